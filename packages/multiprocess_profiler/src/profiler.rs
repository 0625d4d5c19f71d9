//! The measurement state machine.

use std::any::Any;
use std::borrow::Cow;
use std::fmt::{Debug, Display};
use std::panic::{self, AssertUnwindSafe, Location};
use std::thread;
use std::time::{Duration, Instant};

use crate::identity::ProcessIdentity;
use crate::pal::{Platform, PlatformFacade};
use crate::{
    AppendOutcome, Error, MeasureError, MeasureResult, ProfileRecord, ProfilerOptions, RecordSink,
    RegionError, Result,
};

/// Identifiers longer than this are shortened in verbose output if formatting is allowed.
const MAX_DISPLAY_ID_CHARS: usize = 30;

/// Measures the wall-clock time of a code region and appends the result to a shared record file.
///
/// A profiler measures one region at a time. After a measurement ends, the same profiler can
/// start the next one.
///
/// There are three ways to bracket a region:
///
/// * [`scope()`][Self::scope] returns a guard that ends the measurement when dropped, on every
///   exit path including panics. [`measure()`][Self::measure] runs a closure inside such a scope.
///   This is the recommended form.
/// * [`ProfiledFn`][crate::ProfiledFn] wraps a callable so that every invocation is measured
///   by a fresh profiler.
/// * [`begin()`][Self::begin] and [`end()`][Self::end] bracket the region manually. This form
///   has no safety net: dropping a profiler with a measurement in progress records nothing.
///
/// # Example
///
/// ```no_run
/// use multiprocess_profiler::{Profiler, ProfilerOptions};
///
/// let mut profiler = Profiler::new(ProfilerOptions::new().id("manual_region"));
///
/// profiler.begin()?;
/// // Measured work.
/// profiler.pause()?;
/// // Work that is not measured.
/// profiler.resume()?;
/// // More measured work.
/// let record = profiler.end()?;
///
/// println!("{record}");
/// # Ok::<(), multiprocess_profiler::Error>(())
/// ```
#[derive(Debug)]
pub struct Profiler {
    id: String,
    options: ProfilerOptions,
    sink: RecordSink,
    platform: PlatformFacade,

    // None while no measurement is in progress.
    measurement: Option<Measurement>,
    finished: bool,
}

#[derive(Clone, Copy, Debug)]
struct Measurement {
    reference_time: Instant,
    paused_time: Duration,

    // Some while paused.
    pause_reference_time: Option<Instant>,
}

impl Profiler {
    /// Creates a profiler with the given options.
    ///
    /// If the options name no identifier and auto-naming is enabled, the measurement is named
    /// after the location of this call (`file:line:column`).
    #[must_use]
    #[track_caller]
    pub fn new(options: ProfilerOptions) -> Self {
        let location = Location::caller();

        Self::with_platform(options, PlatformFacade::target(), || location.to_string())
    }

    pub(crate) fn with_platform(
        options: ProfilerOptions,
        platform: PlatformFacade,
        auto_name: impl FnOnce() -> String,
    ) -> Self {
        let id = options.resolve_id(auto_name);
        let sink = RecordSink::with_platform(
            options.record_path(),
            options.lock_timeout(),
            platform.clone(),
        );

        Self {
            id,
            options,
            sink,
            platform,
            measurement: None,
            finished: false,
        }
    }

    /// The identifier written to the record file.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The sink that receives the records of this profiler.
    #[must_use]
    pub fn sink(&self) -> &RecordSink {
        &self.sink
    }

    /// Whether a measurement is in progress.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.measurement.is_some()
    }

    /// Whether a measurement is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.measurement
            .is_some_and(|measurement| measurement.pause_reference_time.is_some())
    }

    /// Whether the most recent measurement has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Starts a measurement.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if a measurement is already in progress.
    pub fn begin(&mut self) -> Result<()> {
        if self.measurement.is_some() {
            return Err(Error::AlreadyStarted);
        }

        self.finished = false;
        self.measurement = Some(Measurement {
            reference_time: self.platform.now(),
            paused_time: Duration::ZERO,
            pause_reference_time: None,
        });

        Ok(())
    }

    /// Starts a measurement in manual mode.
    ///
    /// Equivalent to [`begin()`][Self::begin], but in verbose mode it also reports that the
    /// region is not protected by a scope, so errors and panics in it are not recorded.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if a measurement is already in progress.
    /// [`Error::LogFailure`] if the log function fails.
    pub fn start(&mut self) -> Result<()> {
        if self.measurement.is_some() {
            return Err(Error::AlreadyStarted);
        }

        if self.options.is_verbose() {
            self.log("Using start method to initialize profiler, exception handling will be disabled")?;
        }

        self.begin()
    }

    /// Stops the clock until [`resume()`][Self::resume] is called. Does nothing if already paused.
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] if no measurement is in progress.
    pub fn pause(&mut self) -> Result<()> {
        let measurement = self.measurement.as_mut().ok_or(Error::NotStarted)?;

        if measurement.pause_reference_time.is_none() {
            measurement.pause_reference_time = Some(self.platform.now());
        }

        Ok(())
    }

    /// Restarts the clock after [`pause()`][Self::pause]. Does nothing if not paused.
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] if no measurement is in progress.
    pub fn resume(&mut self) -> Result<()> {
        let measurement = self.measurement.as_mut().ok_or(Error::NotStarted)?;

        if let Some(paused_at) = measurement.pause_reference_time.take() {
            let now = self.platform.now();
            measurement.paused_time = measurement
                .paused_time
                .saturating_add(now.saturating_duration_since(paused_at));
        }

        Ok(())
    }

    /// Ends the measurement and appends its record to the record file.
    ///
    /// A paused measurement is resumed first, so the pause lasts until now.
    ///
    /// The profiler returns to the not-started state even if this call fails, so it can be
    /// reused right away.
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] if no measurement is in progress. [`Error::SinkTimeout`] and
    /// [`Error::SinkFailure`] as described on [`RecordSink::append()`].
    /// [`Error::LogFailure`] if the log function fails in verbose mode; the record is still
    /// appended in that case.
    pub fn end(&mut self) -> Result<ProfileRecord> {
        self.finish(None)
    }

    /// Alias of [`end()`][Self::end], matching [`start()`][Self::start].
    ///
    /// # Errors
    ///
    /// Same as [`end()`][Self::end].
    pub fn stop(&mut self) -> Result<ProfileRecord> {
        self.end()
    }

    /// Ends the measurement of a region that failed with `error`.
    ///
    /// The record is marked as broken and describes the error. The error itself remains with
    /// the caller.
    ///
    /// # Errors
    ///
    /// Same as [`end()`][Self::end].
    pub fn end_with_error<E>(&mut self, error: &E) -> Result<ProfileRecord>
    where
        E: Debug + Display + ?Sized,
    {
        self.finish(Some(RegionError::from_error(error)))
    }

    /// Starts a measurement that ends when the returned guard is dropped or finished.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if a measurement is already in progress.
    pub fn scope(&mut self) -> Result<ProfileScope<'_>> {
        self.begin()?;

        Ok(ProfileScope {
            profiler: self,
            region_error: None,
            closed: false,
        })
    }

    /// Measures a fallible closure.
    ///
    /// The inner `Result` is exactly what the closure returned, handed back after the record is
    /// appended. An `Err` from the closure marks the record as broken. A panic in the closure is
    /// recorded as broken and then resumed unchanged.
    ///
    /// # Errors
    ///
    /// [`MeasureError::NotRun`] if the measurement cannot start, as described on
    /// [`begin()`][Self::begin]. The closure is not called in that case.
    ///
    /// [`MeasureError::NotRecorded`] if the record cannot be saved, as described on
    /// [`end()`][Self::end]. The closure's outcome is carried in the error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use multiprocess_profiler::{Profiler, ProfilerOptions};
    ///
    /// let mut profiler = Profiler::new(ProfilerOptions::new().id("parse"));
    ///
    /// let parsed = match profiler.measure(|| "42".parse::<u32>()) {
    ///     Ok(outcome) => outcome,
    ///     Err(error) => {
    ///         eprintln!("not profiled: {}", error.error());
    ///         error.into_outcome().expect("the closure was called")
    ///     }
    /// };
    /// assert_eq!(parsed, Ok(42));
    /// ```
    pub fn measure<F, T, E>(&mut self, f: F) -> MeasureResult<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Debug + Display,
    {
        let mut scope = self.scope().map_err(MeasureError::NotRun)?;

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(outcome) => {
                if let Err(error) = &outcome {
                    scope.fail(error);
                }

                match scope.finish() {
                    Ok(_) => Ok(outcome),
                    Err(error) => Err(MeasureError::NotRecorded { error, outcome }),
                }
            }
            Err(payload) => {
                scope.region_error = Some(RegionError::from_panic(panic_message(&*payload), None));

                // The panic has priority over anything that goes wrong while recording it.
                if let Err(error) = scope.finish() {
                    tracing::error!(%error, "failed to record measurement of panicked region");
                }

                panic::resume_unwind(payload)
            }
        }
    }

    fn finish(&mut self, region_error: Option<RegionError>) -> Result<ProfileRecord> {
        let measurement = self.measurement.take().ok_or(Error::NotStarted)?;
        self.finished = true;

        let end_time = self.platform.now();

        let paused_time = measurement
            .pause_reference_time
            .map_or(measurement.paused_time, |paused_at| {
                measurement
                    .paused_time
                    .saturating_add(end_time.saturating_duration_since(paused_at))
            });

        let elapsed = end_time
            .saturating_duration_since(measurement.reference_time)
            .saturating_sub(paused_time);

        let identity = ProcessIdentity::capture(&self.platform);

        let record = ProfileRecord::new(
            self.id.clone(),
            elapsed.as_secs_f64(),
            identity.process_id,
            identity.parent_process_id,
            identity.process_name,
            identity.parent_process_name,
            region_error,
        );

        let summary_logged = if self.options.is_verbose() {
            self.log(&self.summary_line(&record))
        } else {
            Ok(())
        };

        let outcome = self.sink.append(&record, self.options.ignores_timeout())?;

        summary_logged?;

        if outcome == AppendOutcome::Skipped && self.options.is_verbose() {
            self.log(&format!(
                "[Profiler] skipped saving results from {} ({} / pid {}), csv lock timed out after {:.5} seconds",
                record.id(),
                record.process_name(),
                record.process_id(),
                self.sink.timeout().as_secs_f64()
            ))?;
        }

        Ok(record)
    }

    fn summary_line(&self, record: &ProfileRecord) -> String {
        let id = display_id(record.id(), self.options.formats_ids());
        let elapsed = format!("{:.5} seconds", record.elapsed_seconds());
        let broken = if record.is_broken() { "(broken)" } else { "" };

        format!(
            "[Profiler] {id:<30} - {elapsed:<23} - process {}/{} {broken}",
            record.process_name(),
            record.process_id()
        )
    }

    fn log(&self, message: &str) -> Result<()> {
        self.options
            .log(message)
            .map_err(|source| Error::LogFailure { source })
    }
}

/// A measurement in progress that ends when this guard is dropped.
///
/// Created by [`Profiler::scope()`]. Prefer [`finish()`][Self::finish] to observe profiler
/// errors; when the guard is simply dropped, errors are reported via `tracing` instead.
///
/// If the guard is dropped while the thread is panicking, the record is marked as broken.
#[derive(Debug)]
#[must_use = "the measurement ends when the scope is dropped"]
pub struct ProfileScope<'p> {
    profiler: &'p mut Profiler,
    region_error: Option<RegionError>,
    closed: bool,
}

impl ProfileScope<'_> {
    /// The profiler that owns the measurement.
    #[must_use]
    pub fn profiler(&self) -> &Profiler {
        self.profiler
    }

    /// See [`Profiler::pause()`].
    ///
    /// # Errors
    ///
    /// Never fails while the scope is open, as a measurement is always in progress.
    pub fn pause(&mut self) -> Result<()> {
        self.profiler.pause()
    }

    /// See [`Profiler::resume()`].
    ///
    /// # Errors
    ///
    /// Never fails while the scope is open, as a measurement is always in progress.
    pub fn resume(&mut self) -> Result<()> {
        self.profiler.resume()
    }

    /// Marks the region as failed with `error`. The last error reported wins.
    pub fn fail<E>(&mut self, error: &E)
    where
        E: Debug + Display + ?Sized,
    {
        self.region_error = Some(RegionError::from_error(error));
    }

    /// Ends the measurement and appends its record.
    ///
    /// # Errors
    ///
    /// Same as [`Profiler::end()`].
    pub fn finish(mut self) -> Result<ProfileRecord> {
        self.closed = true;
        let region_error = self.region_error.take();
        self.profiler.finish(region_error)
    }
}

impl Drop for ProfileScope<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let region_error = self.region_error.take().or_else(|| {
            thread::panicking().then(|| RegionError::from_panic("thread panicked", None))
        });

        if let Err(error) = self.profiler.finish(region_error) {
            tracing::error!(
                %error,
                id = self.profiler.id(),
                "failed to record measurement when leaving profiled scope"
            );
        }
    }
}

/// Shortens identifiers that would not fit the verbose output column.
fn display_id(id: &str, allow_formatting: bool) -> Cow<'_, str> {
    if !allow_formatting || id.chars().count() <= MAX_DISPLAY_ID_CHARS {
        return Cow::Borrowed(id);
    }

    let mut shortened: String = id
        .chars()
        .take(MAX_DISPLAY_ID_CHARS.saturating_sub(3))
        .collect();
    shortened.push_str("...");
    Cow::Owned(shortened)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
