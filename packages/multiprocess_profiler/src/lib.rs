#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Execution time profiling for programs made of many cooperating processes.
//!
//! Every measurement appends one record to a shared CSV file. Any number of threads and
//! processes can append to the same file at the same time: appends are serialized by an
//! advisory lock on a companion lock file, so records never interleave and the header row is
//! written exactly once.
//!
//! The core functionality includes:
//! - [`Profiler`] - Measures the wall-clock time of a code region, excluding paused intervals
//! - [`ProfileScope`] - Ends a measurement when dropped, recording errors and panics
//! - [`ProfiledFn`] - Measures every call of a wrapped callable
//! - [`RecordSink`] - Appends records to the shared file under the lock
//! - [`ProfilerOptions`] - Configures naming, lock timeout, verbose output and the file path
//!
//! # Scoped measurement
//!
//! ```no_run
//! use multiprocess_profiler::{Profiler, ProfilerOptions};
//!
//! let mut profiler = Profiler::new(ProfilerOptions::new().id("load_inputs"));
//!
//! {
//!     let mut scope = profiler.scope()?;
//!     // Measured work.
//!     scope.pause()?;
//!     // Work that is not measured.
//!     scope.resume()?;
//! } // The record is appended here, even if the region panics.
//! # Ok::<(), multiprocess_profiler::Error>(())
//! ```
//!
//! The closure form hands back whatever the closure returned, after recording it:
//!
//! ```no_run
//! use multiprocess_profiler::{Profiler, ProfilerOptions};
//!
//! let mut profiler = Profiler::new(ProfilerOptions::new());
//!
//! // Named after this line of code, as no identifier is configured.
//! let first = profiler.measure(|| "12".parse::<u8>())?;
//!
//! // If the record cannot be saved, the error still carries what the closure returned.
//! let second = match profiler.measure(|| "34".parse::<u8>()) {
//!     Ok(outcome) => outcome,
//!     Err(error) => error.into_outcome().expect("the closure was called"),
//! };
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Manual measurement
//!
//! ```no_run
//! use multiprocess_profiler::{Profiler, ProfilerOptions};
//!
//! let mut profiler = Profiler::new(ProfilerOptions::new().verbose(true));
//!
//! profiler.start()?;
//! // Measured work. A panic here records nothing.
//! profiler.stop()?;
//! # Ok::<(), multiprocess_profiler::Error>(())
//! ```
//!
//! # Wrapped callables
//!
//! ```no_run
//! use multiprocess_profiler::ProfilerOptions;
//!
//! fn compute() -> Result<u64, std::io::Error> {
//!     Ok((1..=20).product())
//! }
//!
//! let compute = ProfilerOptions::new().result_path("timings").wrap(compute);
//!
//! // Each call appends a record named after the function to `timings.csv`.
//! let value = compute.call()??;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Record file
//!
//! The first line of the file is the header ([`HEADER`]). Every record is one row with the
//! identifier, the elapsed seconds, the process and parent process IDs and names, whether the
//! region failed and, if so, the error type, message and details. Rows end with `\r\n`.
//!
//! If the lock cannot be taken within the configured timeout, the record is dropped by default
//! and a warning is logged via `tracing`. Disable `ignore_timeout` to get
//! [`Error::SinkTimeout`] instead.

mod error;
mod identity;
mod lock;
mod options;
mod pal;
mod profiler;
mod record;
mod sink;
mod wrap;

pub use error::{Error, LogError, MeasureError, MeasureResult, Result};
pub use options::{LogFunction, NameProvider, ProfilerOptions, UNKNOWN_ID};
pub use profiler::{ProfileScope, Profiler};
pub use record::{HEADER, ProfileRecord, RegionError};
pub use sink::{AppendOutcome, RecordSink};
pub use wrap::ProfiledFn;

/// Expands to the path of the enclosing function, for use as a measurement identifier.
///
/// ```
/// use multiprocess_profiler::function_name;
///
/// fn load_inputs() -> &'static str {
///     function_name!()
/// }
///
/// assert!(load_inputs().ends_with("load_inputs"));
/// ```
#[macro_export]
macro_rules! function_name {
    () => {{
        fn here() {}
        let name = ::std::any::type_name_of_val(&here);
        name.strip_suffix("::here").unwrap_or(name)
    }};
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #[test]
    fn function_name_is_enclosing_function() {
        let name = function_name!();

        assert!(name.ends_with("tests::function_name_is_enclosing_function"));
        assert!(name.starts_with("multiprocess_profiler::"));
    }
}
