use std::any;
use std::fmt::{self, Debug, Display};

use crate::pal::PlatformFacade;
use crate::{MeasureResult, Profiler, ProfilerOptions};

/// A callable whose every invocation is measured.
///
/// The identifier is resolved once, when the callable is wrapped. With auto-naming, unnamed
/// callables are named after their type, which for functions is the function path. Each call
/// uses a fresh [`Profiler`], so a wrapped callable can be shared between threads and invoked
/// concurrently.
///
/// # Example
///
/// ```no_run
/// use multiprocess_profiler::{ProfilerOptions, function_name};
///
/// fn checksum(data: &[u8]) -> Result<u32, std::io::Error> {
///     Ok(data.iter().map(|&b| u32::from(b)).sum())
/// }
///
/// let profiled = ProfilerOptions::new().id(function_name!()).wrap(checksum);
///
/// let sum = profiled.call_with(b"abc".as_slice())??;
/// assert_eq!(sum, 294);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ProfiledFn<F> {
    options: ProfilerOptions,
    id: String,
    platform: PlatformFacade,
    f: F,
}

impl<F> ProfiledFn<F> {
    /// Wraps `f` so that every call is measured with the given options.
    #[must_use]
    pub fn new(options: ProfilerOptions, f: F) -> Self {
        Self::with_platform(options, PlatformFacade::target(), f)
    }

    pub(crate) fn with_platform(options: ProfilerOptions, platform: PlatformFacade, f: F) -> Self {
        let id = options.resolve_id(|| any::type_name::<F>().to_string());

        Self {
            options,
            id,
            platform,
            f,
        }
    }

    /// The identifier written for every call.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unwraps the callable.
    #[must_use]
    pub fn into_inner(self) -> F {
        self.f
    }

    fn profiler(&self) -> Profiler {
        let id = self.id.clone();
        Profiler::with_platform(self.options.clone(), self.platform.clone(), || id)
    }

    /// Calls the wrapped callable and measures the call.
    ///
    /// The inner `Result` is exactly what the callable returned. An `Err` marks the record as
    /// broken. A panic is recorded as broken and then resumed.
    ///
    /// # Errors
    ///
    /// Profiler failures, as described on [`Profiler::measure()`]. The callable's outcome is
    /// carried in the error if the record could not be saved.
    pub fn call<T, E>(&self) -> MeasureResult<T, E>
    where
        F: Fn() -> std::result::Result<T, E>,
        E: Debug + Display,
    {
        self.profiler().measure(&self.f)
    }

    /// Calls the wrapped single-argument callable with `arg` and measures the call.
    ///
    /// Use a tuple to pass more than one value.
    ///
    /// # Errors
    ///
    /// Profiler failures, as described on [`Profiler::measure()`]. The callable's outcome is
    /// carried in the error if the record could not be saved.
    pub fn call_with<A, T, E>(&self, arg: A) -> MeasureResult<T, E>
    where
        F: Fn(A) -> std::result::Result<T, E>,
        E: Debug + Display,
    {
        self.profiler().measure(|| (self.f)(arg))
    }
}

impl ProfilerOptions {
    /// Wraps `f` so that every call is measured with these options.
    #[must_use]
    pub fn wrap<F>(self, f: F) -> ProfiledFn<F> {
        ProfiledFn::new(self, f)
    }
}

// Debug implementations have no API contract to test.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl<F> Debug for ProfiledFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfiledFn")
            .field("id", &self.id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
