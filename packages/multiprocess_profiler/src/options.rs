use std::fmt::{self, Display};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::LogError;

/// Receives one line of verbose output. Returning an error fails the profiler call with
/// [`Error::LogFailure`][crate::Error::LogFailure].
pub type LogFunction = Arc<dyn Fn(&str) -> Result<(), LogError> + Send + Sync>;

/// Supplies a measurement identifier when no explicit one is configured.
pub type NameProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Identifier used when nothing else names a measurement.
pub const UNKNOWN_ID: &str = "unknown";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RESULT_PATH: &str = "profile";

/// Configuration of a [`Profiler`][crate::Profiler] or a [`ProfiledFn`][crate::ProfiledFn].
///
/// Every property is optional. Use `ProfilerOptions::new()` to start from the defaults and the
/// consuming setters to change them.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use multiprocess_profiler::ProfilerOptions;
///
/// let options = ProfilerOptions::new()
///     .id("load_inputs")
///     .timeout(Duration::from_secs(2))
///     .ignore_timeout(false)
///     .result_path("target/timings");
///
/// assert_eq!(options.record_path(), std::path::Path::new("target/timings.csv"));
/// ```
#[derive(Clone)]
pub struct ProfilerOptions {
    id: Option<String>,
    name_provider: Option<NameProvider>,
    timeout: Duration,
    ignore_timeout: bool,
    verbose: bool,
    log_function: LogFunction,
    allow_formatting: bool,
    result_path: PathBuf,
    auto_naming: bool,
}

impl ProfilerOptions {
    /// Creates options with all properties at their defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            name_provider: None,
            timeout: DEFAULT_TIMEOUT,
            ignore_timeout: true,
            verbose: false,
            log_function: Arc::new(print_line),
            allow_formatting: true,
            result_path: PathBuf::from(DEFAULT_RESULT_PATH),
            auto_naming: true,
        }
    }

    /// Sets the identifier written to the record file. Overrides every other naming rule.
    #[must_use]
    pub fn id(self, id: impl Display) -> Self {
        Self {
            id: Some(id.to_string()),
            ..self
        }
    }

    /// Sets a function that names the measurement when no explicit `id` is set.
    ///
    /// The function is called once, when the profiler is created or the callable is wrapped.
    #[must_use]
    pub fn name_provider(self, provider: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            name_provider: Some(Arc::new(provider)),
            ..self
        }
    }

    /// Sets how long to wait for the record file lock. Defaults to 10 seconds.
    ///
    /// Zero means a single attempt without waiting.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Sets the lock timeout in seconds. Negative and NaN values are clamped to zero.
    #[must_use]
    pub fn timeout_secs(self, seconds: f64) -> Self {
        // f64::max() discards NaN, leaving only infinity to overflow.
        let timeout = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);

        Self { timeout, ..self }
    }

    /// Whether a lock timeout silently drops the record instead of failing. Defaults to `true`.
    #[must_use]
    pub fn ignore_timeout(self, ignore_timeout: bool) -> Self {
        Self {
            ignore_timeout,
            ..self
        }
    }

    /// Whether every measurement is also reported through the log function. Defaults to `false`.
    #[must_use]
    pub fn verbose(self, verbose: bool) -> Self {
        Self { verbose, ..self }
    }

    /// Sets the function that receives verbose output. Defaults to printing to stdout.
    #[must_use]
    pub fn log_function(
        self,
        log_function: impl Fn(&str) -> Result<(), LogError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            log_function: Arc::new(log_function),
            ..self
        }
    }

    /// Whether long identifiers are shortened in verbose output. Defaults to `true`.
    #[must_use]
    pub fn allow_formatting(self, allow_formatting: bool) -> Self {
        Self {
            allow_formatting,
            ..self
        }
    }

    /// Sets the record file path. A `.csv` extension is appended if absent.
    ///
    /// Defaults to `profile`, resolving to `profile.csv` in the working directory.
    #[must_use]
    pub fn result_path(self, result_path: impl Into<PathBuf>) -> Self {
        Self {
            result_path: result_path.into(),
            ..self
        }
    }

    /// Whether unnamed measurements are named after their call site or wrapped callable.
    /// Defaults to `true`. When disabled, unnamed measurements use [`UNKNOWN_ID`].
    #[must_use]
    pub fn auto_naming(self, auto_naming: bool) -> Self {
        Self {
            auto_naming,
            ..self
        }
    }

    /// The path of the record file, with the `.csv` extension applied.
    #[must_use]
    pub fn record_path(&self) -> PathBuf {
        with_csv_extension(&self.result_path)
    }

    /// The configured lock timeout.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn ignores_timeout(&self) -> bool {
        self.ignore_timeout
    }

    pub(crate) fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub(crate) fn formats_ids(&self) -> bool {
        self.allow_formatting
    }

    pub(crate) fn log(&self, message: &str) -> Result<(), LogError> {
        (self.log_function)(message)
    }

    /// Resolves the measurement identifier.
    ///
    /// Precedence: explicit id, name provider, `auto_name` (if auto-naming is enabled),
    /// [`UNKNOWN_ID`].
    pub(crate) fn resolve_id(&self, auto_name: impl FnOnce() -> String) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }

        if let Some(provider) = &self.name_provider {
            return provider();
        }

        if self.auto_naming {
            auto_name()
        } else {
            UNKNOWN_ID.to_string()
        }
    }
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self::new()
    }
}

// Debug implementations have no API contract to test.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl fmt::Debug for ProfilerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilerOptions")
            .field("id", &self.id)
            .field("name_provider", &self.name_provider.as_ref().map(|_| ".."))
            .field("timeout", &self.timeout)
            .field("ignore_timeout", &self.ignore_timeout)
            .field("verbose", &self.verbose)
            .field("allow_formatting", &self.allow_formatting)
            .field("result_path", &self.result_path)
            .field("auto_naming", &self.auto_naming)
            .finish_non_exhaustive()
    }
}

fn print_line(message: &str) -> Result<(), LogError> {
    writeln!(io::stdout().lock(), "{message}")?;
    Ok(())
}

fn with_csv_extension(path: &Path) -> PathBuf {
    if path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"))
    {
        return path.to_path_buf();
    }

    let mut path = path.as_os_str().to_os_string();
    path.push(".csv");
    PathBuf::from(path)
}
