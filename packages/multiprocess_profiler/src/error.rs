use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by a caller-supplied log function.
pub type LogError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while profiling a region or persisting its record.
///
/// Errors raised by the measured region itself are never represented here. They are captured
/// as [`RegionError`][crate::RegionError] data and handed back to the caller unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A measurement was started on a profiler that is already measuring.
    #[error("profiler is already started")]
    AlreadyStarted,

    /// The profiler was paused, resumed or ended without a measurement in progress.
    #[error("profiler was not started")]
    NotStarted,

    /// The record file lock could not be acquired in time and timeouts are not ignored.
    #[error("timed out after {timeout:?} waiting for the record file lock at '{}'", lock_path.display())]
    SinkTimeout {
        /// The lock file that was contended.
        lock_path: PathBuf,

        /// How long we waited before giving up.
        timeout: Duration,
    },

    /// Locking, opening or writing the record file failed.
    #[error("failed to append to the record file '{}'", path.display())]
    SinkFailure {
        /// The file we were operating on when the failure happened.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The caller-supplied log function failed during verbose reporting.
    #[error("the log function failed")]
    LogFailure {
        /// The error returned by the log function.
        #[source]
        source: LogError,
    },
}

/// A specialized `Result` type for profiler operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

/// The result of a measured call: the callable's own outcome, or a profiler failure that still
/// carries that outcome if the callable ran.
pub type MeasureResult<T, E> = std::result::Result<std::result::Result<T, E>, MeasureError<T, E>>;

/// A measured call that the profiler could not handle completely.
///
/// If the callable ran, its outcome is preserved here unchanged and can be recovered with
/// [`into_outcome()`][Self::into_outcome], so a recording failure never hides the caller's
/// own error.
#[derive(Debug)]
#[non_exhaustive]
pub enum MeasureError<T, E> {
    /// The measurement could not start, so the callable was not called.
    NotRun(Error),

    /// The callable ran but its record could not be saved.
    NotRecorded {
        /// Why the record could not be saved.
        error: Error,

        /// What the callable returned.
        outcome: std::result::Result<T, E>,
    },
}

impl<T, E> MeasureError<T, E> {
    /// The profiler failure.
    #[must_use]
    pub fn error(&self) -> &Error {
        match self {
            Self::NotRun(error) | Self::NotRecorded { error, .. } => error,
        }
    }

    /// What the callable returned, if it was called.
    #[must_use]
    pub fn outcome(&self) -> Option<&std::result::Result<T, E>> {
        match self {
            Self::NotRun(_) => None,
            Self::NotRecorded { outcome, .. } => Some(outcome),
        }
    }

    /// Discards the profiler failure and returns what the callable returned, if it was called.
    #[must_use]
    pub fn into_outcome(self) -> Option<std::result::Result<T, E>> {
        match self {
            Self::NotRun(_) => None,
            Self::NotRecorded { outcome, .. } => Some(outcome),
        }
    }
}

impl<T, E> fmt::Display for MeasureError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRun(_) => write!(f, "the measured callable was not run"),
            Self::NotRecorded { .. } => write!(f, "the measured callable ran but was not recorded"),
        }
    }
}

impl<T, E> std::error::Error for MeasureError<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::error::Error as _;
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn sink_failure_exposes_io_source() {
        let error = Error::SinkFailure {
            path: PathBuf::from("profile.csv"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        };

        assert!(error.to_string().contains("profile.csv"));

        let source = error.source().expect("sink failure always has a source");
        assert_eq!(source.to_string(), "read-only");
    }

    #[test]
    fn sink_timeout_names_lock_file() {
        let error = Error::SinkTimeout {
            lock_path: PathBuf::from("/tmp/profile.csv.profiler_lock"),
            timeout: Duration::from_secs(3),
        };

        let message = error.to_string();
        assert!(message.contains("profile.csv.profiler_lock"));
        assert!(message.contains("3s"));
    }

    assert_impl_all!(MeasureError<u32, io::Error>: Send, Sync, std::error::Error);

    #[test]
    fn measure_error_keeps_outcome() {
        let error = MeasureError::NotRecorded {
            error: Error::NotStarted,
            outcome: Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "no input")),
        };

        assert!(matches!(error.error(), Error::NotStarted));
        assert!(error.source().is_some());
        assert!(error.outcome().is_some());

        let outcome = error.into_outcome().unwrap();
        assert_eq!(outcome.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn measure_error_without_run_has_no_outcome() {
        let error = MeasureError::<(), io::Error>::NotRun(Error::AlreadyStarted);

        assert!(matches!(error.error(), Error::AlreadyStarted));
        assert!(error.outcome().is_none());
        assert!(error.into_outcome().is_none());
    }

    #[test]
    fn log_failure_keeps_original_error() {
        let error = Error::LogFailure {
            source: "stdout is closed".into(),
        };

        let source = error.source().expect("log failure always has a source");
        assert_eq!(source.to_string(), "stdout is closed");
    }
}
