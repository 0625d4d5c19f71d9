//! Multiprocess-safe append-only record file.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{self, Path, PathBuf};
use std::time::Duration;

use crate::pal::PlatformFacade;
use crate::record::header_row;
use crate::{Error, ProfileRecord, Result, lock};

const LOCK_FILE_SUFFIX: &str = ".profiler_lock";

// ASCII only, so this is also the byte length.
const LOCK_NAME_PREFIX_MAX_CHARS: usize = 64;

/// What happened to a record handed to [`RecordSink::append()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum AppendOutcome {
    /// The record was appended to the record file.
    Written,

    /// The lock could not be acquired in time and the record was dropped, as permitted by
    /// the `ignore_timeout` policy.
    Skipped,
}

/// Appends profiling records to a file shared by any number of processes.
///
/// Every append takes an exclusive advisory lock on a lock file derived from the record file
/// path, so all processes appending to the same record file contend on the same lock no matter
/// which working directory they run in. The lock file lives in the temp directory and is
/// never deleted by this type.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use multiprocess_profiler::RecordSink;
///
/// let sink = RecordSink::new("timings.csv", Duration::from_secs(5));
/// println!("appending to {} under {}", sink.record_path().display(), sink.lock_path().display());
/// ```
#[derive(Clone, Debug)]
pub struct RecordSink {
    record_path: PathBuf,
    lock_path: PathBuf,
    timeout: Duration,
    platform: PlatformFacade,
}

impl RecordSink {
    /// Creates a sink appending to the record file at `record_path`, waiting up to `timeout`
    /// for the lock on every append.
    ///
    /// The path is used as given. See [`ProfilerOptions::record_path()`][crate::ProfilerOptions::record_path]
    /// for the `.csv` extension rule applied by profilers.
    #[must_use]
    pub fn new(record_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_platform(record_path.into(), timeout, PlatformFacade::target())
    }

    pub(crate) fn with_platform(
        record_path: PathBuf,
        timeout: Duration,
        platform: PlatformFacade,
    ) -> Self {
        let lock_path = lock_path_for(&record_path);

        Self {
            record_path,
            lock_path,
            timeout,
            platform,
        }
    }

    /// The record file this sink appends to.
    #[must_use]
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// The lock file guarding the record file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// How long an append waits for the lock.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Appends one record, writing the header first if the record file is empty.
    ///
    /// If the lock cannot be acquired within the timeout, the record is dropped and
    /// [`AppendOutcome::Skipped`] is returned when `ignore_timeout` is set. Otherwise the
    /// call fails with [`Error::SinkTimeout`].
    ///
    /// # Errors
    ///
    /// [`Error::SinkTimeout`] as described above. [`Error::SinkFailure`] if locking, opening or
    /// writing fails for any other reason, regardless of `ignore_timeout`.
    pub fn append(&self, record: &ProfileRecord, ignore_timeout: bool) -> Result<AppendOutcome> {
        let lock = lock::acquire(&self.lock_path, self.timeout, &self.platform).map_err(|source| {
            Error::SinkFailure {
                path: self.lock_path.clone(),
                source,
            }
        })?;

        let Some(_lock) = lock else {
            if !ignore_timeout {
                return Err(Error::SinkTimeout {
                    lock_path: self.lock_path.clone(),
                    timeout: self.timeout,
                });
            }

            tracing::warn!(
                id = record.id(),
                record_path = %self.record_path.display(),
                timeout = ?self.timeout,
                "record file lock timed out, dropping record"
            );

            return Ok(AppendOutcome::Skipped);
        };

        self.write(record).map_err(|source| Error::SinkFailure {
            path: self.record_path.clone(),
            source,
        })?;

        tracing::debug!(
            id = record.id(),
            record_path = %self.record_path.display(),
            "appended profile record"
        );

        Ok(AppendOutcome::Written)
    }

    /// Writes the row (and the header, if needed) with a single write call.
    ///
    /// Must only be called while holding the lock.
    fn write(&self, record: &ProfileRecord) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.record_path)?;

        let mut payload = String::new();

        if file.metadata()?.len() == 0 {
            payload.push_str(&header_row());
        }

        payload.push_str(&record.to_row());

        file.write_all(payload.as_bytes())?;
        file.flush()
    }
}

/// Derives the lock file path from the absolute record file path.
///
/// The same record file always maps to the same lock file, whichever working directory or
/// relative path a process used to name it. The name is a short readable prefix taken from the
/// record file name plus a digest of the absolute path, so it stays within file name limits.
fn lock_path_for(record_path: &Path) -> PathBuf {
    let absolute = path::absolute(record_path).unwrap_or_else(|_| record_path.to_path_buf());

    let prefix: String = absolute
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .take(LOCK_NAME_PREFIX_MAX_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let digest = blake3::hash(absolute.as_os_str().as_encoded_bytes());

    env::temp_dir().join(format!("{prefix}_{}{LOCK_FILE_SUFFIX}", digest.to_hex()))
}
