//! Advisory file lock with a bounded wait.
//!
//! The lock file is only a synchronization handle. Its content is never read or written, and
//! it is never deleted: removing it while another process is about to lock it would let two
//! processes hold "the" lock on two different files. Stale lock files in the temp directory
//! are left for the operating system to reclaim.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::pal::{Platform, PlatformFacade};

/// How often a contended lock is retried while waiting.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Holds an exclusive advisory lock until dropped.
#[derive(Debug)]
pub(crate) struct FileLockGuard {
    file: File,
    platform: PlatformFacade,
}

/// Takes an exclusive advisory lock on the file at `path`, creating the file if needed.
///
/// Retries every [`POLL_INTERVAL`] until `timeout` has passed. Returns `Ok(None)` if the lock
/// is still held elsewhere when the time runs out. A zero timeout makes exactly one attempt.
pub(crate) fn acquire(
    path: &Path,
    timeout: Duration,
    platform: &PlatformFacade,
) -> io::Result<Option<FileLockGuard>> {
    let file = open_lock_file(path)?;

    let wait_started = Instant::now();

    loop {
        if platform.try_lock_exclusive(&file)? {
            return Ok(Some(FileLockGuard {
                file,
                platform: platform.clone(),
            }));
        }

        let waited = wait_started.elapsed();

        if waited >= timeout {
            return Ok(None);
        }

        tracing::debug!(lock_path = %path.display(), ?waited, "record file lock is contended, waiting");

        thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(waited)));
    }
}

/// Opens the lock file, creating it if it does not exist yet.
///
/// The lock file may have been created by another user. It is shared between all users of the
/// temp directory, so an existing file we cannot write to is opened for reading only, which is
/// enough to lock it.
fn open_lock_file(path: &Path) -> io::Result<File> {
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
    {
        Err(error) if error.kind() == io::ErrorKind::PermissionDenied => File::open(path),
        result => result,
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // Closing the file releases the lock anyway, so a failed unlock is not fatal.
        if let Err(error) = self.platform.unlock(&self.file) {
            tracing::warn!(%error, "failed to release record file lock explicitly");
        }
    }
}
