use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::time::Instant;

/// Operating system capabilities used by the profiler.
///
/// This trait is automatically mocked by mockall in test builds, generating `MockPlatform`.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Reads the monotonic clock used for all elapsed time calculations.
    fn now(&self) -> Instant;

    /// Attempts to take an exclusive advisory lock on the file without blocking.
    ///
    /// Returns `Ok(false)` if another handle currently holds the lock.
    fn try_lock_exclusive(&self, file: &File) -> io::Result<bool>;

    /// Releases an advisory lock previously taken via `try_lock_exclusive()`.
    fn unlock(&self, file: &File) -> io::Result<()>;

    /// The OS identifier of the current process.
    fn current_process_id(&self) -> u32;

    /// The OS identifier of the parent of the current process, if the platform can tell.
    fn parent_process_id(&self) -> Option<u32>;

    /// Best-effort lookup of the executable name of a process.
    fn process_name(&self, process_id: u32) -> Option<String>;
}
