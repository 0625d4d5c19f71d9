use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

pub(crate) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    // SAFETY: The descriptor is owned by `file`, which outlives the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

    if result == 0 {
        return Ok(true);
    }

    let error = io::Error::last_os_error();

    match error.kind() {
        // Interrupted attempts are treated as contention; the caller polls again.
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(false),
        _ => Err(error),
    }
}

pub(crate) fn unlock(file: &File) -> io::Result<()> {
    // SAFETY: The descriptor is owned by `file`, which outlives the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };

    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

pub(crate) fn parent_process_id() -> Option<u32> {
    // SAFETY: No safety requirements, getppid() always succeeds.
    let ppid = unsafe { libc::getppid() };

    u32::try_from(ppid).ok()
}
