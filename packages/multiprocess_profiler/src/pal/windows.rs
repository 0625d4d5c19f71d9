use std::fs::File;
use std::io;
use std::os::windows::io::AsRawHandle;

use windows::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
use windows::Win32::Storage::FileSystem::{
    LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx, UnlockFileEx,
};
use windows::Win32::System::IO::OVERLAPPED;

use sysinfo::Pid;

use crate::pal::refreshed_system;

pub(crate) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    let handle = HANDLE(file.as_raw_handle());
    let mut overlapped = OVERLAPPED::default();

    // SAFETY: The handle is owned by `file`, which outlives the call. The OVERLAPPED
    // structure is only used for the duration of this synchronous call.
    let result = unsafe {
        LockFileEx(
            handle,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            None,
            u32::MAX,
            u32::MAX,
            &raw mut overlapped,
        )
    };

    if result.is_ok() {
        return Ok(true);
    }

    let error = io::Error::last_os_error();

    if error.raw_os_error() == i32::try_from(ERROR_LOCK_VIOLATION.0).ok() {
        Ok(false)
    } else {
        Err(error)
    }
}

pub(crate) fn unlock(file: &File) -> io::Result<()> {
    let handle = HANDLE(file.as_raw_handle());
    let mut overlapped = OVERLAPPED::default();

    // SAFETY: The handle is owned by `file`, which outlives the call. The OVERLAPPED
    // structure is only used for the duration of this synchronous call.
    let result = unsafe { UnlockFileEx(handle, None, u32::MAX, u32::MAX, &raw mut overlapped) };

    if result.is_ok() {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// Windows has no direct parent process query, so we go through the process table.
pub(crate) fn parent_process_id() -> Option<u32> {
    let pid = Pid::from_u32(std::process::id());

    refreshed_system(pid)
        .process(pid)
        .and_then(sysinfo::Process::parent)
        .map(|parent| parent.as_u32())
}
