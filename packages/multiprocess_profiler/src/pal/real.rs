use std::fs::File;
use std::io;
use std::time::Instant;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::pal::Platform;
#[cfg(unix)]
use crate::pal::unix as os;
#[cfg(windows)]
use crate::pal::windows as os;

/// The operating system that the build is targeting.
///
/// You would only use a different platform in unit tests that need to control the clock,
/// the lock outcome or the reported process identity.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

// Trivial forwarder to system APIs - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Platform for BuildTargetPlatform {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn try_lock_exclusive(&self, file: &File) -> io::Result<bool> {
        os::try_lock_exclusive(file)
    }

    fn unlock(&self, file: &File) -> io::Result<()> {
        os::unlock(file)
    }

    fn current_process_id(&self) -> u32 {
        std::process::id()
    }

    fn parent_process_id(&self) -> Option<u32> {
        os::parent_process_id()
    }

    fn process_name(&self, process_id: u32) -> Option<String> {
        let pid = Pid::from_u32(process_id);

        refreshed_system(pid)
            .process(pid)
            .map(|process| process.name().to_string_lossy().into_owned())
    }
}

/// Loads the minimal process table needed to describe a single process.
pub(crate) fn refreshed_system(pid: Pid) -> System {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        false,
        ProcessRefreshKind::nothing(),
    );
    system
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
    fn current_process_has_a_name() {
        let platform = BuildTargetPlatform;
        let name = platform.process_name(platform.current_process_id());

        assert!(name.is_some_and(|name| !name.is_empty()));
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
    fn parent_differs_from_current_process() {
        let platform = BuildTargetPlatform;

        let parent = platform
            .parent_process_id()
            .expect("test runner always has a parent process");
        assert_ne!(parent, platform.current_process_id());
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
    fn second_handle_cannot_lock_while_first_holds_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");

        let first = File::create(&path).unwrap();
        let second = File::options().write(true).open(&path).unwrap();

        let platform = BuildTargetPlatform;

        assert!(platform.try_lock_exclusive(&first).unwrap());
        assert!(!platform.try_lock_exclusive(&second).unwrap());

        platform.unlock(&first).unwrap();
        assert!(platform.try_lock_exclusive(&second).unwrap());
        platform.unlock(&second).unwrap();
    }
}
