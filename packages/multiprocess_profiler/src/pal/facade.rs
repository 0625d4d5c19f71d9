use std::fs::File;
use std::io;
#[cfg(test)]
use std::sync::Arc;
use std::time::Instant;

#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{BuildTargetPlatform, Platform};

/// Dispatches to either the real platform or, in test builds, a mock.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Target(&'static BuildTargetPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl PlatformFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Platform for PlatformFacade {
    fn now(&self) -> Instant {
        match self {
            Self::Target(p) => p.now(),
            #[cfg(test)]
            Self::Mock(p) => p.now(),
        }
    }

    fn try_lock_exclusive(&self, file: &File) -> io::Result<bool> {
        match self {
            Self::Target(p) => p.try_lock_exclusive(file),
            #[cfg(test)]
            Self::Mock(p) => p.try_lock_exclusive(file),
        }
    }

    fn unlock(&self, file: &File) -> io::Result<()> {
        match self {
            Self::Target(p) => p.unlock(file),
            #[cfg(test)]
            Self::Mock(p) => p.unlock(file),
        }
    }

    fn current_process_id(&self) -> u32 {
        match self {
            Self::Target(p) => p.current_process_id(),
            #[cfg(test)]
            Self::Mock(p) => p.current_process_id(),
        }
    }

    fn parent_process_id(&self) -> Option<u32> {
        match self {
            Self::Target(p) => p.parent_process_id(),
            #[cfg(test)]
            Self::Mock(p) => p.parent_process_id(),
        }
    }

    fn process_name(&self, process_id: u32) -> Option<String> {
        match self {
            Self::Target(p) => p.process_name(process_id),
            #[cfg(test)]
            Self::Mock(p) => p.process_name(process_id),
        }
    }
}

#[cfg(test)]
impl From<MockPlatform> for PlatformFacade {
    fn from(mock: MockPlatform) -> Self {
        Self::from_mock(mock)
    }
}

// Debug implementations have no API contract to test.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl std::fmt::Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(p) => p.fmt(f),
            #[cfg(test)]
            Self::Mock(_) => f.debug_struct("PlatformFacade::Mock").finish(),
        }
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Default for PlatformFacade {
    fn default() -> Self {
        Self::target()
    }
}
