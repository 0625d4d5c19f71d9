//! Identity of the process that takes a measurement.

use crate::pal::Platform;

/// Name recorded when a process name cannot be determined.
pub(crate) const UNKNOWN_NAME: &str = "unknown";

/// Process identity captured at the end of a measurement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ProcessIdentity {
    pub(crate) process_id: u32,
    pub(crate) parent_process_id: Option<u32>,
    pub(crate) process_name: String,
    pub(crate) parent_process_name: String,
}

impl ProcessIdentity {
    /// Captures the identity of the current process and its parent.
    ///
    /// Name lookups are best-effort. A process that has already exited or that we are not
    /// permitted to inspect is reported as [`UNKNOWN_NAME`] instead of failing the measurement.
    pub(crate) fn capture(platform: &impl Platform) -> Self {
        let process_id = platform.current_process_id();
        let parent_process_id = platform.parent_process_id();

        let process_name = platform
            .process_name(process_id)
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let parent_process_name = parent_process_id
            .and_then(|ppid| platform.process_name(ppid))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        Self {
            process_id,
            parent_process_id,
            process_name,
            parent_process_name,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::pal::{MockPlatform, PlatformFacade};

    #[test]
    fn captures_both_processes() {
        let mut platform = MockPlatform::new();
        platform.expect_current_process_id().return_const(42_u32);
        platform.expect_parent_process_id().return_const(Some(7_u32));
        platform
            .expect_process_name()
            .with(eq(42))
            .return_const(Some("worker".to_string()));
        platform
            .expect_process_name()
            .with(eq(7))
            .return_const(Some("shell".to_string()));

        let identity = ProcessIdentity::capture(&PlatformFacade::from_mock(platform));

        assert_eq!(
            identity,
            ProcessIdentity {
                process_id: 42,
                parent_process_id: Some(7),
                process_name: "worker".to_string(),
                parent_process_name: "shell".to_string(),
            }
        );
    }

    #[test]
    fn failed_name_lookup_falls_back_to_unknown() {
        let mut platform = MockPlatform::new();
        platform.expect_current_process_id().return_const(42_u32);
        platform.expect_parent_process_id().return_const(Some(7_u32));
        platform.expect_process_name().return_const(None::<String>);

        let identity = ProcessIdentity::capture(&PlatformFacade::from_mock(platform));

        assert_eq!(identity.process_name, UNKNOWN_NAME);
        assert_eq!(identity.parent_process_name, UNKNOWN_NAME);
    }

    #[test]
    fn missing_parent_skips_parent_lookup() {
        let mut platform = MockPlatform::new();
        platform.expect_current_process_id().return_const(42_u32);
        platform.expect_parent_process_id().return_const(None::<u32>);
        platform
            .expect_process_name()
            .with(eq(42))
            .times(1)
            .return_const(Some("worker".to_string()));

        let identity = ProcessIdentity::capture(&PlatformFacade::from_mock(platform));

        assert_eq!(identity.parent_process_id, None);
        assert_eq!(identity.parent_process_name, UNKNOWN_NAME);
    }
}
