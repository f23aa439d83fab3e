//! Freeze/thaw of whole processes.
//!
//! Each call opens its own handle with only suspend/resume + query rights and
//! closes it before returning. Failed calls have no side effects and are never retried.

/// Suspend/resume transition for a single process.
pub trait SuspendPrimitive: Send + Sync {
    /// Suspend every thread of `pid`. Suspending an already suspended process is
    /// reported as success when the OS call succeeds.
    fn suspend(&self, pid: u32) -> bool;

    /// Resume every thread of `pid`.
    fn resume(&self, pid: u32) -> bool;
}

/// NtSuspendProcess / NtResumeProcess backed primitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct NtProcessControl;

#[cfg(windows)]
mod imp {
    use tracing::warn;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_SUSPEND_RESUME,
    };

    #[link(name = "ntdll")]
    extern "system" {
        fn NtSuspendProcess(process_handle: HANDLE) -> i32;
        fn NtResumeProcess(process_handle: HANDLE) -> i32;
    }

    /// Owned process handle, closed on drop
    struct ProcessHandle(HANDLE);

    impl ProcessHandle {
        fn open(pid: u32) -> Option<Self> {
            match unsafe { OpenProcess(PROCESS_SUSPEND_RESUME | PROCESS_QUERY_INFORMATION, false, pid) } {
                Ok(handle) if !handle.is_invalid() => Some(Self(handle)),
                Ok(_) => None,
                Err(e) => {
                    warn!(pid, error = %e, "OpenProcess failed");
                    None
                }
            }
        }
    }

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    #[derive(Clone, Copy)]
    pub(super) enum Transition {
        Suspend,
        Resume,
    }

    pub(super) fn transition(pid: u32, transition: Transition) -> bool {
        let Some(handle) = ProcessHandle::open(pid) else {
            return false;
        };
        let status = unsafe {
            match transition {
                Transition::Suspend => NtSuspendProcess(handle.0),
                Transition::Resume => NtResumeProcess(handle.0),
            }
        };
        // NT_SUCCESS
        if status < 0 {
            warn!(pid, status = %format!("{:#010x}", status as u32), "NT transition failed");
            return false;
        }
        true
    }
}

#[cfg(windows)]
impl SuspendPrimitive for NtProcessControl {
    fn suspend(&self, pid: u32) -> bool {
        imp::transition(pid, imp::Transition::Suspend)
    }

    fn resume(&self, pid: u32) -> bool {
        imp::transition(pid, imp::Transition::Resume)
    }
}

#[cfg(not(windows))]
impl SuspendPrimitive for NtProcessControl {
    fn suspend(&self, pid: u32) -> bool {
        tracing::warn!(pid, "process suspension is only supported on Windows");
        false
    }

    fn resume(&self, pid: u32) -> bool {
        tracing::warn!(pid, "process resumption is only supported on Windows");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::FakeControl;

    #[test]
    fn test_fake_control_reports_configured_failures() {
        let control = FakeControl::default();
        control.fail_suspend(7);
        assert!(control.suspend(6));
        assert!(!control.suspend(7));
        assert_eq!(control.suspend_calls(6), 1);
        assert_eq!(control.suspend_calls(7), 1);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_nt_control_refuses_off_windows() {
        assert!(!NtProcessControl.suspend(std::process::id()));
        assert!(!NtProcessControl.resume(std::process::id()));
    }
}
