use tracing::{debug, error};

use crate::error::Result;
use crate::services::catalog::matches_any;

/// A live process as seen by one enumeration. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self { pid, name: name.into() }
    }
}

/// Source of live process records.
///
/// Implementors only provide the raw enumeration; filtering by name and
/// excluding our own process are shared.
pub trait ProcessDirectory: Send + Sync {
    /// Enumerate every process visible to the caller's privilege level.
    /// Entries that vanish or cannot be read mid-enumeration are skipped.
    fn try_list_processes(&self) -> Result<Vec<ProcessRecord>>;

    /// Our own pid, never handed out by `resolve`.
    fn own_pid(&self) -> u32 {
        std::process::id()
    }

    /// Like `try_list_processes`, but an enumeration failure yields an empty list.
    fn list_processes(&self) -> Vec<ProcessRecord> {
        self.try_list_processes().unwrap_or_else(|e| {
            error!(error = %e, "process enumeration failed");
            Vec::new()
        })
    }

    /// All pids whose base executable name matches one of `executables` (case-insensitive).
    fn resolve(&self, executables: &[&str]) -> Vec<u32> {
        let own = self.own_pid();
        let pids: Vec<u32> = self
            .list_processes()
            .into_iter()
            .filter(|p| p.pid != own && matches_any(&p.name, executables))
            .map(|p| p.pid)
            .collect();
        debug!(matched = pids.len(), "resolved executables");
        pids
    }
}

/// Live process table via the Toolhelp snapshot API.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

#[cfg(windows)]
mod imp {
    use super::ProcessRecord;
    use crate::error::{Error, Result};
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
    };

    /// Closes the snapshot handle on every exit path
    struct SnapshotGuard(HANDLE);

    impl Drop for SnapshotGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    pub(super) fn enumerate() -> Result<Vec<ProcessRecord>> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::Snapshot(e.to_string()))?;
        if snapshot.is_invalid() {
            return Err(Error::Snapshot("invalid snapshot handle".into()));
        }
        let _guard = SnapshotGuard(snapshot);

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        // Typical desktop has 150-250 processes
        let mut records = Vec::with_capacity(256);
        let mut has_entry = unsafe { Process32FirstW(snapshot, &mut entry).is_ok() };
        while has_entry {
            if let Some(name) = extract_name(&entry.szExeFile) {
                records.push(ProcessRecord::new(entry.th32ProcessID, name));
            }
            has_entry = unsafe { Process32NextW(snapshot, &mut entry).is_ok() };
        }
        Ok(records)
    }

    /// szExeFile is a null-terminated UTF-16 buffer
    fn extract_name(sz_exe_file: &[u16; 260]) -> Option<String> {
        let len = sz_exe_file.iter().position(|&c| c == 0).unwrap_or(sz_exe_file.len());
        if len == 0 {
            return None;
        }
        String::from_utf16(&sz_exe_file[..len]).ok()
    }
}

#[cfg(not(windows))]
mod imp {
    use super::ProcessRecord;
    use crate::error::{Error, Result};

    pub(super) fn enumerate() -> Result<Vec<ProcessRecord>> {
        Err(Error::Unsupported("process enumeration"))
    }
}

impl ProcessDirectory for SystemProcesses {
    fn try_list_processes(&self) -> Result<Vec<ProcessRecord>> {
        imp::enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::Category;
    use crate::services::fakes::FakeDirectory;

    #[test]
    fn test_resolve_matches_every_instance() {
        let dir = FakeDirectory::new(&[
            (10, "chrome.exe"),
            (11, "Chrome.exe"),
            (12, "CHROME.EXE"),
            (13, "notepad.exe"),
        ]);
        let mut pids = dir.resolve(Category::Browsers.executables());
        pids.sort_unstable();
        assert_eq!(pids, vec![10, 11, 12]);
    }

    #[test]
    fn test_resolve_never_returns_own_pid() {
        let dir = FakeDirectory::new(&[(10, "chrome.exe"), (99, "chrome.exe")]).with_own_pid(99);
        assert_eq!(dir.resolve(Category::Browsers.executables()), vec![10]);
    }

    #[test]
    fn test_resolve_with_no_matches() {
        let dir = FakeDirectory::new(&[(1, "System"), (4, "svchost.exe")]);
        assert!(dir.resolve(Category::Launchers.executables()).is_empty());
    }

    #[test]
    fn test_enumeration_error_yields_empty_list() {
        let dir = FakeDirectory::new(&[(10, "chrome.exe")]);
        dir.fail_enumeration(true);
        assert!(dir.list_processes().is_empty());
        assert!(dir.resolve(Category::Browsers.executables()).is_empty());
        assert!(dir.try_list_processes().is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_system_processes_unsupported_off_windows() {
        assert!(SystemProcesses.try_list_processes().is_err());
        assert!(SystemProcesses.list_processes().is_empty());
    }
}
