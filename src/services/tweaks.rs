//! Reversible registry tweaks.
//!
//! Every value is read before it is first written and the original state
//! (a DWORD, or "absent") is kept in a [`TweakJournal`]. Restoring writes the
//! originals back in reverse order and deletes values that did not exist.
//! The journal serializes to JSON so a host can survive its own crash.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
}

/// DWORD-valued registry access.
pub trait RegistryStore: Send + Sync {
    /// `None` when the key or value does not exist or is unreadable
    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Option<u32>;
    /// Creates the key if needed
    fn write_dword(&self, hive: Hive, path: &str, name: &str, value: u32) -> bool;
    /// Deleting an absent value counts as success
    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwordTweak {
    pub hive: Hive,
    pub path: &'static str,
    pub name: &'static str,
    pub value: u32,
}

const PRIORITY_CONTROL: &str = "SYSTEM\\CurrentControlSet\\Control\\PriorityControl";
const GAME_BAR: &str = "Software\\Microsoft\\GameBar";
const GAMES_TASK: &str = "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Multimedia\\SystemProfile\\Tasks\\Games";

/// Foreground boost, Game Bar game mode and multimedia scheduling for games
pub static GAMING_TWEAKS: &[DwordTweak] = &[
    DwordTweak { hive: Hive::LocalMachine, path: PRIORITY_CONTROL, name: "Win32PrioritySeparation", value: 38 },
    DwordTweak { hive: Hive::CurrentUser, path: GAME_BAR, name: "AutoGameModeEnabled", value: 1 },
    DwordTweak { hive: Hive::CurrentUser, path: GAME_BAR, name: "AllowAutoGameMode", value: 1 },
    DwordTweak { hive: Hive::LocalMachine, path: GAMES_TASK, name: "Priority", value: 6 },
    DwordTweak { hive: Hive::LocalMachine, path: GAMES_TASK, name: "GPU Priority", value: 8 },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct JournalEntry {
    hive: Hive,
    path: String,
    name: String,
    /// Value before the first write; `None` means the value did not exist
    original: Option<u32>,
}

impl JournalEntry {
    fn is_for(&self, tweak: &DwordTweak) -> bool {
        self.hive == tweak.hive
            && self.path.eq_ignore_ascii_case(tweak.path)
            && self.name.eq_ignore_ascii_case(tweak.name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TweakReport {
    pub applied: usize,
    pub failed: usize,
}

/// Original values of every registry value touched since the last restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweakJournal {
    entries: Vec<JournalEntry>,
}

impl TweakJournal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Write `tweaks`, recording each value's original state the first time it is touched.
    ///
    /// A value that could not be written is only kept in the journal if it was
    /// journaled by an earlier, successful apply.
    pub fn apply(&mut self, store: &dyn RegistryStore, tweaks: &[DwordTweak]) -> TweakReport {
        let mut report = TweakReport::default();

        for tweak in tweaks {
            let fresh = !self.entries.iter().any(|e| e.is_for(tweak));
            if fresh {
                self.entries.push(JournalEntry {
                    hive: tweak.hive,
                    path: tweak.path.to_string(),
                    name: tweak.name.to_string(),
                    original: store.read_dword(tweak.hive, tweak.path, tweak.name),
                });
            }

            if store.write_dword(tweak.hive, tweak.path, tweak.name, tweak.value) {
                report.applied += 1;
            } else {
                warn!(path = tweak.path, name = tweak.name, "registry write failed");
                report.failed += 1;
                if fresh {
                    self.entries.pop();
                }
            }
        }

        info!(applied = report.applied, failed = report.failed, "registry tweaks applied");
        report
    }

    /// Put every journaled value back as it was, newest first, and empty the journal.
    pub fn restore(&mut self, store: &dyn RegistryStore) -> TweakReport {
        let mut report = TweakReport::default();

        for entry in self.entries.drain(..).rev() {
            let ok = match entry.original {
                Some(value) => store.write_dword(entry.hive, &entry.path, &entry.name, value),
                None => store.delete_value(entry.hive, &entry.path, &entry.name),
            };
            if ok {
                report.applied += 1;
            } else {
                warn!(path = %entry.path, name = %entry.name, "registry restore failed");
                report.failed += 1;
            }
        }

        info!(restored = report.applied, failed = report.failed, "registry tweaks restored");
        report
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Win32 registry
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

#[cfg(windows)]
mod imp {
    use super::Hive;
    use std::mem::size_of;
    use windows::core::{HSTRING, PCWSTR};
    use windows::Win32::Foundation::ERROR_FILE_NOT_FOUND;
    use windows::Win32::System::Registry::{
        RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
        HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE,
        REG_SAM_FLAGS, REG_VALUE_TYPE,
    };

    /// Open key, closed on drop
    struct Key(HKEY);

    impl Drop for Key {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }

    fn root(hive: Hive) -> HKEY {
        match hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::CurrentUser => HKEY_CURRENT_USER,
        }
    }

    fn open(hive: Hive, path: &str, access: REG_SAM_FLAGS) -> Option<Key> {
        let mut handle = HKEY::default();
        let subkey = HSTRING::from(path);
        unsafe { RegOpenKeyExW(root(hive), PCWSTR(subkey.as_ptr()), 0, access, &mut handle) }
            .is_ok()
            .then_some(Key(handle))
    }

    pub(super) fn read_dword(hive: Hive, path: &str, name: &str) -> Option<u32> {
        let key = open(hive, path, KEY_READ)?;
        let value = HSTRING::from(name);
        let mut data: u32 = 0;
        let mut data_size = size_of::<u32>() as u32;
        let mut value_type = REG_VALUE_TYPE::default();

        let result = unsafe {
            RegQueryValueExW(
                key.0,
                PCWSTR(value.as_ptr()),
                None,
                Some(&mut value_type),
                Some(&mut data as *mut u32 as *mut u8),
                Some(&mut data_size),
            )
        };
        (result.is_ok() && value_type == REG_DWORD).then_some(data)
    }

    pub(super) fn write_dword(hive: Hive, path: &str, name: &str, data: u32) -> bool {
        let mut handle = HKEY::default();
        let subkey = HSTRING::from(path);
        let created = unsafe {
            RegCreateKeyExW(
                root(hive),
                PCWSTR(subkey.as_ptr()),
                0,
                None,
                REG_OPTION_NON_VOLATILE,
                KEY_WRITE,
                None,
                &mut handle,
                None,
            )
        };
        if created.is_err() {
            return false;
        }
        let key = Key(handle);
        let value = HSTRING::from(name);
        unsafe { RegSetValueExW(key.0, PCWSTR(value.as_ptr()), 0, REG_DWORD, Some(&data.to_le_bytes())) }.is_ok()
    }

    pub(super) fn delete_value(hive: Hive, path: &str, name: &str) -> bool {
        // No key means no value
        let Some(key) = open(hive, path, KEY_WRITE) else {
            return true;
        };
        let value = HSTRING::from(name);
        let result = unsafe { RegDeleteValueW(key.0, PCWSTR(value.as_ptr())) };
        result.is_ok() || result == ERROR_FILE_NOT_FOUND
    }
}

#[cfg(windows)]
impl RegistryStore for WindowsRegistry {
    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Option<u32> {
        imp::read_dword(hive, path, name)
    }

    fn write_dword(&self, hive: Hive, path: &str, name: &str, value: u32) -> bool {
        imp::write_dword(hive, path, name, value)
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> bool {
        imp::delete_value(hive, path, name)
    }
}

#[cfg(not(windows))]
impl RegistryStore for WindowsRegistry {
    fn read_dword(&self, _hive: Hive, _path: &str, _name: &str) -> Option<u32> {
        None
    }

    fn write_dword(&self, _hive: Hive, path: &str, name: &str, _value: u32) -> bool {
        warn!(path, name, "registry is only available on Windows");
        false
    }

    fn delete_value(&self, _hive: Hive, _path: &str, _name: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::FakeRegistry;

    #[test]
    fn test_apply_then_restore_round_trip() {
        let store = FakeRegistry::default();
        store.set(Hive::LocalMachine, PRIORITY_CONTROL, "Win32PrioritySeparation", 2);
        store.set(Hive::LocalMachine, GAMES_TASK, "Priority", 2);
        let mut journal = TweakJournal::new();

        let applied = journal.apply(&store, GAMING_TWEAKS);
        assert_eq!(applied, TweakReport { applied: 5, failed: 0 });
        assert_eq!(store.get(Hive::LocalMachine, PRIORITY_CONTROL, "Win32PrioritySeparation"), Some(38));
        assert_eq!(store.get(Hive::LocalMachine, GAMES_TASK, "GPU Priority"), Some(8));

        let restored = journal.restore(&store);
        assert_eq!(restored, TweakReport { applied: 5, failed: 0 });
        assert!(journal.is_empty());

        // Existing values come back, values that did not exist are removed
        assert_eq!(store.get(Hive::LocalMachine, PRIORITY_CONTROL, "Win32PrioritySeparation"), Some(2));
        assert_eq!(store.get(Hive::LocalMachine, GAMES_TASK, "Priority"), Some(2));
        assert_eq!(store.get(Hive::LocalMachine, GAMES_TASK, "GPU Priority"), None);
        assert_eq!(store.get(Hive::CurrentUser, GAME_BAR, "AutoGameModeEnabled"), None);
    }

    #[test]
    fn test_reapply_keeps_first_original() {
        let store = FakeRegistry::default();
        store.set(Hive::LocalMachine, GAMES_TASK, "Priority", 2);
        let mut journal = TweakJournal::new();

        journal.apply(&store, GAMING_TWEAKS);
        journal.apply(&store, GAMING_TWEAKS);
        assert_eq!(journal.len(), GAMING_TWEAKS.len());

        journal.restore(&store);
        assert_eq!(store.get(Hive::LocalMachine, GAMES_TASK, "Priority"), Some(2));
    }

    #[test]
    fn test_failed_write_is_not_journaled() {
        let store = FakeRegistry::default();
        store.deny("GPU Priority");
        let mut journal = TweakJournal::new();

        let report = journal.apply(&store, GAMING_TWEAKS);

        assert_eq!(report, TweakReport { applied: 4, failed: 1 });
        assert_eq!(journal.len(), 4);
    }

    #[test]
    fn test_restore_empty_journal() {
        let store = FakeRegistry::default();
        assert_eq!(TweakJournal::new().restore(&store), TweakReport::default());
    }

    #[test]
    fn test_journal_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweaks.json");
        let store = FakeRegistry::default();
        store.set(Hive::CurrentUser, GAME_BAR, "AutoGameModeEnabled", 0);
        let mut journal = TweakJournal::new();
        journal.apply(&store, GAMING_TWEAKS);

        journal.save(&path).unwrap();
        let mut loaded = TweakJournal::load(&path).unwrap().unwrap();
        assert_eq!(loaded, journal);

        loaded.restore(&store);
        assert_eq!(store.get(Hive::CurrentUser, GAME_BAR, "AutoGameModeEnabled"), Some(0));
        assert_eq!(store.get(Hive::CurrentUser, GAME_BAR, "AllowAutoGameMode"), None);
    }

    #[test]
    fn test_load_missing_journal() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(TweakJournal::load(&dir.path().join("none.json")).unwrap(), None);
    }
}
