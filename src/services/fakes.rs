//! In-memory stand-ins for the OS-facing traits.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::services::process::{ProcessDirectory, ProcessRecord};
use crate::services::suspend::SuspendPrimitive;
use crate::services::tweaks::{Hive, RegistryStore};

pub struct FakeDirectory {
    processes: Mutex<Vec<ProcessRecord>>,
    own_pid: u32,
    fail: AtomicBool,
}

impl FakeDirectory {
    pub fn new(processes: &[(u32, &str)]) -> Self {
        Self {
            processes: Mutex::new(processes.iter().map(|&(pid, name)| ProcessRecord::new(pid, name)).collect()),
            own_pid: u32::MAX,
            fail: AtomicBool::new(false),
        }
    }

    pub fn with_own_pid(mut self, pid: u32) -> Self {
        self.own_pid = pid;
        self
    }

    pub fn set_processes(&self, processes: &[(u32, &str)]) {
        *self.processes.lock() = processes.iter().map(|&(pid, name)| ProcessRecord::new(pid, name)).collect();
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ProcessDirectory for FakeDirectory {
    fn try_list_processes(&self) -> Result<Vec<ProcessRecord>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Snapshot("scripted failure".into()));
        }
        Ok(self.processes.lock().clone())
    }

    fn own_pid(&self) -> u32 {
        self.own_pid
    }
}

/// Records every call and keeps a simulated frozen set.
#[derive(Default)]
pub struct FakeControl {
    suspend_calls: Mutex<HashMap<u32, usize>>,
    resume_calls: Mutex<HashMap<u32, usize>>,
    failing_suspend: Mutex<HashSet<u32>>,
    failing_resume: Mutex<HashSet<u32>>,
    frozen: Mutex<HashSet<u32>>,
    order: Mutex<Vec<(bool, u32)>>,
}

impl FakeControl {
    pub fn fail_suspend(&self, pid: u32) {
        self.failing_suspend.lock().insert(pid);
    }

    pub fn allow_suspend(&self, pid: u32) {
        self.failing_suspend.lock().remove(&pid);
    }

    pub fn fail_resume(&self, pid: u32) {
        self.failing_resume.lock().insert(pid);
    }

    pub fn suspend_calls(&self, pid: u32) -> usize {
        self.suspend_calls.lock().get(&pid).copied().unwrap_or(0)
    }

    pub fn resume_calls(&self, pid: u32) -> usize {
        self.resume_calls.lock().get(&pid).copied().unwrap_or(0)
    }

    pub fn total_suspend_calls(&self) -> usize {
        self.suspend_calls.lock().values().sum()
    }

    pub fn is_frozen(&self, pid: u32) -> bool {
        self.frozen.lock().contains(&pid)
    }

    /// Resume calls in the order they were made
    pub fn resume_order(&self) -> Vec<u32> {
        self.order.lock().iter().filter(|(suspend, _)| !suspend).map(|&(_, pid)| pid).collect()
    }
}

impl SuspendPrimitive for FakeControl {
    fn suspend(&self, pid: u32) -> bool {
        *self.suspend_calls.lock().entry(pid).or_default() += 1;
        self.order.lock().push((true, pid));
        if self.failing_suspend.lock().contains(&pid) {
            return false;
        }
        self.frozen.lock().insert(pid);
        true
    }

    fn resume(&self, pid: u32) -> bool {
        *self.resume_calls.lock().entry(pid).or_default() += 1;
        self.order.lock().push((false, pid));
        if self.failing_resume.lock().contains(&pid) {
            return false;
        }
        self.frozen.lock().remove(&pid);
        true
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    values: Mutex<HashMap<(Hive, String, String), u32>>,
    read_only: Mutex<HashSet<String>>,
}

impl FakeRegistry {
    pub fn set(&self, hive: Hive, path: &str, name: &str, value: u32) {
        self.values.lock().insert((hive, path.to_string(), name.to_string()), value);
    }

    pub fn get(&self, hive: Hive, path: &str, name: &str) -> Option<u32> {
        self.values.lock().get(&(hive, path.to_string(), name.to_string())).copied()
    }

    /// Writes and deletes of `name` fail
    pub fn deny(&self, name: &str) {
        self.read_only.lock().insert(name.to_string());
    }
}

impl RegistryStore for FakeRegistry {
    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Option<u32> {
        self.get(hive, path, name)
    }

    fn write_dword(&self, hive: Hive, path: &str, name: &str, value: u32) -> bool {
        if self.read_only.lock().contains(name) {
            return false;
        }
        self.set(hive, path, name, value);
        true
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> bool {
        if self.read_only.lock().contains(name) {
            return false;
        }
        self.values.lock().remove(&(hive, path.to_string(), name.to_string()));
        true
    }
}
