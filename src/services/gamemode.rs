use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::services::{
    catalog::{matches_any, Category},
    options::GameModeOptions,
    process::ProcessDirectory,
    suspend::SuspendPrimitive,
};

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing suspended by this session
    Idle,
    /// At least one process suspended by this session
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStatus {
    Activated,
    Disabled,
}

/// Outcome of one category within an `activate` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryReport {
    /// Newly suspended by this call
    pub suspended: usize,
    pub failed: usize,
    /// Matching pids skipped because the session already holds them
    pub already_tracked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub status: ActivationStatus,
    pub shell: CategoryReport,
    pub browsers: CategoryReport,
    pub launchers: CategoryReport,
    pub background: CategoryReport,
}

impl ActivationReport {
    fn new(status: ActivationStatus) -> Self {
        Self {
            status,
            shell: CategoryReport::default(),
            browsers: CategoryReport::default(),
            launchers: CategoryReport::default(),
            background: CategoryReport::default(),
        }
    }

    pub fn category(&self, category: Category) -> &CategoryReport {
        match category {
            Category::Shell => &self.shell,
            Category::Browsers => &self.browsers,
            Category::Launchers => &self.launchers,
            Category::Background => &self.background,
        }
    }

    fn category_mut(&mut self, category: Category) -> &mut CategoryReport {
        match category {
            Category::Shell => &mut self.shell,
            Category::Browsers => &mut self.browsers,
            Category::Launchers => &mut self.launchers,
            Category::Background => &mut self.background,
        }
    }

    #[inline]
    pub fn shell_suspended(&self) -> bool {
        self.shell.suspended > 0
    }

    /// Processes newly suspended by this call, shell included
    pub fn total_suspended(&self) -> usize {
        self.shell.suspended + self.browsers.suspended + self.launchers.suspended + self.background.suspended
    }

    pub fn total_failed(&self) -> usize {
        self.shell.failed + self.browsers.failed + self.launchers.failed + self.background.failed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeactivationReport {
    pub resumed: usize,
    /// Resumes that failed; those processes are no longer tracked and may stay frozen
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub enabled: bool,
    pub active: bool,
    /// Tracked processes, shell included
    pub suspended_count: usize,
    pub shell_suspended: bool,
}

/// Game-mode session: suspends process categories and resumes exactly what it suspended.
///
/// The session is the only owner of its suspended set. Callers serialize
/// `activate`/`deactivate`; a batch, once started, runs to completion.
/// Tracking lives in memory only: if the host dies while active, the frozen
/// processes stay frozen.
pub struct GameModeSession {
    directory: Arc<dyn ProcessDirectory>,
    control: Arc<dyn SuspendPrimitive>,
    enabled: bool,
    suspended: HashSet<u32>,
    // Desktop shell, resumed before everything else
    shell_pid: Option<u32>,
}

impl GameModeSession {
    pub fn new(directory: Arc<dyn ProcessDirectory>, control: Arc<dyn SuspendPrimitive>) -> Self {
        Self {
            directory,
            control,
            enabled: true,
            suspended: HashSet::with_capacity(32),
            shell_pid: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> SessionState {
        if self.shell_pid.is_some() || !self.suspended.is_empty() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    #[inline]
    pub fn shell_pid(&self) -> Option<u32> {
        self.shell_pid
    }

    /// Batch-tracked pids (the shell slot is separate), sorted
    pub fn suspended_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.suspended.iter().copied().collect();
        pids.sort_unstable();
        pids
    }

    #[inline]
    pub fn is_tracked(&self, pid: u32) -> bool {
        self.shell_pid == Some(pid) || self.suspended.contains(&pid)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            enabled: self.enabled,
            active: self.state() == SessionState::Active,
            suspended_count: self.suspended.len() + usize::from(self.shell_pid.is_some()),
            shell_suspended: self.shell_pid.is_some(),
        }
    }

    /// Suspend the selected categories. Best-effort per process; never fails wholesale.
    ///
    /// Calling this while already active only picks up newly matching processes:
    /// a tracked pid is never suspended twice. A pid whose suspend failed is not
    /// tracked, so the next call tries it again.
    pub fn activate(&mut self, options: &GameModeOptions) -> ActivationReport {
        if !self.enabled {
            info!("game mode disabled, activation skipped");
            return ActivationReport::new(ActivationStatus::Disabled);
        }

        let mut report = ActivationReport::new(ActivationStatus::Activated);

        if options.suspend_explorer {
            report.shell = self.suspend_shell();
        }

        for category in Category::BATCH {
            if options.includes(category) {
                *report.category_mut(category) = self.suspend_category(category);
            }
        }

        info!(
            total = report.total_suspended(),
            failed = report.total_failed(),
            tracked = self.status().suspended_count,
            "game mode activated"
        );
        report
    }

    fn suspend_shell(&mut self) -> CategoryReport {
        let mut report = CategoryReport::default();
        if self.shell_pid.is_some() {
            report.already_tracked = 1;
            return report;
        }

        for pid in self.directory.resolve(Category::Shell.executables()) {
            if self.suspended.contains(&pid) {
                report.already_tracked += 1;
                continue;
            }
            if self.control.suspend(pid) {
                info!(pid, "suspended desktop shell");
                self.shell_pid = Some(pid);
                report.suspended = 1;
                break;
            }
            warn!(pid, "failed to suspend desktop shell");
            report.failed += 1;
        }
        report
    }

    fn suspend_category(&mut self, category: Category) -> CategoryReport {
        let mut report = CategoryReport::default();

        for pid in self.directory.resolve(category.executables()) {
            if self.is_tracked(pid) {
                report.already_tracked += 1;
                continue;
            }
            if self.control.suspend(pid) {
                debug!(pid, category = category.label(), "suspended");
                self.suspended.insert(pid);
                report.suspended += 1;
            } else {
                warn!(pid, category = category.label(), "failed to suspend");
                report.failed += 1;
            }
        }

        info!(
            category = category.label(),
            suspended = report.suspended,
            failed = report.failed,
            "category processed"
        );
        report
    }

    /// Resume everything this session suspended, shell first.
    ///
    /// Every pid leaves tracking whether or not its resume succeeded. Safe to call
    /// with nothing tracked.
    pub fn deactivate(&mut self) -> DeactivationReport {
        let mut report = DeactivationReport::default();

        if let Some(pid) = self.shell_pid.take() {
            if self.control.resume(pid) {
                info!(pid, "resumed desktop shell");
                report.resumed += 1;
            } else {
                warn!(pid, "failed to resume desktop shell");
                report.failed += 1;
            }
        }

        for pid in std::mem::take(&mut self.suspended) {
            if self.control.resume(pid) {
                debug!(pid, "resumed");
                report.resumed += 1;
            } else {
                warn!(pid, "failed to resume, dropping from tracking");
                report.failed += 1;
            }
        }

        info!(resumed = report.resumed, failed = report.failed, "game mode deactivated");
        report
    }

    /// Resume a single tracked process and stop tracking it.
    ///
    /// Returns `None` without touching the OS when `pid` is not tracked.
    pub fn resume_one(&mut self, pid: u32) -> Option<bool> {
        if self.shell_pid == Some(pid) {
            self.shell_pid = None;
        } else if !self.suspended.remove(&pid) {
            debug!(pid, "resume requested for untracked pid");
            return None;
        }
        let resumed = self.control.resume(pid);
        if !resumed {
            warn!(pid, "failed to resume");
        }
        Some(resumed)
    }

    /// Forget every tracked pid without resuming anything. Returns what was dropped.
    pub fn reset(&mut self) -> Vec<u32> {
        let mut dropped: Vec<u32> = self.shell_pid.take().into_iter().collect();
        dropped.extend(self.suspended.drain());
        if !dropped.is_empty() {
            warn!(count = dropped.len(), "tracking reset, processes left as they are");
        }
        dropped
    }

    /// Running executables each batch category would suspend, de-duplicated.
    pub fn suspendable_processes(&self) -> BTreeMap<Category, Vec<String>> {
        let mut result: BTreeMap<Category, Vec<String>> =
            Category::BATCH.iter().map(|&c| (c, Vec::new())).collect();
        let own = self.directory.own_pid();

        for process in self.directory.list_processes() {
            if process.pid == own {
                continue;
            }
            let Some(category) = Category::BATCH
                .into_iter()
                .find(|c| matches_any(&process.name, c.executables()))
            else {
                continue;
            };
            let names = result.entry(category).or_default();
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&process.name)) {
                names.push(process.name);
            }
        }
        result
    }
}

impl Drop for GameModeSession {
    fn drop(&mut self) {
        if self.state() == SessionState::Active {
            warn!(
                tracked = self.status().suspended_count,
                "game mode session dropped while active, processes stay suspended"
            );
        }
    }
}
