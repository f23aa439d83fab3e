//! Game detection by polling the process table.
//!
//! A background thread enumerates processes every `check_interval`, maps them
//! onto the game catalog and diffs the result against the previous tick.
//! Changes are sent as [`GameEvent`]s over a channel; the receiver owns any
//! reaction (activating game mode included) and runs it on its own thread.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::services::catalog::{game_entry, game_for_process, GAMES};
use crate::services::process::{ProcessDirectory, ProcessRecord};
use crate::services::settings::GameDetectorSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A catalog game started running
    Detected(String),
    /// A previously detected game is gone
    Closed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Checked every tick; a disabled detector keeps running but does not poll
    pub enabled: bool,
    /// Hint for the event receiver: activate game mode on detection
    pub auto_optimize: bool,
    pub check_interval: Duration,
    /// How long `stop` waits for the polling thread before giving up
    pub stop_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_optimize: true,
            check_interval: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(2),
        }
    }
}

impl DetectorConfig {
    pub fn from_settings(settings: &GameDetectorSettings) -> Self {
        Self {
            enabled: settings.enabled,
            auto_optimize: settings.auto_optimize,
            check_interval: Duration::from_secs(settings.check_interval_secs.max(1)),
            ..Self::default()
        }
    }
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    // Disconnects when the thread exits
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

pub struct GameDetector {
    directory: Arc<dyn ProcessDirectory>,
    config: DetectorConfig,
    enabled: Arc<AtomicBool>,
    detected: Arc<Mutex<HashSet<String>>>,
    worker: Option<Worker>,
}

impl GameDetector {
    pub fn new(directory: Arc<dyn ProcessDirectory>, config: DetectorConfig) -> Self {
        Self {
            directory,
            enabled: Arc::new(AtomicBool::new(config.enabled)),
            config,
            detected: Arc::new(Mutex::new(HashSet::new())),
            worker: None,
        }
    }

    #[inline]
    pub fn auto_optimize(&self) -> bool {
        self.config.auto_optimize
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.handle.is_finished())
    }

    /// Start polling on a background thread. Returns `false` if already running.
    pub fn start(&mut self, events: mpsc::Sender<GameEvent>) -> Result<bool> {
        if self.is_running() {
            debug!("game detector already running");
            return Ok(false);
        }
        // A previous thread that exited on its own (receiver dropped)
        if let Some(old) = self.worker.take() {
            let _ = old.handle.join();
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let directory = self.directory.clone();
        let detected = self.detected.clone();
        let enabled = self.enabled.clone();
        let interval = self.config.check_interval;

        let handle = thread::Builder::new()
            .name("game-detector".into())
            .spawn(move || {
                let _done = done_tx;
                loop {
                    if enabled.load(Ordering::Acquire) {
                        for event in poll(directory.as_ref(), &detected) {
                            if events.send(event).is_err() {
                                debug!("game event receiver gone, detector exiting");
                                return;
                            }
                        }
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        self.worker = Some(Worker { stop_tx, done_rx, handle });
        info!(interval_ms = interval.as_millis() as u64, "game detector started");
        Ok(true)
    }

    /// Ask the polling thread to stop and wait up to `stop_timeout` for it.
    ///
    /// Returns `false` when the thread did not finish in time. It exits after
    /// its current tick; until then it still counts as running and `start`
    /// is refused.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return true;
        };
        let _ = worker.stop_tx.send(());

        match worker.done_rx.recv_timeout(self.config.stop_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "game detector did not stop in time"
                );
                self.worker = Some(worker);
                false
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                info!("game detector stopped");
                true
            }
        }
    }

    /// Compare a fresh enumeration with the detected set on the calling thread.
    ///
    /// Returns the changes the next tick would report. The detected set is
    /// left alone, so the subscriber still receives those events.
    pub fn check_now(&self) -> Vec<GameEvent> {
        let Some(current) = snapshot(self.directory.as_ref()) else {
            return Vec::new();
        };
        diff(&self.detected.lock(), &current)
    }

    /// Currently detected games, sorted
    pub fn running_games(&self) -> Vec<String> {
        let mut games: Vec<String> = self.detected.lock().iter().cloned().collect();
        games.sort();
        games
    }

    pub fn is_game_running(&self, name: &str) -> bool {
        self.detected.lock().contains(name)
    }

    pub fn supported_games() -> Vec<&'static str> {
        GAMES.iter().map(|g| g.name).collect()
    }

    /// Bring a window of a running game to the foreground
    pub fn focus_game(&self, name: &str) -> bool {
        let Some(entry) = game_entry(name) else {
            return false;
        };
        let focused = self
            .directory
            .resolve(entry.executables)
            .into_iter()
            .any(window::focus_process);
        if !focused {
            debug!(game = name, "no visible window to focus");
        }
        focused
    }
}

impl Drop for GameDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Games present in one enumeration
fn scan(processes: &[ProcessRecord]) -> HashSet<String> {
    processes
        .iter()
        .filter_map(|p| game_for_process(&p.name))
        .map(str::to_owned)
        .collect()
}

fn snapshot(directory: &dyn ProcessDirectory) -> Option<HashSet<String>> {
    match directory.try_list_processes() {
        Ok(processes) => Some(scan(&processes)),
        Err(e) => {
            error!(error = %e, "game detection tick skipped");
            None
        }
    }
}

/// Detected events (sorted) followed by closed events (sorted)
fn diff(previous: &HashSet<String>, current: &HashSet<String>) -> Vec<GameEvent> {
    let mut started: Vec<&String> = current.difference(previous).collect();
    let mut closed: Vec<&String> = previous.difference(current).collect();
    started.sort();
    closed.sort();

    started
        .into_iter()
        .map(|g| GameEvent::Detected(g.clone()))
        .chain(closed.into_iter().map(|g| GameEvent::Closed(g.clone())))
        .collect()
}

/// One tick. The baseline starts empty, so games already running at the
/// first tick are reported as detected. A failed enumeration keeps the previous set.
fn poll(directory: &dyn ProcessDirectory, detected: &Mutex<HashSet<String>>) -> Vec<GameEvent> {
    let Some(current) = snapshot(directory) else {
        return Vec::new();
    };

    let mut previous = detected.lock();
    let events = diff(&previous, &current);
    for event in &events {
        match event {
            GameEvent::Detected(game) => info!(game = %game, "game detected"),
            GameEvent::Closed(game) => info!(game = %game, "game closed"),
        }
    }
    *previous = current;
    events
}

#[cfg(windows)]
mod window {
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowThreadProcessId, IsWindowVisible, SetForegroundWindow,
    };

    struct WindowSearch {
        pid: u32,
        found: Option<HWND>,
    }

    unsafe extern "system" fn find_visible(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam.0 as *mut WindowSearch);
        let mut window_pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut window_pid));

        if window_pid == search.pid && IsWindowVisible(hwnd).as_bool() {
            search.found = Some(hwnd);
            return BOOL(0); // Stop enumeration
        }
        BOOL(1)
    }

    pub(super) fn focus_process(pid: u32) -> bool {
        let mut search = WindowSearch { pid, found: None };
        unsafe {
            // Err when the callback stops early
            let _ = EnumWindows(Some(find_visible), LPARAM(&mut search as *mut WindowSearch as isize));
            match search.found {
                Some(hwnd) => SetForegroundWindow(hwnd).as_bool(),
                None => false,
            }
        }
    }
}

#[cfg(not(windows))]
mod window {
    pub(super) fn focus_process(_pid: u32) -> bool {
        false
    }
}
