use anyhow::{Context, Result};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gameboost::{
    ActivationReport, AppSettings, AutoOptimizer, Category, DeactivationReport, DetectorConfig, GameDetector,
    GameEvent, GameModeOptions, GameModeSession, NtProcessControl, ProcessDirectory, Reaction, SessionState,
    SettingsService, SystemProcesses, TweakJournal, WindowsRegistry, GAMING_TWEAKS,
};

/// Everything the owner thread reacts to
enum HostEvent {
    Game(GameEvent),
    Command(String),
    InputClosed,
}

/// Owns the session and the tweak journal; only ever touched from the main thread
struct Host {
    settings: AppSettings,
    session: GameModeSession,
    detector: GameDetector,
    optimizer: AutoOptimizer,
    registry: WindowsRegistry,
    journal: TweakJournal,
    journal_path: PathBuf,
}

impl Host {
    fn run(&mut self, events: mpsc::Receiver<HostEvent>) {
        for event in events {
            match event {
                HostEvent::Game(event) => self.on_game_event(event),
                HostEvent::Command(line) => {
                    if !self.on_command(line.trim()) {
                        break;
                    }
                }
                HostEvent::InputClosed => break,
            }
        }
    }

    fn on_game_event(&mut self, event: GameEvent) {
        match &event {
            GameEvent::Detected(game) => println!("Game detected: {}", game),
            GameEvent::Closed(game) => println!("Game closed: {}", game),
        }
        let options = GameModeOptions::from_settings(&self.settings);
        match self.optimizer.handle(event, &mut self.session, &options) {
            Reaction::Activated { game, report } => {
                self.apply_tweaks();
                print_activation(&report);
                // The taskbar is frozen now, so hand focus back to the game
                if self.session.shell_pid().is_some() {
                    self.detector.focus_game(&game);
                }
            }
            Reaction::Deactivated(report) => {
                self.restore_tweaks();
                print_deactivation(&report);
            }
            Reaction::None => {}
        }
    }

    /// Returns false when the host should exit
    fn on_command(&mut self, command: &str) -> bool {
        match command {
            "on" => {
                let options = GameModeOptions::from_settings(&self.settings);
                let report = self.optimizer.activate(&mut self.session, &options);
                self.apply_tweaks();
                print_activation(&report);
            }
            "off" => self.deactivate(),
            "status" => {
                let status = self.session.status();
                println!(
                    "Game mode: {} ({} suspended{})",
                    if status.active { "active" } else { "idle" },
                    status.suspended_count,
                    if status.shell_suspended { ", shell frozen" } else { "" },
                );
            }
            "status json" => {
                let status = serde_json::json!({
                    "session": self.session.status(),
                    "suspendable": self.session.suspendable_processes(),
                    "games": self.detector.running_games(),
                });
                println!("{}", status);
            }
            "scan" => {
                for event in self.detector.check_now() {
                    println!("Pending: {:?}", event);
                }
                for (category, names) in self.session.suspendable_processes() {
                    if !names.is_empty() {
                        println!("{:<11} {}", category.label(), names.join(", "));
                    }
                }
            }
            "games" => {
                let running = self.detector.running_games();
                println!("Running: {}", if running.is_empty() { "-".to_string() } else { running.join(", ") });
                println!("Supported: {}", GameDetector::supported_games().join(", "));
            }
            "quit" | "exit" => return false,
            "" => {}
            other => println!("Unknown command '{}' (on, off, status, status json, scan, games, quit)", other),
        }
        true
    }

    fn apply_tweaks(&mut self) {
        if !self.settings.registry_tweaks || self.session.state() != SessionState::Active {
            return;
        }
        self.journal.apply(&self.registry, GAMING_TWEAKS);
        if let Err(e) = self.journal.save(&self.journal_path) {
            warn!(error = %e, "could not persist registry journal");
        }
    }

    fn deactivate(&mut self) {
        let report = self.optimizer.deactivate(&mut self.session);
        self.restore_tweaks();
        print_deactivation(&report);
    }

    fn restore_tweaks(&mut self) {
        if self.journal.is_empty() {
            return;
        }
        self.journal.restore(&self.registry);
        if let Err(e) = fs::remove_file(&self.journal_path) {
            warn!(error = %e, "could not remove registry journal");
        }
    }

    fn shutdown(mut self) {
        self.detector.stop();
        if self.session.state() == SessionState::Active {
            self.deactivate();
        }
        self.restore_tweaks();
    }
}

fn print_activation(report: &ActivationReport) {
    println!(
        "Game mode active: {} suspended (shell {}, browsers {}, launchers {}, background {}), {} failed",
        report.total_suspended(),
        report.category(Category::Shell).suspended,
        report.category(Category::Browsers).suspended,
        report.category(Category::Launchers).suspended,
        report.category(Category::Background).suspended,
        report.total_failed(),
    );
}

fn print_deactivation(report: &DeactivationReport) {
    println!("Game mode off: {} resumed, {} failed", report.resumed, report.failed);
}

/// Put back registry values left modified by a previous run that died
fn recover_tweaks(registry: &WindowsRegistry, journal_path: &Path) {
    match TweakJournal::load(journal_path) {
        Ok(Some(mut journal)) => {
            warn!(entries = journal.len(), "restoring registry values from a previous run");
            journal.restore(registry);
            let _ = fs::remove_file(journal_path);
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "unreadable registry journal left in place"),
    }
}

fn spawn_console(tx: mpsc::Sender<HostEvent>) -> Result<()> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(HostEvent::Command(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(HostEvent::InputClosed);
        })
        .context("failed to spawn console thread")?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings_service = SettingsService::new();
    let settings = settings_service.load();
    let journal_path = settings_service.folder().join("tweaks.json");

    let registry = WindowsRegistry;
    recover_tweaks(&registry, &journal_path);

    let directory: Arc<dyn ProcessDirectory> = Arc::new(SystemProcesses);
    let session = GameModeSession::new(directory.clone(), Arc::new(NtProcessControl));
    let detector_config = DetectorConfig::from_settings(&settings.game_detector);
    let optimizer = AutoOptimizer::new(detector_config.auto_optimize);
    let mut detector = GameDetector::new(directory, detector_config);

    let (tx, rx) = mpsc::channel::<HostEvent>();

    if settings.game_detector.enabled {
        let (game_tx, game_rx) = mpsc::channel::<GameEvent>();
        let forward = tx.clone();
        thread::Builder::new()
            .name("game-events".into())
            .spawn(move || {
                for event in game_rx {
                    if forward.send(HostEvent::Game(event)).is_err() {
                        break;
                    }
                }
            })
            .context("failed to spawn event forwarder")?;
        detector.start(game_tx).context("failed to start game detector")?;
    }

    spawn_console(tx)?;
    info!("ready (on, off, status, status json, scan, games, quit)");

    let mut host = Host {
        settings,
        session,
        detector,
        optimizer,
        registry,
        journal: TweakJournal::new(),
        journal_path,
    };
    host.run(rx);
    host.shutdown();
    Ok(())
}
