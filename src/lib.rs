//! Game-mode engine: suspends background process categories while a game runs
//! and resumes exactly what it suspended afterwards.

pub mod error;
pub mod services;

pub use error::{Error, Result};
pub use services::{
    catalog::Category,
    detector::{DetectorConfig, GameDetector, GameEvent},
    gamemode::{ActivationReport, DeactivationReport, GameModeSession, SessionState, SessionStatus},
    options::GameModeOptions,
    policy::{AutoOptimizer, Reaction},
    process::{ProcessDirectory, ProcessRecord, SystemProcesses},
    settings::{AppSettings, SettingsService},
    suspend::{NtProcessControl, SuspendPrimitive},
    tweaks::{RegistryStore, TweakJournal, WindowsRegistry, GAMING_TWEAKS},
};
