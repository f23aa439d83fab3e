use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;

/// Persisted user settings. Every field has a default so older files keep loading.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    /// Suspend explorer.exe during game mode
    #[serde(default = "default_true")]
    pub suspend_explorer: bool,

    #[serde(default = "default_true")]
    pub suspend_browsers: bool,

    #[serde(default = "default_true")]
    pub suspend_launchers: bool,

    /// Discord, Spotify, sync clients...
    #[serde(default)]
    pub suspend_background: bool,

    /// Apply the reversible registry tweak set together with game mode
    #[serde(default)]
    pub registry_tweaks: bool,

    #[serde(default)]
    pub game_detector: GameDetectorSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameDetectorSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Activate game mode when a game shows up
    #[serde(default = "default_true")]
    pub auto_optimize: bool,

    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl Default for GameDetectorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_optimize: true,
            check_interval_secs: default_check_interval(),
        }
    }
}

fn default_true() -> bool { true }

fn default_check_interval() -> u64 { 5 }

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            suspend_explorer: true,
            suspend_browsers: true,
            suspend_launchers: true,
            suspend_background: false,
            registry_tweaks: false,
            game_detector: GameDetectorSettings::default(),
        }
    }
}

/// Loads and saves settings as JSON in %LOCALAPPDATA%\GameBoost
pub struct SettingsService {
    file_path: PathBuf,
}

impl SettingsService {
    /// Creates the settings folder if it doesn't exist
    pub fn new() -> Self {
        let app_data = dirs::data_local_dir().unwrap_or(PathBuf::from("."));
        let folder = app_data.join("GameBoost");
        if !folder.exists() {
            if let Err(e) = fs::create_dir_all(&folder) {
                warn!(path = %folder.display(), error = %e, "could not create settings folder");
            }
        }
        Self::with_path(folder.join("settings.json"))
    }

    pub fn with_path(file_path: impl Into<PathBuf>) -> Self {
        Self { file_path: file_path.into() }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Folder holding the settings file and other state files
    pub fn folder(&self) -> &Path {
        self.file_path.parent().unwrap_or(Path::new("."))
    }

    /// Missing or unreadable files fall back to defaults
    pub fn load(&self) -> AppSettings {
        if !self.file_path.exists() {
            info!(path = %self.file_path.display(), "no settings file, using defaults");
            return AppSettings::default();
        }
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.file_path.display(), error = %e, "settings unreadable, using defaults");
                AppSettings::default()
            }
        }
    }

    fn try_load(&self) -> Result<AppSettings> {
        let content = fs::read_to_string(&self.file_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.file_path, content)?;
        info!(path = %self.file_path.display(), "settings saved");
        Ok(())
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}
