use serde::{Deserialize, Serialize};

use crate::services::catalog::Category;
use crate::services::settings::AppSettings;

/// Which categories one `activate` call suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameModeOptions {
    /// Suspend the desktop shell (explorer.exe)
    #[serde(default = "default_true")]
    pub suspend_explorer: bool,

    #[serde(default = "default_true")]
    pub suspend_browsers: bool,

    #[serde(default = "default_true")]
    pub suspend_launchers: bool,

    /// Chat, media and sync clients (off unless asked for)
    #[serde(default)]
    pub suspend_background: bool,
}

fn default_true() -> bool { true }

impl Default for GameModeOptions {
    fn default() -> Self {
        Self {
            suspend_explorer: true,
            suspend_browsers: true,
            suspend_launchers: true,
            suspend_background: false,
        }
    }
}

impl GameModeOptions {
    /// Nothing selected
    pub const NONE: GameModeOptions = GameModeOptions {
        suspend_explorer: false,
        suspend_browsers: false,
        suspend_launchers: false,
        suspend_background: false,
    };

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            suspend_explorer: settings.suspend_explorer,
            suspend_browsers: settings.suspend_browsers,
            suspend_launchers: settings.suspend_launchers,
            suspend_background: settings.suspend_background,
        }
    }

    #[inline]
    pub fn includes(&self, category: Category) -> bool {
        match category {
            Category::Shell => self.suspend_explorer,
            Category::Browsers => self.suspend_browsers,
            Category::Launchers => self.suspend_launchers,
            Category::Background => self.suspend_background,
        }
    }

    /// All sixteen toggle combinations
    pub fn all_combinations() -> impl Iterator<Item = GameModeOptions> {
        (0u8..16).map(|bits| GameModeOptions {
            suspend_explorer: bits & 1 != 0,
            suspend_browsers: bits & 2 != 0,
            suspend_launchers: bits & 4 != 0,
            suspend_background: bits & 8 != 0,
        })
    }
}
