use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

// ============================================================================
// PROCESS CATEGORIES (static, zero allocation)
// ============================================================================

static SHELL: &[&str] = &["explorer.exe"];

static BROWSERS: &[&str] = &[
    "chrome.exe", "firefox.exe", "msedge.exe", "opera.exe", "brave.exe",
    "vivaldi.exe", "waterfox.exe", "iexplore.exe", "safari.exe",
    // Helpers
    "chrome_crashpad_handler.exe", "firefox_crashpad_handler.exe",
];

static LAUNCHERS: &[&str] = &[
    // Steam
    "steam.exe", "steamwebhelper.exe", "steamservice.exe",
    // Epic Games
    "EpicGamesLauncher.exe", "EpicWebHelper.exe",
    // Battle.net
    "Battle.net.exe", "Agent.exe",
    // EA
    "EADesktop.exe", "EABackgroundService.exe", "Origin.exe",
    // Ubisoft
    "UbisoftConnect.exe", "upc.exe",
    // GOG
    "GalaxyClient.exe", "GalaxyClientService.exe",
    // Xbox
    "XboxPcApp.exe", "XboxPcAppFT.exe",
    // Rockstar
    "Rockstar-Launcher.exe",
    // Riot
    "RiotClientServices.exe",
];

static BACKGROUND: &[&str] = &[
    // Communication
    "Discord.exe", "Slack.exe", "Teams.exe", "Zoom.exe", "Skype.exe",
    // Media
    "Spotify.exe", "iTunes.exe",
    // Sync clients
    "OneDrive.exe", "Dropbox.exe", "GoogleDriveFS.exe",
    // Peripheral suites
    "iCUE.exe", "NZXT CAM.exe", "RazerCentral.exe",
];

/// A fixed group of executables suspended and resumed as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Desktop shell, a singleton tracked in its own slot
    Shell,
    Browsers,
    Launchers,
    Background,
}

impl Category {
    /// Categories that track any number of processes, in activation order.
    pub const BATCH: [Category; 3] = [Category::Browsers, Category::Launchers, Category::Background];

    #[inline]
    pub fn executables(self) -> &'static [&'static str] {
        match self {
            Category::Shell => SHELL,
            Category::Browsers => BROWSERS,
            Category::Launchers => LAUNCHERS,
            Category::Background => BACKGROUND,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Shell => "shell",
            Category::Browsers => "browsers",
            Category::Launchers => "launchers",
            Category::Background => "background",
        }
    }
}

// ============================================================================
// GAME CATALOG
// ============================================================================

/// A detectable game and the executables that identify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEntry {
    pub name: &'static str,
    pub executables: &'static [&'static str],
}

pub static GAMES: &[GameEntry] = &[
    GameEntry { name: "Call of Duty", executables: &["cod.exe", "ModernWarfare.exe", "BlackOpsColdWar.exe"] },
    GameEntry { name: "Fortnite", executables: &["FortniteClient-Win64-Shipping.exe", "FortniteLauncher.exe"] },
    GameEntry { name: "Apex Legends", executables: &["r5apex.exe"] },
    GameEntry { name: "Counter-Strike 2", executables: &["cs2.exe"] },
    GameEntry { name: "Valheim", executables: &["valheim.exe"] },
    GameEntry { name: "DOTA 2", executables: &["dota2.exe"] },
    GameEntry { name: "League of Legends", executables: &["League of Legends.exe", "LeagueClient.exe"] },
    GameEntry { name: "Overwatch", executables: &["Overwatch.exe"] },
    GameEntry { name: "Valorant", executables: &["VALORANT-Win64-Shipping.exe"] },
    GameEntry { name: "GTA V", executables: &["GTA5.exe"] },
    GameEntry { name: "Red Dead Redemption 2", executables: &["RDR2.exe"] },
    GameEntry { name: "Cyberpunk 2077", executables: &["Cyberpunk2077.exe"] },
    GameEntry { name: "Minecraft", executables: &["javaw.exe", "Minecraft.Windows.exe"] },
    GameEntry { name: "Elden Ring", executables: &["eldenring.exe"] },
    GameEntry { name: "Baldur's Gate 3", executables: &["bg3.exe", "bg3_dx11.exe"] },
    GameEntry { name: "Diablo IV", executables: &["Diablo IV.exe"] },
    GameEntry { name: "Path of Exile", executables: &["PathOfExile_x64.exe", "PathOfExileSteam.exe"] },
    GameEntry { name: "World of Warcraft", executables: &["Wow.exe", "WowClassic.exe"] },
];

// Lowercased executable -> game name. Earlier catalog entries win on collisions.
static GAME_INDEX: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut index = HashMap::with_capacity(GAMES.len() * 2);
    for game in GAMES {
        for exe in game.executables {
            index.entry(exe.to_ascii_lowercase()).or_insert(game.name);
        }
    }
    index
});

/// Strip any directory part from an executable path.
#[inline]
pub fn base_name(name: &str) -> &str {
    name.rsplit(['\\', '/']).next().unwrap_or(name)
}

/// Case-insensitive exact match of a process's base executable name against a list.
#[inline]
pub fn matches_any(name: &str, executables: &[&str]) -> bool {
    let name = base_name(name);
    executables.iter().any(|exe| exe.eq_ignore_ascii_case(name))
}

/// Game a process belongs to, if any. A process matches at most one game.
pub fn game_for_process(name: &str) -> Option<&'static str> {
    GAME_INDEX.get(&base_name(name).to_ascii_lowercase()).copied()
}

pub fn game_entry(name: &str) -> Option<&'static GameEntry> {
    GAMES.iter().find(|g| g.name == name)
}
