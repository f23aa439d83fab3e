//! Reaction of the host to detector events.
//!
//! Game mode is switched on when a game shows up and the session is idle,
//! and switched off when the last game closes, but only if it was switched
//! on automatically. A manual `on` is never undone by a closing game.

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::services::{
    detector::GameEvent,
    gamemode::{ActivationReport, DeactivationReport, GameModeSession, SessionState},
    options::GameModeOptions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    None,
    Activated { game: String, report: ActivationReport },
    Deactivated(DeactivationReport),
}

#[derive(Debug, Default)]
pub struct AutoOptimizer {
    auto_optimize: bool,
    // Set only while the current activation came from a detected game
    auto_activated: bool,
    running: BTreeSet<String>,
}

impl AutoOptimizer {
    pub fn new(auto_optimize: bool) -> Self {
        Self {
            auto_optimize,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_auto_activated(&self) -> bool {
        self.auto_activated
    }

    /// Games seen by the events handled so far, sorted
    pub fn running_games(&self) -> Vec<String> {
        self.running.iter().cloned().collect()
    }

    pub fn handle(
        &mut self,
        event: GameEvent,
        session: &mut GameModeSession,
        options: &GameModeOptions,
    ) -> Reaction {
        match event {
            GameEvent::Detected(game) => {
                self.running.insert(game.clone());
                if !self.auto_optimize || session.state() == SessionState::Active {
                    debug!(game = %game, "no automatic activation");
                    return Reaction::None;
                }
                let report = session.activate(options);
                self.auto_activated = session.state() == SessionState::Active;
                info!(game = %game, active = self.auto_activated, "game mode switched on for game");
                Reaction::Activated { game, report }
            }
            GameEvent::Closed(game) => {
                self.running.remove(&game);
                if !self.auto_activated || !self.running.is_empty() {
                    return Reaction::None;
                }
                self.auto_activated = false;
                info!(game = %game, "last game closed, switching game mode off");
                Reaction::Deactivated(session.deactivate())
            }
        }
    }

    /// Manual `on`: the activation is the user's from now on.
    pub fn activate(&mut self, session: &mut GameModeSession, options: &GameModeOptions) -> ActivationReport {
        self.auto_activated = false;
        session.activate(options)
    }

    pub fn deactivate(&mut self, session: &mut GameModeSession) -> DeactivationReport {
        self.auto_activated = false;
        session.deactivate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::{FakeControl, FakeDirectory};
    use std::sync::Arc;

    fn setup() -> (Arc<FakeControl>, GameModeSession) {
        let dir = Arc::new(FakeDirectory::new(&[
            (100, "explorer.exe"),
            (200, "chrome.exe"),
            (300, "steam.exe"),
            (900, "cs2.exe"),
            (901, "valheim.exe"),
        ]));
        let control = Arc::new(FakeControl::default());
        let session = GameModeSession::new(dir, control.clone());
        (control, session)
    }

    fn detected(name: &str) -> GameEvent {
        GameEvent::Detected(name.to_string())
    }

    fn closed(name: &str) -> GameEvent {
        GameEvent::Closed(name.to_string())
    }

    #[test]
    fn test_auto_activates_when_idle() {
        let (control, mut session) = setup();
        let mut policy = AutoOptimizer::new(true);
        let options = GameModeOptions::default();

        let reaction = policy.handle(detected("Counter-Strike 2"), &mut session, &options);

        let (game, report) = match reaction {
            Reaction::Activated { game, report } => (game, report),
            other => panic!("expected activation, got {:?}", other),
        };
        assert_eq!(game, "Counter-Strike 2");
        assert_eq!(report.total_suspended(), 3);
        assert!(policy.is_auto_activated());
        assert!(control.is_frozen(100));
        assert!(!control.is_frozen(900));

        let reaction = policy.handle(closed("Counter-Strike 2"), &mut session, &options);
        assert_eq!(reaction, Reaction::Deactivated(DeactivationReport { resumed: 3, failed: 0 }));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!policy.is_auto_activated());
    }

    #[test]
    fn test_no_activation_without_auto_optimize() {
        let (control, mut session) = setup();
        let mut policy = AutoOptimizer::new(false);
        let options = GameModeOptions::default();

        assert_eq!(policy.handle(detected("Counter-Strike 2"), &mut session, &options), Reaction::None);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(control.total_suspend_calls(), 0);
        assert_eq!(policy.running_games(), vec!["Counter-Strike 2".to_string()]);

        assert_eq!(policy.handle(closed("Counter-Strike 2"), &mut session, &options), Reaction::None);
        assert!(policy.running_games().is_empty());
    }

    #[test]
    fn test_second_game_keeps_game_mode_on() {
        let (control, mut session) = setup();
        let mut policy = AutoOptimizer::new(true);
        let options = GameModeOptions::default();

        policy.handle(detected("Counter-Strike 2"), &mut session, &options);
        assert_eq!(policy.handle(detected("Valheim"), &mut session, &options), Reaction::None);
        assert_eq!(control.suspend_calls(200), 1);

        assert_eq!(policy.handle(closed("Counter-Strike 2"), &mut session, &options), Reaction::None);
        assert_eq!(session.state(), SessionState::Active);

        let reaction = policy.handle(closed("Valheim"), &mut session, &options);
        assert!(matches!(reaction, Reaction::Deactivated(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_manual_activation_survives_game_exit() {
        let (_control, mut session) = setup();
        let mut policy = AutoOptimizer::new(true);
        let options = GameModeOptions::default();

        policy.activate(&mut session, &options);
        assert_eq!(policy.handle(detected("Counter-Strike 2"), &mut session, &options), Reaction::None);
        assert_eq!(policy.handle(closed("Counter-Strike 2"), &mut session, &options), Reaction::None);

        assert_eq!(session.state(), SessionState::Active);
        assert!(!policy.is_auto_activated());
    }

    #[test]
    fn test_manual_on_takes_over_auto_activation() {
        let (_control, mut session) = setup();
        let mut policy = AutoOptimizer::new(true);
        let options = GameModeOptions::default();

        policy.handle(detected("Counter-Strike 2"), &mut session, &options);
        policy.activate(&mut session, &options);
        policy.handle(closed("Counter-Strike 2"), &mut session, &options);

        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_manual_off_then_next_game_reactivates() {
        let (_control, mut session) = setup();
        let mut policy = AutoOptimizer::new(true);
        let options = GameModeOptions::default();

        policy.handle(detected("Counter-Strike 2"), &mut session, &options);
        policy.deactivate(&mut session);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(policy.handle(closed("Counter-Strike 2"), &mut session, &options), Reaction::None);

        let reaction = policy.handle(detected("Valheim"), &mut session, &options);
        assert!(matches!(reaction, Reaction::Activated { .. }));
        assert!(policy.is_auto_activated());
    }

    #[test]
    fn test_nothing_to_suspend_is_not_auto_activated() {
        let dir = Arc::new(FakeDirectory::new(&[(900, "cs2.exe")]));
        let mut session = GameModeSession::new(dir, Arc::new(FakeControl::default()));
        let mut policy = AutoOptimizer::new(true);

        let reaction = policy.handle(detected("Counter-Strike 2"), &mut session, &GameModeOptions::default());

        assert!(matches!(reaction, Reaction::Activated { .. }));
        assert!(!policy.is_auto_activated());
        assert_eq!(policy.handle(closed("Counter-Strike 2"), &mut session, &GameModeOptions::default()), Reaction::None);
    }
}
