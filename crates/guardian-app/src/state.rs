//! Engine state (Model in TEA pattern)

use crate::config::Settings;
use crate::session::{AlertSession, SharingSession};

/// Everything the update function reads and writes
#[derive(Debug, Default)]
pub struct AppState {
    pub settings: Settings,
    pub alert: AlertSession,
    pub sharing: SharingSession,
    quitting: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// End both sessions and mark the engine as quitting
    pub fn quit(&mut self) {
        self.alert.cancel();
        self.sharing.stop();
        self.quitting = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quitting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AlertState, SharingState};
    use guardian_services::test_utils::test_contact;

    #[test]
    fn test_quit_cancels_live_alert() {
        let mut state = AppState::new();
        state.alert.activate(vec![test_contact("a", "Alice")]).unwrap();

        state.quit();

        assert!(state.should_quit());
        assert_eq!(state.alert.state(), &AlertState::Cancelled);
        assert_eq!(state.sharing.state(), &SharingState::Idle);
    }
}
