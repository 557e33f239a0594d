//! Domain events emitted by the Engine for external consumers
//!
//! Events are broadcast after each message processing cycle via
//! `Engine::subscribe()`. They describe what changed; the full current state
//! is available through the watch channels.

use guardian_core::Position;

use crate::session::{AlertState, DeliveryReport, SharingPhase};

/// Domain events emitted by the Engine.
///
/// Each event is emitted exactly once per transition, so a repeated
/// cancel/stop produces nothing.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    // ─────────────────────────────────────────────────────────
    // Alert
    // ─────────────────────────────────────────────────────────
    /// The alert moved to a new state
    AlertStateChanged { old: AlertState, new: AlertState },

    /// The SOS text reached (or failed to reach) one contact
    AlertDelivery { report: DeliveryReport },

    /// Every recipient of the current alert has a delivery report
    AlertFanOutCompleted { delivered: usize, failed: usize },

    // ─────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────
    /// The sharing session moved to a new phase
    SharingStateChanged { old: SharingPhase, new: SharingPhase },

    /// A new position was sampled for the active session
    PositionUpdated { position: Position },

    /// A periodic sample failed; the session keeps running
    SampleFailed { reason: String },

    /// Remaining time changed (whole seconds); `None` means indefinite
    SharingCountdown {
        remaining_secs: Option<u64>,
        display: String,
    },

    // ─────────────────────────────────────────────────────────
    // Engine Lifecycle
    // ─────────────────────────────────────────────────────────
    /// Engine is shutting down
    Shutdown,
}

impl EngineEvent {
    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AlertStateChanged { .. } => "alert_state_changed",
            Self::AlertDelivery { .. } => "alert_delivery",
            Self::AlertFanOutCompleted { .. } => "alert_fan_out_completed",
            Self::SharingStateChanged { .. } => "sharing_state_changed",
            Self::PositionUpdated { .. } => "position_updated",
            Self::SampleFailed { .. } => "sample_failed",
            Self::SharingCountdown { .. } => "sharing_countdown",
            Self::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DeliveryOutcome;
    use guardian_core::ContactId;

    #[test]
    fn test_engine_event_all_variants_have_labels() {
        let events = vec![
            EngineEvent::AlertStateChanged {
                old: AlertState::Idle,
                new: AlertState::Activating,
            },
            EngineEvent::AlertDelivery {
                report: DeliveryReport {
                    contact_id: ContactId::from("a"),
                    contact_name: "Alice".to_string(),
                    outcome: DeliveryOutcome::Delivered,
                    attempts: 1,
                },
            },
            EngineEvent::AlertFanOutCompleted {
                delivered: 2,
                failed: 0,
            },
            EngineEvent::SharingStateChanged {
                old: SharingPhase::Idle,
                new: SharingPhase::Active,
            },
            EngineEvent::PositionUpdated {
                position: Position::new(1.0, 2.0),
            },
            EngineEvent::SampleFailed {
                reason: "timeout".to_string(),
            },
            EngineEvent::SharingCountdown {
                remaining_secs: Some(60),
                display: "01:00".to_string(),
            },
            EngineEvent::Shutdown,
        ];

        let mut labels: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), events.len());
    }
}
