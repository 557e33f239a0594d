//! Main update function - handles state transitions (TEA pattern)

use tracing::debug;

use crate::message::Message;
use crate::state::AppState;

use super::{alert, sharing, UpdateResult};

/// Process a message and update state
/// Returns optional follow-up message and/or action
pub fn update(state: &mut AppState, message: Message) -> UpdateResult {
    match message {
        // ─────────────────────────────────────────────────────────
        // Alert
        // ─────────────────────────────────────────────────────────
        Message::AlertLocationResolved { epoch, result } => {
            alert::handle_location_resolved(state, epoch, result)
        }

        Message::AlertDeliveryFinished { epoch, report } => {
            alert::handle_delivery_finished(state, epoch, report)
        }

        Message::CancelAlert => {
            if !state.alert.cancel() {
                debug!("Cancel ignored: no live alert");
            }
            UpdateResult::none()
        }

        // ─────────────────────────────────────────────────────────
        // Sharing
        // ─────────────────────────────────────────────────────────
        Message::SharingTick { epoch, at } => sharing::handle_tick(state, epoch, at),

        Message::SharingDeadline { epoch } => sharing::handle_deadline(state, epoch),

        Message::SharingSampled { epoch, result } => {
            sharing::handle_sampled(state, epoch, result)
        }

        Message::StopSharing => {
            if !state.sharing.stop() {
                debug!("Stop ignored: sharing not running");
            }
            UpdateResult::none()
        }

        // ─────────────────────────────────────────────────────────
        // Lifecycle
        // ─────────────────────────────────────────────────────────
        Message::Quit => {
            state.quit();
            UpdateResult::none()
        }
    }
}
