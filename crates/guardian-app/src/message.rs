//! Message types for the session engine (TEA pattern)
//!
//! Background tasks and timers never touch session state; they report back
//! through these messages, tagged with the epoch they were issued under.

use tokio::time::Instant;

use guardian_core::Position;
use guardian_services::LocationError;

use crate::session::{DeliveryReport, Epoch};

/// All messages processed by the engine loop
#[derive(Debug, Clone)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Alert
    // ─────────────────────────────────────────────────────────
    /// Location request made at activation finished
    AlertLocationResolved {
        epoch: Epoch,
        result: Result<Position, LocationError>,
    },

    /// Delivery of the SOS text to one contact finished (retries included)
    AlertDeliveryFinished { epoch: Epoch, report: DeliveryReport },

    /// User cancelled the alert
    CancelAlert,

    // ─────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────
    /// Countdown tick, stamped with the time it fired
    SharingTick { epoch: Epoch, at: Instant },

    /// One-shot deadline timer fired
    SharingDeadline { epoch: Epoch },

    /// Periodic (or initial) location sample finished
    SharingSampled {
        epoch: Epoch,
        result: Result<Position, LocationError>,
    },

    /// User stopped sharing
    StopSharing,

    // ─────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────
    /// Termination signal: end both sessions and quit
    Quit,
}
