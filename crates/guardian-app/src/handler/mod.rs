//! Handler module - TEA update function and session command handlers
//!
//! Organized into submodules:
//! - `update`: Main update() function and message dispatch
//! - `alert`: SOS activation and fan-out result handling
//! - `sharing`: Sharing start, countdown, expiry and sample handling

pub(crate) mod alert;
pub(crate) mod sharing;
pub(crate) mod update;


use tokio::time::Instant;

use guardian_core::Contact;

use crate::message::Message;
use crate::session::Epoch;

// Re-export main entry points
pub use alert::activate_alert;
pub use sharing::start_sharing;
pub use update::update;

/// Actions that the engine loop should perform after update
#[derive(Debug, Clone)]
pub enum UpdateAction {
    /// Request one location sample for the activating alert
    RequestAlertLocation { epoch: Epoch },

    /// Send the SOS text to every recipient, one task per contact
    FanOutAlert {
        epoch: Epoch,
        recipients: Vec<Contact>,
        message: String,
    },

    /// Arm the deadline, countdown and sampler of a new sharing session,
    /// take the initial sample and, if `notice` is set, tell the recipients
    StartSharing {
        epoch: Epoch,
        end_time: Option<Instant>,
        recipients: Vec<Contact>,
        notice: Option<String>,
    },
}

/// Result of processing a message
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Optional follow-up message to process
    pub message: Option<Message>,
    /// Optional action for the engine loop to perform
    pub action: Option<UpdateAction>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(msg: Message) -> Self {
        Self {
            message: Some(msg),
            action: None,
        }
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            message: None,
            action: Some(action),
        }
    }
}
