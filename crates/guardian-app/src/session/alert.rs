//! SOS alert session

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use guardian_core::prelude::*;
use guardian_core::{compose_sos_message, Contact, ContactId, Position, SessionKind};
use guardian_services::LocationError;

use super::Epoch;

/// Observable state of the SOS alert
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlertState {
    #[default]
    Idle,

    /// Waiting for the location fix
    Activating,

    /// Alert raised; `position` is `None` when the location could not be
    /// resolved, in which case `location_error` says why
    Active {
        position: Option<Position>,
        location_error: Option<String>,
    },

    /// Cancelled by the user; kept until the next activation
    Cancelled,
}

impl AlertState {
    /// Activating or Active
    pub fn is_live(&self) -> bool {
        matches!(self, AlertState::Activating | AlertState::Active { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertState::Idle => "idle",
            AlertState::Activating => "activating",
            AlertState::Active { .. } => "active",
            AlertState::Cancelled => "cancelled",
        }
    }
}

/// Result of delivering the SOS text to one contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

/// Per-recipient fan-out report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub contact_id: ContactId,
    pub contact_name: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
    pub attempts: u32,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }

    /// The failure as an engine error, if delivery failed
    pub fn error(&self) -> Option<Error> {
        match &self.outcome {
            DeliveryOutcome::Delivered => None,
            DeliveryOutcome::Failed { reason } => {
                Some(Error::delivery_failed(self.contact_id.clone(), reason.clone()))
            }
        }
    }
}

/// A single SOS alert and its notification fan-out
#[derive(Debug, Default)]
pub struct AlertSession {
    state: AlertState,
    epoch: Epoch,
    recipients: Vec<Contact>,
    message: Option<String>,
    reports: Vec<DeliveryReport>,
    tasks: Vec<JoinHandle<()>>,
}

impl AlertSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Contacts snapshotted at activation
    pub fn recipients(&self) -> &[Contact] {
        &self.recipients
    }

    /// The SOS text, once composed
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn reports(&self) -> &[DeliveryReport] {
        &self.reports
    }

    /// Every recipient has a delivery report
    pub fn fan_out_complete(&self) -> bool {
        self.message.is_some() && self.reports.len() == self.recipients.len()
    }

    /// Raise the alert for `contacts`.
    ///
    /// Fails with `NoContacts` on an empty list and `AlreadyActive` while an
    /// alert is live; state is untouched in both cases.
    pub fn activate(&mut self, contacts: Vec<Contact>) -> Result<Epoch> {
        if contacts.is_empty() {
            return Err(Error::NoContacts);
        }
        if self.state.is_live() {
            return Err(Error::already_active(SessionKind::Alert));
        }

        self.abort_tasks();
        self.epoch += 1;
        self.recipients = contacts;
        self.message = None;
        self.reports.clear();
        self.state = AlertState::Activating;

        info!(
            "Alert activating (epoch {}) for {} contact(s)",
            self.epoch,
            self.recipients.len()
        );
        Ok(self.epoch)
    }

    /// Apply the location outcome and compose the SOS text.
    ///
    /// Returns the text to fan out, or `None` if the result is stale.
    pub fn resolve_location(
        &mut self,
        epoch: Epoch,
        result: std::result::Result<Position, LocationError>,
    ) -> Option<String> {
        if epoch != self.epoch || self.state != AlertState::Activating {
            debug!(
                "Dropping stale location result (epoch {}, current {})",
                epoch, self.epoch
            );
            return None;
        }

        let (position, location_error) = match result {
            Ok(position) => (Some(position), None),
            Err(e) => {
                warn!("Alert raised without location: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let message = compose_sos_message(position.as_ref());
        self.state = AlertState::Active {
            position,
            location_error,
        };
        self.message = Some(message.clone());
        info!("Alert active (epoch {})", self.epoch);
        Some(message)
    }

    /// Record the delivery outcome for one recipient. Returns `false` if stale.
    pub fn record_delivery(&mut self, epoch: Epoch, report: DeliveryReport) -> bool {
        if epoch != self.epoch || !self.state.is_live() {
            debug!(
                "Dropping stale delivery report for {} (epoch {}, current {})",
                report.contact_id, epoch, self.epoch
            );
            return false;
        }
        if self.reports.iter().any(|r| r.contact_id == report.contact_id) {
            debug!("Duplicate delivery report for {}", report.contact_id);
            return false;
        }

        if let Some(err) = report.error() {
            warn!("{}", err);
        }
        self.reports.push(report);
        true
    }

    /// Track a background task of the current activation.
    ///
    /// A task issued under an older epoch is aborted immediately.
    pub fn attach_task(&mut self, epoch: Epoch, task: JoinHandle<()>) {
        if epoch != self.epoch || !self.state.is_live() {
            task.abort();
            return;
        }
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }

    /// Cancel a live alert. Returns `false` (and does nothing) otherwise.
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_live() {
            return false;
        }

        self.abort_tasks();
        self.epoch += 1;
        self.state = AlertState::Cancelled;
        info!("Alert cancelled");
        true
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for AlertSession {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
