//! Outbound notification channel (SMS/push/email abstraction)

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use guardian_core::Contact;

/// A single send that the channel could not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct DeliveryError {
    pub reason: String,
}

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Delivers a text message to one contact.
///
/// Implementations report per-contact outcomes; they are never asked to
/// deliver to several contacts at once.
#[trait_variant::make(NotificationChannel: Send)]
pub trait LocalNotificationChannel {
    async fn send(&self, contact: &Contact, message: &str) -> Result<(), DeliveryError>;
}

/// Outcome of [`deliver_with_retries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempts {
    pub result: Result<(), DeliveryError>,
    /// Sends performed, including the first
    pub attempts: u32,
}

/// Send `message` to `contact`, retrying immediately up to `max_retries`
/// extra times on failure.
#[instrument(level = "debug", skip_all, fields(contact = %contact.id))]
pub async fn deliver_with_retries<N>(
    channel: &N,
    contact: &Contact,
    message: &str,
    max_retries: u32,
) -> DeliveryAttempts
where
    N: NotificationChannel + Sync,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match NotificationChannel::send(channel, contact, message).await {
            Ok(()) => {
                return DeliveryAttempts {
                    result: Ok(()),
                    attempts,
                }
            }
            Err(e) if attempts <= max_retries => {
                debug!(
                    "Delivery to {} failed (attempt {}): {}, retrying",
                    contact.id, attempts, e
                );
            }
            Err(e) => {
                warn!(
                    "Delivery to {} failed after {} attempt(s): {}",
                    contact.id, attempts, e
                );
                return DeliveryAttempts {
                    result: Err(e),
                    attempts,
                };
            }
        }
    }
}

/// Channel that records messages to the log instead of a carrier.
///
/// Stands in for an SMS gateway on machines without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationChannel;

impl NotificationChannel for LogNotificationChannel {
    async fn send(&self, contact: &Contact, message: &str) -> Result<(), DeliveryError> {
        info!(
            "SMS to {} <{}>: {}",
            contact.name, contact.phone_number, message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_contact, RecordingChannel};

    #[tokio::test]
    async fn test_delivers_first_try() {
        let channel = RecordingChannel::new();
        let alice = test_contact("a", "Alice");

        let outcome = deliver_with_retries(&channel, &alice, "hello", 2).await;
        assert_eq!(outcome.result, Ok(()));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(channel.send_count(), 1);
    }

    #[tokio::test]
    async fn test_no_retries_by_default() {
        let channel = RecordingChannel::new().failing_for("a");
        let alice = test_contact("a", "Alice");

        let outcome = deliver_with_retries(&channel, &alice, "hello", 0).await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let channel = RecordingChannel::new().flaky_for("a", 2);
        let alice = test_contact("a", "Alice");

        let outcome = deliver_with_retries(&channel, &alice, "hello", 3).await;
        assert_eq!(outcome.result, Ok(()));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(channel.attempts_for("a"), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let channel = RecordingChannel::new().failing_for("a");
        let alice = test_contact("a", "Alice");

        let outcome = deliver_with_retries(&channel, &alice, "hello", 2).await;
        assert_eq!(outcome.attempts, 3);
        assert_eq!(
            outcome.result.unwrap_err().reason,
            "simulated carrier rejection"
        );
    }

    #[tokio::test]
    async fn test_log_channel_always_delivers() {
        let alice = test_contact("a", "Alice");
        assert!(NotificationChannel::send(&LogNotificationChannel, &alice, "hi")
            .await
            .is_ok());
    }
}
