//! Test utilities for session collaborators
//!
//! Scripted stand-ins for the location provider and notification channel,
//! plus a contact factory. Enabled for other crates via the `test-helpers`
//! feature.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use guardian_core::{Contact, ContactId, Position};

use crate::geo::{GeoSource, LocationError};
use crate::notify::{DeliveryError, NotificationChannel};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates a valid contact with a fixed phone number.
///
/// # Arguments
/// * `id` - Contact identifier
/// * `name` - Display name (at least two characters)
pub fn test_contact(id: &str, name: &str) -> Contact {
    Contact {
        id: ContactId::from(id),
        name: name.to_string(),
        phone_number: "555-123-4567".to_string(),
    }
}

#[derive(Debug, Clone)]
enum Fallback {
    Fixed(f64, f64),
    Fail(LocationError),
    Hang,
}

/// Location provider driven by a script.
///
/// Queued responses are returned first, in order; afterwards every call gets
/// the fallback. An optional delay is applied before answering, which lets
/// tests hold a request in flight.
#[derive(Debug)]
pub struct ScriptedGeoSource {
    queue: Mutex<VecDeque<Result<(f64, f64), LocationError>>>,
    fallback: Fallback,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedGeoSource {
    fn with_fallback(fallback: Fallback) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers with the given coordinates
    pub fn fixed(latitude: f64, longitude: f64) -> Self {
        Self::with_fallback(Fallback::Fixed(latitude, longitude))
    }

    /// Always fails with `error`
    pub fn failing(error: LocationError) -> Self {
        Self::with_fallback(Fallback::Fail(error))
    }

    /// Never answers
    pub fn hanging() -> Self {
        Self::with_fallback(Fallback::Hang)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a one-off response ahead of the fallback
    pub fn push(&self, response: Result<(f64, f64), LocationError>) {
        lock(&self.queue).push_back(response);
    }

    /// Number of samples requested so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeoSource for ScriptedGeoSource {
    async fn sample_once(&self) -> Result<Position, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = lock(&self.queue).pop_front();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = match queued {
            Some(response) => response,
            None => match &self.fallback {
                Fallback::Fixed(lat, lng) => Ok((*lat, *lng)),
                Fallback::Fail(e) => Err(e.clone()),
                Fallback::Hang => std::future::pending().await,
            },
        };

        scripted.map(|(lat, lng)| Position::new(lat, lng))
    }
}

/// Notification channel that records every send.
///
/// Contacts registered with [`failing_for`](Self::failing_for) always fail;
/// contacts registered with [`flaky_for`](Self::flaky_for) fail the given
/// number of times and then succeed.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(ContactId, String)>>,
    attempts: Mutex<HashMap<ContactId, u32>>,
    fail_for: HashSet<ContactId>,
    flaky: Mutex<HashMap<ContactId, u32>>,
    delay: Duration,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, id: &str) -> Self {
        self.fail_for.insert(ContactId::from(id));
        self
    }

    pub fn flaky_for(self, id: &str, failures: u32) -> Self {
        lock(&self.flaky).insert(ContactId::from(id), failures);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Successfully delivered `(contact, message)` pairs, in delivery order
    pub fn sent(&self) -> Vec<(ContactId, String)> {
        lock(&self.sent).clone()
    }

    /// Total sends attempted, successful or not
    pub fn send_count(&self) -> usize {
        lock(&self.attempts).values().map(|n| *n as usize).sum()
    }

    pub fn attempts_for(&self, id: &str) -> u32 {
        lock(&self.attempts)
            .get(&ContactId::from(id))
            .copied()
            .unwrap_or(0)
    }
}

impl NotificationChannel for RecordingChannel {
    async fn send(&self, contact: &Contact, message: &str) -> Result<(), DeliveryError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        *lock(&self.attempts).entry(contact.id.clone()).or_insert(0) += 1;

        if self.fail_for.contains(&contact.id) {
            return Err(DeliveryError::new("simulated carrier rejection"));
        }

        {
            let mut flaky = lock(&self.flaky);
            if let Some(remaining) = flaky.get_mut(&contact.id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DeliveryError::new("simulated transient failure"));
                }
            }
        }

        lock(&self.sent).push((contact.id.clone(), message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_is_valid() {
        let c = test_contact("a", "Alice");
        assert!(c.validate().is_ok());
    }

    #[tokio::test]
    async fn test_scripted_queue_before_fallback() {
        let geo = ScriptedGeoSource::fixed(1.0, 2.0);
        geo.push(Err(LocationError::PermissionDenied));

        assert_eq!(
            GeoSource::sample_once(&geo).await,
            Err(LocationError::PermissionDenied)
        );
        assert_eq!(GeoSource::sample_once(&geo).await.unwrap().latitude, 1.0);
        assert_eq!(geo.calls(), 2);
    }

    #[tokio::test]
    async fn test_recording_channel_counts_failures() {
        let channel = RecordingChannel::new().failing_for("b");
        let a = test_contact("a", "Alice");
        let b = test_contact("b", "Bob");

        assert!(NotificationChannel::send(&channel, &a, "x").await.is_ok());
        assert!(NotificationChannel::send(&channel, &b, "x").await.is_err());

        assert_eq!(channel.send_count(), 2);
        assert_eq!(channel.sent().len(), 1);
    }
}
