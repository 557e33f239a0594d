//! # guardian-services - Session Collaborators
//!
//! The external collaborators the emergency session engine talks to: the
//! location provider, the trusted contact directory, the outbound
//! notification channel and the cancellable session clock.
//!
//! Depends on [`guardian_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Location (`geo`)
//! - [`GeoSource`] - Async one-shot position provider
//! - [`sample_within()`] - One sample bounded by a timeout
//! - [`sample_every()`] - Periodic sampling driven by the session clock
//! - [`FixedGeoSource`] - Provider pinned to configured coordinates
//!
//! ### Contacts (`contacts`)
//! - [`ContactDirectory`] - Read-only contact listing
//! - [`ContactBook`] - In-memory store with JSON persistence
//!
//! ### Notifications (`notify`)
//! - [`NotificationChannel`] - Per-contact message delivery
//! - [`deliver_with_retries()`] - Bounded immediate retry
//! - [`LogNotificationChannel`] - Simulated SMS written to the log
//!
//! ### Timing (`clock`)
//! - [`SessionClock`] - `after` / `every` timers on the tokio clock
//! - [`TimerToken`] - Cancellation handle (cancels on drop)

pub mod clock;
pub mod contacts;
pub mod geo;
pub mod notify;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use clock::{SessionClock, TimerToken, MIN_TICK_INTERVAL};
pub use contacts::{ContactBook, ContactDirectory};
pub use geo::{
    sample_every, sample_within, FixedGeoSource, GeoSource, LocalGeoSource, LocationError,
};
pub use notify::{
    deliver_with_retries, DeliveryAttempts, DeliveryError, LocalNotificationChannel,
    LogNotificationChannel, NotificationChannel,
};
