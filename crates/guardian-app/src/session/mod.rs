//! Emergency session state machines
//!
//! [`AlertSession`] and [`SharingSession`] are plain state holders. They own
//! the handles of their background work (tasks and timer tokens) so that a
//! terminal transition tears everything down at once, but they never spawn
//! anything themselves; the action layer does.

pub mod alert;
pub mod sharing;

pub use alert::{AlertSession, AlertState, DeliveryOutcome, DeliveryReport};
pub use sharing::{format_countdown, SharingPhase, SharingSession, SharingState, TickOutcome};

/// Generation counter of a session.
///
/// Bumped on every start and every terminal transition. Asynchronous results
/// carry the epoch they were issued under and are dropped when it no longer
/// matches.
pub type Epoch = u64;
