//! Sharing session handlers

use tokio::time::Instant;

use guardian_core::prelude::*;
use guardian_core::{compose_sharing_notice, ContactId, Position};
use guardian_services::{ContactDirectory, LocationError};

use crate::session::{Epoch, TickOutcome};
use crate::state::AppState;

use super::{UpdateAction, UpdateResult};

/// Configure and start a sharing session at `now`.
///
/// A rejected command leaves the session untouched. On success the engine
/// must arm the session's timers.
pub fn start_sharing<I>(
    state: &mut AppState,
    directory: &dyn ContactDirectory,
    contacts: I,
    duration_minutes: u32,
    now: Instant,
) -> Result<UpdateResult>
where
    I: IntoIterator<Item = ContactId>,
{
    let epoch = state
        .sharing
        .begin(contacts, duration_minutes, directory, now)?;

    let notice = state
        .settings
        .sharing
        .notify_recipients
        .then(|| compose_sharing_notice(duration_minutes));

    Ok(UpdateResult::action(UpdateAction::StartSharing {
        epoch,
        end_time: state.sharing.end_time(),
        recipients: state.sharing.recipients().to_vec(),
        notice,
    }))
}

pub(super) fn handle_tick(state: &mut AppState, epoch: Epoch, at: Instant) -> UpdateResult {
    if let TickOutcome::Expired = state.sharing.tick(epoch, at) {
        debug!("Sharing expired on countdown tick");
    }
    UpdateResult::none()
}

pub(super) fn handle_deadline(state: &mut AppState, epoch: Epoch) -> UpdateResult {
    state.sharing.expire(epoch);
    UpdateResult::none()
}

pub(super) fn handle_sampled(
    state: &mut AppState,
    epoch: Epoch,
    result: std::result::Result<Position, LocationError>,
) -> UpdateResult {
    state.sharing.record_sample(epoch, result);
    UpdateResult::none()
}
