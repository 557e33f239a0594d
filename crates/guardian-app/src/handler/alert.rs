//! SOS alert handlers

use guardian_core::prelude::*;
use guardian_core::Position;
use guardian_services::{ContactDirectory, LocationError};

use crate::session::{DeliveryReport, Epoch};
use crate::state::AppState;

use super::{UpdateAction, UpdateResult};

/// Activate the alert for every contact in `directory`.
///
/// On success the engine must request the location fix.
pub fn activate_alert(
    state: &mut AppState,
    directory: &dyn ContactDirectory,
) -> Result<UpdateResult> {
    let epoch = state.alert.activate(directory.list())?;
    Ok(UpdateResult::action(UpdateAction::RequestAlertLocation {
        epoch,
    }))
}

pub(super) fn handle_location_resolved(
    state: &mut AppState,
    epoch: Epoch,
    result: std::result::Result<Position, LocationError>,
) -> UpdateResult {
    match state.alert.resolve_location(epoch, result) {
        Some(message) => UpdateResult::action(UpdateAction::FanOutAlert {
            epoch,
            recipients: state.alert.recipients().to_vec(),
            message,
        }),
        None => UpdateResult::none(),
    }
}

pub(super) fn handle_delivery_finished(
    state: &mut AppState,
    epoch: Epoch,
    report: DeliveryReport,
) -> UpdateResult {
    if state.alert.record_delivery(epoch, report) && state.alert.fan_out_complete() {
        let delivered = state
            .alert
            .reports()
            .iter()
            .filter(|r| r.is_delivered())
            .count();
        info!(
            "SOS fan-out complete: {}/{} delivered",
            delivered,
            state.alert.recipients().len()
        );
    }
    UpdateResult::none()
}
