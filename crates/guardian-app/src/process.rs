//! Message processing: runs the TEA update loop and dispatches actions

use tokio::sync::{mpsc, watch};

use guardian_services::{GeoSource, NotificationChannel};

use crate::actions::{handle_action, Services};
use crate::handler::{self, UpdateResult};
use crate::message::Message;
use crate::state::AppState;

/// Process a message through the TEA update function
pub fn process_message<G, N>(
    state: &mut AppState,
    message: Message,
    services: &Services<G, N>,
    msg_tx: &mpsc::Sender<Message>,
    shutdown_rx: &watch::Receiver<bool>,
) where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    let result = handler::update(state, message);
    process_result(state, result, services, msg_tx, shutdown_rx);
}

/// Dispatch an update result and any follow-up messages it chains
pub fn process_result<G, N>(
    state: &mut AppState,
    result: UpdateResult,
    services: &Services<G, N>,
    msg_tx: &mpsc::Sender<Message>,
    shutdown_rx: &watch::Receiver<bool>,
) where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    let mut next = Some(result);
    while let Some(result) = next {
        if let Some(action) = result.action {
            handle_action(state, action, services, msg_tx, shutdown_rx);
        }
        next = result.message.map(|m| handler::update(state, m));
    }
}
