//! Headless runners - drive one session and stream its events
//!
//! Each runner owns the Engine for the lifetime of one command: it starts
//! the session, forwards engine events to stdout as NDJSON and processes
//! messages until the session ends or Ctrl+C arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use guardian_app::config::Settings;
use guardian_app::{message::Message, signals, Engine, EngineEvent, SharingPhase};
use guardian_core::prelude::*;
use guardian_core::ContactId;
use guardian_services::{ContactDirectory, GeoSource, NotificationChannel};

use super::HeadlessEvent;

/// Raise an SOS alert and stream its events.
///
/// The alert stays active until Ctrl+C, or for `hold` when given.
pub async fn run_sos<G, N>(
    settings: Settings,
    geo: G,
    channel: N,
    contacts: Arc<dyn ContactDirectory>,
    hold: Option<Duration>,
) -> Result<()>
where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    info!("Guardian starting SOS in headless mode");

    let mut engine = Engine::new(settings, geo, channel, contacts);
    let printer = spawn_event_printer(engine.subscribe());
    signals::spawn_signal_handler(engine.msg_sender());

    let result = drive_sos(&mut engine, hold).await;
    finish(&mut engine, printer, &result).await;
    result
}

/// Start a sharing session and stream its events until it ends
pub async fn run_share<G, N>(
    settings: Settings,
    geo: G,
    channel: N,
    contacts: Arc<dyn ContactDirectory>,
    contact_ids: Vec<ContactId>,
    duration_minutes: u32,
) -> Result<()>
where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    info!("Guardian starting location sharing in headless mode");

    let mut engine = Engine::new(settings, geo, channel, contacts);
    let printer = spawn_event_printer(engine.subscribe());
    signals::spawn_signal_handler(engine.msg_sender());

    let result = drive_share(&mut engine, contact_ids, duration_minutes).await;
    finish(&mut engine, printer, &result).await;
    result
}

/// Activate the alert and process messages until it is cancelled, the hold
/// time elapses or a quit arrives
pub async fn drive_sos<G, N>(engine: &mut Engine<G, N>, hold: Option<Duration>) -> Result<()>
where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    engine.activate_alert()?;

    let release = hold.map(|hold| {
        let tx = engine.msg_sender();
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            info!("Hold time elapsed, cancelling alert");
            let _ = tx.send(Message::CancelAlert).await;
        })
    });

    let result = engine
        .run_until(|state| state.should_quit() || !state.alert.state().is_live())
        .await;

    if let Some(release) = release {
        release.abort();
    }
    result
}

/// Start sharing and process messages until the session expires, is
/// stopped or a quit arrives
pub async fn drive_share<G, N>(
    engine: &mut Engine<G, N>,
    contact_ids: Vec<ContactId>,
    duration_minutes: u32,
) -> Result<()>
where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    engine.start_sharing(contact_ids, duration_minutes)?;

    engine
        .run_until(|state| {
            state.should_quit()
                || matches!(
                    state.sharing.state().phase(),
                    SharingPhase::Expired | SharingPhase::Stopped
                )
        })
        .await
}

/// Forward engine events to stdout until the engine shuts down
pub fn spawn_event_printer(mut rx: broadcast::Receiver<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    HeadlessEvent::from_engine_event(&event).emit();
                    if matches!(event, EngineEvent::Shutdown) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Headless output lagged, {} event(s) skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn finish<G, N>(engine: &mut Engine<G, N>, printer: JoinHandle<()>, result: &Result<()>)
where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    // A failed run always ends the command
    if let Err(e) = result {
        HeadlessEvent::error(e.to_string(), true).emit();
    }

    engine.shutdown();
    if let Err(e) = printer.await {
        warn!("Headless event printer failed: {}", e);
    }
    info!("Guardian headless mode exiting");
}
