//! Action handlers: UpdateAction dispatch and background task spawning
//!
//! Every spawned task reports through the message channel and gives up as
//! soon as the engine signals shutdown. Handles are attached to the owning
//! session so a terminal transition cancels them.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use guardian_core::Contact;
use guardian_services::{
    deliver_with_retries, sample_every, sample_within, ContactDirectory, GeoSource,
    NotificationChannel, SessionClock,
};

use crate::handler::UpdateAction;
use crate::message::Message;
use crate::session::{DeliveryOutcome, DeliveryReport, Epoch};
use crate::state::AppState;

/// Collaborators shared by all background work
pub struct Services<G, N> {
    pub geo: Arc<G>,
    pub channel: Arc<N>,
    pub contacts: Arc<dyn ContactDirectory>,
    pub clock: SessionClock,
}

impl<G, N> Clone for Services<G, N> {
    fn clone(&self) -> Self {
        Self {
            geo: self.geo.clone(),
            channel: self.channel.clone(),
            contacts: self.contacts.clone(),
            clock: self.clock,
        }
    }
}

/// Execute an action by spawning background work and attaching its handles
/// to the owning session
pub fn handle_action<G, N>(
    state: &mut AppState,
    action: UpdateAction,
    services: &Services<G, N>,
    msg_tx: &mpsc::Sender<Message>,
    shutdown_rx: &watch::Receiver<bool>,
) where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    match action {
        UpdateAction::RequestAlertLocation { epoch } => {
            let timeout = state.settings.alert.location_timeout();
            let geo = services.geo.clone();
            let tx = msg_tx.clone();

            let task = tokio::spawn(until_shutdown(shutdown_rx.clone(), async move {
                let result = sample_within(geo.as_ref(), timeout).await;
                let _ = tx.send(Message::AlertLocationResolved { epoch, result }).await;
            }));
            state.alert.attach_task(epoch, task);
        }

        UpdateAction::FanOutAlert {
            epoch,
            recipients,
            message,
        } => {
            let max_retries = state.settings.alert.max_delivery_retries;
            let message: Arc<str> = message.into();

            for contact in recipients {
                let task = spawn_delivery(
                    services.channel.clone(),
                    contact,
                    message.clone(),
                    max_retries,
                    epoch,
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                );
                state.alert.attach_task(epoch, task);
            }
        }

        UpdateAction::StartSharing {
            epoch,
            end_time,
            recipients,
            notice,
        } => {
            start_sharing_timers(state, epoch, end_time, services, msg_tx, shutdown_rx);

            if let Some(notice) = notice {
                send_sharing_notice(services.channel.clone(), recipients, notice, shutdown_rx);
            }
        }
    }
}

fn spawn_delivery<N>(
    channel: Arc<N>,
    contact: Contact,
    message: Arc<str>,
    max_retries: u32,
    epoch: Epoch,
    tx: mpsc::Sender<Message>,
    shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()>
where
    N: NotificationChannel + Sync + 'static,
{
    tokio::spawn(until_shutdown(shutdown_rx, async move {
        let outcome = deliver_with_retries(channel.as_ref(), &contact, &message, max_retries).await;

        let report = DeliveryReport {
            contact_id: contact.id,
            contact_name: contact.name,
            outcome: match outcome.result {
                Ok(()) => DeliveryOutcome::Delivered,
                Err(e) => DeliveryOutcome::Failed { reason: e.reason },
            },
            attempts: outcome.attempts,
        };
        let _ = tx.send(Message::AlertDeliveryFinished { epoch, report }).await;
    }))
}

fn start_sharing_timers<G, N>(
    state: &mut AppState,
    epoch: Epoch,
    end_time: Option<Instant>,
    services: &Services<G, N>,
    msg_tx: &mpsc::Sender<Message>,
    shutdown_rx: &watch::Receiver<bool>,
) where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    let clock = services.clock;
    let sample_timeout = state.settings.alert.location_timeout();
    let tick_interval = state.settings.sharing.tick_interval();
    let sample_interval = state.settings.sharing.sample_interval();

    // Deadline
    if let Some(end) = end_time {
        let tx = msg_tx.clone();
        let delay = end.saturating_duration_since(clock.now());
        let token = clock.after(delay, move || {
            if let Err(e) = tx.try_send(Message::SharingDeadline { epoch }) {
                warn!("Could not deliver sharing deadline: {}", e);
            }
        });
        state.sharing.attach_timer(epoch, token);
    }

    // Countdown
    let tx = msg_tx.clone();
    let token = clock.every(tick_interval, move || {
        let msg = Message::SharingTick {
            epoch,
            at: Instant::now(),
        };
        if let Err(e) = tx.try_send(msg) {
            debug!("Dropped countdown tick: {}", e);
        }
    });
    state.sharing.attach_timer(epoch, token);

    // Periodic sampler
    let tx = msg_tx.clone();
    let token = sample_every(
        services.geo.clone(),
        &clock,
        sample_interval,
        sample_timeout,
        move |result| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(Message::SharingSampled { epoch, result }).await;
            }
        },
    );
    state.sharing.attach_timer(epoch, token);

    // Initial sample
    let geo = services.geo.clone();
    let tx = msg_tx.clone();
    let task = tokio::spawn(until_shutdown(shutdown_rx.clone(), async move {
        let result = sample_within(geo.as_ref(), sample_timeout).await;
        let _ = tx.send(Message::SharingSampled { epoch, result }).await;
    }));
    state.sharing.attach_task(epoch, task);
}

/// Best-effort notice; outcomes are only logged
fn send_sharing_notice<N>(
    channel: Arc<N>,
    recipients: Vec<Contact>,
    notice: String,
    shutdown_rx: &watch::Receiver<bool>,
) where
    N: NotificationChannel + Sync + 'static,
{
    let notice: Arc<str> = notice.into();
    for contact in recipients {
        let channel = channel.clone();
        let notice = notice.clone();
        tokio::spawn(until_shutdown(shutdown_rx.clone(), async move {
            if let Err(e) = NotificationChannel::send(channel.as_ref(), &contact, &notice).await {
                warn!("Sharing notice to {} failed: {}", contact.id, e);
            }
        }));
    }
}

/// Run `fut` unless the engine shuts down first
async fn until_shutdown<F>(mut shutdown_rx: watch::Receiver<bool>, fut: F)
where
    F: Future<Output = ()>,
{
    if *shutdown_rx.borrow() {
        return;
    }
    tokio::select! {
        _ = fut => {}
        _ = shutdown_rx.changed() => debug!("Background task stopped by shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::handler::{activate_alert, start_sharing};
    use crate::session::{AlertState, SharingState};
    use guardian_core::ContactId;
    use guardian_services::test_utils::{test_contact, RecordingChannel, ScriptedGeoSource};
    use guardian_services::ContactBook;

    fn services(
        geo: ScriptedGeoSource,
        channel: RecordingChannel,
    ) -> Services<ScriptedGeoSource, RecordingChannel> {
        Services {
            geo: Arc::new(geo),
            channel: Arc::new(channel),
            contacts: Arc::new(ContactBook::from_contacts(vec![
                test_contact("a", "Alice"),
                test_contact("b", "Bob"),
            ])),
            clock: SessionClock::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_request_reports_back() {
        let services = services(ScriptedGeoSource::fixed(1.0, 2.0), RecordingChannel::new());
        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut state = AppState::new();

        let result = activate_alert(&mut state, services.contacts.as_ref()).unwrap();
        handle_action(&mut state, result.action.unwrap(), &services, &tx, &shutdown_rx);

        match rx.recv().await {
            Some(Message::AlertLocationResolved { epoch: 1, result }) => {
                assert_eq!(result.unwrap().latitude, 1.0);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_reports_each_contact() {
        let services = services(
            ScriptedGeoSource::fixed(1.0, 2.0),
            RecordingChannel::new().failing_for("b"),
        );
        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut state = AppState::new();
        activate_alert(&mut state, services.contacts.as_ref()).unwrap();
        state
            .alert
            .resolve_location(1, Ok(guardian_core::Position::new(1.0, 2.0)));

        let action = UpdateAction::FanOutAlert {
            epoch: 1,
            recipients: state.alert.recipients().to_vec(),
            message: "help".to_string(),
        };
        handle_action(&mut state, action, &services, &tx, &shutdown_rx);

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            match rx.recv().await {
                Some(Message::AlertDeliveryFinished { report, .. }) => {
                    outcomes.push((report.contact_id.to_string(), report.is_delivered()))
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
        outcomes.sort();
        assert_eq!(
            outcomes,
            vec![("a".to_string(), true), ("b".to_string(), false)]
        );
        assert_eq!(services.channel.send_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_pending_location_request() {
        let services = services(ScriptedGeoSource::hanging(), RecordingChannel::new());
        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut state = AppState::new();
        state.settings.alert.location_timeout_ms = 60_000;

        let result = activate_alert(&mut state, services.contacts.as_ref()).unwrap();
        handle_action(&mut state, result.action.unwrap(), &services, &tx, &shutdown_rx);

        shutdown_tx.send(true).unwrap();
        drop(tx);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(rx.recv().await.is_none());
        assert_eq!(state.alert.state(), &AlertState::Activating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sharing_timers_tick_and_sample() {
        let services = services(ScriptedGeoSource::fixed(1.0, 2.0), RecordingChannel::new());
        let (tx, mut rx) = mpsc::channel(256);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut state = AppState::new();

        let result = start_sharing(
            &mut state,
            services.contacts.as_ref(),
            vec![ContactId::from("a")],
            15,
            Instant::now(),
        )
        .unwrap();
        handle_action(&mut state, result.action.unwrap(), &services, &tx, &shutdown_rx);

        tokio::time::sleep(Duration::from_millis(3010)).await;

        let mut ticks = 0;
        let mut samples = 0;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                Message::SharingTick { epoch: 1, .. } => ticks += 1,
                Message::SharingSampled { epoch: 1, .. } => samples += 1,
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert_eq!(ticks, 3);
        assert_eq!(samples, 1);
        assert_eq!(
            services.channel.sent(),
            vec![(
                ContactId::from("a"),
                "I'm sharing my live location with you for 15 minutes.".to_string()
            )]
        );

        state.sharing.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(state.sharing.state(), &SharingState::Stopped);
    }
}
