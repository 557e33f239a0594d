//! Engine - the single entry point to the emergency sessions
//!
//! The Engine owns the application state, the message channel, the shutdown
//! signal and the collaborators. Commands are `&mut self` methods applied
//! immediately; results of background work arrive as messages and are
//! applied one at a time by `process_message`, so no two transitions of a
//! session ever run concurrently.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::info;

use guardian_core::prelude::*;
use guardian_core::{ContactId, Position};
use guardian_services::{ContactDirectory, GeoSource, NotificationChannel, SessionClock};

use crate::actions::Services;
use crate::config::Settings;
use crate::engine_event::EngineEvent;
use crate::handler::{self, UpdateResult};
use crate::message::Message;
use crate::process;
use crate::session::{format_countdown, AlertState, SharingPhase, SharingState};
use crate::state::AppState;

/// Capacity of the message and event channels
const CHANNEL_CAPACITY: usize = 256;

/// Lightweight snapshot of state for change detection.
///
/// Captured before message processing, compared after to detect
/// what changed and emit appropriate EngineEvents.
#[derive(Debug, Clone)]
struct StateSnapshot {
    alert: AlertState,
    report_count: usize,
    fan_out_complete: bool,
    sharing_phase: SharingPhase,
    last_position: Option<Position>,
    failed_samples: u32,
    remaining_secs: Option<u64>,
}

impl StateSnapshot {
    fn capture(state: &AppState) -> Self {
        Self {
            alert: state.alert.state().clone(),
            report_count: state.alert.reports().len(),
            fan_out_complete: state.alert.fan_out_complete(),
            sharing_phase: state.sharing.state().phase(),
            last_position: state.sharing.state().last_position().cloned(),
            failed_samples: state.sharing.failed_samples(),
            remaining_secs: state.sharing.remaining().map(|r| r.as_secs()),
        }
    }
}

/// Orchestration engine for one user's emergency sessions.
///
/// - TEA state management
/// - Message channel
/// - Shutdown signaling
/// - Watch channels with the current alert and sharing state
/// - Event broadcasting for external consumers
pub struct Engine<G, N> {
    /// TEA application state (the Model)
    pub state: AppState,

    /// Sender half of the message channel.
    /// Clone this to give to input sources (signal handler, timers, tasks).
    msg_tx: mpsc::Sender<Message>,

    /// Receiver half of the message channel.
    msg_rx: mpsc::Receiver<Message>,

    /// Sender for the shutdown signal. Send `true` to initiate shutdown.
    shutdown_tx: watch::Sender<bool>,

    /// Receiver for the shutdown signal. Clone for background tasks.
    shutdown_rx: watch::Receiver<bool>,

    services: Services<G, N>,

    event_tx: broadcast::Sender<EngineEvent>,
    alert_tx: watch::Sender<AlertState>,
    sharing_tx: watch::Sender<SharingState>,
}

impl<G, N> Engine<G, N>
where
    G: GeoSource + Sync + 'static,
    N: NotificationChannel + Sync + 'static,
{
    /// Create an engine. Must be called from within a tokio runtime.
    pub fn new(
        settings: Settings,
        geo: G,
        channel: N,
        contacts: Arc<dyn ContactDirectory>,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (alert_tx, _) = watch::channel(AlertState::Idle);
        let (sharing_tx, _) = watch::channel(SharingState::Idle);

        let services = Services {
            geo: Arc::new(geo),
            channel: Arc::new(channel),
            contacts,
            clock: SessionClock::new(),
        };

        Self {
            state: AppState::with_settings(settings),
            msg_tx,
            msg_rx,
            shutdown_tx,
            shutdown_rx,
            services,
            event_tx,
            alert_tx,
            sharing_tx,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn contacts(&self) -> &Arc<dyn ContactDirectory> {
        &self.services.contacts
    }

    pub fn geo(&self) -> &Arc<G> {
        &self.services.geo
    }

    pub fn channel(&self) -> &Arc<N> {
        &self.services.channel
    }

    // ─────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────

    /// Raise an SOS alert to every trusted contact.
    ///
    /// Fails with `NoContacts` when the directory is empty and with
    /// `AlreadyActive` while an alert is live. Location failures do not fail
    /// the command; the alert goes out without a link.
    pub fn activate_alert(&mut self) -> Result<()> {
        let contacts = self.services.contacts.clone();
        self.run_command(|state| handler::activate_alert(state, contacts.as_ref()))
    }

    /// Cancel the alert. A no-op unless an alert is live.
    pub fn cancel_alert(&mut self) {
        self.process_message(Message::CancelAlert);
    }

    /// Start sharing with the given contacts for `duration_minutes`
    /// (0 = until stopped).
    pub fn start_sharing<I>(&mut self, contact_ids: I, duration_minutes: u32) -> Result<()>
    where
        I: IntoIterator<Item = ContactId>,
    {
        let contacts = self.services.contacts.clone();
        let now = self.services.clock.now();
        self.run_command(|state| {
            handler::start_sharing(state, contacts.as_ref(), contact_ids, duration_minutes, now)
        })
    }

    /// Stop sharing. A no-op unless a session is running or configured.
    pub fn stop_sharing(&mut self) {
        self.process_message(Message::StopSharing);
    }

    // ─────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────

    /// Watch the alert state
    pub fn subscribe_alert(&self) -> watch::Receiver<AlertState> {
        self.alert_tx.subscribe()
    }

    /// Watch the sharing state
    pub fn subscribe_sharing(&self) -> watch::Receiver<SharingState> {
        self.sharing_tx.subscribe()
    }

    /// Subscribe to engine events.
    ///
    /// If the subscriber falls behind (buffer full), older events are
    /// dropped. Use `broadcast::error::RecvError::Lagged` to detect this.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    pub fn alert_state(&self) -> &AlertState {
        self.state.alert.state()
    }

    pub fn sharing_state(&self) -> &SharingState {
        self.state.sharing.state()
    }

    /// Countdown text for the sharing session at the current time
    pub fn sharing_countdown(&self) -> Option<String> {
        self.state.sharing.countdown_text(self.services.clock.now())
    }

    // ─────────────────────────────────────────────────────────
    // Loop Plumbing
    // ─────────────────────────────────────────────────────────

    /// Get a clone of the message sender for spawning input sources.
    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    /// Get a clone of the shutdown receiver for background tasks.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn should_quit(&self) -> bool {
        self.state.should_quit()
    }

    /// Process a single message through the TEA update cycle and emit
    /// events for whatever it changed.
    pub fn process_message(&mut self, msg: Message) {
        let pre = StateSnapshot::capture(&self.state);

        process::process_message(
            &mut self.state,
            msg,
            &self.services,
            &self.msg_tx,
            &self.shutdown_rx,
        );

        self.publish(&pre);
    }

    /// Drain and process all pending messages from the channel.
    ///
    /// Returns the number of messages processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    /// Process messages as they arrive until `done` returns true for the
    /// current state.
    pub async fn run_until<F>(&mut self, mut done: F) -> Result<()>
    where
        F: FnMut(&AppState) -> bool,
    {
        while !done(&self.state) {
            match self.msg_rx.recv().await {
                Some(msg) => self.process_message(msg),
                None => return Err(Error::ChannelClosed),
            }
        }
        Ok(())
    }

    /// End both sessions, emit `Shutdown` and signal background tasks.
    pub fn shutdown(&mut self) {
        let pre = StateSnapshot::capture(&self.state);
        self.state.alert.cancel();
        self.state.sharing.stop();
        self.publish(&pre);

        self.emit(EngineEvent::Shutdown);
        let _ = self.shutdown_tx.send(true);
        info!("Engine shut down");
    }

    fn run_command<F>(&mut self, command: F) -> Result<()>
    where
        F: FnOnce(&mut AppState) -> Result<UpdateResult>,
    {
        let pre = StateSnapshot::capture(&self.state);

        let outcome = command(&mut self.state).map(|result| {
            process::process_result(
                &mut self.state,
                result,
                &self.services,
                &self.msg_tx,
                &self.shutdown_rx,
            );
        });

        self.publish(&pre);
        outcome
    }

    /// Emit events for changes since `pre` and refresh the watch channels
    fn publish(&self, pre: &StateSnapshot) {
        let post = StateSnapshot::capture(&self.state);
        self.emit_events(pre, &post);

        let alert = self.state.alert.state();
        self.alert_tx.send_if_modified(|current| {
            if *current != *alert {
                *current = alert.clone();
                true
            } else {
                false
            }
        });

        let sharing = self.state.sharing.state();
        self.sharing_tx.send_if_modified(|current| {
            if *current != *sharing {
                *current = sharing.clone();
                true
            } else {
                false
            }
        });
    }

    /// Compares pre/post snapshots to detect what changed.
    fn emit_events(&self, pre: &StateSnapshot, post: &StateSnapshot) {
        // Alert transitions
        if pre.alert != post.alert {
            self.emit(EngineEvent::AlertStateChanged {
                old: pre.alert.clone(),
                new: post.alert.clone(),
            });
        }

        // New delivery reports (the list restarts on re-activation)
        let first_new = if post.report_count >= pre.report_count {
            pre.report_count
        } else {
            0
        };
        for report in &self.state.alert.reports()[first_new..] {
            self.emit(EngineEvent::AlertDelivery {
                report: report.clone(),
            });
        }

        if !pre.fan_out_complete && post.fan_out_complete {
            let reports = self.state.alert.reports();
            let delivered = reports.iter().filter(|r| r.is_delivered()).count();
            self.emit(EngineEvent::AlertFanOutCompleted {
                delivered,
                failed: reports.len() - delivered,
            });
        }

        // Sharing transitions
        if pre.sharing_phase != post.sharing_phase {
            self.emit(EngineEvent::SharingStateChanged {
                old: pre.sharing_phase,
                new: post.sharing_phase,
            });
        }

        if post.last_position != pre.last_position {
            if let Some(position) = &post.last_position {
                self.emit(EngineEvent::PositionUpdated {
                    position: position.clone(),
                });
            }
        }

        if post.failed_samples > pre.failed_samples {
            if let Some(reason) = self.state.sharing.sample_error() {
                self.emit(EngineEvent::SampleFailed {
                    reason: reason.to_string(),
                });
            }
        }

        if post.sharing_phase == SharingPhase::Active
            && (pre.sharing_phase != SharingPhase::Active
                || pre.remaining_secs != post.remaining_secs)
        {
            self.emit(EngineEvent::SharingCountdown {
                remaining_secs: post.remaining_secs,
                display: format_countdown(self.state.sharing.remaining()),
            });
        }
    }

    /// Emit a single EngineEvent to all subscribers.
    ///
    /// send() returns Err only if there are no receivers, which is fine.
    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}
