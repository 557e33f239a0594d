//! Headless mode - NDJSON event output
//!
//! The `guardian` binary has no interactive UI. Engine events are written
//! to stdout as NDJSON (newline-delimited JSON), one event per line, so the
//! output can be piped into other tools or asserted on in scripts.
//!
//! # Example Output
//!
//! ```json
//! {"event":"alert_state","state":"activating","timestamp":1704700001000}
//! {"event":"alert_state","state":"active","latitude":40.7128,"longitude":-74.006,"location_error":null,"timestamp":1704700001200}
//! {"event":"delivery","contact_id":"a1","contact_name":"Alice","delivered":true,"error":null,"attempts":1,"timestamp":1704700001300}
//! ```

pub mod runner;

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use guardian_app::{AlertState, EngineEvent};

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// The SOS alert changed state
    AlertState {
        state: String,
        latitude: Option<f64>,
        longitude: Option<f64>,
        location_error: Option<String>,
        timestamp: i64,
    },

    /// SOS text delivery outcome for one contact
    Delivery {
        contact_id: String,
        contact_name: String,
        delivered: bool,
        error: Option<String>,
        attempts: u32,
        timestamp: i64,
    },

    /// Every recipient has a delivery outcome
    FanOutCompleted {
        delivered: usize,
        failed: usize,
        timestamp: i64,
    },

    /// The sharing session changed phase
    SharingState { phase: String, timestamp: i64 },

    /// A fresh position for the sharing session
    Position {
        latitude: f64,
        longitude: f64,
        maps_link: String,
        timestamp: i64,
    },

    /// A periodic location sample failed
    SampleFailed { reason: String, timestamp: i64 },

    /// Remaining sharing time
    Countdown {
        remaining_secs: Option<u64>,
        display: String,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// Engine shut down
    Shutdown { timestamp: i64 },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn alert_state(state: &AlertState) -> Self {
        let (latitude, longitude, location_error) = match state {
            AlertState::Active {
                position,
                location_error,
            } => (
                position.as_ref().map(|p| p.latitude),
                position.as_ref().map(|p| p.longitude),
                location_error.clone(),
            ),
            _ => (None, None, None),
        };

        Self::AlertState {
            state: state.label().to_string(),
            latitude,
            longitude,
            location_error,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    /// Headless rendition of an engine event
    pub fn from_engine_event(event: &EngineEvent) -> Self {
        let timestamp = Self::now();
        match event {
            EngineEvent::AlertStateChanged { new, .. } => Self::alert_state(new),
            EngineEvent::AlertDelivery { report } => Self::Delivery {
                contact_id: report.contact_id.to_string(),
                contact_name: report.contact_name.clone(),
                delivered: report.is_delivered(),
                error: report.error().map(|e| e.to_string()),
                attempts: report.attempts,
                timestamp,
            },
            EngineEvent::AlertFanOutCompleted { delivered, failed } => Self::FanOutCompleted {
                delivered: *delivered,
                failed: *failed,
                timestamp,
            },
            EngineEvent::SharingStateChanged { new, .. } => Self::SharingState {
                phase: new.label().to_string(),
                timestamp,
            },
            EngineEvent::PositionUpdated { position } => Self::Position {
                latitude: position.latitude,
                longitude: position.longitude,
                maps_link: position.maps_link(),
                timestamp,
            },
            EngineEvent::SampleFailed { reason } => Self::SampleFailed {
                reason: reason.clone(),
                timestamp,
            },
            EngineEvent::SharingCountdown {
                remaining_secs,
                display,
            } => Self::Countdown {
                remaining_secs: *remaining_secs,
                display: display.clone(),
                timestamp,
            },
            EngineEvent::Shutdown => Self::Shutdown { timestamp },
        }
    }
}
