//! Configuration types for Guardian Angel
//!
//! Defines `Settings` and one sub-struct per `config.toml` section. Every
//! field has a serde default so a partial file is always valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global settings, read from `.guardian/config.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub alert: AlertSettings,

    #[serde(default)]
    pub sharing: SharingSettings,

    #[serde(default)]
    pub location: LocationSettings,

    #[serde(default)]
    pub contacts: ContactsSettings,
}

/// SOS alert settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertSettings {
    /// Upper bound on the location request made at activation
    #[serde(default = "default_location_timeout_ms")]
    pub location_timeout_ms: u64,

    /// Extra send attempts per contact after a failed delivery (0 = none)
    #[serde(default)]
    pub max_delivery_retries: u32,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            location_timeout_ms: default_location_timeout_ms(),
            max_delivery_retries: 0,
        }
    }
}

impl AlertSettings {
    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }
}

fn default_location_timeout_ms() -> u64 {
    5000
}

/// Live location sharing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SharingSettings {
    /// Seconds between periodic position samples
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Countdown refresh interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Duration preselected when a session is configured (0 = indefinite)
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: u32,

    /// Durations offered to the user, in minutes (0 = indefinite)
    #[serde(default = "default_duration_options")]
    pub duration_options: Vec<u32>,

    /// Send recipients a notice when sharing starts
    #[serde(default = "default_true")]
    pub notify_recipients: bool,
}

impl Default for SharingSettings {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            default_duration_minutes: default_duration_minutes(),
            duration_options: default_duration_options(),
            notify_recipients: true,
        }
    }
}

impl SharingSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn default_sample_interval_secs() -> u64 {
    30
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_duration_minutes() -> u32 {
    30
}

fn default_duration_options() -> Vec<u32> {
    vec![15, 30, 60, 120, 0]
}

fn default_true() -> bool {
    true
}

/// Fixed coordinates for hosts without a location provider
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocationSettings {
    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,
}

impl LocationSettings {
    /// Both coordinates, if configured
    pub fn coords(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Contact store settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactsSettings {
    /// Contact store file, relative to the `.guardian` directory
    #[serde(default = "default_store_file")]
    pub store_file: String,
}

impl Default for ContactsSettings {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
        }
    }
}

fn default_store_file() -> String {
    "contacts.json".to_string()
}
