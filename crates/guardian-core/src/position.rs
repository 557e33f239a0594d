//! Geographic position samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base URL used for shareable map links
pub const MAPS_BASE_URL: &str = "https://www.google.com/maps";

/// A single position sample produced by a location provider.
///
/// Transient: the engine keeps the latest one in memory and never persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Utc::now())
    }

    pub fn at(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Shareable map link pointing at this position
    pub fn maps_link(&self) -> String {
        format!("{}?q={},{}", MAPS_BASE_URL, self.latitude, self.longitude)
    }

    /// Human-readable coordinates with 5 decimals (about 1 m precision)
    pub fn display_coords(&self) -> String {
        format!("{:.5}, {:.5}", self.latitude, self.longitude)
    }
}
