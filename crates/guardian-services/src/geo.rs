//! Location provider abstraction
//!
//! [`GeoSource`] wraps a platform location provider. The engine asks it for
//! one-shot samples, always through [`sample_within`] so that a provider that
//! never answers is reported as a timeout instead of blocking the session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use guardian_core::{Error, Position};

use crate::clock::{SessionClock, TimerToken};

/// Why a position sample could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Geolocation is not supported on this device")]
    Unsupported,

    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

impl LocationError {
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }
}

impl From<LocationError> for Error {
    fn from(err: LocationError) -> Self {
        Error::location_unavailable(err.to_string())
    }
}

/// Platform location provider
#[trait_variant::make(GeoSource: Send)]
pub trait LocalGeoSource {
    /// Request a single position sample
    async fn sample_once(&self) -> Result<Position, LocationError>;
}

/// Request one sample, treating anything slower than `timeout` as a failure
pub async fn sample_within<G>(geo: &G, timeout: Duration) -> Result<Position, LocationError>
where
    G: GeoSource + Sync,
{
    match tokio::time::timeout(timeout, GeoSource::sample_once(geo)).await {
        Ok(result) => result,
        Err(_) => {
            debug!("Location request exceeded {:?}", timeout);
            Err(LocationError::timeout(timeout))
        }
    }
}

/// Sample `geo` every `interval` until the returned token is cancelled.
///
/// Each tick runs one bounded request and hands the outcome, success or
/// failure, to `on_sample`. A slow request delays the next tick instead of
/// overlapping it, and cancelling the token drops a request in flight.
pub fn sample_every<G, F, Fut>(
    geo: Arc<G>,
    clock: &SessionClock,
    interval: Duration,
    timeout: Duration,
    on_sample: F,
) -> TimerToken
where
    G: GeoSource + Sync + 'static,
    F: Fn(Result<Position, LocationError>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let on_sample = Arc::new(on_sample);

    clock.every_async(interval, move || {
        let geo = geo.clone();
        let on_sample = on_sample.clone();
        async move {
            let result = sample_within(geo.as_ref(), timeout).await;
            on_sample(result).await;
        }
    })
}

/// A location provider pinned to configured coordinates.
///
/// Used where no hardware provider exists (desktop, CI). Without coordinates
/// it behaves like a platform without geolocation support.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedGeoSource {
    coords: Option<(f64, f64)>,
}

impl FixedGeoSource {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coords: Some((latitude, longitude)),
        }
    }

    pub fn unsupported() -> Self {
        Self { coords: None }
    }

    pub fn from_coords(coords: Option<(f64, f64)>) -> Self {
        Self { coords }
    }
}

impl GeoSource for FixedGeoSource {
    async fn sample_once(&self) -> Result<Position, LocationError> {
        match self.coords {
            Some((latitude, longitude)) => Ok(Position::new(latitude, longitude)),
            None => Err(LocationError::Unsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedGeoSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fixed_source_returns_coords() {
        let geo = FixedGeoSource::new(1.5, 2.5);
        let pos = GeoSource::sample_once(&geo).await.unwrap();
        assert_eq!(pos.latitude, 1.5);
        assert_eq!(pos.longitude, 2.5);
    }

    #[tokio::test]
    async fn test_fixed_source_without_coords_is_unsupported() {
        let geo = FixedGeoSource::unsupported();
        assert_eq!(
            GeoSource::sample_once(&geo).await,
            Err(LocationError::Unsupported)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_within_times_out_hanging_provider() {
        let geo = ScriptedGeoSource::hanging();
        let result = sample_within(&geo, Duration::from_secs(5)).await;
        assert_eq!(result, Err(LocationError::Timeout { after_ms: 5000 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_within_passes_fast_answer() {
        let geo = ScriptedGeoSource::fixed(10.0, 20.0).with_delay(Duration::from_secs(1));
        let pos = sample_within(&geo, Duration::from_secs(5)).await.unwrap();
        assert_eq!(pos.latitude, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_every_reports_each_tick() {
        let geo = Arc::new(ScriptedGeoSource::fixed(1.0, 1.0));
        let clock = SessionClock::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();

        let token = sample_every(
            geo.clone(),
            &clock,
            Duration::from_secs(30),
            Duration::from_secs(5),
            move |result| {
                let seen = seen_cb.clone();
                async move {
                    assert!(result.is_ok());
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(geo.calls(), 3);

        token.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_every_cancel_drops_in_flight_request() {
        let geo = Arc::new(
            ScriptedGeoSource::fixed(1.0, 1.0).with_delay(Duration::from_secs(4)),
        );
        let clock = SessionClock::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();

        let token = sample_every(
            geo.clone(),
            &clock,
            Duration::from_secs(30),
            Duration::from_secs(60),
            move |_| {
                let seen = seen_cb.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(geo.calls(), 1);

        token.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(geo.calls(), 1);
    }

    #[test]
    fn test_location_error_into_engine_error() {
        let err: Error = LocationError::PermissionDenied.into();
        assert!(matches!(err, Error::LocationUnavailable { .. }));
        assert!(err.to_string().contains("permission denied"));
    }
}
