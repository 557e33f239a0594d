//! Session clock - cancellable one-shot and repeating timers
//!
//! The only timing primitive the session engine depends on. Timers run on the
//! tokio timer wheel, so tests drive them deterministically with
//! `#[tokio::test(start_paused = true)]` and `tokio::time::advance`.
//!
//! **Cancellation guarantee:** every callback runs while holding the token's
//! phase lock, and `cancel()` takes the same lock. Once `cancel()` has
//! returned, the callback never starts again. Cancelling a one-shot timer
//! that already fired is a no-op.
//!
//! **Drift:** ticks are best-effort. Missed ticks (e.g. the host was
//! suspended) are skipped rather than replayed in a burst, so consumers must
//! recompute remaining time from an absolute deadline instead of counting
//! ticks.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Smallest repeating interval accepted by [`SessionClock::every`]
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPhase {
    Armed,
    Fired,
    Cancelled,
}

#[derive(Debug)]
struct TimerShared {
    phase: Mutex<TimerPhase>,
    fires: AtomicU64,
}

impl TimerShared {
    fn new() -> Self {
        Self {
            phase: Mutex::new(TimerPhase::Armed),
            fires: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a scheduled timer.
///
/// Dropping the token cancels the timer, so a session that forgets a token
/// cannot leave an orphaned timer behind.
#[derive(Debug)]
pub struct TimerToken {
    shared: Arc<TimerShared>,
    task: JoinHandle<()>,
}

impl TimerToken {
    /// Cancel the timer.
    ///
    /// Returns `true` if this call disarmed a pending timer, `false` if it had
    /// already fired (one-shot) or been cancelled.
    pub fn cancel(&self) -> bool {
        let disarmed = {
            let mut phase = self.shared.lock();
            if *phase == TimerPhase::Armed {
                *phase = TimerPhase::Cancelled;
                true
            } else {
                false
            }
        };
        self.task.abort();
        disarmed
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shared.lock() == TimerPhase::Cancelled
    }

    /// Number of times the callback has run
    pub fn fire_count(&self) -> u64 {
        self.shared.fires.load(Ordering::SeqCst)
    }

    pub fn has_fired(&self) -> bool {
        self.fire_count() > 0
    }
}

impl Drop for TimerToken {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Cancellable countdown/interval primitive.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionClock;

impl SessionClock {
    pub fn new() -> Self {
        Self
    }

    /// Current monotonic time (honours tokio's paused test clock)
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Schedule `callback` to run once after `delay`.
    pub fn after<F>(&self, delay: Duration, callback: F) -> TimerToken
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let shared = Arc::new(TimerShared::new());
        let task_shared = shared.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let mut phase = task_shared.lock();
            if *phase != TimerPhase::Armed {
                return;
            }
            *phase = TimerPhase::Fired;
            task_shared.fires.fetch_add(1, Ordering::SeqCst);
            callback();
        });

        TimerToken { shared, task }
    }

    /// Schedule `callback` to run every `interval`, starting one interval
    /// from now.
    pub fn every<F>(&self, interval: Duration, mut callback: F) -> TimerToken
    where
        F: FnMut() + Send + 'static,
    {
        let interval = interval.max(MIN_TICK_INTERVAL);
        let first_tick = Instant::now() + interval;
        let shared = Arc::new(TimerShared::new());
        let task_shared = shared.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                {
                    let phase = task_shared.lock();
                    if *phase != TimerPhase::Armed {
                        break;
                    }
                    task_shared.fires.fetch_add(1, Ordering::SeqCst);
                    callback();
                }
            }
        });

        TimerToken { shared, task }
    }

    /// Like [`every`](Self::every), but awaits the future `callback` returns
    /// before waiting for the next tick.
    ///
    /// Runs never overlap. Cancelling the token also drops a run that is
    /// still in flight.
    pub fn every_async<F, Fut>(&self, interval: Duration, mut callback: F) -> TimerToken
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let interval = interval.max(MIN_TICK_INTERVAL);
        let first_tick = Instant::now() + interval;
        let shared = Arc::new(TimerShared::new());
        let task_shared = shared.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let run = {
                    let phase = task_shared.lock();
                    if *phase != TimerPhase::Armed {
                        break;
                    }
                    task_shared.fires.fetch_add(1, Ordering::SeqCst);
                    callback()
                };
                run.await;
            }
        });

        TimerToken { shared, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (c.clone(), c)
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_fires_once_at_deadline() {
        let clock = SessionClock::new();
        let (count, seen) = counter();

        let token = clock.after(Duration::from_secs(10), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(token.has_fired());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_cancelled_never_fires() {
        let clock = SessionClock::new();
        let (count, seen) = counter();

        let token = clock.after(Duration::from_secs(5), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(token.cancel());
        assert!(token.is_cancelled());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(!token.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let clock = SessionClock::new();
        let token = clock.after(Duration::from_millis(100), || {});

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(token.has_fired());

        assert!(!token.cancel());
        assert!(!token.is_cancelled());
        assert_eq!(token.fire_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_repeats_until_cancelled() {
        let clock = SessionClock::new();
        let (count, seen) = counter();

        let token = clock.every(Duration::from_secs(1), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        // First tick is one interval out, not immediate.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        assert!(token.cancel());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(token.fire_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_cancel_is_idempotent() {
        let clock = SessionClock::new();
        let token = clock.every(Duration::from_secs(1), || {});

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let clock = SessionClock::new();
        let (count, seen) = counter();

        {
            let _token = clock.every(Duration::from_secs(1), move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_async_cancel_drops_in_flight_run() {
        let clock = SessionClock::new();
        let (started, seen_started) = counter();
        let (finished, seen_finished) = counter();

        let token = clock.every_async(Duration::from_secs(1), move || {
            let started = started.clone();
            let finished = finished.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(seen_started.load(Ordering::SeqCst), 1);

        assert!(token.cancel());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(seen_started.load(Ordering::SeqCst), 1);
        assert_eq!(seen_finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_async_runs_do_not_overlap() {
        let clock = SessionClock::new();
        let (count, seen) = counter();

        let _token = clock.every_async(Duration::from_secs(1), move || {
            let count = count.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Each run starts only after the previous one finished (3.5 s, 6 s).
        tokio::time::sleep(Duration::from_millis(7500)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let clock = SessionClock::new();
        let token = clock.every(Duration::ZERO, || {});

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(token.has_fired());
        token.cancel();
    }
}
