//! Live location sharing session
//!
//! Lifecycle: `Idle -> Configuring -> Active -> {Expired | Stopped}`. A
//! terminal state stays visible until the next `configure`, which starts a
//! fresh instance.
//!
//! Remaining time is always derived from the absolute `end_time`, never from
//! a count of ticks, so a stalled host catches up on the first tick after it
//! resumes.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use guardian_core::prelude::*;
use guardian_core::{Contact, ContactId, Position, SessionKind};
use guardian_services::{ContactDirectory, LocationError, TimerToken};

use super::Epoch;

/// Observable state of the sharing session
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SharingState {
    #[default]
    Idle,

    /// Contacts and duration chosen, not yet started
    Configuring {
        selected_contacts: BTreeSet<ContactId>,
        duration_minutes: u32,
    },

    /// Broadcasting; `end_time` is `None` for an indefinite session
    Active {
        end_time: Option<Instant>,
        last_position: Option<Position>,
        recipients: Vec<Contact>,
    },

    Expired,

    Stopped,
}

impl SharingState {
    pub fn phase(&self) -> SharingPhase {
        match self {
            SharingState::Idle => SharingPhase::Idle,
            SharingState::Configuring { .. } => SharingPhase::Configuring,
            SharingState::Active { .. } => SharingPhase::Active,
            SharingState::Expired => SharingPhase::Expired,
            SharingState::Stopped => SharingPhase::Stopped,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SharingState::Active { .. })
    }

    pub fn last_position(&self) -> Option<&Position> {
        match self {
            SharingState::Active { last_position, .. } => last_position.as_ref(),
            _ => None,
        }
    }
}

/// Data-free discriminant of [`SharingState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingPhase {
    Idle,
    Configuring,
    Active,
    Expired,
    Stopped,
}

impl SharingPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SharingPhase::Idle => "idle",
            SharingPhase::Configuring => "configuring",
            SharingPhase::Active => "active",
            SharingPhase::Expired => "expired",
            SharingPhase::Stopped => "stopped",
        }
    }
}

/// What a countdown tick did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick from an older session; ignored
    Stale,
    /// Still running; `None` remaining means indefinite
    Running { remaining: Option<Duration> },
    /// The deadline has passed and the session expired on this tick
    Expired,
}

/// A single live location sharing session
#[derive(Debug, Default)]
pub struct SharingSession {
    state: SharingState,
    epoch: Epoch,
    duration_minutes: u32,
    remaining: Option<Duration>,
    sample_error: Option<String>,
    failed_samples: u32,
    timers: Vec<TimerToken>,
    tasks: Vec<JoinHandle<()>>,
}

impl SharingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SharingState {
        &self.state
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Duration chosen at configuration (0 = indefinite)
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Remaining time as of the last tick (`None` when indefinite or not active)
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// Reason of the most recent failed sample, cleared by a good one
    pub fn sample_error(&self) -> Option<&str> {
        self.sample_error.as_deref()
    }

    /// Number of failed samples in the current session
    pub fn failed_samples(&self) -> u32 {
        self.failed_samples
    }

    pub fn recipients(&self) -> &[Contact] {
        match &self.state {
            SharingState::Active { recipients, .. } => recipients,
            _ => &[],
        }
    }

    pub fn end_time(&self) -> Option<Instant> {
        match &self.state {
            SharingState::Active { end_time, .. } => *end_time,
            _ => None,
        }
    }

    /// Remaining time at `now`, computed from the absolute end time
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.end_time().map(|end| end.saturating_duration_since(now))
    }

    /// Countdown text at `now`, or `None` when not sharing
    pub fn countdown_text(&self, now: Instant) -> Option<String> {
        self.is_active().then(|| format_countdown(self.remaining_at(now)))
    }

    /// Choose recipients and a duration (0 = indefinite).
    ///
    /// Resets a finished session. Fails with `AlreadyActive` while sharing
    /// and with `NoContacts` on an empty selection.
    pub fn configure<I>(&mut self, contacts: I, duration_minutes: u32) -> Result<()>
    where
        I: IntoIterator<Item = ContactId>,
    {
        if self.is_active() {
            return Err(Error::already_active(SessionKind::Sharing));
        }

        let selected_contacts: BTreeSet<ContactId> = contacts.into_iter().collect();
        if selected_contacts.is_empty() {
            return Err(Error::NoContacts);
        }

        self.duration_minutes = duration_minutes;
        self.remaining = None;
        self.sample_error = None;
        self.failed_samples = 0;
        self.state = SharingState::Configuring {
            selected_contacts,
            duration_minutes,
        };
        Ok(())
    }

    /// Start sharing with the configured selection.
    ///
    /// The selection is resolved against a snapshot of `directory`, keeping
    /// directory order. Unknown IDs are skipped; if none resolve the result
    /// is `NoContacts` and the session stays `Configuring`.
    pub fn start(&mut self, directory: &dyn ContactDirectory, now: Instant) -> Result<Epoch> {
        let (selected, duration_minutes) = match &self.state {
            SharingState::Active { .. } => {
                return Err(Error::already_active(SessionKind::Sharing))
            }
            SharingState::Configuring {
                selected_contacts,
                duration_minutes,
            } => (selected_contacts, *duration_minutes),
            _ => return Err(Error::NoContacts),
        };

        let recipients = resolve_selection(selected, directory);
        if recipients.is_empty() {
            return Err(Error::NoContacts);
        }

        Ok(self.go_active(recipients, duration_minutes, now))
    }

    /// Configure and start in one step.
    ///
    /// Same checks as [`configure`](Self::configure) followed by
    /// [`start`](Self::start), but a rejected call leaves the session exactly
    /// as it was, including a visible terminal state.
    pub fn begin<I>(
        &mut self,
        contacts: I,
        duration_minutes: u32,
        directory: &dyn ContactDirectory,
        now: Instant,
    ) -> Result<Epoch>
    where
        I: IntoIterator<Item = ContactId>,
    {
        if self.is_active() {
            return Err(Error::already_active(SessionKind::Sharing));
        }

        let selected: BTreeSet<ContactId> = contacts.into_iter().collect();
        let recipients = resolve_selection(&selected, directory);
        if recipients.is_empty() {
            return Err(Error::NoContacts);
        }

        Ok(self.go_active(recipients, duration_minutes, now))
    }

    fn go_active(
        &mut self,
        recipients: Vec<Contact>,
        duration_minutes: u32,
        now: Instant,
    ) -> Epoch {
        let end_time = (duration_minutes > 0)
            .then(|| now + Duration::from_secs(u64::from(duration_minutes) * 60));

        self.cancel_background();
        self.epoch += 1;
        self.duration_minutes = duration_minutes;
        self.remaining = end_time.map(|end| end - now);
        self.sample_error = None;
        self.failed_samples = 0;
        self.state = SharingState::Active {
            end_time,
            last_position: None,
            recipients,
        };

        info!(
            "Sharing started (epoch {}) for {} contact(s), {}",
            self.epoch,
            self.recipients().len(),
            guardian_core::describe_duration(duration_minutes)
        );
        self.epoch
    }

    /// Track a timer of the current session; tokens of older sessions are
    /// cancelled immediately.
    pub fn attach_timer(&mut self, epoch: Epoch, token: TimerToken) {
        if epoch != self.epoch || !self.is_active() {
            token.cancel();
            return;
        }
        self.timers.push(token);
    }

    /// Track a one-off background task of the current session
    pub fn attach_task(&mut self, epoch: Epoch, task: JoinHandle<()>) {
        if epoch != self.epoch || !self.is_active() {
            task.abort();
            return;
        }
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }

    /// Recompute the countdown at `now`, expiring the session if the
    /// deadline has passed.
    pub fn tick(&mut self, epoch: Epoch, now: Instant) -> TickOutcome {
        if epoch != self.epoch || !self.is_active() {
            debug!("Dropping stale tick (epoch {}, current {})", epoch, self.epoch);
            return TickOutcome::Stale;
        }

        match self.end_time() {
            Some(end) if now >= end => {
                self.expire(epoch);
                TickOutcome::Expired
            }
            Some(end) => {
                let remaining = end - now;
                self.remaining = Some(remaining);
                TickOutcome::Running {
                    remaining: Some(remaining),
                }
            }
            None => TickOutcome::Running { remaining: None },
        }
    }

    /// Move an active session to `Expired`. Returns `false` if stale.
    pub fn expire(&mut self, epoch: Epoch) -> bool {
        if epoch != self.epoch || !self.is_active() {
            debug!("Dropping stale expiry (epoch {}, current {})", epoch, self.epoch);
            return false;
        }

        self.cancel_background();
        self.epoch += 1;
        self.remaining = Some(Duration::ZERO);
        self.state = SharingState::Expired;
        info!("Sharing expired");
        true
    }

    /// Apply a position sample. Returns `false` if stale.
    pub fn record_sample(
        &mut self,
        epoch: Epoch,
        result: std::result::Result<Position, LocationError>,
    ) -> bool {
        if epoch != self.epoch {
            debug!("Dropping stale sample (epoch {}, current {})", epoch, self.epoch);
            return false;
        }
        let SharingState::Active { last_position, .. } = &mut self.state else {
            debug!("Dropping sample outside an active session");
            return false;
        };

        match result {
            Ok(position) => {
                debug!("Shared position {}", position.display_coords());
                *last_position = Some(position);
                self.sample_error = None;
            }
            Err(e) => {
                warn!("Location sample failed: {}", e);
                self.sample_error = Some(e.to_string());
                self.failed_samples += 1;
            }
        }
        true
    }

    /// Stop sharing.
    ///
    /// Active sessions move to `Stopped`; an unstarted configuration is
    /// discarded. Returns `false` when there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        match self.state {
            SharingState::Active { .. } => {
                self.cancel_background();
                self.epoch += 1;
                self.remaining = None;
                self.sample_error = None;
                self.state = SharingState::Stopped;
                info!("Sharing stopped");
                true
            }
            SharingState::Configuring { .. } => {
                self.state = SharingState::Idle;
                true
            }
            _ => false,
        }
    }

    fn cancel_background(&mut self) {
        for token in self.timers.drain(..) {
            token.cancel();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SharingSession {
    fn drop(&mut self) {
        self.cancel_background();
    }
}

/// Contacts of `directory` whose id is in `selected`, in directory order
fn resolve_selection(
    selected: &BTreeSet<ContactId>,
    directory: &dyn ContactDirectory,
) -> Vec<Contact> {
    let recipients: Vec<Contact> = directory
        .list()
        .into_iter()
        .filter(|c| selected.contains(&c.id))
        .collect();

    if recipients.len() < selected.len() {
        warn!(
            "{} selected contact(s) no longer in the directory",
            selected.len() - recipients.len()
        );
    }
    recipients
}

/// Format a countdown as `MM:SS`, or `H:MM:SS` from one hour up.
///
/// `None` means the session has no end time.
pub fn format_countdown(remaining: Option<Duration>) -> String {
    let Some(remaining) = remaining else {
        return "Sharing indefinitely".to_string();
    };

    let total = remaining.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_services::test_utils::test_contact;
    use guardian_services::ContactBook;

    fn directory() -> ContactBook {
        ContactBook::from_contacts(vec![
            test_contact("a", "Alice"),
            test_contact("b", "Bob"),
            test_contact("c", "Carol"),
        ])
    }

    fn ids(list: &[&str]) -> Vec<ContactId> {
        list.iter().map(|id| ContactId::from(*id)).collect()
    }

    fn started(minutes: u32) -> (SharingSession, Instant, Epoch) {
        let mut sharing = SharingSession::new();
        sharing.configure(ids(&["a", "b"]), minutes).unwrap();
        let now = Instant::now();
        let epoch = sharing.start(&directory(), now).unwrap();
        (sharing, now, epoch)
    }

    #[test]
    fn test_configure_requires_contacts() {
        let mut sharing = SharingSession::new();
        assert!(matches!(sharing.configure(vec![], 30), Err(Error::NoContacts)));
        assert_eq!(sharing.state(), &SharingState::Idle);
    }

    #[test]
    fn test_start_resolves_in_directory_order() {
        let mut sharing = SharingSession::new();
        sharing.configure(ids(&["c", "a"]), 30).unwrap();
        sharing.start(&directory(), Instant::now()).unwrap();

        let names: Vec<_> = sharing.recipients().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Carol"]);
    }

    #[test]
    fn test_start_sets_end_time() {
        let (sharing, now, _) = started(30);
        assert_eq!(sharing.end_time(), Some(now + Duration::from_secs(1800)));
        assert_eq!(sharing.remaining(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_indefinite_has_no_end_time() {
        let (mut sharing, now, epoch) = started(0);
        assert_eq!(sharing.end_time(), None);
        assert_eq!(
            sharing.tick(epoch, now + Duration::from_secs(86_400)),
            TickOutcome::Running { remaining: None }
        );
        assert!(sharing.is_active());
    }

    #[test]
    fn test_start_with_unknown_contacts() {
        let mut sharing = SharingSession::new();
        sharing.configure(ids(&["ghost"]), 15).unwrap();

        assert!(matches!(
            sharing.start(&directory(), Instant::now()),
            Err(Error::NoContacts)
        ));
        assert_eq!(sharing.state().phase(), SharingPhase::Configuring);
    }

    #[test]
    fn test_begin_with_unknown_contacts_changes_nothing() {
        let mut sharing = SharingSession::new();

        assert!(matches!(
            sharing.begin(ids(&["ghost"]), 15, &directory(), Instant::now()),
            Err(Error::NoContacts)
        ));
        assert_eq!(sharing.state(), &SharingState::Idle);
        assert_eq!(sharing.epoch(), 0);
    }

    #[test]
    fn test_rejected_begin_keeps_terminal_state() {
        let (mut sharing, _, _) = started(30);
        sharing.stop();
        let epoch = sharing.epoch();

        assert!(matches!(
            sharing.begin(ids(&["ghost"]), 15, &directory(), Instant::now()),
            Err(Error::NoContacts)
        ));
        assert!(matches!(
            sharing.begin(Vec::new(), 15, &directory(), Instant::now()),
            Err(Error::NoContacts)
        ));
        assert_eq!(sharing.state(), &SharingState::Stopped);
        assert_eq!(sharing.epoch(), epoch);
    }

    #[test]
    fn test_begin_starts_in_directory_order() {
        let mut sharing = SharingSession::new();
        let now = Instant::now();

        let epoch = sharing
            .begin(ids(&["c", "ghost", "b"]), 60, &directory(), now)
            .unwrap();

        assert_eq!(epoch, 1);
        assert_eq!(sharing.duration_minutes(), 60);
        assert_eq!(sharing.end_time(), Some(now + Duration::from_secs(3600)));
        let names: Vec<_> = sharing.recipients().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Carol"]);
    }

    #[test]
    fn test_begin_while_active_is_rejected() {
        let (mut sharing, now, epoch) = started(30);
        assert!(matches!(
            sharing.begin(ids(&["ghost"]), 15, &directory(), now),
            Err(Error::AlreadyActive { .. })
        ));
        assert_eq!(sharing.epoch(), epoch);
    }

    #[test]
    fn test_start_without_configuration() {
        let mut sharing = SharingSession::new();
        assert!(matches!(
            sharing.start(&directory(), Instant::now()),
            Err(Error::NoContacts)
        ));
    }

    #[test]
    fn test_configure_while_active_is_rejected() {
        let (mut sharing, now, _) = started(30);
        assert!(matches!(
            sharing.configure(ids(&["c"]), 15),
            Err(Error::AlreadyActive { .. })
        ));
        assert!(matches!(
            sharing.start(&directory(), now),
            Err(Error::AlreadyActive { .. })
        ));
    }

    #[test]
    fn test_tick_recomputes_from_end_time() {
        let (mut sharing, now, epoch) = started(30);

        let outcome = sharing.tick(epoch, now + Duration::from_secs(61));
        assert_eq!(
            outcome,
            TickOutcome::Running {
                remaining: Some(Duration::from_secs(1739))
            }
        );

        // A long stall lands straight on expiry.
        assert_eq!(
            sharing.tick(epoch, now + Duration::from_secs(3600)),
            TickOutcome::Expired
        );
        assert_eq!(sharing.state(), &SharingState::Expired);
    }

    #[test]
    fn test_expire_is_single_shot() {
        let (mut sharing, _, epoch) = started(15);
        assert!(sharing.expire(epoch));
        assert!(!sharing.expire(epoch));
        assert_eq!(sharing.tick(epoch, Instant::now()), TickOutcome::Stale);
    }

    #[test]
    fn test_sample_updates_position_and_clears_error() {
        let (mut sharing, _, epoch) = started(30);

        assert!(sharing.record_sample(epoch, Err(LocationError::Unsupported)));
        assert!(sharing.sample_error().is_some());
        assert_eq!(sharing.failed_samples(), 1);
        assert!(sharing.is_active());

        assert!(sharing.record_sample(epoch, Ok(Position::new(3.0, 4.0))));
        assert!(sharing.sample_error().is_none());
        assert_eq!(sharing.state().last_position().unwrap().latitude, 3.0);
    }

    #[test]
    fn test_stale_sample_after_stop_is_rejected() {
        let (mut sharing, _, epoch) = started(30);
        assert!(sharing.stop());

        assert!(!sharing.record_sample(epoch, Ok(Position::new(1.0, 2.0))));
        assert_eq!(sharing.state(), &SharingState::Stopped);
        assert!(sharing.state().last_position().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut sharing, _, _) = started(30);
        assert!(sharing.stop());
        let epoch = sharing.epoch();
        assert!(!sharing.stop());
        assert_eq!(sharing.epoch(), epoch);
    }

    #[test]
    fn test_stop_discards_configuration() {
        let mut sharing = SharingSession::new();
        sharing.configure(ids(&["a"]), 30).unwrap();
        assert!(sharing.stop());
        assert_eq!(sharing.state(), &SharingState::Idle);
    }

    #[test]
    fn test_reconfigure_after_expiry() {
        let (mut sharing, _, epoch) = started(15);
        sharing.expire(epoch);

        sharing.configure(ids(&["b"]), 60).unwrap();
        assert_eq!(sharing.state().phase(), SharingPhase::Configuring);
        assert_eq!(sharing.duration_minutes(), 60);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(None), "Sharing indefinitely");
        assert_eq!(format_countdown(Some(Duration::from_secs(1800))), "30:00");
        assert_eq!(format_countdown(Some(Duration::from_secs(65))), "01:05");
        assert_eq!(format_countdown(Some(Duration::from_millis(900))), "00:00");
        assert_eq!(format_countdown(Some(Duration::from_secs(7200))), "2:00:00");
        assert_eq!(format_countdown(Some(Duration::from_secs(3725))), "1:02:05");
    }
}
