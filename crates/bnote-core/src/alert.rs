use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// Read-only view of the "at least one critical note exists" signal. Cheap
/// to clone; a header badge can hold one without any way to write it back.
#[derive(Debug, Clone)]
pub struct BellHandle(Rc<Cell<bool>>);

impl BellHandle {
    pub fn is_ringing(&self) -> bool {
        self.0.get()
    }
}

/// Outcome of one evaluation pass, so callers can tell a fresh interruption
/// apart from the steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Opened,
    Unchanged,
    Cleared,
}

/// Session-scoped alert state: which notes are critical right now, whether
/// the interrupting modal is up, and when the user last snoozed.
///
/// Snoozing is global for the session (one timestamp, not per note) and only
/// suppresses the interruption; the critical set itself is replaced wholesale
/// on every evaluation tick and is never shrunk by a snooze.
#[derive(Debug)]
pub struct AlertSession {
    critical: BTreeSet<u64>,
    modal_open: bool,
    snoozed_at: Option<DateTime<Utc>>,
    snooze_window: Duration,
    bell: Rc<Cell<bool>>,
}

impl AlertSession {
    /// `snoozed_at` is restored from scratch state at startup so a snooze
    /// survives a view reload within its window.
    pub fn new(snooze_minutes: i64, snoozed_at: Option<DateTime<Utc>>) -> Self {
        Self {
            critical: BTreeSet::new(),
            modal_open: false,
            snoozed_at,
            snooze_window: Duration::minutes(snooze_minutes),
            bell: Rc::new(Cell::new(false)),
        }
    }

    pub fn bell_handle(&self) -> BellHandle {
        BellHandle(Rc::clone(&self.bell))
    }

    pub fn modal_open(&self) -> bool {
        self.modal_open
    }

    pub fn critical_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.critical.iter().copied()
    }

    pub fn is_critical(&self, id: u64) -> bool {
        self.critical.contains(&id)
    }

    /// Replaces the critical set with the latest classification result and
    /// decides whether to interrupt. Re-evaluating an unchanged non-empty set
    /// while the modal is up is a no-op, so the modal never flickers or
    /// double-opens across ticks.
    pub fn evaluate(&mut self, critical: impl IntoIterator<Item = u64>, now: DateTime<Utc>) -> Evaluation {
        self.critical = critical.into_iter().collect();
        self.bell.set(!self.critical.is_empty());

        if self.critical.is_empty() {
            if self.modal_open {
                debug!("critical set emptied; closing modal");
                self.modal_open = false;
            }
            return Evaluation::Cleared;
        }

        if self.modal_open || !self.snooze_elapsed(now) {
            return Evaluation::Unchanged;
        }

        info!(critical = self.critical.len(), "opening reminder modal");
        self.modal_open = true;
        Evaluation::Opened
    }

    /// Bell click: force the modal open regardless of the snooze window, as
    /// long as there is something to show.
    pub fn force_open(&mut self) -> bool {
        if self.critical.is_empty() {
            return false;
        }
        self.modal_open = true;
        true
    }

    /// Records the snooze instant and closes the modal. Reminders are not
    /// touched. Returns the timestamp so the caller can persist it.
    pub fn snooze(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        info!(%now, "snoozing reminder alerts");
        self.snoozed_at = Some(now);
        self.modal_open = false;
        now
    }

    /// Drops one note from the critical set after its reminder was resolved
    /// or the note deleted. Closes the modal once nothing is left.
    pub fn resolve(&mut self, id: u64) {
        self.critical.remove(&id);
        if self.critical.is_empty() {
            self.modal_open = false;
            self.bell.set(false);
        }
    }

    fn snooze_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.snoozed_at {
            Some(snoozed_at) => now - snoozed_at >= self.snooze_window,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{AlertSession, Evaluation};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn modal_opens_once_and_stays_idempotent_across_ticks() {
        let mut session = AlertSession::new(5, None);
        let bell = session.bell_handle();

        assert_eq!(session.evaluate([1, 2], t0()), Evaluation::Opened);
        assert!(session.modal_open());
        assert!(bell.is_ringing());

        // Same set, next tick: no re-open, no flicker.
        assert_eq!(session.evaluate([1, 2], t0() + Duration::seconds(30)), Evaluation::Unchanged);
        assert!(session.modal_open());

        // Still non-empty but different: modal already up, still no re-open.
        assert_eq!(session.evaluate([2], t0() + Duration::seconds(60)), Evaluation::Unchanged);
        assert!(session.modal_open());
    }

    #[test]
    fn empty_set_clears_modal_and_bell() {
        let mut session = AlertSession::new(5, None);
        let bell = session.bell_handle();

        session.evaluate([1], t0());
        assert!(bell.is_ringing());

        assert_eq!(session.evaluate([], t0() + Duration::seconds(30)), Evaluation::Cleared);
        assert!(!session.modal_open());
        assert!(!bell.is_ringing());
    }

    #[test]
    fn snooze_suppresses_within_the_window_only() {
        let mut session = AlertSession::new(5, None);
        session.evaluate([1], t0());
        session.snooze(t0());
        assert!(!session.modal_open());

        // Four minutes later the snooze still holds, and the note is still
        // tracked as critical.
        let later = t0() + Duration::minutes(4);
        assert_eq!(session.evaluate([1], later), Evaluation::Unchanged);
        assert!(!session.modal_open());
        assert!(session.is_critical(1));

        // Past the five-minute window it rings again.
        let past = t0() + Duration::minutes(5);
        assert_eq!(session.evaluate([1], past), Evaluation::Opened);
        assert!(session.modal_open());
    }

    #[test]
    fn restored_snooze_timestamp_applies_at_startup() {
        let mut session = AlertSession::new(5, Some(t0() - Duration::minutes(2)));
        assert_eq!(session.evaluate([1], t0()), Evaluation::Unchanged);
        assert!(!session.modal_open());

        let mut expired = AlertSession::new(5, Some(t0() - Duration::minutes(10)));
        assert_eq!(expired.evaluate([1], t0()), Evaluation::Opened);
    }

    #[test]
    fn force_open_ignores_the_snooze_window() {
        let mut session = AlertSession::new(5, None);
        session.evaluate([1], t0());
        session.snooze(t0());

        assert!(session.force_open());
        assert!(session.modal_open());

        // Nothing critical: the bell click does nothing.
        let mut idle = AlertSession::new(5, None);
        assert!(!idle.force_open());
    }

    #[test]
    fn resolve_closes_the_modal_only_when_the_set_empties() {
        let mut session = AlertSession::new(5, None);
        let bell = session.bell_handle();
        session.evaluate([1, 2], t0());

        session.resolve(1);
        assert!(session.modal_open());
        assert!(bell.is_ringing());

        session.resolve(2);
        assert!(!session.modal_open());
        assert!(!bell.is_ringing());
    }
}
