use chrono::{DateTime, Utc};

use crate::note::Note;

/// Urgency of a single note relative to the clock.
///
/// `Critical` and `Overdue` are the interrupt-worthy tiers: a reminder less
/// than ten minutes away, or past due by less than the aging bound. Reminders
/// overdue beyond the aging bound drop back to `None` so an abandoned note
/// stops ringing; the passive display lists below ignore that bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    None,
    Urgent,
    Overdue,
    Critical,
}

impl Tier {
    /// Whether this tier belongs in the alert session's critical set.
    pub fn interrupts(self) -> bool {
        matches!(self, Tier::Critical | Tier::Overdue)
    }
}

/// Knobs for the classification windows, all in minutes except the urgent
/// horizon. Defaults follow the shipped behavior: interrupt inside
/// `-60 < diff < 10`, passive-urgent inside 24 hours.
#[derive(Debug, Clone, Copy)]
pub struct ReminderPolicy {
    pub critical_minutes: i64,
    pub aging_minutes: i64,
    pub urgent_hours: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            critical_minutes: 10,
            aging_minutes: 60,
            urgent_hours: 24,
        }
    }
}

/// Pure classification of one note against the clock. No reminder means no
/// tier, regardless of the time.
pub fn classify(note: &Note, now: DateTime<Utc>, policy: &ReminderPolicy) -> Tier {
    let Some(reminder) = note.reminder else {
        return Tier::None;
    };

    let diff_ms = (reminder - now).num_milliseconds();
    let critical_ms = policy.critical_minutes * 60_000;
    let aging_ms = policy.aging_minutes * 60_000;
    let urgent_ms = policy.urgent_hours * 3_600_000;

    if (0..critical_ms).contains(&diff_ms) {
        Tier::Critical
    } else if diff_ms < 0 && diff_ms > -aging_ms {
        Tier::Overdue
    } else if (critical_ms..urgent_ms).contains(&diff_ms) {
        Tier::Urgent
    } else {
        Tier::None
    }
}

/// Ids of every note whose tier warrants interrupting the user right now.
pub fn critical_ids(notes: &[Note], now: DateTime<Utc>, policy: &ReminderPolicy) -> Vec<u64> {
    notes
        .iter()
        .filter(|note| classify(note, now, policy).interrupts())
        .filter_map(|note| note.id)
        .collect()
}

/// Passive list: future reminders inside the urgent horizon. Shown in the
/// sidebar, never opens the modal.
pub fn urgent_notes<'a>(
    notes: &'a [Note],
    now: DateTime<Utc>,
    policy: &ReminderPolicy,
) -> Vec<&'a Note> {
    let horizon_ms = policy.urgent_hours * 3_600_000;
    notes
        .iter()
        .filter(|note| {
            note.reminder
                .map(|reminder| {
                    let diff_ms = (reminder - now).num_milliseconds();
                    (0..horizon_ms).contains(&diff_ms)
                })
                .unwrap_or(false)
        })
        .collect()
}

/// Passive list: every past-due reminder, including ones the aging bound has
/// silenced.
pub fn overdue_notes<'a>(notes: &'a [Note], now: DateTime<Utc>) -> Vec<&'a Note> {
    notes
        .iter()
        .filter(|note| note.reminder.map(|reminder| reminder < now).unwrap_or(false))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{ReminderPolicy, Tier, classify, critical_ids, overdue_notes, urgent_notes};
    use crate::note::{Note, default_color};

    fn note_with_reminder(id: u64, reminder: Option<chrono::DateTime<Utc>>) -> Note {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        Note {
            id: Some(id),
            title: format!("note {id}"),
            body: String::new(),
            favorite: false,
            color: default_color().to_string(),
            created,
            modified: created,
            reminder,
            reschedules: 0,
            collapsed: false,
            date_editing: false,
        }
    }

    #[test]
    fn no_reminder_is_never_classified() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let policy = ReminderPolicy::default();
        let note = note_with_reminder(1, None);

        for offset_hours in [-48, -1, 0, 1, 48] {
            let at = now + Duration::hours(offset_hours);
            assert_eq!(classify(&note, at, &policy), Tier::None);
        }
    }

    #[test]
    fn window_boundaries() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let policy = ReminderPolicy::default();
        let at = |minutes: i64| note_with_reminder(1, Some(now + Duration::minutes(minutes)));

        assert_eq!(classify(&at(0), now, &policy), Tier::Critical);
        assert_eq!(classify(&at(9), now, &policy), Tier::Critical);
        assert_eq!(classify(&at(10), now, &policy), Tier::Urgent);
        assert_eq!(classify(&at(-1), now, &policy), Tier::Overdue);
        assert_eq!(classify(&at(-59), now, &policy), Tier::Overdue);
        // Exactly at the aging bound the note is already silenced.
        assert_eq!(classify(&at(-60), now, &policy), Tier::None);
        assert_eq!(classify(&at(-61), now, &policy), Tier::None);
        assert_eq!(classify(&at(23 * 60), now, &policy), Tier::Urgent);
        assert_eq!(classify(&at(24 * 60), now, &policy), Tier::None);
    }

    #[test]
    fn aged_out_note_leaves_critical_but_stays_overdue() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let policy = ReminderPolicy::default();
        let note = note_with_reminder(7, Some(now + Duration::minutes(5)));

        assert_eq!(classify(&note, now, &policy), Tier::Critical);
        assert_eq!(critical_ids(std::slice::from_ref(&note), now, &policy), vec![7]);

        // 70 minutes past the reminder: silenced by the aging bound even
        // though the reminder is still set.
        let later = now + Duration::minutes(75);
        assert_eq!(classify(&note, later, &policy), Tier::None);
        assert!(critical_ids(std::slice::from_ref(&note), later, &policy).is_empty());
        assert_eq!(overdue_notes(std::slice::from_ref(&note), later).len(), 1);
    }

    #[test]
    fn passive_lists_are_independent_of_the_modal_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let policy = ReminderPolicy::default();
        let notes = vec![
            note_with_reminder(1, Some(now + Duration::minutes(5))),
            note_with_reminder(2, Some(now + Duration::hours(3))),
            note_with_reminder(3, Some(now + Duration::hours(30))),
            note_with_reminder(4, Some(now - Duration::hours(2))),
            note_with_reminder(5, None),
        ];

        let urgent: Vec<u64> = urgent_notes(&notes, now, &policy)
            .iter()
            .filter_map(|n| n.id)
            .collect();
        assert_eq!(urgent, vec![1, 2]);

        let overdue: Vec<u64> = overdue_notes(&notes, now).iter().filter_map(|n| n.id).collect();
        assert_eq!(overdue, vec![4]);

        assert_eq!(critical_ids(&notes, now, &policy), vec![1]);
    }
}
