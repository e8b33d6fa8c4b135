use bnote_core::carousel::{Direction, advance};
use bnote_core::classify::{ReminderPolicy, Tier, classify};
use bnote_core::group::regroup;
use bnote_core::note::{NoteDraft, NotePatch};
use bnote_core::store::{LocalStore, NoteStore, ScratchStore};
use chrono::{Duration, Utc};
use tempfile::tempdir;

#[test]
fn store_roundtrip_and_reminder_lifecycle() {
    let temp = tempdir().expect("tempdir");
    let mut store = LocalStore::open(temp.path()).expect("open local store");

    let now = Utc::now();
    let mut draft = NoteDraft::new("Water the plants");
    draft.color = "#c8e6c9".to_string();
    draft.reminder = Some(now + Duration::minutes(5));

    let created = store.create(&draft).expect("create note");
    assert_eq!(created.id, Some(1));
    assert_eq!(created.color, "#c8e6c9");

    // Five minutes out: critical under the default policy.
    let policy = ReminderPolicy::default();
    assert_eq!(classify(&created, now, &policy), Tier::Critical);

    // Seventy minutes past the reminder, the 60-minute aging bound silences
    // it even though the reminder is still set.
    let much_later = now + Duration::minutes(75);
    assert_eq!(classify(&created, much_later, &policy), Tier::None);

    // Marking it done clears the reminder for good.
    let resolved = store
        .update(1, &NotePatch::resolve_reminder())
        .expect("resolve reminder");
    assert_eq!(resolved.reminder, None);
    assert_eq!(resolved.reschedules, 0);

    let listed = store.list().expect("list notes");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].reminder, None);
}

#[test]
fn decks_partition_and_wrap() {
    let temp = tempdir().expect("tempdir");
    let mut store = LocalStore::open(temp.path()).expect("open local store");

    for (title, color) in [
        ("one", "#fff9c4"),
        ("two", "#fff9c4"),
        ("three", "#bbdefb"),
    ] {
        let mut draft = NoteDraft::new(title);
        draft.color = color.to_string();
        store.create(&draft).expect("create note");
    }

    let notes = store.list().expect("list notes");
    let decks = regroup(&notes, "", &[]);
    assert_eq!(decks.len(), 2);

    let mut sizes: Vec<usize> = decks.iter().map(|deck| deck.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2]);
    assert!(decks.iter().all(|deck| deck.active_index == 0));

    // Wrap a three-card deck all the way around.
    let all_yellow = regroup(&notes[..2], "", &[]);
    let mut deck = all_yellow.into_iter().next().expect("yellow deck");
    deck.notes.push(notes[0].clone());
    assert_eq!(deck.len(), 3);

    advance(&mut deck, Direction::Forward);
    assert_eq!(deck.active_index, 1);
    advance(&mut deck, Direction::Forward);
    assert_eq!(deck.active_index, 2);
    advance(&mut deck, Direction::Forward);
    assert_eq!(deck.active_index, 0);
}

#[test]
fn scratch_state_survives_reopen() {
    let temp = tempdir().expect("tempdir");
    let snoozed = "2026-03-01T12:00:00Z".parse().expect("timestamp");

    {
        let mut store = LocalStore::open(temp.path()).expect("open local store");
        store.save_scratchpad("meeting at nine").expect("save scratchpad");
        store.save_snoozed_at(Some(snoozed)).expect("save snooze");
    }

    let store = LocalStore::open(temp.path()).expect("reopen local store");
    let scratch = store.load_scratch().expect("load scratch");
    assert_eq!(scratch.scratchpad, "meeting at nine");
    assert_eq!(scratch.snoozed_at, Some(snoozed));
}
