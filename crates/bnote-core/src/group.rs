use std::collections::BTreeMap;

use tracing::debug;

use crate::note::{Note, normalize_color};

/// One color bucket of notes, displayed as a stack with a single active
/// card. Decks are derived state: rebuilt on every note or search change,
/// never persisted.
#[derive(Debug, Clone)]
pub struct Deck {
    pub color: String,
    pub notes: Vec<Note>,
    pub active_index: usize,
    pub open: bool,
    pub fav_count: usize,
}

impl Deck {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The card currently on top of the stack.
    pub fn active(&self) -> Option<&Note> {
        self.notes.get(self.active_index)
    }
}

/// Rebuilds the deck list from scratch: filter by the search term, partition
/// by normalized color, then carry open/active state forward from the
/// previous decks by color key. Buckets left empty by the filter are not
/// materialized, and a carried active index that no longer fits resets to 0.
///
/// Decks come out ordered by color key, so the on-screen order is stable
/// across recomputations.
pub fn regroup(all_notes: &[Note], search_term: &str, previous: &[Deck]) -> Vec<Deck> {
    let mut buckets: BTreeMap<&str, Vec<Note>> = BTreeMap::new();
    for note in all_notes {
        if !note.matches_search(search_term) {
            continue;
        }
        buckets
            .entry(normalize_color(&note.color))
            .or_default()
            .push(note.clone());
    }

    let decks: Vec<Deck> = buckets
        .into_iter()
        .map(|(color, notes)| {
            let carried = previous.iter().find(|deck| deck.color == color);
            let active_index = carried
                .map(|deck| deck.active_index)
                .filter(|idx| *idx < notes.len())
                .unwrap_or(0);
            let fav_count = notes.iter().filter(|note| note.favorite).count();

            Deck {
                color: color.to_string(),
                notes,
                active_index,
                open: carried.map(|deck| deck.open).unwrap_or(true),
                fav_count,
            }
        })
        .collect();

    debug!(
        notes = all_notes.len(),
        decks = decks.len(),
        search = search_term,
        "regrouped notes"
    );
    decks
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Deck, regroup};
    use crate::note::Note;

    fn note(id: u64, title: &str, body: &str, color: &str) -> Note {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Note {
            id: Some(id),
            title: title.to_string(),
            body: body.to_string(),
            favorite: false,
            color: color.to_string(),
            created: now,
            modified: now,
            reminder: None,
            reschedules: 0,
            collapsed: false,
            date_editing: false,
        }
    }

    #[test]
    fn partition_is_a_disjoint_cover() {
        let notes = vec![
            note(1, "a", "", "#fff9c4"),
            note(2, "b", "", "#fff9c4"),
            note(3, "c", "", "#bbdefb"),
        ];

        let decks = regroup(&notes, "", &[]);
        assert_eq!(decks.len(), 2);

        let sizes: Vec<usize> = decks.iter().map(Deck::len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), notes.len());
        assert_eq!(sizes, vec![1, 2]); // "#bbdefb" sorts before "#fff9c4"

        for deck in &decks {
            assert_eq!(deck.active_index, 0);
            assert!(deck.open);
            for n in &deck.notes {
                assert_eq!(n.color, deck.color);
            }
        }
    }

    #[test]
    fn unrecognized_colors_fold_into_the_default_deck() {
        let notes = vec![note(1, "a", "", "chartreuse"), note(2, "b", "", "#fff9c4")];
        let decks = regroup(&notes, "", &[]);
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].color, "#fff9c4");
        assert_eq!(decks[0].len(), 2);
    }

    #[test]
    fn search_filters_on_title_or_body_and_drops_empty_decks() {
        let notes = vec![
            note(1, "Groceries", "milk and eggs", "#fff9c4"),
            note(2, "Dentist", "friday 9am", "#fff9c4"),
            note(3, "Milk recall", "", "#bbdefb"),
        ];

        let decks = regroup(&notes, "milk", &[]);
        assert_eq!(decks.len(), 2);
        assert_eq!(decks[0].len(), 1);
        assert_eq!(decks[1].len(), 1);

        let decks = regroup(&notes, "friday", &[]);
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].color, "#fff9c4");
    }

    #[test]
    fn open_and_active_state_carry_forward_by_color() {
        let notes = vec![
            note(1, "a", "", "#fff9c4"),
            note(2, "b", "", "#fff9c4"),
            note(3, "c", "", "#fff9c4"),
            note(4, "d", "", "#bbdefb"),
        ];

        let mut decks = regroup(&notes, "", &[]);
        let yellow = decks.iter_mut().find(|d| d.color == "#fff9c4").unwrap();
        yellow.active_index = 2;
        yellow.open = false;

        let decks = regroup(&notes, "", &decks);
        let yellow = decks.iter().find(|d| d.color == "#fff9c4").unwrap();
        assert_eq!(yellow.active_index, 2);
        assert!(!yellow.open);

        // Shrink the bucket below the carried index: it resets to 0.
        let fewer: Vec<Note> = notes.iter().take(2).cloned().collect();
        let shrunk = regroup(&fewer, "", &decks);
        let yellow = shrunk.iter().find(|d| d.color == "#fff9c4").unwrap();
        assert_eq!(yellow.len(), 2);
        assert_eq!(yellow.active_index, 0);
    }

    #[test]
    fn fav_count_tracks_the_bucket() {
        let mut notes = vec![
            note(1, "a", "", "#fff9c4"),
            note(2, "b", "", "#fff9c4"),
            note(3, "c", "", "#bbdefb"),
        ];
        notes[0].favorite = true;
        notes[1].favorite = true;

        let decks = regroup(&notes, "", &[]);
        let yellow = decks.iter().find(|d| d.color == "#fff9c4").unwrap();
        assert_eq!(yellow.fav_count, 2);
        let blue = decks.iter().find(|d| d.color == "#bbdefb").unwrap();
        assert_eq!(blue.fav_count, 0);
    }
}
