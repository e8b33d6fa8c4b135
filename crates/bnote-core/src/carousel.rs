use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::group::Deck;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Moves a deck's active card one step with wrap-around. Single-card and
/// empty decks stay put. An index found out of range (the deck mutated
/// underneath us) is reset to 0 before the step applies.
pub fn advance(deck: &mut Deck, direction: Direction) {
    let count = deck.len();
    if count <= 1 {
        return;
    }
    if deck.active_index >= count {
        deck.active_index = 0;
    }

    deck.active_index = match direction {
        Direction::Forward => (deck.active_index + 1) % count,
        Direction::Backward => (deck.active_index + count - 1) % count,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelOutcome {
    Advanced(Direction),
    Dropped,
}

/// Turns continuous wheel input into discrete carousel steps.
///
/// Events inside the debounce window are dropped outright, not queued.
/// Positive deltas step forward, negative backward, zero is ignored. The
/// caller must consume the raw event either way so the gesture never reaches
/// the native scroll handler.
#[derive(Debug)]
pub struct WheelFilter {
    min_interval: Duration,
    last_accepted: Option<DateTime<Utc>>,
}

impl WheelFilter {
    pub fn new(min_interval_ms: i64) -> Self {
        Self {
            min_interval: Duration::milliseconds(min_interval_ms),
            last_accepted: None,
        }
    }

    pub fn on_wheel(&mut self, deck: &mut Deck, delta: f64, now: DateTime<Utc>) -> WheelOutcome {
        if delta == 0.0 {
            return WheelOutcome::Dropped;
        }

        if let Some(last) = self.last_accepted
            && now - last < self.min_interval
        {
            trace!(color = %deck.color, "wheel event inside debounce window");
            return WheelOutcome::Dropped;
        }

        self.last_accepted = Some(now);
        let direction = if delta > 0.0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        advance(deck, direction);
        WheelOutcome::Advanced(direction)
    }
}
