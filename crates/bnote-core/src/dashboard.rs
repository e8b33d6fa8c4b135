use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::alert::{AlertSession, BellHandle, Evaluation};
use crate::carousel::{WheelFilter, WheelOutcome};
use crate::classify::{self, ReminderPolicy};
use crate::config::Config;
use crate::group::{self, Deck};
use crate::note::{Note, NoteDraft, NotePatch, normalize_color};
use crate::store::{Clock, NoteStore, ScratchStore, StoreError};

/// Dashboard tunables, usually read from config.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub tick_seconds: i64,
    pub debounce_ms: i64,
    pub snooze_minutes: i64,
    pub max_editors: usize,
    pub policy: ReminderPolicy,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            tick_seconds: 30,
            debounce_ms: 150,
            snooze_minutes: 5,
            max_editors: 4,
            policy: ReminderPolicy::default(),
        }
    }
}

impl Tuning {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        Self {
            tick_seconds: cfg.get_i64_or("tick.seconds", defaults.tick_seconds),
            debounce_ms: cfg.get_i64_or("wheel.debounce.ms", defaults.debounce_ms),
            snooze_minutes: cfg.get_i64_or("alert.snooze.minutes", defaults.snooze_minutes),
            max_editors: cfg.get_i64_or("editors.max", defaults.max_editors as i64).max(1) as usize,
            policy: cfg.reminder_policy(),
        }
    }
}

#[derive(Debug)]
struct Ticker {
    period: Duration,
    next_due: DateTime<Utc>,
}

/// Owns the note collection, the deck list, and the alert session, and is
/// the only writer to any of them. All work happens on the caller's thread:
/// the classification "timer" is poll-based, user actions are plain method
/// calls, and store boundaries are the only fallible seams.
pub struct Dashboard<S, C>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    store: S,
    clock: C,
    tuning: Tuning,
    notes: Vec<Note>,
    decks: Vec<Deck>,
    search: String,
    session: AlertSession,
    wheel: WheelFilter,
    editors: Vec<Note>,
    scratchpad: String,
    notices: Vec<String>,
    ticker: Option<Ticker>,
}

impl<S, C> Dashboard<S, C>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    /// Loads scratch state, pulls the initial note set, runs one
    /// classification pass, and starts the ticker.
    pub fn new(store: S, clock: C, tuning: Tuning) -> Self {
        let scratch = match store.load_scratch() {
            Ok(scratch) => scratch,
            Err(err) => {
                warn!(error = %err, "failed to load scratch state; starting empty");
                Default::default()
            }
        };

        let now = clock.now();
        let mut dashboard = Self {
            session: AlertSession::new(tuning.snooze_minutes, scratch.snoozed_at),
            wheel: WheelFilter::new(tuning.debounce_ms),
            ticker: Some(Ticker {
                period: Duration::seconds(tuning.tick_seconds),
                next_due: now + Duration::seconds(tuning.tick_seconds),
            }),
            store,
            clock,
            tuning,
            notes: vec![],
            decks: vec![],
            search: String::new(),
            editors: vec![],
            scratchpad: scratch.scratchpad,
            notices: vec![],
        };

        dashboard.reload();
        dashboard.tick(now);
        dashboard
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// The coordinator's time source, so callers rendering or parsing
    /// against `now` agree with classification.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    pub fn editors(&self) -> &[Note] {
        &self.editors
    }

    /// Mutable access to one open editor, for inline title/body/reminder
    /// edits. Nothing here is classified or grouped until it is saved.
    pub fn editor_mut(&mut self, index: usize) -> Option<&mut Note> {
        self.editors.get_mut(index)
    }

    pub fn session(&self) -> &AlertSession {
        &self.session
    }

    pub fn bell_handle(&self) -> BellHandle {
        self.session.bell_handle()
    }

    pub fn scratchpad(&self) -> &str {
        &self.scratchpad
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Drains queued transient notices (toasts) for the caller to display.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// The critical notes the modal presents, ordered by id.
    pub fn modal_notes(&self) -> Vec<&Note> {
        self.session
            .critical_ids()
            .filter_map(|id| self.notes.iter().find(|note| note.id == Some(id)))
            .collect()
    }

    pub fn urgent_notes(&self) -> Vec<&Note> {
        classify::urgent_notes(&self.notes, self.clock.now(), &self.tuning.policy)
    }

    pub fn overdue_notes(&self) -> Vec<&Note> {
        classify::overdue_notes(&self.notes, self.clock.now())
    }

    /// Replaces the note set from the store. A transport failure keeps the
    /// previous set; classification and grouping keep working on stale data
    /// until the next successful pass.
    #[tracing::instrument(skip(self))]
    pub fn reload(&mut self) {
        match self.store.list() {
            Ok(mut notes) => {
                for note in &mut notes {
                    note.color = normalize_color(&note.color).to_string();
                    note.collapsed = false;
                    note.date_editing = false;
                }
                debug!(count = notes.len(), "reloaded notes");
                self.notes = notes;
                self.regroup();
            }
            Err(err) => {
                warn!(error = %err, "note reload failed; keeping stale set");
            }
        }
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
        self.regroup();
    }

    fn regroup(&mut self) {
        self.decks = group::regroup(&self.notes, &self.search, &self.decks);
    }

    /// Fires the periodic classification pass when the tick period has
    /// elapsed. Returns whether a pass ran. After `close` this is inert.
    pub fn poll(&mut self) -> bool {
        let now = self.clock.now();
        let due = match &mut self.ticker {
            Some(ticker) if now >= ticker.next_due => {
                ticker.next_due = now + ticker.period;
                true
            }
            _ => false,
        };

        if due {
            self.tick(now);
        }
        due
    }

    /// Cancels the ticker. Safe to call more than once; only the first call
    /// does anything.
    pub fn close(&mut self) {
        if self.ticker.take().is_some() {
            debug!("dashboard ticker cancelled");
        }
    }

    fn tick(&mut self, now: DateTime<Utc>) -> Evaluation {
        let critical = classify::critical_ids(&self.notes, now, &self.tuning.policy);
        self.session.evaluate(critical, now)
    }

    fn refresh(&mut self) {
        self.reload();
        let now = self.clock.now();
        self.tick(now);
    }

    fn notice(&mut self, message: impl Into<String>) {
        self.notices.push(message.into());
    }

    // --- editors -----------------------------------------------------------

    /// Opens a persisted note for editing. Rejected with a notice when the
    /// editor row is full; opening an already-open note is a no-op.
    pub fn open_note(&mut self, id: u64) -> bool {
        if self.editors.iter().any(|note| note.id == Some(id)) {
            return false;
        }
        if self.editors.len() >= self.tuning.max_editors {
            self.notice(format!("At most {} notes open at once.", self.tuning.max_editors));
            return false;
        }
        let Some(note) = self.notes.iter().find(|note| note.id == Some(id)) else {
            return false;
        };
        self.editors.push(note.clone());
        true
    }

    pub fn create_draft(&mut self) -> bool {
        if self.editors.len() >= self.tuning.max_editors {
            self.notice("Close a note to create a new one.");
            return false;
        }
        let now = self.clock.now();
        self.editors.push(Note {
            id: None,
            title: String::new(),
            body: String::new(),
            favorite: false,
            color: crate::note::default_color().to_string(),
            created: now,
            modified: now,
            reminder: None,
            reschedules: 0,
            collapsed: false,
            date_editing: false,
        });
        true
    }

    pub fn close_editor(&mut self, index: usize) {
        if index < self.editors.len() {
            self.editors.remove(index);
        }
    }

    /// Persists one open editor. Drafts go through `create`, persisted notes
    /// through `update`. Nothing local changes until the store confirms, so
    /// the classifier never sees unconfirmed reminder data.
    #[tracing::instrument(skip(self))]
    pub fn save_editor(&mut self, index: usize) -> bool {
        let Some(editor) = self.editors.get(index).cloned() else {
            return false;
        };

        if editor.title.trim().is_empty() {
            self.notice("Title is required.");
            return false;
        }

        let result = match editor.id {
            Some(id) => {
                // Moving an existing reminder to a new time counts as a
                // reschedule.
                let stored_reminder = self
                    .notes
                    .iter()
                    .find(|note| note.id == Some(id))
                    .and_then(|note| note.reminder);
                let reschedules = match (stored_reminder, editor.reminder) {
                    (Some(old), Some(new)) if old != new => editor.reschedules + 1,
                    _ => editor.reschedules,
                };

                let patch = NotePatch {
                    title: Some(editor.title.clone()),
                    body: Some(editor.body.clone()),
                    favorite: Some(editor.favorite),
                    color: Some(editor.color.clone()),
                    reminder: Some(editor.reminder),
                    reschedules: Some(reschedules),
                };
                self.store.update(id, &patch).map(|_| ())
            }
            None => {
                let draft = NoteDraft {
                    title: editor.title.clone(),
                    body: editor.body.clone(),
                    favorite: editor.favorite,
                    color: editor.color.clone(),
                    reminder: editor.reminder,
                };
                match self.store.create(&draft) {
                    Ok(created) => {
                        self.editors[index] = created;
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
        };

        match result {
            Ok(()) => {
                self.refresh();
                self.notice("Note saved.");
                true
            }
            Err(err) => {
                self.store_failure("save", err);
                false
            }
        }
    }

    /// Recolors a note locally (editor copy and collection copy) and
    /// regroups. Like every other field, the new color reaches the store on
    /// the next save.
    pub fn change_color(&mut self, id: Option<u64>, editor_index: usize, color: &str) {
        let color = normalize_color(color).to_string();
        if let Some(editor) = self.editors.get_mut(editor_index) {
            editor.color = color.clone();
        }
        if let Some(id) = id
            && let Some(note) = self.notes.iter_mut().find(|note| note.id == Some(id))
        {
            note.color = color;
            self.regroup();
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: u64) -> bool {
        match self.store.delete(id) {
            Ok(()) => {
                self.editors.retain(|note| note.id != Some(id));
                self.session.resolve(id);
                self.refresh();
                self.notice("Note deleted.");
                true
            }
            Err(err) => {
                self.store_failure("delete", err);
                false
            }
        }
    }

    pub fn toggle_deck(&mut self, color: &str) {
        if let Some(deck) = self.decks.iter_mut().find(|deck| deck.color == color) {
            deck.open = !deck.open;
        }
    }

    pub fn toggle_collapse(&mut self, id: u64) {
        if let Some(note) = self.notes.iter_mut().find(|note| note.id == Some(id)) {
            note.collapsed = !note.collapsed;
        }
    }

    pub fn toggle_date_editing(&mut self, id: u64) {
        if let Some(note) = self.notes.iter_mut().find(|note| note.id == Some(id)) {
            note.date_editing = !note.date_editing;
        }
    }

    /// Routes a raw wheel event to one deck through the debounce filter.
    pub fn wheel(&mut self, color: &str, delta: f64) -> WheelOutcome {
        let now = self.clock.now();
        match self.decks.iter_mut().find(|deck| deck.color == color) {
            Some(deck) => self.wheel.on_wheel(deck, delta, now),
            None => WheelOutcome::Dropped,
        }
    }

    // --- alert resolutions -------------------------------------------------

    /// Clears the note's reminder and reschedule counter through the store,
    /// then drops it from the critical set.
    #[tracing::instrument(skip(self))]
    pub fn mark_done(&mut self, id: u64) -> bool {
        match self.store.update(id, &NotePatch::resolve_reminder()) {
            Ok(_) => {
                self.session.resolve(id);
                self.refresh();
                self.notice("Reminder resolved.");
                true
            }
            Err(err) => {
                self.store_failure("resolve reminder", err);
                false
            }
        }
    }

    /// Global snooze: records the instant, persists it, closes the modal
    /// without touching any reminder. When `reopen` names a note, its inline
    /// date editor opens so the user can pick a new time right away.
    #[tracing::instrument(skip(self))]
    pub fn snooze(&mut self, reopen: Option<u64>) {
        let now = self.clock.now();
        let at = self.session.snooze(now);
        if let Err(err) = self.store.save_snoozed_at(Some(at)) {
            warn!(error = %err, "failed to persist snooze timestamp");
        }

        if let Some(id) = reopen
            && let Some(note) = self.notes.iter_mut().find(|note| note.id == Some(id))
        {
            note.date_editing = true;
        }
    }

    /// Deletes a critical note straight from the modal.
    #[tracing::instrument(skip(self))]
    pub fn delete_critical(&mut self, id: u64) -> bool {
        self.delete(id)
    }

    /// Bell click: open the modal even while the passive evaluator would
    /// have stayed silent.
    pub fn force_open_alerts(&mut self) -> bool {
        self.session.force_open()
    }

    // --- scratch state -----------------------------------------------------

    pub fn set_scratchpad(&mut self, text: &str) {
        self.scratchpad = text.to_string();
        if let Err(err) = self.store.save_scratchpad(text) {
            warn!(error = %err, "failed to persist scratchpad");
        }
    }

    fn store_failure(&mut self, action: &str, err: StoreError) {
        match err {
            StoreError::Validation(message) => self.notice(message),
            other => {
                info!(error = %other, action, "store call failed");
                self.notice(format!("Could not {action}: {other}"));
            }
        }
    }
}
