use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::note::{Note, NoteDraft, NotePatch, normalize_color};

/// The two failure classes a store call can surface. Transport failures are
/// recoverable: callers keep whatever in-memory state they already hold.
/// Validation failures never leave the process.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport failure: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("note not found: {0}")]
    NotFound(u64),
}

impl StoreError {
    fn transport(err: impl Into<anyhow::Error>) -> Self {
        Self::Transport(err.into())
    }
}

/// The note backend contract. The dashboard only ever talks to notes
/// through these four calls.
pub trait NoteStore {
    fn list(&self) -> Result<Vec<Note>, StoreError>;
    fn create(&mut self, draft: &NoteDraft) -> Result<Note, StoreError>;
    fn update(&mut self, id: u64, patch: &NotePatch) -> Result<Note, StoreError>;
    fn delete(&mut self, id: u64) -> Result<(), StoreError>;
}

/// Wall-clock source with millisecond resolution. Tests substitute a manual
/// clock; everything downstream of the coordinator takes `now` as a plain
/// argument.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Scratch state lives beside the notes but outside the collection: the
/// free-text scratchpad and the last snooze instant. Read once at startup,
/// written on change.
#[derive(Debug, Clone, Default)]
pub struct ScratchState {
    pub scratchpad: String,
    pub snoozed_at: Option<DateTime<Utc>>,
}

pub trait ScratchStore {
    fn load_scratch(&self) -> Result<ScratchState, StoreError>;
    fn save_scratchpad(&mut self, text: &str) -> Result<(), StoreError>;
    fn save_snoozed_at(&mut self, at: Option<DateTime<Utc>>) -> Result<(), StoreError>;
}

/// File-backed implementation of the store contracts: one JSONL file for
/// notes, two sidecar files for scratch state. Writes go through a temp file
/// and an atomic rename.
#[derive(Debug)]
pub struct LocalStore {
    pub data_dir: PathBuf,
    notes_path: PathBuf,
    scratchpad_path: PathBuf,
    snooze_path: PathBuf,
}

impl LocalStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let notes_path = data_dir.join("notes.data");
        let scratchpad_path = data_dir.join("scratchpad.data");
        let snooze_path = data_dir.join("snooze.data");

        for path in [&notes_path, &scratchpad_path, &snooze_path] {
            if !path.exists() {
                fs::write(path, "")?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            notes = %notes_path.display(),
            "opened local store"
        );

        Ok(Self {
            data_dir,
            notes_path,
            scratchpad_path,
            snooze_path,
        })
    }

    fn load_notes(&self) -> Result<Vec<Note>, StoreError> {
        load_jsonl(&self.notes_path).map_err(StoreError::transport)
    }

    fn save_notes(&self, notes: &[Note]) -> Result<(), StoreError> {
        save_jsonl_atomic(&self.notes_path, notes).map_err(StoreError::transport)
    }

    fn next_id(notes: &[Note]) -> u64 {
        notes.iter().filter_map(|note| note.id).max().unwrap_or(0) + 1
    }
}

impl NoteStore for LocalStore {
    #[tracing::instrument(skip(self))]
    fn list(&self) -> Result<Vec<Note>, StoreError> {
        self.load_notes()
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    fn create(&mut self, draft: &NoteDraft) -> Result<Note, StoreError> {
        if draft.title.trim().is_empty() {
            return Err(StoreError::Validation("title is required".to_string()));
        }

        let mut notes = self.load_notes()?;
        let now = Utc::now();
        let note = Note {
            id: Some(Self::next_id(&notes)),
            title: draft.title.clone(),
            body: draft.body.clone(),
            favorite: draft.favorite,
            color: normalize_color(&draft.color).to_string(),
            created: now,
            modified: now,
            reminder: draft.reminder,
            reschedules: 0,
            collapsed: false,
            date_editing: false,
        };

        notes.push(note.clone());
        self.save_notes(&notes)?;
        debug!(id = ?note.id, "created note");
        Ok(note)
    }

    #[tracing::instrument(skip(self, patch))]
    fn update(&mut self, id: u64, patch: &NotePatch) -> Result<Note, StoreError> {
        if let Some(title) = &patch.title
            && title.trim().is_empty()
        {
            return Err(StoreError::Validation("title is required".to_string()));
        }

        let mut notes = self.load_notes()?;
        let note = notes
            .iter_mut()
            .find(|note| note.id == Some(id))
            .ok_or(StoreError::NotFound(id))?;

        patch.apply_to(note);
        note.modified = Utc::now();
        let updated = note.clone();

        self.save_notes(&notes)?;
        debug!(id, "updated note");
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    fn delete(&mut self, id: u64) -> Result<(), StoreError> {
        let mut notes = self.load_notes()?;
        let before = notes.len();
        notes.retain(|note| note.id != Some(id));
        if notes.len() == before {
            return Err(StoreError::NotFound(id));
        }

        self.save_notes(&notes)?;
        debug!(id, "deleted note");
        Ok(())
    }
}

impl ScratchStore for LocalStore {
    #[tracing::instrument(skip(self))]
    fn load_scratch(&self) -> Result<ScratchState, StoreError> {
        let scratchpad = fs::read_to_string(&self.scratchpad_path).map_err(StoreError::transport)?;

        let raw = fs::read_to_string(&self.snooze_path).map_err(StoreError::transport)?;
        let trimmed = raw.trim();
        let snoozed_at = if trimmed.is_empty() {
            None
        } else {
            Some(
                trimmed
                    .parse::<DateTime<Utc>>()
                    .map_err(StoreError::transport)?,
            )
        };

        Ok(ScratchState {
            scratchpad,
            snoozed_at,
        })
    }

    #[tracing::instrument(skip(self, text))]
    fn save_scratchpad(&mut self, text: &str) -> Result<(), StoreError> {
        fs::write(&self.scratchpad_path, text).map_err(StoreError::transport)
    }

    #[tracing::instrument(skip(self))]
    fn save_snoozed_at(&mut self, at: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        let payload = at.map(|at| at.to_rfc3339()).unwrap_or_default();
        fs::write(&self.snooze_path, payload).map_err(StoreError::transport)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Note>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let note: Note = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(note);
    }

    debug!(count = out.len(), "loaded notes from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, notes))]
fn save_jsonl_atomic(path: &Path, notes: &[Note]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = notes.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for note in notes {
        let serialized = serde_json::to_string(note)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow::anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
