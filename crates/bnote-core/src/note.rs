use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed color palette for note tags. Colors outside this set are folded to
/// the first entry before anything else looks at them.
pub const PALETTE: [&str; 13] = [
    "#fff9c4", "#ffcdd2", "#f8bbd0", "#e1bee7", "#d1c4e9", "#c5cae9", "#bbdefb", "#b3e5fc",
    "#b2dfdb", "#c8e6c9", "#f0f4c3", "#ffe0b2", "#f5f5f5",
];

pub fn default_color() -> &'static str {
    PALETTE[0]
}

/// Folds an arbitrary color value into the palette. Matching is
/// case-insensitive on the hex digits; anything unrecognized becomes the
/// palette default.
pub fn normalize_color(raw: &str) -> &'static str {
    let lowered = raw.trim().to_ascii_lowercase();
    PALETTE
        .iter()
        .copied()
        .find(|candidate| *candidate == lowered)
        .unwrap_or(PALETTE[0])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: Option<u64>,

    pub title: String,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub favorite: bool,

    #[serde(default = "owned_default_color")]
    pub color: String,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,

    /// When set, the alert engine classifies this note against the clock.
    /// Serializes as RFC 3339; absent or null means "no reminder".
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,

    /// How many times the reminder has been pushed to a new time.
    #[serde(default)]
    pub reschedules: u32,

    /// Display-only: card body folded away. Never persisted.
    #[serde(skip)]
    pub collapsed: bool,

    /// Display-only: inline reminder editor open. Never persisted.
    #[serde(skip)]
    pub date_editing: bool,
}

fn owned_default_color() -> String {
    default_color().to_string()
}

impl Note {
    /// Case-insensitive substring match against title or body.
    pub fn matches_search(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.body.to_lowercase().contains(&needle)
    }
}

/// The creatable subset of a note. Ids and timestamps are assigned by the
/// store on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub favorite: bool,

    #[serde(default = "owned_default_color")]
    pub color: String,

    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: String::new(),
            favorite: false,
            color: default_color().to_string(),
            reminder: None,
        }
    }
}

impl Default for NoteDraft {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Partial update for a persisted note. Every field is optional; the
/// reminder is a double option so that `Some(None)` clears it while a plain
/// `None` leaves it untouched on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(
        default,
        with = "reminder_patch_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub reminder: Option<Option<DateTime<Utc>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedules: Option<u32>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.favorite.is_none()
            && self.color.is_none()
            && self.reminder.is_none()
            && self.reschedules.is_none()
    }

    /// Patch that clears the reminder and resets the reschedule counter,
    /// used when a critical note is marked done.
    pub fn resolve_reminder() -> Self {
        Self {
            reminder: Some(None),
            reschedules: Some(0),
            ..Self::default()
        }
    }

    /// Applies this patch to a note in place. Colors fold into the palette
    /// and the modified stamp is the caller's job.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(body) = &self.body {
            note.body = body.clone();
        }
        if let Some(favorite) = self.favorite {
            note.favorite = favorite;
        }
        if let Some(color) = &self.color {
            note.color = normalize_color(color).to_string();
        }
        if let Some(reminder) = self.reminder {
            note.reminder = reminder;
        }
        if let Some(reschedules) = self.reschedules {
            note.reschedules = reschedules;
        }
    }
}

/// Serde for the double-option reminder field: present-and-null clears,
/// absent leaves unspecified. Mirrors how the value crosses the store
/// boundary as an ISO-8601 string or explicit null.
mod reminder_patch_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<DateTime<Utc>>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<DateTime<Utc>>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Note, NotePatch, default_color, normalize_color};

    fn note(title: &str, body: &str) -> Note {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Note {
            id: Some(1),
            title: title.to_string(),
            body: body.to_string(),
            favorite: false,
            color: default_color().to_string(),
            created: now,
            modified: now,
            reminder: None,
            reschedules: 0,
            collapsed: false,
            date_editing: false,
        }
    }

    #[test]
    fn unknown_colors_fold_to_palette_default() {
        assert_eq!(normalize_color("#bbdefb"), "#bbdefb");
        assert_eq!(normalize_color("  #BBDEFB "), "#bbdefb");
        assert_eq!(normalize_color("rebeccapurple"), default_color());
        assert_eq!(normalize_color(""), default_color());
    }

    #[test]
    fn search_matches_title_or_body_case_insensitive() {
        let n = note("Groceries", "Buy OAT milk");
        assert!(n.matches_search("grocer"));
        assert!(n.matches_search("oat"));
        assert!(n.matches_search(""));
        assert!(!n.matches_search("dentist"));
    }

    #[test]
    fn patch_reminder_null_clears_absent_leaves() {
        let clearing: NotePatch = serde_json::from_str(r#"{"reminder": null}"#).unwrap();
        assert_eq!(clearing.reminder, Some(None));

        let silent: NotePatch = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(silent.reminder, None);

        let when = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let setting: NotePatch =
            serde_json::from_str(r#"{"reminder": "2026-03-01T12:00:00Z"}"#).unwrap();
        assert_eq!(setting.reminder, Some(Some(when)));
    }

    #[test]
    fn patch_apply_clears_reminder_and_counter() {
        let mut n = note("a", "b");
        n.reminder = Some(Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap());
        n.reschedules = 3;

        NotePatch::resolve_reminder().apply_to(&mut n);
        assert_eq!(n.reminder, None);
        assert_eq!(n.reschedules, 0);
    }

    #[test]
    fn reminder_round_trips_as_rfc3339() {
        let mut n = note("a", "b");
        n.reminder = Some(Utc.with_ymd_and_hms(2026, 3, 1, 13, 30, 0).unwrap());

        let raw = serde_json::to_string(&n).unwrap();
        assert!(raw.contains("2026-03-01T13:30:00Z"));

        let back: Note = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.reminder, n.reminder);
        assert!(!back.collapsed);
    }
}
