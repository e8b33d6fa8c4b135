use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::classify::{ReminderPolicy, Tier, classify};
use crate::config::Config;
use crate::group::Deck;
use crate::note::Note;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// One row per deck: color key, size, favorites, and the active card.
    #[tracing::instrument(skip(self, decks))]
    pub fn print_deck_table(&mut self, decks: &[Deck]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "Color".to_string(),
            "Notes".to_string(),
            "Fav".to_string(),
            "Active".to_string(),
            "".to_string(),
        ];

        let mut rows = Vec::with_capacity(decks.len());
        for deck in decks {
            let active = deck
                .active()
                .map(|note| note.title.clone())
                .unwrap_or_default();
            let position = if deck.len() > 1 {
                format!("({}/{})", deck.active_index + 1, deck.len())
            } else {
                String::new()
            };

            rows.push(vec![
                self.paint(&deck.color, "36"),
                deck.len().to_string(),
                deck.fav_count.to_string(),
                active,
                position,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Flat note table, reminders painted red once past due.
    #[tracing::instrument(skip(self, notes, now))]
    pub fn print_note_table(&mut self, notes: &[Note], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Reminder".to_string(),
            "Color".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::with_capacity(notes.len());
        for note in notes {
            let id = note
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());

            let reminder = note
                .reminder
                .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let reminder = match note.reminder {
                Some(at) if at < now => self.paint(&reminder, "31"),
                _ => reminder,
            };

            rows.push(vec![
                self.paint(&id, "33"),
                reminder,
                note.color.clone(),
                note.title.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, note))]
    pub fn print_note_info(&mut self, note: &Note) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(
            out,
            "id          {}",
            note.id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "title       {}", note.title)?;
        writeln!(out, "color       {}", note.color)?;
        writeln!(out, "favorite    {}", note.favorite)?;
        writeln!(out, "created     {}", note.created.to_rfc3339())?;
        writeln!(out, "modified    {}", note.modified.to_rfc3339())?;
        if let Some(reminder) = note.reminder {
            writeln!(out, "reminder    {}", reminder.to_rfc3339())?;
            writeln!(out, "reschedules {}", note.reschedules)?;
        }
        if !note.body.is_empty() {
            writeln!(out, "\n{}", note.body)?;
        }

        Ok(())
    }

    /// The alert digest: critical notes first, then the passive urgent and
    /// overdue lists.
    #[tracing::instrument(skip(self, notes, now, policy))]
    pub fn print_alert_summary(
        &mut self,
        notes: &[Note],
        now: DateTime<Utc>,
        policy: &ReminderPolicy,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let mut critical = 0;
        for note in notes {
            let tier = classify(note, now, policy);
            if !tier.interrupts() {
                continue;
            }
            critical += 1;
            let id = note.id.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
            let when = note
                .reminder
                .map(|at| at.with_timezone(&Local).format("%H:%M").to_string())
                .unwrap_or_default();
            let marker = match tier {
                Tier::Overdue => self.paint("overdue", "31"),
                _ => self.paint("due", "33"),
            };
            writeln!(out, "{marker}  {id}  {when}  {}", note.title)?;
        }

        if critical == 0 {
            writeln!(out, "No critical reminders.")?;
        }

        let urgent = crate::classify::urgent_notes(notes, now, policy);
        let overdue = crate::classify::overdue_notes(notes, now);
        writeln!(
            out,
            "{} urgent within {}h, {} overdue total.",
            urgent.len(),
            policy.urgent_hours,
            overdue.len()
        )?;

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    // Column widths are measured on the visible text, since painted cells
    // carry invisible escape bytes.
    let visible = |cell: &str| UnicodeWidthStr::width(strip_ansi(cell).as_str());

    let mut widths: Vec<usize> = headers.iter().map(|h| visible(h)).collect();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible(cell));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$}  ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$}  ", "", width = width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let padding = widths[idx].saturating_sub(visible(cell));
            write!(writer, "{}{}  ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
