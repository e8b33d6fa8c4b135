use anyhow::{anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::render::Renderer;
use crate::store::{Clock, NoteStore, ScratchStore};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "notes", "info", "modify", "done", "delete", "snooze", "alerts", "watch",
        "scratch", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(dash, cfg, renderer, inv))]
pub fn dispatch<S, C>(
    dash: &mut Dashboard<S, C>,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    let now = dash.now();

    debug!(
        command = %inv.command,
        args = ?inv.command_args,
        "dispatching command"
    );

    match inv.command.as_str() {
        "add" => cmd_add(dash, &inv.command_args, now),
        "list" => cmd_list(dash, renderer, &inv.command_args),
        "notes" => cmd_notes(dash, renderer, now),
        "info" => cmd_info(dash, renderer, &inv.command_args),
        "modify" => cmd_modify(dash, &inv.command_args, now),
        "done" => cmd_done(dash, &inv.command_args),
        "delete" => cmd_delete(dash, &inv.command_args),
        "snooze" => cmd_snooze(dash),
        "alerts" => cmd_alerts(dash, cfg, renderer, now),
        "watch" => cmd_watch(dash, cfg, renderer, &inv.command_args),
        "scratch" => cmd_scratch(dash, &inv.command_args),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Splits `add`/`modify` arguments into free title words and `key:value`
/// modifiers (body:, color:, fav:, reminder:).
fn parse_title_and_mods(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(String, Vec<Modifier>)> {
    let mut title_words = Vec::new();
    let mut mods = Vec::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once(':') {
            match key {
                "body" => {
                    mods.push(Modifier::Body(value.to_string()));
                    continue;
                }
                "color" => {
                    mods.push(Modifier::Color(value.to_string()));
                    continue;
                }
                "fav" | "favorite" => {
                    mods.push(Modifier::Favorite(value == "true" || value == "yes"));
                    continue;
                }
                "reminder" => {
                    if value == "none" {
                        mods.push(Modifier::Reminder(None));
                    } else {
                        mods.push(Modifier::Reminder(Some(parse_reminder_expr(value, now)?)));
                    }
                    continue;
                }
                _ => {}
            }
        }
        title_words.push(arg.clone());
    }

    Ok((title_words.join(" "), mods))
}

#[derive(Debug, Clone)]
enum Modifier {
    Body(String),
    Color(String),
    Favorite(bool),
    Reminder(Option<DateTime<Utc>>),
}

/// Reminder expressions: RFC 3339, or relative `+<n>m`/`+<n>h`/`+<n>d`.
fn parse_reminder_expr(raw: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Some(rest) = raw.strip_prefix('+') {
        // The unit is the last char, which need not be a single byte.
        let (unit_start, unit) = rest
            .char_indices()
            .last()
            .ok_or_else(|| anyhow!("invalid reminder offset: {raw}"))?;
        let amount: i64 = rest[..unit_start]
            .parse()
            .map_err(|_| anyhow!("invalid reminder offset: {raw}"))?;
        let duration = match unit {
            'm' => Duration::minutes(amount),
            'h' => Duration::hours(amount),
            'd' => Duration::days(amount),
            _ => bail!("invalid reminder unit in: {raw} (use m, h or d)"),
        };
        return Ok(now + duration);
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid reminder timestamp {raw}: {err}"))
}

fn apply_mods(note: &mut crate::note::Note, mods: &[Modifier]) {
    for modifier in mods {
        match modifier {
            Modifier::Body(body) => note.body = body.clone(),
            Modifier::Color(color) => note.color = crate::note::normalize_color(color).to_string(),
            Modifier::Favorite(favorite) => note.favorite = *favorite,
            Modifier::Reminder(reminder) => note.reminder = *reminder,
        }
    }
}

fn parse_id(args: &[String]) -> anyhow::Result<u64> {
    let raw = args.first().ok_or_else(|| anyhow!("a note id is required"))?;
    raw.parse::<u64>()
        .map_err(|_| anyhow!("invalid note id: {raw}"))
}

fn drain_notices<S, C>(dash: &mut Dashboard<S, C>)
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    for notice in dash.take_notices() {
        println!("{notice}");
    }
}

#[instrument(skip(dash, args, now))]
fn cmd_add<S, C>(dash: &mut Dashboard<S, C>, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    info!("command add");

    let (title, mods) = parse_title_and_mods(args, now)?;
    if !dash.create_draft() {
        drain_notices(dash);
        bail!("could not open a new draft");
    }

    let index = dash.editors().len() - 1;
    if let Some(editor) = dash.editor_mut(index) {
        editor.title = title;
        apply_mods(editor, &mods);
    }

    let saved = dash.save_editor(index);
    drain_notices(dash);
    if !saved {
        bail!("note was not created");
    }

    if let Some(id) = dash.editors().get(index).and_then(|note| note.id) {
        println!("Created note {id}.");
    }
    Ok(())
}

#[instrument(skip(dash, renderer, args))]
fn cmd_list<S, C>(
    dash: &mut Dashboard<S, C>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    info!("command list");
    let search = args.join(" ");
    dash.set_search(&search);
    renderer.print_deck_table(dash.decks())
}

#[instrument(skip(dash, renderer, now))]
fn cmd_notes<S, C>(
    dash: &mut Dashboard<S, C>,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    info!("command notes");
    renderer.print_note_table(dash.notes(), now)
}

#[instrument(skip(dash, renderer, args))]
fn cmd_info<S, C>(
    dash: &mut Dashboard<S, C>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    let id = parse_id(args)?;
    let note = dash
        .notes()
        .iter()
        .find(|note| note.id == Some(id))
        .ok_or_else(|| anyhow!("no note with id {id}"))?
        .clone();
    renderer.print_note_info(&note)
}

#[instrument(skip(dash, args, now))]
fn cmd_modify<S, C>(
    dash: &mut Dashboard<S, C>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    info!("command modify");

    let id = parse_id(args)?;
    let (title, mods) = parse_title_and_mods(&args[1..], now)?;

    if !dash.open_note(id) {
        drain_notices(dash);
        bail!("no note with id {id} (or too many notes open)");
    }

    let index = dash.editors().len() - 1;
    if let Some(editor) = dash.editor_mut(index) {
        if !title.is_empty() {
            editor.title = title;
        }
        apply_mods(editor, &mods);
    }

    let saved = dash.save_editor(index);
    dash.close_editor(index);
    drain_notices(dash);
    if !saved {
        bail!("note {id} was not modified");
    }
    println!("Modified note {id}.");
    Ok(())
}

#[instrument(skip(dash, args))]
fn cmd_done<S, C>(dash: &mut Dashboard<S, C>, args: &[String]) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    let id = parse_id(args)?;
    let done = dash.mark_done(id);
    drain_notices(dash);
    if !done {
        bail!("reminder on note {id} was not resolved");
    }
    Ok(())
}

#[instrument(skip(dash, args))]
fn cmd_delete<S, C>(dash: &mut Dashboard<S, C>, args: &[String]) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    let id = parse_id(args)?;
    let deleted = dash.delete(id);
    drain_notices(dash);
    if !deleted {
        bail!("note {id} was not deleted");
    }
    Ok(())
}

#[instrument(skip(dash))]
fn cmd_snooze<S, C>(dash: &mut Dashboard<S, C>) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    dash.snooze(None);
    println!("Reminder alerts snoozed.");
    Ok(())
}

#[instrument(skip(dash, cfg, renderer, now))]
fn cmd_alerts<S, C>(
    dash: &mut Dashboard<S, C>,
    cfg: &Config,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    info!("command alerts");
    renderer.print_alert_summary(dash.notes(), now, &cfg.reminder_policy())
}

/// Drives the evaluation loop in the foreground: poll once a second, print
/// the alert digest whenever the modal (re)opens. `watch N` stops after N
/// fired ticks; bare `watch` runs until interrupted.
#[instrument(skip(dash, cfg, renderer, args))]
fn cmd_watch<S, C>(
    dash: &mut Dashboard<S, C>,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    info!("command watch");

    let limit: Option<u64> = match args.first() {
        Some(raw) => Some(
            raw.parse()
                .map_err(|_| anyhow!("invalid tick count: {raw}"))?,
        ),
        None => None,
    };

    let mut fired = 0_u64;
    let mut was_open = dash.session().modal_open();
    if was_open {
        renderer.print_alert_summary(dash.notes(), dash.now(), &cfg.reminder_policy())?;
    }

    loop {
        if dash.poll() {
            fired += 1;
            dash.reload();

            let open = dash.session().modal_open();
            if open && !was_open {
                renderer.print_alert_summary(dash.notes(), dash.now(), &cfg.reminder_policy())?;
            }
            was_open = open;

            if let Some(limit) = limit
                && fired >= limit
            {
                break;
            }
        }

        std::thread::sleep(std::time::Duration::from_secs(1));
    }

    Ok(())
}

#[instrument(skip(dash, args))]
fn cmd_scratch<S, C>(dash: &mut Dashboard<S, C>, args: &[String]) -> anyhow::Result<()>
where
    S: NoteStore + ScratchStore,
    C: Clock,
{
    if args.is_empty() {
        println!("{}", dash.scratchpad());
    } else {
        dash.set_scratchpad(&args.join(" "));
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: bnote [options] <command> [args]");
    println!();
    println!("commands:");
    println!("  add <title> [body:.. color:.. fav:.. reminder:..]   create a note");
    println!("  list [search]                                       decks by color");
    println!("  notes                                               flat note table");
    println!("  info <id>                                           one note in full");
    println!("  modify <id> [title] [key:value..]                   edit a note");
    println!("  done <id>                                           resolve a reminder");
    println!("  delete <id>                                         delete a note");
    println!("  snooze                                              silence alerts for a while");
    println!("  alerts                                              one classification pass");
    println!("  watch [ticks]                                       run the evaluation loop");
    println!("  scratch [text]                                      show or set the scratchpad");
    Ok(())
}
