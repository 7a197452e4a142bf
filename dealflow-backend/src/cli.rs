/// Command-line surface over a loaded [`Session`].
///
/// `execute` runs one command against an already-loaded session and writes
/// human-readable text (or JSON with `--json`) to the given writer.
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use dealflow_core::analytics::{Kpis, YearReport};
use dealflow_core::calendar::{reminders_by_day, MonthGrid};
use dealflow_core::export::export_csv;
use dealflow_core::filter::{DateFilter, DealFilter, FilterCriteria, PriorityFilter};
use dealflow_core::layout::{
    compute_reorder, reorder_within, BoardColumn, DragGesture, DropTarget, ReorderPlan,
};
use dealflow_core::session::{Session, SessionError};
use dealflow_core::storage::StorageError;
use dealflow_core::types::{
    parse_timestamp, ActivityEvent, DealDraft, DealPatch, DealView, Priority, REMINDER_FORMAT,
};

use crate::config::{AppConfig, ConfigError};

#[derive(Debug, Parser)]
#[command(name = "dealflow", version, about = "Personal CRM deal pipeline")]
pub struct Cli {
    /// Config file (defaults to ~/.config/dealflow/config.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Mirror log output into the dealflow log file.
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the board, optionally filtered.
    Board(BoardArgs),

    /// Write the filtered board as CSV.
    Export(ExportArgs),

    /// Pipeline counts, win rate and amounts.
    Kpi,

    /// Monthly won revenue, forecast and targets for a year.
    Report {
        #[arg(long)]
        year: Option<i32>,
    },

    /// Reminders laid out on a six-week month grid.
    Calendar {
        /// Month as YYYY-MM; defaults to the current month.
        #[arg(long)]
        month: Option<String>,
    },

    /// Manage pipeline columns.
    #[command(subcommand)]
    Column(ColumnCommand),

    /// Manage deals.
    #[command(subcommand)]
    Deal(DealCommand),

    /// Manage deal notes.
    #[command(subcommand)]
    Note(NoteCommand),

    /// Manage reminders.
    #[command(subcommand)]
    Reminder(ReminderCommand),

    /// Recent activity, newest first.
    Activity {
        /// Only events for this deal.
        #[arg(long)]
        deal: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Default, Args)]
pub struct FilterArgs {
    /// Case- and accent-insensitive match on title or client name.
    #[arg(long, short)]
    pub query: Option<String>,

    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    /// Comma-separated, case-insensitive; a deal needs at least one listed tag.
    #[arg(long)]
    pub tags: Option<String>,

    #[arg(long)]
    pub min: Option<f64>,

    #[arg(long)]
    pub max: Option<f64>,

    /// overdue, today, upcoming or none.
    #[arg(long, value_parser = parse_date_filter)]
    pub due: Option<DateFilter>,
}

impl FilterArgs {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            text_query: self.query.clone().unwrap_or_default(),
            priority: self
                .priority
                .map(PriorityFilter::Only)
                .unwrap_or(PriorityFilter::All),
            tags: self
                .tags
                .as_deref()
                .map(FilterCriteria::parse_tags)
                .unwrap_or_default(),
            amount_min: self.min,
            amount_max: self.max,
            date_filter: self.due.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Args)]
pub struct BoardArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Hide columns with no matching deals.
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Output file; stdout when omitted.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum ColumnCommand {
    Add { title: String },
    Rename { id: String, title: String },
    /// Delete a column and every deal in it.
    Remove { id: String },
}

#[derive(Debug, Subcommand)]
pub enum DealCommand {
    Add(DealAddArgs),
    Edit(DealEditArgs),
    /// Deal details with notes, reminders and history.
    Show { id: String },
    Remove { id: String },
    /// Move a deal to a column, at `--index` or at the bottom.
    Move {
        id: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        index: Option<usize>,
    },
}

#[derive(Debug, Args)]
pub struct DealAddArgs {
    /// Target column id.
    #[arg(long)]
    pub column: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub client: Option<String>,
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,
    #[arg(long, value_parser = parse_date)]
    pub follow_up: Option<NaiveDate>,
    #[arg(long, value_parser = parse_datetime)]
    pub remind_at: Option<NaiveDateTime>,
    #[arg(long)]
    pub note: Option<String>,
    #[arg(long)]
    pub amount: Option<f64>,
    #[arg(long)]
    pub currency: Option<String>,
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Debug, Args)]
pub struct DealEditArgs {
    pub id: String,
    #[arg(long)]
    pub column: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub client: Option<String>,
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,
    #[arg(long, value_parser = parse_date, conflicts_with = "clear_follow_up")]
    pub follow_up: Option<NaiveDate>,
    #[arg(long)]
    pub clear_follow_up: bool,
    #[arg(long, conflicts_with = "clear_amount")]
    pub amount: Option<f64>,
    #[arg(long)]
    pub clear_amount: bool,
    #[arg(long)]
    pub currency: Option<String>,
    /// Replaces the tag list; pass an empty string to clear it.
    #[arg(long)]
    pub tags: Option<String>,
    /// Text for the deal's latest note.
    #[arg(long)]
    pub note: Option<String>,
    #[arg(long, value_parser = parse_datetime)]
    pub remind_at: Option<NaiveDateTime>,
}

impl DealEditArgs {
    fn patch(&self) -> DealPatch {
        DealPatch {
            column_id: self.column.clone(),
            title: self.title.clone(),
            client_name: self.client.clone(),
            priority: self.priority,
            next_follow_up_date: if self.clear_follow_up {
                Some(None)
            } else {
                self.follow_up.map(Some)
            },
            amount: if self.clear_amount {
                Some(None)
            } else {
                self.amount.map(Some)
            },
            currency: self.currency.clone().map(Some),
            tags: self.tags.as_deref().map(FilterCriteria::parse_tags),
            position: None,
            notes: self.note.clone(),
            reminder_at: self.remind_at,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum NoteCommand {
    Add { deal: String, body: String },
    Edit { id: String, body: String },
    Remove { id: String },
}

#[derive(Debug, Subcommand)]
pub enum ReminderCommand {
    Add {
        deal: String,
        #[arg(value_parser = parse_datetime)]
        at: NaiveDateTime,
    },
    Edit {
        id: String,
        #[arg(value_parser = parse_datetime)]
        at: NaiveDateTime,
    },
    /// Move to another day, keeping the time of day.
    Move {
        id: String,
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },
    Remove { id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

// ---------------------------------------------------------------------------
// Argument parsers
// ---------------------------------------------------------------------------

fn parse_priority(raw: &str) -> Result<Priority, String> {
    Priority::from_str_loose(raw).ok_or_else(|| format!("unknown priority {raw:?}"))
}

fn parse_date_filter(raw: &str) -> Result<DateFilter, String> {
    DateFilter::from_str_loose(raw).ok_or_else(|| format!("unknown date filter {raw:?}"))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| format!("{raw:?}: {e}"))
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(raw).ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM, got {raw:?}"))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub struct Output<'a> {
    out: &'a mut dyn Write,
    json: bool,
}

impl<'a> Output<'a> {
    pub fn new(out: &'a mut dyn Write, json: bool) -> Self {
        Self { out, json }
    }

    fn emit<T: Serialize>(
        &mut self,
        value: &T,
        text: impl FnOnce(&mut dyn Write) -> std::io::Result<()>,
    ) -> Result<(), CliError> {
        if self.json {
            serde_json::to_writer_pretty(&mut *self.out, value)?;
            writeln!(self.out)?;
        } else {
            text(&mut *self.out)?;
        }
        Ok(())
    }

    fn done(&mut self, message: &str) -> Result<(), CliError> {
        if !self.json {
            writeln!(self.out, "{message}")?;
        }
        Ok(())
    }
}

pub async fn execute(
    session: &Session,
    command: Command,
    config: &AppConfig,
    out: &mut Output<'_>,
) -> Result<(), CliError> {
    match command {
        Command::Board(args) => {
            let filter = DealFilter::compile(&args.filter.criteria());
            let board = session.visible_board(&filter, args.compact);
            out.emit(&board, |w| write_board(w, &board))
        }
        Command::Export(args) => {
            let filter = DealFilter::compile(&args.filter.criteria());
            let csv = export_csv(&session.columns(), &session.deals(), &filter);
            match args.output {
                Some(path) => {
                    fs::write(&path, &csv)?;
                    log::info!("[dealflow.cli] Exported board to {}", path.display());
                    out.done(&format!("Wrote {}", path.display()))
                }
                None => {
                    writeln!(out.out, "{csv}")?;
                    Ok(())
                }
            }
        }
        Command::Kpi => {
            let kpis = Kpis::compute(&session.columns(), &session.deals(), &config.analytics);
            out.emit(&kpis, |w| write_kpis(w, &kpis))
        }
        Command::Report { year } => {
            let year = year.unwrap_or_else(|| Local::now().year());
            let report =
                YearReport::compute(&session.columns(), &session.deals(), year, &config.analytics);
            out.emit(&report, |w| write_report(w, &report))
        }
        Command::Calendar { month } => {
            let grid = match month {
                Some(raw) => MonthGrid::parse(&raw)
                    .ok_or_else(|| CliError::Usage(format!("invalid month {raw:?}")))?,
                None => {
                    let today = Local::now().date_naive();
                    MonthGrid::new(today.year(), today.month())
                        .ok_or_else(|| CliError::Usage("invalid current month".to_string()))?
                }
            };
            write_calendar(session, &grid, out)
        }
        Command::Column(cmd) => run_column(session, cmd, out).await,
        Command::Deal(cmd) => run_deal(session, cmd, out).await,
        Command::Note(cmd) => run_note(session, cmd, out).await,
        Command::Reminder(cmd) => run_reminder(session, cmd, out).await,
        Command::Activity { deal, limit } => {
            let events: Vec<ActivityEvent> = match &deal {
                Some(id) => session.activity_for_deal(id),
                None => session.activity(),
            }
            .into_iter()
            .take(limit)
            .collect();
            out.emit(&events, |w| {
                for event in &events {
                    write_event(w, event)?;
                }
                Ok(())
            })
        }
    }
}

async fn run_column(
    session: &Session,
    cmd: ColumnCommand,
    out: &mut Output<'_>,
) -> Result<(), CliError> {
    match cmd {
        ColumnCommand::Add { title } => {
            let column = session.add_column(&title).await?;
            out.emit(&column, |w| writeln!(w, "Added column {} ({})", column.title, column.id))
        }
        ColumnCommand::Rename { id, title } => {
            session.edit_column(&id, &title).await?;
            out.done(&format!("Renamed column {id}"))
        }
        ColumnCommand::Remove { id } => {
            session.remove_column(&id).await?;
            out.done(&format!("Removed column {id}"))
        }
    }
}

async fn run_deal(session: &Session, cmd: DealCommand, out: &mut Output<'_>) -> Result<(), CliError> {
    match cmd {
        DealCommand::Add(args) => {
            let draft = DealDraft {
                title: args.title,
                client_name: args.client,
                priority: args.priority,
                next_follow_up_date: args.follow_up,
                reminder_at: args.remind_at,
                notes: args.note,
                amount: args.amount,
                currency: args.currency,
                tags: args
                    .tags
                    .as_deref()
                    .map(FilterCriteria::parse_tags)
                    .unwrap_or_default(),
            };
            let deal = session.add_deal(&args.column, draft).await?;
            out.emit(&deal, |w| writeln!(w, "Added deal {} ({})", deal.title, deal.id))
        }
        DealCommand::Edit(args) => {
            session.save_deal(&args.id, args.patch()).await?;
            out.done(&format!("Saved deal {}", args.id))
        }
        DealCommand::Show { id } => {
            let view = session
                .deal(&id)
                .ok_or_else(|| CliError::Session(SessionError::UnknownDeal(id.clone())))?;
            let notes = session.notes_for(&id);
            let history = session.activity_for_deal(&id);
            let reminders: Vec<_> = session
                .reminders()
                .into_iter()
                .filter(|r| r.deal_id == id)
                .collect();
            let detail = serde_json::json!({
                "deal": view,
                "notes": notes,
                "reminders": reminders,
                "activity": history,
            });
            out.emit(&detail, |w| {
                write_deal_line(w, &view)?;
                for note in &notes {
                    writeln!(
                        w,
                        "  note {} [{}] {}",
                        note.id,
                        note.created_at.format("%Y-%m-%d %H:%M"),
                        note.body
                    )?;
                }
                for reminder in &reminders {
                    writeln!(
                        w,
                        "  reminder {} at {}",
                        reminder.id,
                        reminder.remind_at.format(REMINDER_FORMAT)
                    )?;
                }
                for event in &history {
                    write!(w, "  ")?;
                    write_event(w, event)?;
                }
                Ok(())
            })
        }
        DealCommand::Remove { id } => {
            session.remove_deal(&id).await?;
            out.done(&format!("Removed deal {id}"))
        }
        DealCommand::Move { id, to, index } => {
            let plan = plan_move(&session.board(), &id, &to, index)?;
            session.apply_reorder(plan).await?;
            out.done(&format!("Moved deal {id} to {to}"))
        }
    }
}

/// Turn a move request into the orderings a drop would produce. Without
/// an index this is a drop on the column itself.
fn plan_move(
    board: &[BoardColumn],
    deal_id: &str,
    to_column: &str,
    index: Option<usize>,
) -> Result<ReorderPlan, CliError> {
    let source = board
        .iter()
        .find(|c| c.index_of(deal_id).is_some())
        .ok_or_else(|| CliError::Session(SessionError::UnknownDeal(deal_id.to_string())))?;
    let target = board
        .iter()
        .find(|c| c.column_id == to_column)
        .ok_or_else(|| CliError::Session(SessionError::UnknownColumn(to_column.to_string())))?;

    let Some(index) = index else {
        let mut gesture = DragGesture::new();
        gesture.start(deal_id);
        return gesture
            .drop_on(DropTarget::Column(to_column.to_string()), board)
            .ok_or_else(|| CliError::Usage(format!("Cannot move {deal_id} to {to_column}")));
    };

    if source.column_id == target.column_id {
        return Ok(ReorderPlan::Within {
            column_id: source.column_id.clone(),
            ordered_ids: reorder_within(&source.deal_ids(), deal_id, index),
        });
    }
    let (source_ids, target_ids) =
        compute_reorder(&source.deal_ids(), &target.deal_ids(), deal_id, index);
    Ok(ReorderPlan::Move {
        moved_id: deal_id.to_string(),
        source_column: source.column_id.clone(),
        source_ids,
        target_column: target.column_id.clone(),
        target_ids,
    })
}

async fn run_note(session: &Session, cmd: NoteCommand, out: &mut Output<'_>) -> Result<(), CliError> {
    match cmd {
        NoteCommand::Add { deal, body } => {
            let note = session.add_note(&deal, &body).await?;
            out.emit(&note, |w| writeln!(w, "Added note {}", note.id))
        }
        NoteCommand::Edit { id, body } => {
            session.edit_note(&id, &body).await?;
            out.done(&format!("Saved note {id}"))
        }
        NoteCommand::Remove { id } => {
            session.remove_note(&id).await?;
            out.done(&format!("Removed note {id}"))
        }
    }
}

async fn run_reminder(
    session: &Session,
    cmd: ReminderCommand,
    out: &mut Output<'_>,
) -> Result<(), CliError> {
    match cmd {
        ReminderCommand::Add { deal, at } => {
            let reminder = session.add_reminder(&deal, at).await?;
            out.emit(&reminder, |w| {
                writeln!(
                    w,
                    "Added reminder {} at {}",
                    reminder.id,
                    reminder.remind_at.format(REMINDER_FORMAT)
                )
            })
        }
        ReminderCommand::Edit { id, at } => {
            session.edit_reminder(&id, at).await?;
            out.done(&format!("Saved reminder {id}"))
        }
        ReminderCommand::Move { id, date } => {
            session.move_reminder_to_date(&id, date).await?;
            out.done(&format!("Moved reminder {id} to {date}"))
        }
        ReminderCommand::Remove { id } => {
            session.remove_reminder(&id).await?;
            out.done(&format!("Removed reminder {id}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn write_deal_line(w: &mut dyn Write, view: &DealView) -> std::io::Result<()> {
    let deal = &view.deal;
    write!(
        w,
        "  {} [{}] {} ({})",
        deal.id,
        deal.priority.as_str(),
        deal.title,
        deal.client_name
    )?;
    if let Some(amount) = deal.amount {
        write!(w, " {} {}", amount, deal.currency.as_deref().unwrap_or_default())?;
    }
    if !deal.tags.is_empty() {
        write!(w, " #{}", deal.tags.join(" #"))?;
    }
    if let Some(at) = view.reminder_at {
        write!(w, " due {}", at.format(REMINDER_FORMAT))?;
    } else if let Some(date) = deal.next_follow_up_date {
        write!(w, " follow-up {date}")?;
    }
    writeln!(w)?;
    if let Some(note) = &view.notes {
        writeln!(w, "      {}", note.replace('\n', " "))?;
    }
    Ok(())
}

fn write_board(w: &mut dyn Write, board: &[BoardColumn]) -> std::io::Result<()> {
    for column in board {
        writeln!(w, "== {} ({}) [{}]", column.title, column.deals.len(), column.column_id)?;
        for view in &column.deals {
            write_deal_line(w, view)?;
        }
    }
    Ok(())
}

fn write_kpis(w: &mut dyn Write, kpis: &Kpis) -> std::io::Result<()> {
    writeln!(w, "Deals:     {}", kpis.total)?;
    writeln!(w, "Won:       {}", kpis.won)?;
    writeln!(w, "Lost:      {}", kpis.lost)?;
    writeln!(w, "Win rate:  {}%", kpis.win_rate)?;
    writeln!(w, "Pipeline:  {}", kpis.pipeline_amount)?;
    writeln!(w, "Won total: {}", kpis.won_amount)
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn write_report(w: &mut dyn Write, report: &YearReport) -> std::io::Result<()> {
    writeln!(w, "{}      actual    forecast      target", report.year)?;
    for (month, name) in MONTHS.iter().enumerate() {
        writeln!(
            w,
            "{:<8} {:>10} {:>11} {:>11}",
            name,
            report.actual_by_month[month],
            report.forecast_by_month[month],
            report.target_by_month[month]
        )?;
    }
    for (quarter, totals) in report.quarters.iter().enumerate() {
        writeln!(
            w,
            "Q{:<7} {:>10} {:>11} {:>11}",
            quarter + 1,
            totals.actual,
            totals.forecast,
            totals.target
        )?;
    }
    writeln!(
        w,
        "{:<8} {:>10} {:>11} {:>11}",
        "Year", report.year_total.actual, report.year_total.forecast, report.year_total.target
    )
}

fn write_calendar(session: &Session, grid: &MonthGrid, out: &mut Output<'_>) -> Result<(), CliError> {
    let reminders: Vec<_> = session
        .reminders()
        .into_iter()
        .filter(|r| {
            let day = r.remind_at.date();
            day >= grid.first_day() && day <= grid.last_day()
        })
        .collect();
    let by_day = reminders_by_day(&reminders);
    let titles = |deal_id: &str| {
        session
            .deal(deal_id)
            .map(|v| v.deal.title)
            .unwrap_or_else(|| deal_id.to_string())
    };

    if out.json {
        let days: Vec<_> = grid
            .days
            .iter()
            .map(|day| {
                serde_json::json!({
                    "date": day.date,
                    "inMonth": day.in_month,
                    "reminders": by_day.get(&day.date).cloned().unwrap_or_default(),
                })
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out.out, &days)?;
        writeln!(out.out)?;
        return Ok(());
    }

    let w = &mut *out.out;
    writeln!(w, "{} {}", MONTHS[grid.month as usize - 1], grid.year)?;
    writeln!(w, " Mo  Tu  We  Th  Fr  Sa  Su")?;
    for week in grid.weeks() {
        let cells: Vec<String> = week
            .iter()
            .map(|day| {
                let mark = if by_day.contains_key(&day.date) { '*' } else { ' ' };
                if day.in_month {
                    format!("{:>3}{}", day.date.day(), mark)
                } else {
                    format!("  .{}", mark)
                }
            })
            .collect();
        writeln!(w, "{}", cells.join(""))?;
    }
    for (day, entries) in &by_day {
        for reminder in entries {
            writeln!(
                w,
                "{} {} {} ({})",
                day,
                reminder.remind_at.format("%H:%M"),
                titles(&reminder.deal_id),
                reminder.id
            )?;
        }
    }
    Ok(())
}

fn write_event(w: &mut dyn Write, event: &ActivityEvent) -> std::io::Result<()> {
    write!(
        w,
        "{} {}",
        event.created_at.format("%Y-%m-%d %H:%M"),
        event.kind.wire_type()
    )?;
    if let Some(deal_id) = &event.deal_id {
        write!(w, " deal={deal_id}")?;
    }
    if let Some(payload) = event.kind.wire_payload() {
        write!(w, " {payload}")?;
    }
    writeln!(w)
}
