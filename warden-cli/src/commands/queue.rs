//! `warden queue` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use warden_command_queue::{Command, CommandQueueConfig, CommandStatus, QueueStore};
use warden_core::config::WardenConfig;

use crate::cli::{QueueAction, QueueArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const STATUSES: [CommandStatus; 6] = [
    CommandStatus::Pending,
    CommandStatus::Sent,
    CommandStatus::AwaitingOutput,
    CommandStatus::Completed,
    CommandStatus::TimedOut,
    CommandStatus::Failed,
];

/// Execute the `queue` command.
pub async fn execute(
    args: QueueArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = WardenConfig::load(config_path).await?;
    let queue_config = CommandQueueConfig::from_core(&config.queue);
    queue_config.validate()?;
    let store = QueueStore::open(&queue_config.dir)?;

    match args.action {
        QueueAction::List { status } => {
            let filter = status.as_deref().map(parse_status).transpose()?;
            writer.render(&build_list_report(&store, filter)?)
        }
        QueueAction::Show { id } => {
            let id = Uuid::parse_str(&id)
                .map_err(|e| CliError::Command(format!("invalid command id '{id}': {e}")))?;
            let report = EntryReport {
                acknowledged: store.is_acknowledged(id),
                command: store.load(id)?,
            };
            writer.render(&report)
        }
        QueueAction::Gc => {
            let report = store.collect_garbage(queue_config.retention())?;
            writer.render(&GcSummary {
                removed_entries: report.removed_entries,
                removed_markers: report.removed_markers,
            })
        }
    }
}

/// Parse a status name as printed in queue listings.
pub fn parse_status(name: &str) -> Result<CommandStatus, CliError> {
    STATUSES
        .into_iter()
        .find(|s| s.as_str() == name)
        .ok_or_else(|| {
            let expected: Vec<&str> = STATUSES.iter().map(|s| s.as_str()).collect();
            CliError::Command(format!(
                "unknown status: {name} (expected: {})",
                expected.join(", ")
            ))
        })
}

pub fn build_list_report(
    store: &QueueStore,
    filter: Option<CommandStatus>,
) -> Result<QueueListReport, CliError> {
    let scan = store.scan()?;
    let entries: Vec<QueueEntry> = scan
        .entries
        .into_iter()
        .filter(|c| filter.is_none_or(|f| c.status == f))
        .map(|c| QueueEntry {
            acknowledged: store.is_acknowledged(c.id),
            id: c.id.to_string(),
            status: c.status.as_str().to_owned(),
            priority: c.priority,
            issued_at: c.issued_at.to_rfc3339(),
            text: c.text,
        })
        .collect();

    Ok(QueueListReport {
        dir: store.dir().display().to_string(),
        total: entries.len(),
        entries,
        corrupt: scan
            .corrupt
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    })
}

#[derive(Serialize)]
pub struct QueueListReport {
    pub dir: String,
    pub total: usize,
    pub entries: Vec<QueueEntry>,
    pub corrupt: Vec<String>,
}

#[derive(Serialize)]
pub struct QueueEntry {
    pub id: String,
    pub status: String,
    pub priority: i32,
    pub issued_at: String,
    pub text: String,
    pub acknowledged: bool,
}

impl Render for QueueListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Queue {} ({} entries)", self.dir.bold(), self.total)?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<36} {:<16} {:>8}  {:<25} Command",
            "ID", "Status", "Priority", "Issued"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;

        for e in &self.entries {
            let status = match e.status.as_str() {
                "completed" => e.status.green(),
                "failed" => e.status.red(),
                "timed_out" => e.status.yellow(),
                _ => e.status.normal(),
            };
            writeln!(
                w,
                "{:<36} {:<16} {:>8}  {:<25} {}",
                e.id, status, e.priority, e.issued_at, e.text
            )?;
        }

        if !self.corrupt.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Corrupt entries (skipped):".red().bold())?;
            for path in &self.corrupt {
                writeln!(w, "  {path}")?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct EntryReport {
    #[serde(flatten)]
    pub command: Command,
    pub acknowledged: bool,
}

impl Render for EntryReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let c = &self.command;
        writeln!(w, "Command {}", c.id.to_string().bold())?;
        writeln!(w, "  Text:      {}", c.text)?;
        writeln!(w, "  Status:    {}", c.status)?;
        writeln!(w, "  Priority:  {}", c.priority)?;
        writeln!(w, "  Issued:    {} (pid {})", c.issued_at.to_rfc3339(), c.owner_pid)?;
        if let Some(sent) = c.sent_at {
            writeln!(w, "  Sent:      {}", sent.to_rfc3339())?;
        }
        if let Some(finished) = c.finished_at {
            writeln!(w, "  Finished:  {}", finished.to_rfc3339())?;
        }
        writeln!(w, "  Revision:  {}", c.revision)?;
        writeln!(w, "  Acked:     {}", if self.acknowledged { "yes" } else { "no" })?;
        if let Some(error) = &c.error {
            writeln!(w, "  Error:     {}", error.red())?;
        }
        if let Some(result) = &c.result {
            writeln!(w)?;
            writeln!(w, "{result}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct GcSummary {
    pub removed_entries: usize,
    pub removed_markers: usize,
}

impl Render for GcSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Removed {} entries and {} stale acknowledgement markers",
            self.removed_entries, self.removed_markers
        )
    }
}
