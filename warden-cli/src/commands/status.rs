//! `warden status` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use warden_command_queue::{CommandQueueConfig, CommandStatus, QueueStore};
use warden_core::config::WardenConfig;

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `status` command.
pub async fn execute(
    args: StatusArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = WardenConfig::load(config_path).await?;
    let queue_config = CommandQueueConfig::from_core(&config.queue);

    let report = StatusReport {
        daemon: daemon_status(&config.general.pid_file),
        queue: queue_summary(Path::new(&queue_config.dir), args.verbose)?,
    };
    writer.render(&report)
}

/// Daemon liveness as seen from the PID file.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub pid_file_configured: bool,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Check if the daemon is running by reading the PID file and probing the process.
pub fn daemon_status(pid_file: &str) -> DaemonStatus {
    let not_running = |configured| DaemonStatus {
        pid_file_configured: configured,
        running: false,
        pid: None,
    };

    if pid_file.is_empty() {
        return not_running(false);
    }

    let content = match std::fs::read_to_string(pid_file) {
        Ok(content) => content,
        Err(e) => {
            debug!(pid_file, error = %e, "pid file not readable");
            return not_running(true);
        }
    };

    let pid = match content.trim().parse::<u32>() {
        Ok(pid) => pid,
        Err(e) => {
            warn!(pid_file, error = %e, "failed to parse pid");
            return not_running(true);
        }
    };

    DaemonStatus {
        pid_file_configured: true,
        running: is_process_alive(pid),
        pid: Some(pid),
    }
}

/// Check if a process with the given PID is alive.
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) with signal 0 only checks for existence and permission.
    let result = unsafe { libc::kill(pid, 0) };
    // EPERM: 존재하지만 신호를 보낼 권한이 없음
    result == 0 || std::io::Error::last_os_error().kind() == std::io::ErrorKind::PermissionDenied
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    warn!("process liveness check not supported on this platform");
    false
}

/// Per-status entry counts. A missing queue directory counts as empty and is
/// not created.
pub fn queue_summary(dir: &Path, include_in_flight: bool) -> Result<QueueSummary, CliError> {
    let mut summary = QueueSummary {
        dir: dir.display().to_string(),
        ..QueueSummary::default()
    };
    if !dir.exists() {
        return Ok(summary);
    }

    let scan = QueueStore::open(dir)?.scan()?;
    summary.corrupt = scan.corrupt.len();
    for command in scan.entries {
        match command.status {
            CommandStatus::Pending => summary.pending += 1,
            CommandStatus::Sent | CommandStatus::AwaitingOutput => {
                summary.in_flight += 1;
                if include_in_flight {
                    summary
                        .in_flight_commands
                        .push(format!("{} {}", command.id, command.text));
                }
            }
            CommandStatus::Completed => summary.completed += 1,
            CommandStatus::TimedOut => summary.timed_out += 1,
            CommandStatus::Failed => summary.failed += 1,
        }
    }
    Ok(summary)
}

#[derive(Serialize)]
pub struct StatusReport {
    pub daemon: DaemonStatus,
    pub queue: QueueSummary,
}

#[derive(Debug, Default, Serialize)]
pub struct QueueSummary {
    pub dir: String,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub corrupt: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub in_flight_commands: Vec<String>,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match (self.daemon.running, self.daemon.pid) {
            (true, Some(pid)) => writeln!(w, "Daemon: {} (pid {pid})", "running".green().bold())?,
            _ if !self.daemon.pid_file_configured => {
                writeln!(w, "Daemon: {}", "unknown (no pid file configured)".yellow())?;
            }
            _ => writeln!(w, "Daemon: {}", "not running".red().bold())?,
        }

        let q = &self.queue;
        writeln!(w)?;
        writeln!(w, "Queue: {}", q.dir)?;
        writeln!(w, "  {:<12} {}", "pending", q.pending)?;
        writeln!(w, "  {:<12} {}", "in flight", q.in_flight)?;
        writeln!(w, "  {:<12} {}", "completed", q.completed)?;
        writeln!(w, "  {:<12} {}", "timed out", q.timed_out)?;
        writeln!(w, "  {:<12} {}", "failed", q.failed)?;
        if q.corrupt > 0 {
            writeln!(w, "  {:<12} {}", "corrupt".red(), q.corrupt)?;
        }
        for line in &q.in_flight_commands {
            writeln!(w, "    {}", line.dimmed())?;
        }
        Ok(())
    }
}
