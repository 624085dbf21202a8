//! `warden cmd` command handler

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use warden_command_queue::{Command, CommandOutcome, CommandQueueConfig, QueueClient};
use warden_core::config::WardenConfig;

use crate::cli::CmdArgs;
use crate::commands::status::daemon_status;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `cmd` command.
pub async fn execute(
    args: CmdArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = WardenConfig::load(config_path).await?;
    let queue_config = CommandQueueConfig::from_core(&config.queue);
    let client = QueueClient::from_config(&queue_config)?;

    let daemon = daemon_status(&config.general.pid_file);
    if !args.no_wait && daemon.pid_file_configured && !daemon.running {
        return Err(CliError::DaemonUnavailable(format!(
            "warden daemon is not running (pid file: {})",
            config.general.pid_file
        )));
    }

    let text = args.joined();
    let id = client.enqueue_with_priority(&text, args.priority).await?;
    info!(%id, command = %text, priority = args.priority, "command queued");

    if args.no_wait {
        let command = client.store().load(id)?;
        writer.render(&CommandReport::queued(command))?;
        return Ok(());
    }

    let timeout = args
        .timeout
        .map_or_else(|| queue_config.command_timeout(), Duration::from_secs);
    let outcome = client.wait_for_completion(id, timeout).await?;

    // 종료 상태만 확인 처리합니다. 대기 시간 초과 시 엔트리는 `queue show` 로 다시 볼 수 있습니다.
    if outcome.command().status.is_terminal() {
        client.acknowledge(id).await?;
    } else {
        debug!(%id, status = %outcome.command().status, "leaving unfinished entry unacknowledged");
    }

    let report = CommandReport::from_outcome(&outcome);
    writer.render(&report)?;
    outcome_result(outcome)
}

/// Map the final outcome to the CLI result (and so the exit code).
pub fn outcome_result(outcome: CommandOutcome) -> Result<(), CliError> {
    match outcome {
        CommandOutcome::Completed(_) => Ok(()),
        CommandOutcome::Failed(cmd) => Err(CliError::CommandFailed(
            cmd.error.unwrap_or_else(|| format!("command {} failed", cmd.id)),
        )),
        CommandOutcome::TimedOut(cmd) if cmd.status.is_terminal() => Err(
            CliError::CommandTimedOut(format!("server produced no output for `{}`", cmd.text)),
        ),
        CommandOutcome::TimedOut(cmd) => Err(CliError::CommandTimedOut(format!(
            "command {} is still {}; check later with `warden queue show {}`",
            cmd.id, cmd.status, cmd.id
        ))),
    }
}

/// Result of a single `warden cmd` invocation.
#[derive(Serialize)]
pub struct CommandReport {
    pub id: String,
    pub command: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandReport {
    fn queued(command: Command) -> Self {
        Self {
            id: command.id.to_string(),
            command: command.text,
            status: command.status.as_str().to_owned(),
            result: None,
            error: None,
        }
    }

    pub fn from_outcome(outcome: &CommandOutcome) -> Self {
        let command = outcome.command();
        Self {
            id: command.id.to_string(),
            command: command.text.clone(),
            status: command.status.as_str().to_owned(),
            result: command.result.clone(),
            error: command.error.clone(),
        }
    }
}

impl Render for CommandReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match self.status.as_str() {
            "completed" => {
                if let Some(result) = &self.result {
                    writeln!(w, "{result}")?;
                }
            }
            "pending" => writeln!(w, "Queued {} ({})", self.id.bold(), self.command)?,
            "failed" => writeln!(
                w,
                "{} {}",
                "failed:".red().bold(),
                self.error.as_deref().unwrap_or("unknown error")
            )?,
            "timed_out" => writeln!(w, "{}", "no output from server".yellow())?,
            other => writeln!(
                w,
                "{} command {} is still {}",
                "waiting:".yellow().bold(),
                self.id,
                other
            )?,
        }
        Ok(())
    }
}
