//! CLI-specific error types and exit code mapping

use warden_command_queue::QueueError;
use warden_core::error::WardenError;
use warden_log_pipeline::LogPipelineError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes so scripts can
/// tell a failed server command from a daemon that is not running.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The daemon is not running, so a queued command would never be sent.
    #[error("daemon not reachable: {0}")]
    DaemonUnavailable(String),

    /// The server command finished with status `failed`.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// No result within the timeout.
    #[error("command timed out: {0}")]
    CommandTimedOut(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from warden-core.
    #[error("{0}")]
    Core(#[from] WardenError),

    /// Command queue domain error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Rule loading or compilation error.
    #[error("rule error: {0}")]
    Rule(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command error          |
    /// | 2    | Configuration error              |
    /// | 3    | Daemon unreachable               |
    /// | 4    | Server command failed            |
    /// | 5    | Server command timed out         |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(WardenError::Config(_)) => 2,
            Self::DaemonUnavailable(_) => 3,
            Self::CommandFailed(_) => 4,
            Self::CommandTimedOut(_) => 5,
            Self::Io(_) | Self::Queue(QueueError::Io(_)) => 10,
            Self::JsonSerialize(_)
            | Self::Command(_)
            | Self::Core(_)
            | Self::Queue(_)
            | Self::Rule(_) => 1,
        }
    }
}

impl From<LogPipelineError> for CliError {
    fn from(e: LogPipelineError) -> Self {
        Self::Rule(e.to_string())
    }
}
