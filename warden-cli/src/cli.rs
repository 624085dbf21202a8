//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Warden -- send commands to a supervised game server and inspect its state.
///
/// Use `warden <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about, long_about = None)]
pub struct Cli {
    /// Path to the warden.toml configuration file.
    #[arg(short, long, default_value = "/etc/warden/warden.toml", global = true)]
    pub config: PathBuf,

    /// Log level for CLI diagnostics on stderr (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue a command for the server and wait for its output.
    Cmd(CmdArgs),

    /// Inspect and maintain the command queue.
    Queue(QueueArgs),

    /// Validate and try out line rules.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),

    /// Show daemon and queue status.
    Status(StatusArgs),
}

// ---- cmd ----

#[derive(Args, Debug)]
pub struct CmdArgs {
    /// Command text, e.g. `warden cmd whitelist add Alice`.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    pub text: Vec<String>,

    /// Dispatch priority; higher runs first.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i32,

    /// Seconds to wait for a result (default: queue.command_timeout_secs).
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Enqueue and print the command id without waiting.
    #[arg(long)]
    pub no_wait: bool,
}

impl CmdArgs {
    /// The command line as the server will receive it.
    pub fn joined(&self) -> String {
        self.text.join(" ")
    }
}

// ---- queue ----

#[derive(Args, Debug)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub action: QueueAction,
}

#[derive(Subcommand, Debug)]
pub enum QueueAction {
    /// List queue entries, oldest first.
    List {
        /// Filter by status (pending, sent, awaiting_output, completed, timed_out, failed).
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one entry including its collected output.
    Show {
        /// Command id as printed by `warden cmd`.
        id: String,
    },
    /// Remove acknowledged or expired terminal entries.
    Gc,
}

// ---- rules ----

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// Validate rule files and report patterns that do not compile.
    Validate {
        /// Rule file or directory (default: log_pipeline.rules_path).
        path: Option<PathBuf>,
    },
    /// Show which event a server output line would produce.
    Test {
        /// A single line of server output.
        line: String,

        /// Rule file or directory (default: log_pipeline.rules_path).
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, server, log_pipeline, queue, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

// ---- status ----

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list queue entries that are still in flight.
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_cmd_joins_words() {
        let cli = Cli::try_parse_from(["warden", "cmd", "whitelist", "add", "Alice"])
            .expect("should parse cmd");
        match cli.command {
            Commands::Cmd(args) => {
                assert_eq!(args.joined(), "whitelist add Alice");
                assert_eq!(args.priority, 0);
                assert!(args.timeout.is_none());
                assert!(!args.no_wait);
            }
            _ => panic!("expected Cmd command"),
        }
    }

    #[test]
    fn test_cli_parse_cmd_options() {
        let cli = Cli::try_parse_from([
            "warden", "cmd", "-p", "-5", "--timeout", "3", "--no-wait", "save-all",
        ])
        .expect("should parse cmd with options");
        match cli.command {
            Commands::Cmd(args) => {
                assert_eq!(args.priority, -5);
                assert_eq!(args.timeout, Some(3));
                assert!(args.no_wait);
                assert_eq!(args.joined(), "save-all");
            }
            _ => panic!("expected Cmd command"),
        }
    }

    #[test]
    fn test_cli_parse_cmd_requires_text() {
        assert!(Cli::try_parse_from(["warden", "cmd"]).is_err());
    }

    #[test]
    fn test_cli_parse_queue_show() {
        let cli = Cli::try_parse_from(["warden", "queue", "show", "abc"]).expect("should parse");
        match cli.command {
            Commands::Queue(QueueArgs {
                action: QueueAction::Show { id },
            }) => assert_eq!(id, "abc"),
            _ => panic!("expected queue show"),
        }
    }

    #[test]
    fn test_cli_parse_queue_list_filter() {
        let cli = Cli::try_parse_from(["warden", "queue", "list", "--status", "pending"])
            .expect("should parse");
        match cli.command {
            Commands::Queue(QueueArgs {
                action: QueueAction::List { status },
            }) => assert_eq!(status.as_deref(), Some("pending")),
            _ => panic!("expected queue list"),
        }
    }

    #[test]
    fn test_cli_parse_rules_test() {
        let cli = Cli::try_parse_from([
            "warden",
            "rules",
            "test",
            "Alice joined the game",
            "--rules",
            "rules/minecraft.yml",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Test { line, rules },
            }) => {
                assert_eq!(line, "Alice joined the game");
                assert_eq!(rules, Some(PathBuf::from("rules/minecraft.yml")));
            }
            _ => panic!("expected rules test"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "warden", "status", "--output", "json", "-c", "/tmp/w.toml",
        ])
        .expect("should parse");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("/tmp/w.toml"));
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["warden", "config", "show", "--section", "queue"])
            .expect("should parse");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("queue")),
            _ => panic!("expected config show"),
        }
    }
}
