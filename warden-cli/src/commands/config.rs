//! `warden config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use warden_command_queue::CommandQueueConfig;
use warden_core::config::WardenConfig;
use warden_log_pipeline::RuleEngine;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: [&str; 5] = ["general", "server", "log_pipeline", "queue", "metrics"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => {
            info!(path = %config_path.display(), "loading configuration");
            let config = WardenConfig::load(config_path).await?;
            let report = build_config_report(&config, config_path, section.as_deref())?;
            writer.render(&report)
        }
    }
}

/// Load and validate the file, including the checks the daemon runs at startup
/// (queue settings and the configured rule files).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match WardenConfig::load(config_path).await {
        Ok(config) => {
            if let Err(e) = CommandQueueConfig::from_core(&config.queue).validate() {
                errors.push(e.to_string());
            }
            match RuleEngine::load(
                &config.log_pipeline.rules_path,
                config.log_pipeline.builtin_rules,
            )
            .await
            {
                Ok(engine) => warnings.extend(engine.skipped().iter().map(|s| {
                    format!("rule #{} ({}) skipped: {}", s.index, s.event_kind, s.reason)
                })),
                Err(e) => errors.push(e.to_string()),
            }
        }
        Err(e) => errors.push(e.to_string()),
    }

    let report = ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
        warnings,
    };
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

pub fn build_config_report(
    config: &WardenConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let rendered = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("server") => toml::to_string_pretty(&config.server),
        Some("log_pipeline") => toml::to_string_pretty(&config.log_pipeline),
        Some("queue") => toml::to_string_pretty(&config.queue),
        Some("metrics") => toml::to_string_pretty(&config.metrics),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml: rendered
            .map_err(|e| CliError::Command(format!("failed to render config: {e}")))?,
    })
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
        }
        for err in &self.errors {
            writeln!(w, "  Error: {}", err.red())?;
        }
        for warning in &self.warnings {
            writeln!(w, "  Warning: {}", warning.yellow())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WardenConfig {
        let mut config = WardenConfig::default();
        config.server.executable = "java".to_owned();
        config
    }

    #[test]
    fn test_show_full_config_contains_every_section() {
        let report = build_config_report(&config(), Path::new("warden.toml"), None).unwrap();
        for section in SECTIONS {
            assert!(
                report.config_toml.contains(&format!("[{section}]")),
                "missing section {section}"
            );
        }
    }

    #[test]
    fn test_show_single_section() {
        let report =
            build_config_report(&config(), Path::new("warden.toml"), Some("queue")).unwrap();
        assert!(report.config_toml.contains("poll_interval_ms"));
        assert!(!report.config_toml.contains("executable"));
        assert_eq!(report.section.as_deref(), Some("queue"));
    }

    #[test]
    fn test_show_unknown_section_is_rejected() {
        let err = build_config_report(&config(), Path::new("warden.toml"), Some("database"))
            .err()
            .expect("unknown section should fail");
        assert!(err.to_string().contains("unknown section: database"));
    }

    #[test]
    fn test_validation_report_render_lists_errors() {
        colored::control::set_override(false);
        let report = ConfigValidationReport {
            source: "warden.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'server.executable'".to_owned()],
            warnings: vec![],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("INVALID"));
        assert!(output.contains("server.executable"));
    }
}
