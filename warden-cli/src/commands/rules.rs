//! `warden rules` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use warden_core::bus::EventBus;
use warden_core::config::WardenConfig;
use warden_core::event::KIND_RAW_LOG_LINE;
use warden_core::types::OutputLine;
use warden_log_pipeline::{LogParser, RuleEngine, RuleLoader};

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::Validate { path } => {
            let path = match path {
                Some(path) => path,
                None => configured_rules_path(config_path).await?,
            };
            let report = validate_rules(&path).await?;
            writer.render(&report)?;
            if report.invalid > 0 {
                return Err(CliError::Rule(format!("{} invalid rules", report.invalid)));
            }
            Ok(())
        }
        RulesAction::Test { line, rules } => {
            let engine = match rules {
                Some(path) => RuleEngine::load(&path.display().to_string(), true).await?,
                None => {
                    let config = WardenConfig::load(config_path).await?;
                    RuleEngine::load(
                        &config.log_pipeline.rules_path,
                        config.log_pipeline.builtin_rules,
                    )
                    .await?
                }
            };
            writer.render(&test_line(engine, &line))
        }
    }
}

async fn configured_rules_path(config_path: &Path) -> Result<PathBuf, CliError> {
    let config = WardenConfig::load(config_path).await?;
    if config.log_pipeline.rules_path.is_empty() {
        return Err(CliError::Config(
            "log_pipeline.rules_path is empty; pass a path to validate".to_owned(),
        ));
    }
    Ok(PathBuf::from(config.log_pipeline.rules_path))
}

/// Load every rule file under `path` and compile each one on its own so that
/// problems are reported per file.
pub async fn validate_rules(path: &Path) -> Result<RuleValidationReport, CliError> {
    info!(path = %path.display(), "validating line rules");

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| CliError::Rule(format!("cannot read {}: {e}", path.display())))?;
    let files = if metadata.is_dir() {
        yaml_files(path).await?
    } else {
        vec![path.to_path_buf()]
    };

    let mut report = RuleValidationReport {
        path: path.display().to_string(),
        files: files.len(),
        valid: 0,
        invalid: 0,
        errors: Vec::new(),
    };

    for file in files {
        let source = file.display().to_string();
        match RuleLoader::load_file(&file).await {
            Ok(rules) => {
                let engine = RuleEngine::compile(rules);
                report.valid += engine.rule_count();
                report.invalid += engine.skipped().len();
                report
                    .errors
                    .extend(engine.skipped().iter().map(|skipped| RuleError {
                        source: format!("{source} (rule #{}, {})", skipped.index, skipped.event_kind),
                        error: skipped.reason.clone(),
                    }));
            }
            Err(e) => {
                report.invalid += 1;
                report.errors.push(RuleError {
                    source,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

async fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml")
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse `line` the way the daemon would and describe the resulting event.
pub fn test_line(engine: RuleEngine, line: &str) -> LineTestReport {
    let rule_index = engine.match_line(line).map(|m| m.rule_index);
    let parser = LogParser::new(engine, Arc::new(EventBus::new()), 1);
    let event = parser.parse(&OutputLine::stdout(line));

    LineTestReport {
        line: line.to_owned(),
        matched: event.kind != KIND_RAW_LOG_LINE,
        rule_index,
        event_kind: event.kind,
        fields: event.fields,
    }
}

#[derive(Debug, Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<RuleError>,
}

#[derive(Debug, Serialize)]
pub struct RuleError {
    pub source: String,
    pub error: String,
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Files: {}, rules: {} valid, {} invalid",
            self.files,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                writeln!(w, "  {}: {}", e.source.red(), e.error)?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct LineTestReport {
    pub line: String,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
    pub event_kind: String,
    pub fields: BTreeMap<String, String>,
}

impl Render for LineTestReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match self.rule_index {
            Some(index) => writeln!(
                w,
                "{} (rule #{index})",
                self.event_kind.green().bold()
            )?,
            None => writeln!(w, "{} (no rule matched)", self.event_kind.yellow())?,
        }
        for (name, value) in &self.fields {
            writeln!(w, "  {name} = {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_reports_matching_rule_and_fields() {
        let report = test_line(RuleEngine::with_default_rules(), "[12:00:00] [Server thread/INFO]: Alice joined the game");
        assert!(report.matched);
        assert_eq!(report.event_kind, "PlayerJoin");
        assert_eq!(report.fields.get("player_name").map(String::as_str), Some("Alice"));
        assert!(report.rule_index.is_some());
    }

    #[test]
    fn test_line_without_match_is_raw_log_line() {
        let report = test_line(RuleEngine::empty(), "Preparing spawn area: 42%");
        assert!(!report.matched);
        assert_eq!(report.event_kind, KIND_RAW_LOG_LINE);
        assert!(report.rule_index.is_none());
        assert_eq!(
            report.fields.get("line").map(String::as_str),
            Some("Preparing spawn area: 42%")
        );
    }

    #[tokio::test]
    async fn validate_reports_bad_pattern_and_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "rules:\n  - pattern: '(\\w+) joined the game$'\n    event_kind: PlayerJoin\n    field_names: [player_name]\n  - pattern: '(unclosed'\n    event_kind: Broken\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.yaml"), "rules: [ this is not").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let report = validate_rules(dir.path()).await.unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 2);
        assert!(report.errors[0].source.contains("Broken"));
        assert!(report.errors[1].source.ends_with("b.yaml"));
    }

    #[tokio::test]
    async fn validate_missing_path_is_rule_error() {
        let err = validate_rules(Path::new("/nonexistent/rules")).await.unwrap_err();
        assert!(matches!(err, CliError::Rule(_)));
    }
}
