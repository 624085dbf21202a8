//! Logging initialization for warden-daemon.
//!
//! The daemon's own messages and the supervised server's output share one
//! subscriber. Server output is logged under [`SERVER_OUTPUT_TARGET`] and is
//! capped at `info` unless the filter names that target explicitly, so
//! `log_level = "debug"` does not echo every console line.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use warden_core::config::GeneralConfig;

/// Target of server output lines and log-derived events.
pub const SERVER_OUTPUT_TARGET: &str = "warden::server";

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `config.log_level`.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config.log_level, rust_log.as_deref())?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };
    result.with_context(|| {
        format!(
            "failed to initialize {} tracing subscriber",
            config.log_format
        )
    })
}

/// Build the filter from `RUST_LOG` (if set and non-empty) or the configured level.
fn build_filter(log_level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    let mut directives = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(log_level)
        .to_owned();
    if !directives.contains(SERVER_OUTPUT_TARGET) {
        directives.push_str(&format!(",{SERVER_OUTPUT_TARGET}=info"));
    }

    EnvFilter::try_new(&directives).with_context(|| format!("invalid log filter '{directives}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..Default::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn server_output_is_capped_by_default() {
        let filter = build_filter("debug", None).unwrap().to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("warden::server=info"));
    }

    #[test]
    fn explicit_server_target_is_kept() {
        let filter = build_filter("info,warden::server=trace", None)
            .unwrap()
            .to_string();
        assert!(filter.contains("warden::server=trace"));
        assert!(!filter.contains("warden::server=info"));
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let filter = build_filter("info", Some("warn")).unwrap().to_string();
        assert!(filter.contains("warn"));
        assert!(build_filter("error", Some("   ")).unwrap().to_string().contains("error"));
    }

    #[test]
    fn invalid_directive_is_an_error() {
        let err = build_filter("info,warden=verbose", None).unwrap_err();
        assert!(err.to_string().contains("invalid log filter"));
    }
}
