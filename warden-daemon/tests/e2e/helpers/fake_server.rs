//! A `/bin/sh` stand-in for a game server and a matching daemon config.

use tempfile::TempDir;
use warden_core::config::WardenConfig;

/// Prints a ready line, answers `list`, exits on `stop`, crashes on `crash`.
pub const FAKE_SERVER: &str = r#"
echo '[12:00:00] [Server thread/INFO]: Done (1.234s)! For help, type "help"'
while IFS= read -r line; do
  case "$line" in
    stop)
      echo '[12:00:09] [Server thread/INFO]: Stopping server'
      exit 0 ;;
    list)
      echo '[12:00:05] [Server thread/INFO]: There are 1 of a max of 20 players online: Alice' ;;
    crash)
      echo 'java.lang.OutOfMemoryError: Java heap space' >&2
      exit 3 ;;
    *)
      echo "[12:00:05] [Server thread/INFO]: Unknown command: $line" ;;
  esac
done
"#;

/// Daemon config running [`FAKE_SERVER`] with its queue inside `dir`.
pub fn fake_server_config(dir: &TempDir) -> WardenConfig {
    let mut config = WardenConfig::default();
    config.general.pid_file = String::new();
    config.server.executable = "/bin/sh".to_owned();
    config.server.args = vec!["-c".to_owned(), FAKE_SERVER.to_owned()];
    config.server.stop_grace_secs = 5;
    config.server.kill_wait_secs = 2;
    config.log_pipeline.rules_path = String::new();
    config.log_pipeline.builtin_rules = true;
    config.queue.dir = dir.path().join("queue").to_string_lossy().into_owned();
    config.queue.poll_interval_ms = 20;
    config.queue.quiet_period_ms = 100;
    config.queue.response_timeout_ms = 1000;
    config.metrics.enabled = false;
    config
}
