//! PID file creation, removal, and duplicate detection.

use std::fs;

use tempfile::TempDir;
use warden_daemon::pid_file::{remove_pid_file, write_pid_file};

#[test]
fn pid_file_contains_current_pid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.pid");

    write_pid_file(&path).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
}

#[test]
fn parent_directories_are_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run").join("warden").join("warden.pid");

    write_pid_file(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn existing_pid_file_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.pid");
    fs::write(&path, "12345\n").unwrap();

    let err = write_pid_file(&path).unwrap_err().to_string();
    assert!(err.contains("already exists"), "unexpected error: {err}");
    assert!(err.contains("12345"), "unexpected error: {err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), "12345\n");
}

#[cfg(unix)]
#[test]
fn pid_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.pid");
    write_pid_file(&path).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn remove_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.pid");
    write_pid_file(&path).unwrap();

    remove_pid_file(&path);
    assert!(!path.exists());
    // second call only logs a warning
    remove_pid_file(&path);
}
