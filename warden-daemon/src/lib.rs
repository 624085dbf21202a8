//! Warden daemon library.
//!
//! Exposes the daemon's building blocks for integration testing.
//! In production, `warden-daemon` is used as a binary (main.rs).

pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod modules;
pub mod orchestrator;
pub mod pid_file;
