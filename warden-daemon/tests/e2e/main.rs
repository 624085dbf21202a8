//! E2E integration tests for warden-daemon.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (mock pipelines, fake server config)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p warden-daemon --test e2e
//! ```

mod helpers;
mod scenarios;
