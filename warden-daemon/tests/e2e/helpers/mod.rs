//! Shared E2E test helpers.

pub mod fake_server;
pub mod mock_pipeline;
