//! E2E test scenarios.

mod command_flow;
mod fault_isolation;
mod lifecycle;
