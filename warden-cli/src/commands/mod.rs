//! Command handlers -- one module per subcommand

pub mod cmd;
pub mod config;
pub mod queue;
pub mod rules;
pub mod status;
