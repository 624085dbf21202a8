#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod io;
pub mod process;
pub mod supervisor;

pub use config::{SupervisorConfig, SupervisorConfigBuilder};
pub use error::SupervisorError;
pub use io::LineTail;
pub use process::{ProcessMetrics, ProcessSampler};
pub use supervisor::{ExitInfo, ServerSupervisor};
