//! CLI tool for inspecting network topologies.
//!
//! Provides commands for:
//! - Loading a host listing into a topology
//! - Dumping racks and hosts
//! - Distance and same-rack checks
//! - Random selection, replica sorting and pipeline construction

pub mod commands;
pub mod config;
pub mod hosts;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
