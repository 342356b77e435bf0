//! Command-line relay over a virtual network.
//!
//! Provides:
//! - Argument parsing and validation into run options
//! - The relay session: node bring-up, network join, one stream, teardown

pub mod commands;
pub mod config;

pub use commands::{execute, Command};
pub use config::{CliConfig, Options, UsageError};
