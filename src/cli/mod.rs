//! Command-line front-end

pub mod commands;
pub mod config;

pub use commands::{cmd_hash, cmd_pending, cmd_show, cmd_sign, CliResult, ProposalInput};
pub use config::{load_config, ConfigError};
