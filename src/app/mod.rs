//! Application Layer
//!
//! `gaze-gen` command-line parsing and the TOML configuration it reads.

pub mod cli;
pub mod config;

pub use cli::{Cli, Commands, ConfigAction};
pub use config::Config;
