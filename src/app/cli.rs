//! Command-Line Interface

use super::config::Config;
use crate::generator::OutputFormat;
use crate::resolver::PointerSample;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Gaze Grid - Generate gaze-direction portraits and resolve pointers to them
#[derive(Parser, Debug)]
#[command(name = "gaze-gen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Grid range overrides shared by several commands
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct GridArgs {
    /// Minimum pupil offset
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<f64>,

    /// Maximum pupil offset
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<f64>,

    /// Spacing between grid values
    #[arg(long)]
    pub step: Option<f64>,
}

/// Output overrides shared by several commands
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct OutputArgs {
    /// Output directory
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Square output size in pixels
    #[arg(long)]
    pub size: Option<u32>,

    /// Output encoding
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render every grid coordinate from a source face
    Generate {
        /// Source image: local file, http(s) URL or data URI
        #[arg(short, long)]
        image: String,

        #[command(flatten)]
        grid: GridArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Requests in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Keep files that already exist instead of re-requesting them
        #[arg(long)]
        skip_existing: bool,
    },

    /// List grid files missing from the output directory
    Check {
        #[command(flatten)]
        grid: GridArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Rebuild the index from the filenames in the output directory
    Reindex {
        #[command(flatten)]
        output: OutputArgs,

        /// Index every size and extension instead of the configured ones
        #[arg(long)]
        all: bool,
    },

    /// Resolve pointer samples against an index
    Resolve {
        #[command(flatten)]
        grid: GridArgs,

        /// Directory holding the index
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Container width in pixels
        #[arg(long, default_value = "400")]
        width: f64,

        /// Container height in pixels
        #[arg(long, default_value = "400")]
        height: f64,

        /// Pointer samples as `x,y`, relative to the container
        #[arg(required = true, allow_hyphen_values = true, value_parser = parse_sample)]
        samples: Vec<PointerSample>,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "grid.step", "output.size")
        key: String,

        /// Value to set
        value: String,
    },

    /// Get a specific configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Parse `x,y` into a pointer sample
pub fn parse_sample(s: &str) -> Result<PointerSample, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{}'", s))?;
    let x: f64 = x.trim().parse().map_err(|_| format!("invalid x in '{}'", s))?;
    let y: f64 = y.trim().parse().map_err(|_| format!("invalid y in '{}'", s))?;
    Ok(PointerSample::new(x, y))
}

impl GridArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(min) = self.min {
            config.grid.min = min;
        }
        if let Some(max) = self.max {
            config.grid.max = max;
        }
        if let Some(step) = self.step {
            config.grid.step = step;
        }
    }
}

impl OutputArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.out_dir {
            config.output.dir = dir.clone();
        }
        if let Some(size) = self.size {
            config.output.size = size;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
