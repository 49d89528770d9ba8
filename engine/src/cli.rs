//! CLI interface for Superpilot
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines the commands and global flags of the `pilot` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ExecutionNature;

/// Superpilot task pilot
///
/// Turns a natural-language objective into ability invocations by repeatedly
/// asking a language model what to do next.
#[derive(Parser, Debug)]
#[command(name = "pilot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub settings_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive an objective to completion
    Run {
        /// The objective to pursue
        objective: String,

        /// Override the execution nature (sequential, parallel, auto, simple)
        #[arg(long, value_name = "MODE")]
        mode: Option<ExecutionNature>,

        /// Override the prompt strategy tag
        #[arg(long, value_name = "KIND")]
        strategy: Option<String>,
    },

    /// Write the default settings file
    MakeSettings {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List the abilities enabled by the settings
    Abilities,
}
