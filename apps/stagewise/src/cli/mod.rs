//! # Stagewise CLI Module
//!
//! This module implements the CLI interface for Stagewise.
//!
//! ## Available Commands
//!
//! - `run` - Run a scenario on the simulated clock
//! - `validate` - Check a scenario without running it
//! - `operations` - List the registered operations

mod commands;

use clap::{Parser, Subcommand};
use stagewise_core::LifecycleError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stagewise - Staged Lifecycle Simulator
///
/// Drives shutdown, startup and failure operations through a component tree,
/// one barriered stage at a time.
#[derive(Parser, Debug)]
#[command(name = "stagewise")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario and print the report
    Run {
        /// Path to the scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// Check a scenario without running it
    Validate {
        /// Path to the scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// List the registered operations
    Operations,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), LifecycleError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Run { scenario }) => cmd_run(&scenario, json_mode),
        Some(Commands::Validate { scenario }) => cmd_validate(&scenario, json_mode),
        Some(Commands::Operations) | None => cmd_operations(json_mode),
    }
}
