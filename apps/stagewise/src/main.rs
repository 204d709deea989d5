//! # Stagewise - Staged Lifecycle Simulator
//!
//! The main binary for the Stagewise lifecycle engine.
//!
//! This application provides:
//! - Scenario validation
//! - Scenario runs on a simulated clock
//! - A listing of the registered operations
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/stagewise (THE BINARY)            │
//! │                                                       │
//! │  ┌─────────────┐    ┌─────────────┐    ┌───────────┐  │
//! │  │   CLI       │    │  Scenario   │    │  Agenda   │  │
//! │  │  (clap)     │    │  (toml)     │    │  (ticks)  │  │
//! │  └──────┬──────┘    └──────┬──────┘    └─────┬─────┘  │
//! │         │                  │                 │        │
//! │         └──────────────────┼─────────────────┘        │
//! │                            ▼                          │
//! │                   ┌────────────────┐                  │
//! │                   │ stagewise-core │                  │
//! │                   │  (THE LOGIC)   │                  │
//! │                   └────────────────┘                  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! stagewise validate -s shutdown.toml
//! stagewise run -s shutdown.toml --json-mode
//! stagewise operations
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing; STAGEWISE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("STAGEWISE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "stagewise=debug,stagewise_core=debug"
    } else {
        "stagewise=info,stagewise_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Stagewise startup banner.
fn print_banner() {
    println!(
        r#"
  stagewise v{}

  Staged • Barriered • Deterministic
"#,
        env!("CARGO_PKG_VERSION")
    );
}
