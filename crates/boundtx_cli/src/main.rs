//! boundtx CLI
//!
//! Command-line tools for exercising the boundtx transaction manager
//! against the in-memory store.
//!
//! # Commands
//!
//! - `demo` - Walk through commit, rollback and unit-of-work scenarios
//! - `torture` - Run many failing and succeeding units on a thread pool
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use tracing_subscriber::EnvFilter;

/// boundtx command-line tools.
#[derive(Parser)]
#[command(name = "boundtx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through commit, rollback and unit-of-work scenarios
    Demo,

    /// Run concurrent units of work, every odd one failing
    Torture {
        /// Number of units of work
        #[arg(short, long, default_value = "1000")]
        units: usize,

        /// Number of worker threads
        #[arg(short, long, default_value = "50")]
        threads: usize,

        /// Seconds allowed for all units to finish
        #[arg(long, default_value = "15")]
        timeout_secs: u64,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Demo => {
            commands::demo::run()?;
        }
        Commands::Torture {
            units,
            threads,
            timeout_secs,
            format,
        } => {
            commands::torture::run(units, threads, timeout_secs, format)?;
        }
        Commands::Version => {
            println!("boundtx CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("boundtx Core v{}", boundtx_core::VERSION);
        }
    }

    Ok(())
}
