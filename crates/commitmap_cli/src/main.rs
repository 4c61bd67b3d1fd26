//! commitmap CLI
//!
//! Command-line tools for inspecting commit index tables.
//!
//! # Commands
//!
//! - `inspect` - Display table header and record statistics
//! - `verify` - Check every record checksum
//! - `dump` - Print every stored commit with its index
//! - `find` - Look up commits by hash prefix

mod commands;

use clap::{Parser, Subcommand};
use commands::{CliResult, OutputFormat, SessionArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// commitmap command-line index tools.
#[derive(Parser)]
#[command(name = "commitmap")]
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
    /// Display table header and record statistics
    Inspect {
        /// Path to the table file
        #[arg(short, long)]
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Verify every record checksum in a table file
    Verify {
        /// Path to the table file
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Print every stored commit
    Dump {
        #[command(flatten)]
        session: SessionArgs,

        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Find commits whose hash starts with a prefix
    Find {
        #[command(flatten)]
        session: SessionArgs,

        /// Hex hash prefix
        prefix: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { path, format } => commands::inspect::run(&path, format)?,
        Commands::Verify { path } => commands::verify::run(&path)?,
        Commands::Dump {
            session,
            limit,
            format,
        } => commands::dump::run(&session, limit, format)?,
        Commands::Find {
            session,
            prefix,
            format,
        } => commands::find::run(&session, &prefix, format)?,
        Commands::Version => {
            println!("commitmap CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("commitmap core v{}", commitmap_core::CRATE_VERSION);
            println!("index schema version {}", commitmap_core::VERSION);
        }
    }

    Ok(())
}
