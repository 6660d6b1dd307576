//! BlobDB CLI
//!
//! Command-line tools for examining blob log files.
//!
//! # Commands
//!
//! - `inspect` - Display header, footer and derived state
//! - `verify` - Check every record and the footer summary
//! - `dump` - List records for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// BlobDB blob file tools.
#[derive(Parser)]
#[command(name = "blobdb")]
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
    /// Display header, footer and derived state of a blob file
    Inspect {
        /// Path to the blob file
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify record checksums and the footer summary
    Verify {
        /// Path to the blob file
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the records of a blob file
    Dump {
        /// Path to the blob file
        file: PathBuf,

        /// Maximum number of records to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip records stored before this offset
        #[arg(short, long, default_value = "0")]
        offset: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
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
        Commands::Inspect { file, format } => {
            commands::inspect::run(&file, &format)?;
        }
        Commands::Verify { file, format } => {
            commands::verify::run(&file, &format)?;
        }
        Commands::Dump {
            file,
            limit,
            offset,
            format,
        } => {
            commands::dump::run(&file, limit, offset, &format)?;
        }
    }

    Ok(())
}
