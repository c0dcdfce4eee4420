//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// callsift - Enrich call transcripts with summaries, contacts, sentiment and interest
#[derive(Parser, Debug)]
#[command(name = "callsift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Runs the enrichment pipeline when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enrich every unprocessed call record once
    Run {
        /// Maximum model calls in flight (overrides pipeline.concurrency)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Import transcript files (or directories of .txt files) into the store
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List stored call records
    List {
        /// Maximum number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Only show records that are not enriched yet
        #[arg(short, long)]
        pending: bool,
    },

    /// View a call record and its enrichment
    View {
        /// Record ID or ID prefix
        id: String,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store and processed-log counts
    Status,

    /// Clear the failure count of a quarantined record
    Retry {
        /// Record ID or ID prefix
        id: String,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}
