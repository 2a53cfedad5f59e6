use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelsort")]
#[command(author, version, about = "Media library ingest automation")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the ingest directory and process arriving files
    Start,

    /// Identify a single file: guess, candidates, score breakdown, planned path
    Identify {
        /// File to identify (only the name is parsed; the file need not exist)
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Identify every media file in a directory
    Batch {
        /// Directory to scan
        #[arg(required = true)]
        dir: PathBuf,
    },

    /// List queue items awaiting review
    Queue {
        /// Show all items regardless of status
        #[arg(long)]
        all: bool,
    },

    /// Approve a pending queue item and ingest it
    Approve {
        /// Source path of the queued file
        #[arg(required = true)]
        path: PathBuf,
    },

    /// Reject a pending queue item
    Reject {
        /// Source path of the queued file
        #[arg(required = true)]
        path: PathBuf,

        /// Why the item is being rejected
        #[arg(long)]
        reason: Option<String>,
    },

    /// Show ingest history
    History {
        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: i64,

        /// Filter by status (success | failed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show queue depth and ingest statistics
    Status,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default search if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
