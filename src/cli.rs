use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "realstate")]
#[command(author, version, about = "Real-estate store schema and connection management")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log every SQL statement
    #[arg(long, global = true)]
    pub echo: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create any missing tables
    Init,

    /// Drop every table and all data in them
    Teardown {
        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },

    /// Show which tables exist, their row counts, and pool state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Borrow a pooled connection and ping the store
    Check,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
