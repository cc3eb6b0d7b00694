//! Command-line definition

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docshift-migrate")]
#[command(about = "Migration management tool for Docshift")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: config/docshift.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store connection string (memory://name or file://dir)
    #[arg(long, global = true)]
    pub uri: Option<String>,

    /// Database name
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Migrations directory path
    #[arg(long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the migrations directory and configuration file
    Init,

    /// Create a new migration file under the migrations directory
    New {
        /// The migration name
        #[arg(short, long)]
        name: Option<String>,

        /// The template file to use
        #[arg(short, long)]
        template_file: Option<PathBuf>,
    },

    /// Run all pending migrations
    Up,

    /// Undo migrations
    Down(DownArgs),

    /// Show the status of the migrations
    Status,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").required(true).args(["last", "all"])))]
pub struct DownArgs {
    /// Undo the last applied migration
    #[arg(short, long)]
    pub last: bool,

    /// Undo all applied migrations
    #[arg(short, long)]
    pub all: bool,

    /// With --all: undo newest first, one at a time, stopping at the first failure
    #[arg(long, requires = "all")]
    pub sequential: bool,
}
