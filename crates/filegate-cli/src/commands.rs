use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "filegate")]
#[command(about = "Content-addressed file deduplication gate", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the dedup pipeline over files and directories
    Process(ProcessArgs),
    /// Print index, journal, and orphan statistics
    Stats,
    /// List pending orphan records
    Orphans,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Parser)]
pub struct ProcessArgs {
    /// Files or directories to process
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recurse: bool,
    /// Emit one JSON record per file instead of colored lines
    #[arg(long)]
    pub json: bool,
}
