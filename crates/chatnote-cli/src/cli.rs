use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatnote")]
#[command(about = "Sync ChatGPT conversations into your notes without duplicates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the sync store (overrides SYNC_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sweep the export folder, then sync changes until Ctrl-C
    Watch {
        /// Folder to watch (overrides CHATGPT_DATA_PATH)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
        /// Write to an in-memory sink and leave the sync store untouched
        #[arg(long)]
        dry_run: bool,
    },
    /// Sync a folder or a single export file once
    Scan {
        /// Folder or file to scan (defaults to CHATGPT_DATA_PATH)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
        /// Write to an in-memory sink and leave the sync store untouched
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync store counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the note mapped to a conversation id or file path
    Lookup {
        /// Identity key (conversation id or canonical file path)
        identity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear sync history so every file is synced again
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
}
