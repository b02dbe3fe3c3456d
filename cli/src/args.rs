use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "draft")]
#[command(about = "Inspect and edit versioned exercise drafts", long_about = None)]
pub struct Cli {
    /// SQLite database holding the drafts
    pub db: PathBuf,

    /// Exercise content as JSON
    pub exercise: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the draft for the current content, creating it if needed
    Init,

    /// Show the current draft, or the draft of an explicit version
    Show { version: Option<String> },

    /// Store a file's content into one slot
    Save {
        slot: String,
        file: PathBuf,

        /// Bypass the anti-clobber guards
        #[arg(long)]
        force: bool,
    },

    /// Put every slot back to its starter
    Reset,

    /// Delete the current draft
    Clear,

    /// List drafts of other versions and the banner state
    Versions,

    /// Hide the "exercise updated" banner for the current version
    Dismiss,

    /// Archive a pre-versioning draft stored under the bare key
    Migrate,
}
