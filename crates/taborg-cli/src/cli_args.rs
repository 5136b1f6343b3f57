//! CLI argument parsing for taborg.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taborg_config::OrganizeOption;

#[derive(Parser, Clone, Debug)]
#[command(name = "taborg")]
#[command(about = "Organize browser tabs into thematic groups with Gemini")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override the configured Gemini model
    #[arg(long, value_name = "MODEL", global = true)]
    pub model: Option<String>,

    /// Override the model call timeout
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Organize the tabs of a saved window (keyboard shortcut / popup button)
    Organize {
        /// Dissolve every group and regroup all tabs (saved as the default)
        #[arg(long, conflicts_with = "new")]
        all: bool,

        /// Only group tabs that are not in a group yet (saved as the default)
        #[arg(long)]
        new: bool,

        /// Window state JSON file; rewritten with the new groups
        #[arg(short, long, value_name = "FILE")]
        window: PathBuf,

        /// Run against the window but do not write the result back
        #[arg(long)]
        dry_run: bool,
    },

    /// Deliver a runtime message, e.g. '{"action":"organizeTabs","regroupAll":true}'
    Message {
        /// The message as JSON
        json: String,

        /// Window state JSON file; rewritten with the new groups
        #[arg(short, long, value_name = "FILE")]
        window: PathBuf,
    },

    /// Save the Gemini API key
    SetKey {
        key: String,
    },

    /// Set which tabs the keyboard shortcut organizes
    SetMode {
        /// 'new' or 'all'
        mode: OrganizeOption,
    },

    /// Show the stored preferences
    ShowPrefs,
}

impl Commands {
    /// Mode picked explicitly on the `organize` command line
    pub fn chosen_option(all: bool, new: bool) -> Option<OrganizeOption> {
        match (all, new) {
            (true, _) => Some(OrganizeOption::All),
            (false, true) => Some(OrganizeOption::New),
            (false, false) => None,
        }
    }
}
