//! Core CLI definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::chest::ChestCommand;
use super::progress::ProgressCommand;
use super::streak::StreakCommand;
use super::wheel::WheelCommand;

/// How command results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "lectio")]
#[command(about = "Reward resolution and progression engine", long_about = None)]
pub struct Cli {
    /// Path to database file (can also set LECTIO_DB env var)
    #[arg(short, long, global = true, env = "LECTIO_DB")]
    pub db: Option<PathBuf>,

    /// Output format: text (default), json
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Set the default database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// Create the database and apply migrations
    Init,

    /// Import a JSON catalog (rewards, loot tables, wheels, challenges, users)
    Import {
        /// Path to the catalog document
        file: PathBuf,
    },

    /// Chest operations
    Chest {
        #[command(subcommand)]
        command: ChestCommand,
    },

    /// Fortune wheel operations (spin, simulate)
    #[command(visible_alias = "w")]
    Wheel {
        #[command(subcommand)]
        command: WheelCommand,
    },

    /// Daily streak operations (show, recover)
    Streak {
        #[command(subcommand)]
        command: StreakCommand,
    },

    /// Report activity to challenges and inspect progress
    #[command(visible_alias = "p")]
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },

    /// Show balances, level, inventory and gift codes of a user
    #[command(visible_alias = "b")]
    Balance {
        /// User id
        user: String,
    },

    /// Show the level for an experience total
    Level {
        /// Experience points
        xp: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["lectio", "balance", "alice", "--format", "json", "--db", "x.db"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(cli.command, Commands::Balance { ref user } if user == "alice"));
    }
}
