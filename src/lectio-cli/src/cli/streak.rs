//! Streak command CLI definitions

use clap::Subcommand;

#[derive(Subcommand)]
pub enum StreakCommand {
    /// Show the streak of a user
    Show {
        /// User id
        user: String,
    },

    /// Pay orydors to restore the last broken streak
    Recover {
        /// User id
        user: String,
    },
}
