//! Fortune wheel command CLI definitions

use chrono::NaiveDate;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum WheelCommand {
    /// Spin today's wheel
    Spin {
        /// User id
        user: String,

        /// Paid spin (payment is settled before this call)
        #[arg(long)]
        paid: bool,

        /// Seed the random draws for a reproducible result
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Draw the active wheel repeatedly without writing anything
    Simulate {
        /// Number of draws
        #[arg(short, long, default_value_t = 10_000)]
        trials: u32,

        /// Streak length to apply bonuses for
        #[arg(long, default_value_t = 0)]
        streak: u32,

        /// Day to pick the active wheel for (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Seed the random draws for a reproducible result
        #[arg(long)]
        seed: Option<u64>,
    },
}
