//! Chest command CLI definitions

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ChestCommand {
    /// Open the chest of a content item for the current period
    Open {
        /// User id
        user: String,

        /// Content item id
        content: String,

        /// Chest key to spend if the chest was already claimed this period
        #[arg(short, long)]
        key: Option<String>,

        /// Seed the random draws for a reproducible result
        #[arg(long)]
        seed: Option<u64>,
    },
}
