//! Challenge progress command CLI definitions

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProgressCommand {
    /// Report a finished book
    Book {
        /// User id
        user: String,

        /// Content item id
        content: String,

        /// Genres of the book (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        genres: Vec<String>,
    },

    /// Report a finished chapter
    Chapter {
        /// User id
        user: String,

        /// Book id the chapter belongs to
        book: String,

        /// Genres of the book (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        genres: Vec<String>,
    },

    /// Report collected items
    Item {
        /// User id
        user: String,

        /// Reward id of the collected item
        reward: String,

        /// Number collected
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },

    /// Show progress on one objective
    Show {
        /// Objective id
        objective: String,

        /// Individual progress of this user
        #[arg(long, conflicts_with = "guild", required_unless_present = "guild")]
        user: Option<String>,

        /// Shared progress of this guild
        #[arg(long)]
        guild: Option<String>,
    },
}
