//! CLI argument definitions for lectio
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod chest;
mod core;
mod progress;
mod streak;
mod wheel;

pub use chest::ChestCommand;
pub use core::{Cli, Commands, OutputFormat};
pub use progress::ProgressCommand;
pub use streak::StreakCommand;
pub use wheel::WheelCommand;
