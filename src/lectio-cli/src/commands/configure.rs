//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up lectio CLI defaults.

use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;

/// Handle the configure command
pub fn handle(database: Option<PathBuf>, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if let Some(path) = database {
        config.database = Some(path.clone());
        config.save()?;
        println!("Database configured: {}", path.display());
        if let Ok(path) = Config::config_path() {
            println!("Config saved to: {}", path.display());
        }
    } else {
        show_usage();
    }

    Ok(())
}

/// Display current configuration
fn show_config(config: &Config) {
    match &config.database {
        Some(path) => println!("Database: {}", path.display()),
        None => println!("Database: {} (default)", lectio::DEFAULT_DB_PATH),
    }

    let engine = &config.engine;
    println!("Notable currency threshold: {}", engine.notable_currency_threshold);
    println!("Streak recovery cost:       {}", engine.streak_recovery_cost);
    println!("Gift code validity:         {} months", engine.gift_code_validity_months);
    println!("Spin attempts:              {}", engine.spin_attempts);
    println!("Progress write attempts:    {}", engine.progress_write_attempts);

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: lectio configure --database PATH");
    println!("   or: lectio configure --show");
    println!();
    println!("Engine tunables live in the [engine] table of the config file.");
}
