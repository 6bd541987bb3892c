//! Chest command handlers

use anyhow::Result;
use chrono::{DateTime, Utc};
use lectio::{ChestResult, Engine, RewardStore};

use super::{engine_error, print_json, progress::print_progress, rng};
use crate::cli::OutputFormat;

/// Handle `chest open`
pub fn open<S: RewardStore>(
    engine: &Engine<S>,
    user: &str,
    content: &str,
    key: Option<&str>,
    seed: Option<u64>,
    now: DateTime<Utc>,
    format: OutputFormat,
) -> Result<ChestResult> {
    let result = engine
        .open_chest_with_rng(user, content, key, now, &mut rng(seed))
        .map_err(engine_error)?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_chest(&result),
    }
    Ok(result)
}

fn print_chest(result: &ChestResult) {
    let bundle = &result.bundle;
    println!(
        "Opened {} chest for {} ({})",
        bundle.tier, result.content_id, result.period_key
    );
    if result.admin {
        println!("  Administrator opening, no claim recorded");
    }
    if let Some(key) = &result.used_bypass {
        println!("  Spent key: {}", key);
    }
    println!(
        "  Band:       {}% of {} (x{}%)",
        bundle.band_percent,
        bundle.base_value,
        bundle.multiplier_percent
    );
    println!("  Orydors:    {}", result.orydors);
    if result.experience > 0 {
        println!("  Experience: {}", result.experience);
    }
    for delta in &result.inventory {
        println!("  Item:       {} x{}", delta.reward_id, delta.quantity);
    }
    if result.level.leveled_up() {
        println!(
            "  Level up!   {} -> {}",
            result.level.before, result.level.after
        );
    }
    print_progress(&result.progress);
}
