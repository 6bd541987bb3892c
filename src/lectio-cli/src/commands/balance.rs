//! Balance and level command handlers

use anyhow::Result;
use lectio::level::{level_for, threshold_for, xp_to_next_level};
use lectio::{Balance, Engine, GiftCode, InventoryEntry, RewardStore};
use serde::Serialize;

use super::{engine_error, print_json};
use crate::cli::OutputFormat;

/// Everything a user holds
#[derive(Debug, Serialize)]
pub struct Holdings {
    pub user_id: String,
    pub balance: Balance,
    pub level: u32,
    pub xp_to_next_level: u64,
    pub inventory: Vec<InventoryEntry>,
    pub gift_codes: Vec<GiftCode>,
}

/// Handle `balance`
pub fn balance<S: RewardStore>(engine: &Engine<S>, user: &str, format: OutputFormat) -> Result<Holdings> {
    let balance = engine.balance(user).map_err(engine_error)?;
    let xp = u64::try_from(balance.experience).unwrap_or(0);
    let holdings = Holdings {
        user_id: user.to_string(),
        balance,
        level: engine.level(user).map_err(engine_error)?,
        xp_to_next_level: xp_to_next_level(xp),
        inventory: engine.inventory(user).map_err(engine_error)?,
        gift_codes: engine.gift_codes(user).map_err(engine_error)?,
    };

    if format == OutputFormat::Json {
        print_json(&holdings)?;
        return Ok(holdings);
    }

    println!("Holdings of {}", holdings.user_id);
    println!("  Orydors:    {}", holdings.balance.orydors);
    println!(
        "  Experience: {} (level {}, {} to next)",
        holdings.balance.experience, holdings.level, holdings.xp_to_next_level
    );
    if !holdings.inventory.is_empty() {
        println!("\nInventory:");
        for entry in &holdings.inventory {
            println!("  {} x{}", entry.reward_id, entry.quantity);
        }
    }
    if !holdings.gift_codes.is_empty() {
        println!("\nGift codes:");
        for code in &holdings.gift_codes {
            println!(
                "  {} ({}.{:02}, expires {})",
                code.code,
                code.value_cents / 100,
                code.value_cents % 100,
                code.expires_on
            );
        }
    }
    Ok(holdings)
}

/// Handle `level`
pub fn level(xp: u64, format: OutputFormat) -> Result<()> {
    let level = level_for(xp);
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "xp": xp,
            "level": level,
            "level_starts_at": threshold_for(level),
            "xp_to_next_level": xp_to_next_level(xp),
        }))?,
        OutputFormat::Text => println!(
            "{} XP is level {} ({} to level {})",
            xp,
            level,
            xp_to_next_level(xp),
            level + 1
        ),
    }
    Ok(())
}
