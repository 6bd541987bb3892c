//! Chest loot resolution.
//!
//! Pure: everything comes in through [`LootContext`] and the caller's RNG,
//! nothing is written. The chest path in [`crate::chest`] persists the result.

use crate::skills;
use crate::types::{ChestTier, ContentItem, LootTableEntry, SkillBonus};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// (band percent, selection weight) for silver chests
pub const SILVER_BANDS: &[(u32, u32)] = &[(50, 40), (75, 35), (100, 20), (125, 5)];

/// (band percent, selection weight) for gold chests
pub const GOLD_BANDS: &[(u32, u32)] = &[(100, 35), (125, 35), (150, 20), (200, 10)];

/// Band forced for administrative openings
pub const ADMIN_BAND_PERCENT: u32 = 200;

/// Inputs of one loot resolution
#[derive(Debug, Clone)]
pub struct LootContext<'a> {
    pub content: &'a ContentItem,
    pub tier: ChestTier,
    /// Unfiltered active bonuses of the user
    pub bonuses: &'a [SkillBonus],
    /// 0 = Sunday ... 6 = Saturday
    pub weekday: u8,
    /// Loot entries of the tier, any scope
    pub entries: &'a [LootTableEntry],
    /// Forces gold tier and the top band, without randomness
    pub admin_override: bool,
}

/// One loot entry that fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredReward {
    pub entry_id: i64,
    pub reward_id: String,
    pub quantity: u32,
}

/// Outcome of a loot resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardBundle {
    pub tier: ChestTier,
    pub band_percent: u32,
    pub base_value: u32,
    /// 100 + sum of applied currency bonus percentages
    pub multiplier_percent: u32,
    pub currency: u64,
    pub fired: Vec<FiredReward>,
    /// Bonuses that changed the outcome, for audit
    pub applied_bonuses: Vec<SkillBonus>,
}

fn bands_for(tier: ChestTier) -> &'static [(u32, u32)] {
    match tier {
        ChestTier::Silver => SILVER_BANDS,
        ChestTier::Gold => GOLD_BANDS,
    }
}

/// Draw a band percent from the tier's fixed distribution
pub fn draw_band<R: Rng + ?Sized>(tier: ChestTier, rng: &mut R) -> u32 {
    let bands = bands_for(tier);
    let total: u32 = bands.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for &(percent, weight) in bands {
        if roll < weight {
            return percent;
        }
        roll -= weight;
    }
    bands[bands.len() - 1].0
}

/// `floor(value * band/100 * (100 + bonus)/100)`, floored once at the end
pub fn currency_award(value: u32, band_percent: u32, bonus_percent: u32) -> u64 {
    u64::from(value)
        .saturating_mul(u64::from(band_percent))
        .saturating_mul(100 + u64::from(bonus_percent))
        / 10_000
}

/// Entries applying to the content: global, genre-matched and content-specific.
/// The same reward may appear from several scopes; each is rolled.
pub fn candidates<'a>(
    entries: &'a [LootTableEntry],
    content: &ContentItem,
    tier: ChestTier,
) -> Vec<&'a LootTableEntry> {
    entries
        .iter()
        .filter(|e| e.tier == tier && e.scope.applies_to(content))
        .collect()
}

/// Roll one entry. Returns the quantity if it fires.
pub fn roll_entry<R: Rng + ?Sized>(
    entry: &LootTableEntry,
    boost: f64,
    rng: &mut R,
) -> Option<u32> {
    let roll: f64 = rng.gen_range(0.0..100.0);
    if roll > entry.drop_chance + boost {
        return None;
    }
    let max = entry.max_quantity.max(entry.min_quantity);
    Some(rng.gen_range(entry.min_quantity..=max))
}

/// Resolve a chest's loot
pub fn resolve_loot<R: Rng + ?Sized>(ctx: &LootContext<'_>, rng: &mut R) -> RewardBundle {
    let (tier, band_percent) = if ctx.admin_override {
        (ChestTier::Gold, ADMIN_BAND_PERCENT)
    } else {
        (ctx.tier, draw_band(ctx.tier, rng))
    };

    let currency_bonuses = skills::currency_bonuses(ctx.bonuses, ctx.weekday, &ctx.content.genres);
    let bonus_percent = skills::total_percent(&currency_bonuses);
    let currency = currency_award(ctx.content.reward_value, band_percent, bonus_percent);

    let mut applied_bonuses: Vec<SkillBonus> = currency_bonuses.into_iter().cloned().collect();
    let mut fired = Vec::new();

    for entry in candidates(ctx.entries, ctx.content, tier) {
        let boosts = skills::drop_chance_boosts(ctx.bonuses, &entry.reward_id);
        let boost = f64::from(skills::total_percent(&boosts));
        for bonus in boosts {
            if !applied_bonuses.contains(bonus) {
                applied_bonuses.push(bonus.clone());
            }
        }
        if let Some(quantity) = roll_entry(entry, boost, rng) {
            fired.push(FiredReward {
                entry_id: entry.id,
                reward_id: entry.reward_id.clone(),
                quantity,
            });
        }
    }

    tracing::debug!(
        content = %ctx.content.id,
        %tier,
        band_percent,
        bonus_percent,
        currency,
        fired = fired.len(),
        "resolved loot"
    );

    RewardBundle {
        tier,
        band_percent,
        base_value: ctx.content.reward_value,
        multiplier_percent: 100u32.saturating_add(bonus_percent),
        currency,
        fired,
        applied_bonuses,
    }
}
