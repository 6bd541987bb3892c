//! Save-time validation of admin-authored configuration.
//!
//! Resolution code trusts what is in the store, so everything that could
//! make a draw or a payout ill-defined is rejected here. `known` answers
//! whether a reward id exists in the catalog.

use crate::error::ValidationError;
use crate::types::*;
use std::collections::HashSet;

type Result<T = ()> = std::result::Result<T, ValidationError>;

/// Segment weights of a wheel must add up to this
pub const WHEEL_WEIGHT_TOTAL: u32 = 100;

/// Upper bound for a single skill bonus percentage
pub const MAX_BONUS_PERCENT: u32 = 1000;

fn non_empty(field: &str, value: &str) -> Result {
    if value.trim().is_empty() {
        return Err(ValidationError::invalid(field, "must not be empty"));
    }
    Ok(())
}

fn positive(field: &str, value: u32) -> Result {
    if value == 0 {
        return Err(ValidationError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

fn known_reward(known: &impl Fn(&str) -> bool, reward_id: &str) -> Result {
    if !known(reward_id) {
        return Err(ValidationError::UnknownReward(reward_id.to_string()));
    }
    Ok(())
}

pub fn reward(reward: &RewardDescriptor) -> Result {
    non_empty("id", &reward.id)?;
    non_empty("name", &reward.name)?;
    match &reward.kind {
        RewardKind::Currency { amount } | RewardKind::Experience { amount } => {
            positive("amount", *amount)
        }
        RewardKind::Fragment {
            collection,
            set_size,
        } => {
            non_empty("collection", collection)?;
            positive("set_size", *set_size)
        }
        RewardKind::Card { series, .. } => non_empty("series", series),
        RewardKind::Item { .. } => Ok(()),
    }
}

pub fn content(content: &ContentItem) -> Result {
    non_empty("id", &content.id)?;
    non_empty("title", &content.title)
}

pub fn loot_entry(entry: &LootTableEntry, known: &impl Fn(&str) -> bool) -> Result {
    if !entry.drop_chance.is_finite() || entry.drop_chance <= 0.0 || entry.drop_chance > 100.0 {
        return Err(ValidationError::invalid(
            "drop_chance",
            format!("{} is outside (0, 100]", entry.drop_chance),
        ));
    }
    positive("min_quantity", entry.min_quantity)?;
    if entry.min_quantity > entry.max_quantity {
        return Err(ValidationError::invalid(
            "max_quantity",
            format!(
                "{} is below min_quantity {}",
                entry.max_quantity, entry.min_quantity
            ),
        ));
    }
    match &entry.scope {
        LootScope::Global => {}
        LootScope::Genre(genre) => non_empty("scope", genre)?,
        LootScope::Content(id) => non_empty("scope", id)?,
    }
    known_reward(known, &entry.reward_id)
}

pub fn wheel(wheel: &WheelConfig, known: &impl Fn(&str) -> bool) -> Result {
    non_empty("id", &wheel.id)?;
    if wheel.segments.is_empty() {
        return Err(ValidationError::invalid("segments", "a wheel needs at least one segment"));
    }
    if let Some(end) = wheel.ends_on {
        if end < wheel.starts_on {
            return Err(ValidationError::invalid(
                "ends_on",
                format!("{} is before starts_on {}", end, wheel.starts_on),
            ));
        }
    }

    for (idx, segment) in wheel.segments.iter().enumerate() {
        let field = format!("segments[{}]", idx);
        positive(&format!("{}.weight", field), segment.weight)?;
        match &segment.reward {
            SegmentReward::Currency { amount } | SegmentReward::Experience { amount } => {
                positive(&format!("{}.amount", field), *amount)?
            }
            SegmentReward::Item {
                reward_id,
                quantity,
            } => {
                positive(&format!("{}.quantity", field), *quantity)?;
                known_reward(known, reward_id)?;
            }
            SegmentReward::GiftCard { value_cents } => {
                positive(&format!("{}.value_cents", field), *value_cents)?
            }
        }
    }

    let total: u64 = wheel.segments.iter().map(|s| u64::from(s.weight)).sum();
    if total != u64::from(WHEEL_WEIGHT_TOTAL) {
        return Err(ValidationError::invalid(
            "segments",
            format!("weights sum to {}, expected {}", total, WHEEL_WEIGHT_TOTAL),
        ));
    }
    Ok(())
}

pub fn streak_bonus(bonus: &StreakBonus) -> Result {
    positive("threshold_days", bonus.threshold_days)?;
    let factor = match bonus.kind {
        StreakBonusKind::ProbabilityBoost { factor } | StreakBonusKind::QuantityBoost { factor } => {
            factor
        }
    };
    if !factor.is_finite() || factor <= 1.0 {
        return Err(ValidationError::invalid(
            "factor",
            format!("{} must be greater than 1", factor),
        ));
    }
    Ok(())
}

pub fn skill_node(node: &SkillNode, known: &impl Fn(&str) -> bool) -> Result {
    non_empty("id", &node.id)?;
    positive("percent", node.bonus.percent())?;
    if node.bonus.percent() > MAX_BONUS_PERCENT {
        return Err(ValidationError::invalid(
            "percent",
            format!("must not exceed {}", MAX_BONUS_PERCENT),
        ));
    }
    match &node.bonus {
        SkillBonusKind::CurrencyByDay { weekdays, .. } => {
            if weekdays.is_empty() {
                return Err(ValidationError::invalid("weekdays", "must not be empty"));
            }
            if let Some(day) = weekdays.iter().find(|d| **d > 6) {
                return Err(ValidationError::invalid(
                    "weekdays",
                    format!("{} is not in 0 (Sunday) ..= 6 (Saturday)", day),
                ));
            }
            Ok(())
        }
        SkillBonusKind::CurrencyByGenre { genres, .. } => {
            if genres.is_empty() {
                return Err(ValidationError::invalid("genres", "must not be empty"));
            }
            Ok(())
        }
        SkillBonusKind::ExperienceBoost { .. } => Ok(()),
        SkillBonusKind::DropChanceBoost { reward_id, .. } => known_reward(known, reward_id),
    }
}

fn objective(objective: &ChallengeObjective, known: &impl Fn(&str) -> bool) -> Result {
    non_empty("objective.id", &objective.id)?;
    positive("target_count", objective.target_count)?;
    match &objective.objective {
        ObjectiveType::ReadBook { content_id } | ObjectiveType::ReadChaptersOfBook { content_id } => {
            non_empty("content_id", content_id)
        }
        ObjectiveType::ReadAnyBook => Ok(()),
        ObjectiveType::ReadBookFromSet { content_ids }
        | ObjectiveType::ReadChaptersOfSelection { content_ids } => {
            if content_ids.is_empty() {
                return Err(ValidationError::invalid("content_ids", "must not be empty"));
            }
            Ok(())
        }
        ObjectiveType::ReadBooksOfGenre { genres } | ObjectiveType::ReadChaptersOfGenre { genres } => {
            if genres.is_empty() {
                return Err(ValidationError::invalid("genres", "must not be empty"));
            }
            Ok(())
        }
        ObjectiveType::CollectItem { reward_id } => known_reward(known, reward_id),
    }
}

pub fn challenge(challenge: &Challenge, known: &impl Fn(&str) -> bool) -> Result {
    non_empty("id", &challenge.id)?;
    if challenge.ends_at <= challenge.starts_at {
        return Err(ValidationError::invalid("ends_at", "must be after starts_at"));
    }
    if challenge.objectives.is_empty() {
        return Err(ValidationError::invalid("objectives", "a challenge needs at least one objective"));
    }

    let mut seen = HashSet::new();
    for o in &challenge.objectives {
        if !seen.insert(o.id.as_str()) {
            return Err(ValidationError::invalid(
                "objectives",
                format!("duplicate objective id {}", o.id),
            ));
        }
        objective(o, known)?;
    }

    for grant in &challenge.payouts {
        positive("payouts.quantity", grant.quantity)?;
        known_reward(known, &grant.reward_id)?;
    }
    Ok(())
}
