//! Skill bonus aggregation and context filtering.
//!
//! Both the chest and the wheel path read the same unfiltered list once per
//! request and then narrow it down with the filters below for each context
//! (today's weekday, the content's genres, a specific reward).

use crate::repository::{ProfileRepository, RepoResult};
use crate::types::{SkillBonus, SkillBonusKind};
use chrono::{DateTime, Datelike, Utc};

/// Active bonuses of a user, unfiltered by context.
///
/// Users without any skill investment get an empty list.
pub fn active_bonuses<R: ProfileRepository + ?Sized>(
    repo: &R,
    user_id: &str,
) -> RepoResult<Vec<SkillBonus>> {
    let bonuses = repo.unlocked_skill_bonuses(user_id)?;
    tracing::debug!(user = user_id, count = bonuses.len(), "loaded skill bonuses");
    Ok(bonuses)
}

/// Weekday index used by day bonuses: 0 = Sunday ... 6 = Saturday
pub fn weekday_index(now: DateTime<Utc>) -> u8 {
    now.weekday().num_days_from_sunday() as u8
}

/// Currency bonuses applying today to content with the given genres
pub fn currency_bonuses<'a>(
    bonuses: &'a [SkillBonus],
    weekday: u8,
    genres: &[String],
) -> Vec<&'a SkillBonus> {
    bonuses
        .iter()
        .filter(|bonus| match &bonus.kind {
            SkillBonusKind::CurrencyByDay { weekdays, .. } => weekdays.contains(&weekday),
            SkillBonusKind::CurrencyByGenre {
                genres: bonus_genres,
                ..
            } => bonus_genres.iter().any(|g| genres.contains(g)),
            _ => false,
        })
        .collect()
}

/// Drop chance boosts targeting one reward
pub fn drop_chance_boosts<'a>(bonuses: &'a [SkillBonus], reward_id: &str) -> Vec<&'a SkillBonus> {
    bonuses
        .iter()
        .filter(|bonus| {
            matches!(
                &bonus.kind,
                SkillBonusKind::DropChanceBoost { reward_id: target, .. } if target == reward_id
            )
        })
        .collect()
}

/// Summed drop chance boost for one reward, in percentage points
pub fn drop_chance_boost_for(bonuses: &[SkillBonus], reward_id: &str) -> f64 {
    f64::from(total_percent(&drop_chance_boosts(bonuses, reward_id)))
}

/// Experience boosts, which apply to every XP grant
pub fn experience_bonuses(bonuses: &[SkillBonus]) -> Vec<&SkillBonus> {
    bonuses
        .iter()
        .filter(|bonus| matches!(bonus.kind, SkillBonusKind::ExperienceBoost { .. }))
        .collect()
}

/// Sum of the percentages of the given bonuses
pub fn total_percent(bonuses: &[&SkillBonus]) -> u32 {
    bonuses
        .iter()
        .fold(0u32, |acc, b| acc.saturating_add(b.kind.percent()))
}

/// `floor(amount * (100 + percent) / 100)` without going through floats
pub fn apply_percent(amount: u64, percent: u32) -> u64 {
    amount.saturating_mul(100 + u64::from(percent)) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bonus(skill: &str, kind: SkillBonusKind) -> SkillBonus {
        SkillBonus {
            skill_id: skill.to_string(),
            kind,
        }
    }

    fn sample() -> Vec<SkillBonus> {
        vec![
            bonus(
                "weekend-reader",
                SkillBonusKind::CurrencyByDay {
                    percent: 20,
                    weekdays: vec![0, 6],
                },
            ),
            bonus(
                "saturday-scholar",
                SkillBonusKind::CurrencyByDay {
                    percent: 10,
                    weekdays: vec![6],
                },
            ),
            bonus(
                "fantasy-fan",
                SkillBonusKind::CurrencyByGenre {
                    percent: 15,
                    genres: vec!["fantasy".to_string()],
                },
            ),
            bonus("quick-learner", SkillBonusKind::ExperienceBoost { percent: 25 }),
            bonus(
                "key-finder",
                SkillBonusKind::DropChanceBoost {
                    percent: 5,
                    reward_id: "chest-key".to_string(),
                },
            ),
        ]
    }

    #[test]
    fn test_currency_bonuses_by_day() {
        let bonuses = sample();
        let saturday = currency_bonuses(&bonuses, 6, &[]);
        assert_eq!(total_percent(&saturday), 30);
        let monday = currency_bonuses(&bonuses, 1, &[]);
        assert!(monday.is_empty());
    }

    #[test]
    fn test_currency_bonuses_by_genre() {
        let bonuses = sample();
        let genres = vec!["romance".to_string(), "fantasy".to_string()];
        let applied = currency_bonuses(&bonuses, 1, &genres);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].skill_id, "fantasy-fan");
    }

    #[test]
    fn test_drop_chance_boost_targets_reward() {
        let bonuses = sample();
        assert_eq!(drop_chance_boost_for(&bonuses, "chest-key"), 5.0);
        assert_eq!(drop_chance_boost_for(&bonuses, "card-7"), 0.0);
    }

    #[test]
    fn test_total_percent_saturates() {
        let half = u32::MAX / 2 + 1;
        let bonuses = vec![
            bonus(
                "a",
                SkillBonusKind::CurrencyByDay {
                    percent: half,
                    weekdays: vec![1],
                },
            ),
            bonus(
                "b",
                SkillBonusKind::CurrencyByDay {
                    percent: half,
                    weekdays: vec![1],
                },
            ),
        ];
        let monday = currency_bonuses(&bonuses, 1, &[]);
        assert_eq!(total_percent(&monday), u32::MAX);
    }

    #[test]
    fn test_drop_chance_boosts_lists_matching_bonuses() {
        let mut bonuses = sample();
        bonuses.push(bonus(
            "key-hoarder",
            SkillBonusKind::DropChanceBoost {
                percent: 3,
                reward_id: "chest-key".to_string(),
            },
        ));
        let boosts = drop_chance_boosts(&bonuses, "chest-key");
        let ids: Vec<&str> = boosts.iter().map(|b| b.skill_id.as_str()).collect();
        assert_eq!(ids, ["key-finder", "key-hoarder"]);
        assert_eq!(drop_chance_boost_for(&bonuses, "chest-key"), 8.0);
        assert!(drop_chance_boosts(&bonuses, "card-7").is_empty());
    }

    #[test]
    fn test_experience_boost() {
        let bonuses = sample();
        let xp = experience_bonuses(&bonuses);
        assert_eq!(total_percent(&xp), 25);
        assert_eq!(apply_percent(100, 25), 125);
        assert_eq!(apply_percent(7, 25), 8);
        assert_eq!(apply_percent(40, 0), 40);
    }

    #[test]
    fn test_weekday_index_starts_on_sunday() {
        let sunday = crate::types::parse_timestamp("2026-10-18T10:00:00Z").unwrap();
        assert_eq!(weekday_index(sunday), 0);
        let saturday = crate::types::parse_timestamp("2026-10-17T10:00:00Z").unwrap();
        assert_eq!(weekday_index(saturday), 6);
    }
}
