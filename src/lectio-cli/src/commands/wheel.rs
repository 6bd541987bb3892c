//! Fortune wheel command handlers

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use lectio::streak::applicable_bonus;
use lectio::wheel::{effective_weights, simulate as draw_many};
use lectio::{CatalogRepository, Engine, RewardStore, SegmentReward, SpinKind, SpinResult};
use serde::Serialize;

use super::{engine_error, print_json, progress::print_progress, rng};
use crate::cli::OutputFormat;

/// Handle `wheel spin`
pub fn spin<S: RewardStore>(
    engine: &Engine<S>,
    user: &str,
    paid: bool,
    seed: Option<u64>,
    now: DateTime<Utc>,
    format: OutputFormat,
) -> Result<SpinResult> {
    let kind = if paid { SpinKind::Paid } else { SpinKind::Free };
    let result = engine
        .spin_with_rng(user, kind, now, &mut rng(seed))
        .map_err(engine_error)?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_spin(&result),
    }
    Ok(result)
}

fn print_spin(result: &SpinResult) {
    println!(
        "{} spin on {}: {} ({})",
        result.kind,
        result.wheel_id,
        result.label,
        describe(&result.reward)
    );
    if result.experience > 0 {
        println!("  Experience: {}", result.experience);
    }
    if let Some(code) = &result.gift_code {
        println!("  Gift code:  {} (expires {})", code.code, code.expires_on);
    }
    println!(
        "  Streak:     {} day(s), best {}",
        result.streak.current_streak, result.streak.max_streak
    );
    if let Some(bonus) = &result.streak_bonus {
        println!("  Bonus:      {}-day streak bonus applied", bonus.threshold_days);
    }
    if result.level.leveled_up() {
        println!(
            "  Level up!   {} -> {}",
            result.level.before, result.level.after
        );
    }
    print_progress(&result.progress);
}

fn describe(reward: &SegmentReward) -> String {
    match reward {
        SegmentReward::Currency { amount } => format!("{} orydors", amount),
        SegmentReward::Experience { amount } => format!("{} XP", amount),
        SegmentReward::Item {
            reward_id,
            quantity,
        } => format!("{} x{}", reward_id, quantity),
        SegmentReward::GiftCard { value_cents } => {
            format!("gift card {}.{:02}", value_cents / 100, value_cents % 100)
        }
    }
}

/// One segment's share of a simulation
#[derive(Debug, Serialize)]
pub struct SimulationRow {
    pub label: String,
    pub weight: u32,
    pub effective_weight: f64,
    pub wins: u32,
    pub rate: f64,
}

/// Handle `wheel simulate`
pub fn simulate<S: RewardStore>(
    engine: &Engine<S>,
    trials: u32,
    streak: u32,
    date: Option<NaiveDate>,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<Vec<SimulationRow>> {
    let day = date.unwrap_or_else(|| Utc::now().date_naive());
    let wheel = engine
        .store()
        .active_wheel(day)?
        .with_context(|| format!("No wheel is active on {}", day))?;
    let bonuses = engine.store().streak_bonuses()?;
    let bonus = applicable_bonus(&bonuses, streak);
    let weights = effective_weights(
        &wheel.segments,
        bonus,
        engine.config().notable_currency_threshold,
    );
    let wins = draw_many(&weights, trials, &mut rng(seed));

    let rows: Vec<SimulationRow> = wheel
        .segments
        .iter()
        .zip(weights.iter().zip(&wins))
        .map(|(segment, (&effective_weight, &wins))| SimulationRow {
            label: segment.label.clone(),
            weight: segment.weight,
            effective_weight,
            wins,
            rate: if trials == 0 {
                0.0
            } else {
                f64::from(wins) / f64::from(trials)
            },
        })
        .collect();

    if format == OutputFormat::Json {
        print_json(&rows)?;
        return Ok(rows);
    }

    println!(
        "{} ({}), {} draws at a {}-day streak",
        wheel.name, wheel.id, trials, streak
    );
    println!(
        "{:<20} {:>8} {:>10} {:>8} {:>8}",
        "SEGMENT", "WEIGHT", "EFFECTIVE", "WINS", "RATE"
    );
    for row in &rows {
        println!(
            "{:<20} {:>8} {:>10.1} {:>8} {:>7.2}%",
            row.label,
            row.weight,
            row.effective_weight,
            row.wins,
            row.rate * 100.0
        );
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::seeded;
    use chrono::TimeZone;
    use lectio::{StreakBonus, StreakBonusKind, WheelConfig, WheelSegment};

    fn with_wheel() -> Engine<lectio::SqliteDb> {
        let engine = seeded();
        let segment = |label: &str, reward: SegmentReward, weight: u32| WheelSegment {
            label: label.to_string(),
            reward,
            weight,
        };
        engine
            .save_wheel(&WheelConfig {
                id: "daily".to_string(),
                name: "Daily".to_string(),
                premium_only: false,
                starts_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                ends_on: None,
                segments: vec![
                    segment("50", SegmentReward::Currency { amount: 50 }, 50),
                    segment("1000", SegmentReward::Currency { amount: 1000 }, 5),
                    segment("25 XP", SegmentReward::Experience { amount: 25 }, 45),
                ],
            })
            .unwrap();
        engine
            .save_streak_bonus(&StreakBonus {
                threshold_days: 7,
                kind: StreakBonusKind::ProbabilityBoost { factor: 2.0 },
            })
            .unwrap();
        engine
    }

    #[test]
    fn test_simulate_applies_streak_boost() {
        let engine = with_wheel();
        let day = NaiveDate::from_ymd_opt(2026, 10, 17);

        let plain = simulate(&engine, 1000, 0, day, Some(3), OutputFormat::Text).unwrap();
        assert_eq!(plain[1].effective_weight, 5.0);

        let boosted = simulate(&engine, 1000, 7, day, Some(3), OutputFormat::Json).unwrap();
        assert_eq!(boosted[1].effective_weight, 10.0);
        assert_eq!(boosted[0].effective_weight, 50.0);
        assert_eq!(boosted.iter().map(|r| r.wins).sum::<u32>(), 1000);
    }

    #[test]
    fn test_simulate_without_wheel() {
        let engine = seeded();
        let err = simulate(&engine, 10, 0, NaiveDate::from_ymd_opt(2026, 10, 17), None, OutputFormat::Text)
            .unwrap_err();
        assert!(err.to_string().contains("No wheel is active"));
    }

    #[test]
    fn test_free_spin_once_per_day() {
        let engine = with_wheel();
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();

        let result = spin(&engine, "alice", false, Some(11), now, OutputFormat::Text).unwrap();
        assert_eq!(result.streak.current_streak, 1);

        let err = spin(&engine, "alice", false, Some(12), now, OutputFormat::Text).unwrap_err();
        assert!(err.to_string().starts_with("You have already"));

        let paid = spin(&engine, "alice", true, Some(13), now, OutputFormat::Json).unwrap();
        assert_eq!(paid.kind, SpinKind::Paid);
    }

    #[test]
    fn test_describe_gift_card() {
        assert_eq!(
            describe(&SegmentReward::GiftCard { value_cents: 1050 }),
            "gift card 10.50"
        );
    }
}
