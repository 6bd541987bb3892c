//! Streak command handlers

use anyhow::Result;
use chrono::{DateTime, Utc};
use lectio::{Engine, RecoveryResult, RewardStore, UserStreak};

use super::{engine_error, print_json};
use crate::cli::OutputFormat;

/// Handle `streak show`
pub fn show<S: RewardStore>(engine: &Engine<S>, user: &str, format: OutputFormat) -> Result<UserStreak> {
    let streak = engine.streak(user).map_err(engine_error)?;

    match format {
        OutputFormat::Json => print_json(&streak)?,
        OutputFormat::Text => {
            println!("Streak of {}", streak.user_id);
            println!("  Current: {}", streak.current_streak);
            println!("  Best:    {}", streak.max_streak);
            match streak.last_participation_date {
                Some(day) => println!("  Last:    {}", day),
                None => println!("  Last:    never"),
            }
            if let Some(lost) = streak.broken_streak_value {
                println!("  Broken:  {} day(s), recoverable", lost);
            }
        }
    }
    Ok(streak)
}

/// Handle `streak recover`
pub fn recover<S: RewardStore>(
    engine: &Engine<S>,
    user: &str,
    now: DateTime<Utc>,
    format: OutputFormat,
) -> Result<RecoveryResult> {
    let result = engine.recover_streak(user, now).map_err(engine_error)?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => println!(
            "Restored a {}-day streak for {} orydors (now {} day(s))",
            result.restored, result.cost, result.streak.current_streak
        ),
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::seeded;
    use chrono::{NaiveDate, TimeZone};
    use lectio::{Currency, LedgerEntry, LedgerReason};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_show_unknown_history_is_zero() {
        let streak = show(&seeded(), "alice", OutputFormat::Text).unwrap();
        assert_eq!(streak.current_streak, 0);
        assert!(streak.last_participation_date.is_none());
    }

    #[test]
    fn test_recover_requires_broken_streak() {
        let err = recover(&seeded(), "alice", now(), OutputFormat::Text).unwrap_err();
        assert!(err.to_string().contains("could not be found"));
    }

    #[test]
    fn test_recover_restores_and_charges() {
        let engine = seeded();
        engine
            .store()
            .put_streak(&UserStreak {
                user_id: "alice".to_string(),
                current_streak: 1,
                max_streak: 9,
                last_participation_date: NaiveDate::from_ymd_opt(2026, 10, 17),
                broken_streak_value: Some(9),
            })
            .unwrap();
        engine
            .store()
            .adjust_balance(
                "alice",
                &LedgerEntry {
                    currency: Currency::Orydors,
                    amount: 500,
                    reason: LedgerReason::Chest,
                    reference_id: "seed".to_string(),
                },
            )
            .unwrap();

        let result = recover(&engine, "alice", now(), OutputFormat::Json).unwrap();
        assert_eq!(result.restored, 9);
        assert_eq!(engine.balance("alice").unwrap().orydors, 300);
    }
}
