//! Daily participation streaks.
//!
//! A streak advances at most once per calendar day, on the first spin of
//! that day. Missing a day resets it to 1 and remembers the lost value so it
//! can be bought back with [`Engine::recover_streak`].

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::repository::{RecoveryOutcome, RewardStore};
use crate::types::{StreakBonus, UserStreak};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Streak before and after a participation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakTransition {
    /// Record as read before the transition, used as the compare-and-swap guard
    pub before: Option<UserStreak>,
    pub after: UserStreak,
    /// Whether a running streak was lost on this transition
    pub broke: bool,
}

/// Apply today's participation to the stored streak
pub fn advance(previous: Option<&UserStreak>, user_id: &str, today: NaiveDate) -> StreakTransition {
    let mut streak = previous
        .cloned()
        .unwrap_or_else(|| UserStreak::new(user_id));
    let previous_date = streak.last_participation_date;
    let mut broke = false;

    match previous_date {
        // Already counted today, or a clock-skewed future date
        Some(last) if last >= today => {}
        Some(last) if last.succ_opt() == Some(today) => {
            streak.current_streak = streak.current_streak.saturating_add(1);
        }
        _ => {
            if streak.current_streak > 0 {
                streak.broken_streak_value = Some(streak.current_streak);
                broke = previous_date.is_some();
            }
            streak.current_streak = 1;
        }
    }

    if previous_date.map_or(true, |last| last < today) {
        streak.last_participation_date = Some(today);
    }
    streak.max_streak = streak.max_streak.max(streak.current_streak);

    StreakTransition {
        before: previous.cloned(),
        after: streak,
        broke,
    }
}

/// Highest-threshold bonus unlocked by the streak
pub fn applicable_bonus(bonuses: &[StreakBonus], streak: u32) -> Option<&StreakBonus> {
    bonuses
        .iter()
        .filter(|b| b.threshold_days <= streak)
        .max_by_key(|b| b.threshold_days)
}

/// Outcome of a paid streak recovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub restored: u32,
    pub cost: u32,
    pub streak: UserStreak,
}

impl<S: RewardStore> Engine<S> {
    /// Stored streak of a user (zeroed if the user never participated)
    pub fn streak(&self, user_id: &str) -> EngineResult<UserStreak> {
        Ok(self
            .store()
            .get_streak(user_id)?
            .unwrap_or_else(|| UserStreak::new(user_id)))
    }

    /// Spend orydors to restore the last broken streak
    pub fn recover_streak(&self, user_id: &str, now: DateTime<Utc>) -> EngineResult<RecoveryResult> {
        let cost = self.config().streak_recovery_cost;
        match self
            .store()
            .recover_streak(user_id, i64::from(cost), now)?
        {
            RecoveryOutcome::Recovered { restored } => {
                tracing::info!(user = user_id, restored, cost, "streak recovered");
                Ok(RecoveryResult {
                    restored,
                    cost,
                    streak: self.streak(user_id)?,
                })
            }
            RecoveryOutcome::NoBrokenStreak => {
                Err(EngineError::NotFound("A broken streak to recover".to_string()))
            }
            RecoveryOutcome::InsufficientFunds { balance } => {
                Err(EngineError::InsufficientResource(format!(
                    "orydors to recover your streak ({} needed, {} available)",
                    cost, balance
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreakBonusKind;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn streak(current: u32, max: u32, last: &str) -> UserStreak {
        UserStreak {
            user_id: "alice".to_string(),
            current_streak: current,
            max_streak: max,
            last_participation_date: Some(day(last)),
            broken_streak_value: None,
        }
    }

    #[test]
    fn test_first_participation_starts_at_one() {
        let t = advance(None, "alice", day("2026-10-17"));
        assert_eq!(t.after.current_streak, 1);
        assert_eq!(t.after.max_streak, 1);
        assert_eq!(t.after.last_participation_date, Some(day("2026-10-17")));
        assert!(t.after.broken_streak_value.is_none());
        assert!(t.before.is_none());
        assert!(!t.broke);
    }

    #[test]
    fn test_consecutive_day_increments() {
        let prev = streak(4, 4, "2026-10-16");
        let t = advance(Some(&prev), "alice", day("2026-10-17"));
        assert_eq!(t.after.current_streak, 5);
        assert_eq!(t.after.max_streak, 5);
        assert_eq!(t.before, Some(prev));
    }

    #[test]
    fn test_same_day_is_unchanged() {
        let prev = streak(4, 7, "2026-10-17");
        let t = advance(Some(&prev), "alice", day("2026-10-17"));
        assert_eq!(t.after, prev);
        assert!(!t.broke);
    }

    #[test]
    fn test_gap_resets_and_remembers() {
        let prev = streak(6, 9, "2026-10-14");
        let t = advance(Some(&prev), "alice", day("2026-10-17"));
        assert_eq!(t.after.current_streak, 1);
        assert_eq!(t.after.max_streak, 9);
        assert_eq!(t.after.broken_streak_value, Some(6));
        assert!(t.broke);
    }

    #[test]
    fn test_increment_across_month_boundary() {
        let prev = streak(2, 2, "2026-09-30");
        let t = advance(Some(&prev), "alice", day("2026-10-01"));
        assert_eq!(t.after.current_streak, 3);
    }

    #[test]
    fn test_applicable_bonus_picks_highest_threshold() {
        let bonuses = vec![
            StreakBonus {
                threshold_days: 3,
                kind: StreakBonusKind::QuantityBoost { factor: 1.5 },
            },
            StreakBonus {
                threshold_days: 7,
                kind: StreakBonusKind::ProbabilityBoost { factor: 2.0 },
            },
            StreakBonus {
                threshold_days: 30,
                kind: StreakBonusKind::QuantityBoost { factor: 3.0 },
            },
        ];
        assert!(applicable_bonus(&bonuses, 2).is_none());
        assert_eq!(applicable_bonus(&bonuses, 3).unwrap().threshold_days, 3);
        assert_eq!(applicable_bonus(&bonuses, 12).unwrap().threshold_days, 7);
        assert_eq!(applicable_bonus(&bonuses, 45).unwrap().threshold_days, 30);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_recover_streak_through_engine() {
        use crate::engine::testing::*;
        use crate::types::{Currency, LedgerEntry, LedgerReason};

        let engine = engine();
        add_user(&engine, "alice");
        let now = at("2026-10-17T09:00:00Z");

        assert!(matches!(
            engine.recover_streak("alice", now),
            Err(EngineError::NotFound(_))
        ));

        let mut broken = streak(1, 12, "2026-10-17");
        broken.broken_streak_value = Some(12);
        engine.store().put_streak(&broken).unwrap();
        let err = engine.recover_streak("alice", now).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientResource(_)));
        assert!(err.user_message().starts_with("Not enough orydors"));

        engine
            .store()
            .adjust_balance(
                "alice",
                &LedgerEntry {
                    currency: Currency::Orydors,
                    amount: 200,
                    reason: LedgerReason::Chest,
                    reference_id: "seed".to_string(),
                },
            )
            .unwrap();
        let result = engine.recover_streak("alice", now).unwrap();
        assert_eq!(result.restored, 12);
        assert_eq!(result.streak.current_streak, 12);
        assert_eq!(result.streak.max_streak, 12);
        assert!(result.streak.broken_streak_value.is_none());
        assert_eq!(engine.balance("alice").unwrap().orydors, 0);
    }
}
