//! The engine facade.
//!
//! [`Engine`] owns the injected store, the tunables and the gift-code
//! notifier. The chest, wheel, streak, challenge and catalog operations are
//! implemented as `impl` blocks in their own modules.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::giftcard::{GiftCodeNotifier, LogNotifier};
use crate::level;
use crate::repository::{RepoResult, RewardStore};
use crate::skills;
use crate::types::{Balance, GiftCode, InventoryEntry, SkillBonus, UserProfile};

/// Reward resolution and progression engine over a store
pub struct Engine<S: RewardStore> {
    store: S,
    config: EngineConfig,
    notifier: Box<dyn GiftCodeNotifier>,
}

impl<S: RewardStore> Engine<S> {
    /// Create an engine that logs minted gift codes instead of delivering them
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            notifier: Box::new(LogNotifier),
        }
    }

    /// Replace the gift-code notifier
    pub fn with_notifier(mut self, notifier: impl GiftCodeNotifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn notifier(&self) -> &dyn GiftCodeNotifier {
        self.notifier.as_ref()
    }

    /// Profile of a user the operation acts on
    pub(crate) fn profile(&self, user_id: &str) -> EngineResult<UserProfile> {
        self.store
            .user_profile(user_id)?
            .ok_or_else(|| EngineError::NotFound(format!("User {}", user_id)))
    }

    pub fn balance(&self, user_id: &str) -> EngineResult<Balance> {
        Ok(self.store.balance(user_id)?)
    }

    /// Current level derived from the experience balance
    pub fn level(&self, user_id: &str) -> EngineResult<u32> {
        let balance = self.store.balance(user_id)?;
        Ok(level::level_for(balance.experience.max(0) as u64))
    }

    pub fn inventory(&self, user_id: &str) -> EngineResult<Vec<InventoryEntry>> {
        Ok(self.store.inventory(user_id)?)
    }

    pub fn gift_codes(&self, user_id: &str) -> EngineResult<Vec<GiftCode>> {
        Ok(self.store.gift_codes(user_id)?)
    }

    /// Run an idempotent-on-failure write, retrying busy and conflict errors
    pub(crate) fn retry_transient<T>(
        &self,
        attempts: u32,
        what: &str,
        mut op: impl FnMut() -> RepoResult<T>,
    ) -> RepoResult<T> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(attempt, error = %e, "{} hit a transient error, retrying", what);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// XP after experience boosts, with the bonuses that applied
pub(crate) fn boosted_experience(bonuses: &[SkillBonus], amount: u64) -> (u64, Vec<SkillBonus>) {
    if amount == 0 {
        return (0, Vec::new());
    }
    let boosts = skills::experience_bonuses(bonuses);
    let percent = skills::total_percent(&boosts);
    (
        skills::apply_percent(amount, percent),
        boosts.into_iter().cloned().collect(),
    )
}

/// Ledger amounts are signed; grants beyond `i64::MAX` saturate
pub(crate) fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}


#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::repository::RepoError;
    use crate::types::SkillBonusKind;

    #[test]
    fn test_unknown_user_is_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.profile("ghost"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_level_from_balance() {
        let engine = engine();
        add_user(&engine, "alice");
        assert_eq!(engine.level("alice").unwrap(), 1);
    }

    #[test]
    fn test_boosted_experience_sums_percentages() {
        let bonuses = vec![
            SkillBonus {
                skill_id: "scholar".to_string(),
                kind: SkillBonusKind::ExperienceBoost { percent: 10 },
            },
            SkillBonus {
                skill_id: "sage".to_string(),
                kind: SkillBonusKind::ExperienceBoost { percent: 15 },
            },
            SkillBonus {
                skill_id: "miser".to_string(),
                kind: SkillBonusKind::CurrencyByDay {
                    percent: 50,
                    weekdays: vec![0],
                },
            },
        ];
        let (xp, applied) = boosted_experience(&bonuses, 200);
        assert_eq!(xp, 250);
        assert_eq!(applied.len(), 2);
        assert_eq!(boosted_experience(&bonuses, 0), (0, Vec::new()));
    }

    #[test]
    fn test_retry_transient_stops_on_permanent_error() {
        let engine = engine();
        let mut calls = 0;
        let result: RepoResult<()> = engine.retry_transient(5, "test write", || {
            calls += 1;
            Err(RepoError::Database("constraint".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);

        let mut calls = 0;
        let result = engine.retry_transient(3, "test write", || {
            calls += 1;
            if calls < 3 {
                Err(RepoError::Busy("locked".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }
}
