//! Chest opening with the once-per-period claim guard.
//!
//! A user may open the chest of a content item once per calendar month.
//! Reopening requires spending a chest key. Admin openings skip the guard
//! and always get the top gold band.

use crate::challenge::ProgressResult;
use crate::engine::{boosted_experience, signed, Engine};
use crate::error::{EngineError, EngineResult, ValidationError};
use crate::level::LevelChange;
use crate::loot::{self, LootContext, RewardBundle};
use crate::repository::{ChestCommit, ChestCommitOutcome, RepoError, RewardStore};
use crate::skills;
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Claim period of a moment: the calendar month, `YYYY-MM`
pub fn period_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Outcome of a chest opening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChestResult {
    pub content_id: String,
    pub period_key: String,
    pub bundle: RewardBundle,
    /// Key spent to reopen an already claimed chest
    pub used_bypass: Option<String>,
    pub admin: bool,
    /// Orydors credited, band currency plus currency drops
    pub orydors: u64,
    /// Experience credited after skill boosts
    pub experience: u64,
    pub inventory: Vec<InventoryDelta>,
    pub level: LevelChange,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<ProgressResult>,
}

impl<S: RewardStore> Engine<S> {
    /// Open the chest of a content item
    pub fn open_chest(
        &self,
        user_id: &str,
        content_id: &str,
        bypass_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<ChestResult> {
        self.open_chest_with_rng(user_id, content_id, bypass_key, now, &mut rand::thread_rng())
    }

    /// Open a chest with a caller-provided RNG
    pub fn open_chest_with_rng<R: Rng + ?Sized>(
        &self,
        user_id: &str,
        content_id: &str,
        bypass_key: Option<&str>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> EngineResult<ChestResult> {
        let profile = self.profile(user_id)?;
        let content = self
            .store()
            .get_content(content_id)?
            .ok_or_else(|| EngineError::NotFound(format!("Content {}", content_id)))?;
        let period = period_key(now);
        let admin = profile.is_admin;

        let mut used_bypass = None;
        if !admin && self.store().has_claim(user_id, content_id, &period)? {
            let Some(key_id) = bypass_key else {
                return Err(EngineError::AlreadyClaimed(
                    "opened this chest this month".to_string(),
                ));
            };
            let key = self
                .store()
                .get_reward(key_id)?
                .ok_or_else(|| EngineError::NotFound(format!("Reward {}", key_id)))?;
            if !key.is_chest_key() {
                return Err(ValidationError::invalid(
                    "bypass_key",
                    format!("{} is not a chest key", key_id),
                )
                .into());
            }
            if self.store().inventory_quantity(user_id, key_id)? < 1 {
                return Err(EngineError::InsufficientResource("chest keys".to_string()));
            }
            used_bypass = Some(key_id.to_string());
        }

        let tier = if admin || profile.has_active_subscription(now) {
            ChestTier::Gold
        } else {
            ChestTier::Silver
        };
        let bonuses = skills::active_bonuses(self.store(), user_id)?;
        let entries = self.store().loot_entries(tier)?;
        let ctx = LootContext {
            content: &content,
            tier,
            bonuses: &bonuses,
            weekday: skills::weekday_index(now),
            entries: &entries,
            admin_override: admin,
        };
        let mut bundle = loot::resolve_loot(&ctx, rng);

        let mut orydors = bundle.currency;
        let mut raw_experience: u64 = 0;
        let mut inventory: Vec<InventoryDelta> = Vec::new();
        for fired in &bundle.fired {
            let reward = self
                .store()
                .get_reward(&fired.reward_id)?
                .ok_or_else(|| RepoError::NotFound(format!("reward {}", fired.reward_id)))?;
            let quantity = u64::from(fired.quantity);
            match reward.kind {
                RewardKind::Currency { amount } => orydors += u64::from(amount) * quantity,
                RewardKind::Experience { amount } => raw_experience += u64::from(amount) * quantity,
                _ => match inventory.iter_mut().find(|d| d.reward_id == fired.reward_id) {
                    Some(delta) => delta.quantity += i64::from(fired.quantity),
                    None => inventory.push(InventoryDelta {
                        reward_id: fired.reward_id.clone(),
                        quantity: i64::from(fired.quantity),
                    }),
                },
            }
        }
        let (experience, xp_bonuses) = boosted_experience(&bonuses, raw_experience);
        bundle.applied_bonuses.extend(xp_bonuses);

        let reference_id = format!("{}:{}", content_id, period);
        let mut ledger = Vec::new();
        if orydors > 0 {
            ledger.push(LedgerEntry {
                currency: Currency::Orydors,
                amount: signed(orydors),
                reason: LedgerReason::Chest,
                reference_id: reference_id.clone(),
            });
        }
        if experience > 0 {
            ledger.push(LedgerEntry {
                currency: Currency::Experience,
                amount: signed(experience),
                reason: LedgerReason::Chest,
                reference_id,
            });
        }

        let before = self.store().balance(user_id)?;
        let increments = self.collection_progress(user_id, &inventory, now)?;
        let commit = ChestCommit {
            user_id: user_id.to_string(),
            content_id: content_id.to_string(),
            period_key: period.clone(),
            bypass_key: used_bypass.clone(),
            record_claim: !admin,
            ledger,
            inventory: inventory.clone(),
            progress: increments,
            opened_at: now,
            summary_json: serde_json::to_string(&bundle).map_err(RepoError::from)?,
        };

        let updates = match self.store().commit_chest(&commit)? {
            ChestCommitOutcome::Committed { progress } => progress,
            ChestCommitOutcome::AlreadyClaimed => {
                return Err(EngineError::AlreadyClaimed(
                    "opened this chest this month".to_string(),
                ));
            }
            ChestCommitOutcome::KeyUnavailable => {
                return Err(EngineError::InsufficientResource("chest keys".to_string()));
            }
        };

        tracing::info!(
            user = user_id,
            content = content_id,
            period = %period,
            %tier,
            band = bundle.band_percent,
            orydors,
            experience,
            items = inventory.len(),
            bypass = used_bypass.is_some(),
            admin,
            "chest opened"
        );

        let progress = self.finish_progress(commit.progress, updates, now);

        let level = LevelChange::from_xp(
            before.experience,
            before.experience.saturating_add(signed(experience)),
        );

        Ok(ChestResult {
            content_id: content_id.to_string(),
            period_key: period,
            bundle,
            used_bypass,
            admin,
            orydors,
            experience,
            inventory,
            level,
            progress,
        })
    }
}
