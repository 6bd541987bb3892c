//! Administrative writes: validated saves and JSON catalog import.

use crate::engine::Engine;
use crate::error::{EngineResult, ValidationError};
use crate::repository::RewardStore;
use crate::types::*;
use crate::validate;
use serde::{Deserialize, Serialize};

/// A user unlocking a skill node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillUnlock {
    pub user_id: String,
    pub skill_id: String,
}

/// Everything an administrator can author, as one JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogImport {
    pub rewards: Vec<RewardDescriptor>,
    pub contents: Vec<ContentItem>,
    pub loot: Vec<LootTableEntry>,
    pub wheels: Vec<WheelConfig>,
    pub streak_bonuses: Vec<StreakBonus>,
    pub skills: Vec<SkillNode>,
    pub challenges: Vec<Challenge>,
    pub users: Vec<UserProfile>,
    pub unlocks: Vec<SkillUnlock>,
}

/// Counts of what an import wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub rewards: usize,
    /// Identical descriptors already present
    pub rewards_unchanged: usize,
    pub contents: usize,
    pub loot: usize,
    pub wheels: usize,
    pub streak_bonuses: usize,
    pub skills: usize,
    pub challenges: usize,
    pub users: usize,
    pub unlocks: usize,
}

impl<S: RewardStore> Engine<S> {
    fn reward_exists(&self, reward_id: &str) -> bool {
        // A failing lookup counts as missing; the save is then rejected
        matches!(self.store().get_reward(reward_id), Ok(Some(_)))
    }

    /// Save a new reward descriptor. Descriptors are immutable once saved.
    pub fn save_reward(&self, reward: &RewardDescriptor) -> EngineResult<()> {
        validate::reward(reward)?;
        if self.store().get_reward(&reward.id)?.is_some() {
            return Err(ValidationError::invalid(
                "id",
                format!("reward {} already exists and cannot be changed", reward.id),
            )
            .into());
        }
        self.store().insert_reward(reward)?;
        Ok(())
    }

    pub fn save_content(&self, content: &ContentItem) -> EngineResult<()> {
        validate::content(content)?;
        self.store().upsert_content(content)?;
        Ok(())
    }

    /// Save a loot entry, returning its id
    pub fn save_loot_entry(&self, entry: &LootTableEntry) -> EngineResult<i64> {
        validate::loot_entry(entry, &|id| self.reward_exists(id))?;
        Ok(self.store().insert_loot_entry(entry)?)
    }

    pub fn save_wheel(&self, wheel: &WheelConfig) -> EngineResult<()> {
        validate::wheel(wheel, &|id| self.reward_exists(id))?;
        self.store().upsert_wheel(wheel)?;
        Ok(())
    }

    pub fn save_streak_bonus(&self, bonus: &StreakBonus) -> EngineResult<()> {
        validate::streak_bonus(bonus)?;
        self.store().insert_streak_bonus(bonus)?;
        Ok(())
    }

    pub fn save_skill_node(&self, node: &SkillNode) -> EngineResult<()> {
        validate::skill_node(node, &|id| self.reward_exists(id))?;
        self.store().upsert_skill_node(node)?;
        Ok(())
    }

    /// Save a challenge; objectives take the challenge's id and scope
    pub fn save_challenge(&self, challenge: &Challenge) -> EngineResult<()> {
        let mut challenge = challenge.clone();
        for objective in &mut challenge.objectives {
            objective.challenge_id = challenge.id.clone();
            objective.scope = challenge.scope;
        }
        validate::challenge(&challenge, &|id| self.reward_exists(id))?;
        self.store().upsert_challenge(&challenge)?;
        Ok(())
    }

    /// Mirror a collaborator-owned profile into the store
    pub fn save_user(&self, profile: &UserProfile) -> EngineResult<()> {
        if profile.id.trim().is_empty() {
            return Err(ValidationError::invalid("id", "must not be empty").into());
        }
        self.store().upsert_user(profile)?;
        Ok(())
    }

    pub fn unlock_skill(&self, user_id: &str, skill_id: &str) -> EngineResult<()> {
        self.store().unlock_skill(user_id, skill_id)?;
        Ok(())
    }

    /// Import a catalog document in dependency order.
    ///
    /// Rewards identical to a stored descriptor are skipped and a changed
    /// descriptor is rejected. Loot entries and streak bonuses are appended.
    pub fn import_catalog(&self, catalog: &CatalogImport) -> EngineResult<ImportSummary> {
        let mut summary = ImportSummary::default();

        for reward in &catalog.rewards {
            match self.store().get_reward(&reward.id)? {
                Some(existing) if existing == *reward => summary.rewards_unchanged += 1,
                _ => {
                    self.save_reward(reward)?;
                    summary.rewards += 1;
                }
            }
        }
        for content in &catalog.contents {
            self.save_content(content)?;
            summary.contents += 1;
        }
        for entry in &catalog.loot {
            self.save_loot_entry(entry)?;
            summary.loot += 1;
        }
        for wheel in &catalog.wheels {
            self.save_wheel(wheel)?;
            summary.wheels += 1;
        }
        for bonus in &catalog.streak_bonuses {
            self.save_streak_bonus(bonus)?;
            summary.streak_bonuses += 1;
        }
        for node in &catalog.skills {
            self.save_skill_node(node)?;
            summary.skills += 1;
        }
        for challenge in &catalog.challenges {
            self.save_challenge(challenge)?;
            summary.challenges += 1;
        }
        for user in &catalog.users {
            self.save_user(user)?;
            summary.users += 1;
        }
        for unlock in &catalog.unlocks {
            self.unlock_skill(&unlock.user_id, &unlock.skill_id)?;
            summary.unlocks += 1;
        }

        tracing::info!(?summary, "catalog imported");
        Ok(summary)
    }
}
