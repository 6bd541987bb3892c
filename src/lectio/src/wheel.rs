//! Fortune wheel resolution.
//!
//! A spin is one weighted draw over mutually exclusive segments. Streak
//! bonuses either reweight notable segments before the draw or scale the
//! winning reward after it.

use crate::challenge::ProgressResult;
use crate::engine::{boosted_experience, signed, Engine};
use crate::error::{EngineError, EngineResult};
use crate::giftcard;
use crate::level::LevelChange;
use crate::repository::{RepoError, RewardStore, SpinCommit, SpinCommitOutcome};
use crate::skills;
use crate::streak;
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Segments a probability boost applies to: items, gift cards and large currency wins
pub fn is_notable(segment: &WheelSegment, currency_threshold: u32) -> bool {
    match segment.reward {
        SegmentReward::Item { .. } | SegmentReward::GiftCard { .. } => true,
        SegmentReward::Currency { amount } => amount >= currency_threshold,
        SegmentReward::Experience { .. } => false,
    }
}

/// Draw weights after an optional probability boost
pub fn effective_weights(
    segments: &[WheelSegment],
    bonus: Option<&StreakBonus>,
    currency_threshold: u32,
) -> Vec<f64> {
    let factor = match bonus.map(|b| b.kind) {
        Some(StreakBonusKind::ProbabilityBoost { factor }) => Some(factor),
        _ => None,
    };
    segments
        .iter()
        .map(|segment| {
            let weight = f64::from(segment.weight);
            match factor {
                Some(factor) if is_notable(segment, currency_threshold) => weight * factor,
                _ => weight,
            }
        })
        .collect()
}

/// Pick exactly one index. `None` only for an empty wheel.
pub fn draw_segment<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let last = weights.len().checked_sub(1)?;
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Some(last);
    }
    let roll = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if roll < cumulative {
            return Some(idx);
        }
    }
    // Rounding left the roll past the final boundary
    Some(last)
}

/// Scale the winning reward by a quantity boost; gift cards keep their face value
pub fn apply_quantity_boost(reward: &SegmentReward, bonus: Option<&StreakBonus>) -> SegmentReward {
    let Some(StreakBonusKind::QuantityBoost { factor }) = bonus.map(|b| b.kind) else {
        return reward.clone();
    };
    let scale = |n: u32| (f64::from(n) * factor).floor().min(f64::from(u32::MAX)) as u32;
    match reward {
        SegmentReward::Currency { amount } => SegmentReward::Currency {
            amount: scale(*amount),
        },
        SegmentReward::Experience { amount } => SegmentReward::Experience {
            amount: scale(*amount),
        },
        SegmentReward::Item {
            reward_id,
            quantity,
        } => SegmentReward::Item {
            reward_id: reward_id.clone(),
            quantity: scale(*quantity),
        },
        SegmentReward::GiftCard { .. } => reward.clone(),
    }
}

/// Win counts per segment over `trials` draws
pub fn simulate<R: Rng + ?Sized>(weights: &[f64], trials: u32, rng: &mut R) -> Vec<u32> {
    let mut counts = vec![0u32; weights.len()];
    for _ in 0..trials {
        if let Some(idx) = draw_segment(weights, rng) {
            counts[idx] += 1;
        }
    }
    counts
}

/// Outcome of one spin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinResult {
    pub spin_id: String,
    pub wheel_id: String,
    pub kind: SpinKind,
    pub segment_index: usize,
    pub label: String,
    /// Reward as granted, after any quantity boost
    pub reward: SegmentReward,
    /// Experience credited after skill boosts
    pub experience: u64,
    pub streak: UserStreak,
    pub streak_bonus: Option<StreakBonus>,
    pub gift_code: Option<GiftCode>,
    pub level: LevelChange,
    pub applied_bonuses: Vec<SkillBonus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<ProgressResult>,
}

/// Writes for one drawn segment
struct SpinGrant {
    ledger: Vec<LedgerEntry>,
    inventory: Vec<InventoryDelta>,
    experience: u64,
    applied_bonuses: Vec<SkillBonus>,
    gift_code: Option<GiftCode>,
}

impl<S: RewardStore> Engine<S> {
    /// Spin today's wheel
    pub fn spin(&self, user_id: &str, kind: SpinKind, now: DateTime<Utc>) -> EngineResult<SpinResult> {
        self.spin_with_rng(user_id, kind, now, &mut rand::thread_rng())
    }

    /// Spin with a caller-provided RNG
    pub fn spin_with_rng<R: Rng + ?Sized>(
        &self,
        user_id: &str,
        kind: SpinKind,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> EngineResult<SpinResult> {
        let profile = self.profile(user_id)?;
        let today = now.date_naive();

        if kind == SpinKind::Free && self.store().has_free_spin(user_id, today)? {
            return Err(EngineError::AlreadyClaimed(
                "used your free spin today".to_string(),
            ));
        }

        let wheel = self
            .store()
            .active_wheel(today)?
            .ok_or_else(|| EngineError::NotFound(format!("A wheel for {}", today)))?;
        if wheel.premium_only && !profile.is_admin && !profile.has_active_subscription(now) {
            return Err(EngineError::Forbidden(
                "wheel is reserved for premium members".to_string(),
            ));
        }

        let bonuses = skills::active_bonuses(self.store(), user_id)?;
        let streak_bonuses = self.store().streak_bonuses()?;
        let threshold = self.config().notable_currency_threshold;
        let attempts = self.config().spin_attempts.max(1);

        for attempt in 1..=attempts {
            let stored = self.store().get_streak(user_id)?;
            let transition = streak::advance(stored.as_ref(), user_id, today);
            let streak_bonus =
                streak::applicable_bonus(&streak_bonuses, transition.after.current_streak).cloned();

            let weights = effective_weights(&wheel.segments, streak_bonus.as_ref(), threshold);
            let index = draw_segment(&weights, rng)
                .ok_or_else(|| EngineError::NotFound(format!("Segments on wheel {}", wheel.id)))?;
            let segment = &wheel.segments[index];
            let reward = apply_quantity_boost(&segment.reward, streak_bonus.as_ref());

            let spin_id = uuid::Uuid::new_v4().to_string();
            let grant = self.spin_grant(&reward, &bonuses, user_id, &spin_id, now, rng)?;
            let before = self.store().balance(user_id)?;
            let increments = self.collection_progress(user_id, &grant.inventory, now)?;

            let commit = SpinCommit {
                spin_id: spin_id.clone(),
                user_id: user_id.to_string(),
                wheel_id: wheel.id.clone(),
                kind,
                segment_index: index,
                spun_at: now,
                previous_streak: transition.before,
                streak: transition.after.clone(),
                ledger: grant.ledger,
                inventory: grant.inventory,
                progress: increments,
                gift_code: grant.gift_code.clone(),
            };

            let updates = match self.store().commit_spin(&commit)? {
                SpinCommitOutcome::Committed { progress } => progress,
                SpinCommitOutcome::FreeSpinTaken => {
                    return Err(EngineError::AlreadyClaimed(
                        "used your free spin today".to_string(),
                    ));
                }
                outcome @ (SpinCommitOutcome::StreakConflict | SpinCommitOutcome::GiftCodeTaken) => {
                    tracing::debug!(user = user_id, attempt, ?outcome, "spin commit conflicted, retrying");
                    continue;
                }
            };

            tracing::info!(
                user = user_id,
                wheel = %wheel.id,
                %kind,
                segment = index,
                streak = transition.after.current_streak,
                "wheel spun"
            );

            if let Some(code) = &grant.gift_code {
                giftcard::notify_best_effort(self.notifier(), code);
            }

            let progress = self.finish_progress(commit.progress, updates, now);

            let level = LevelChange::from_xp(
                before.experience,
                before.experience.saturating_add(signed(grant.experience)),
            );

            return Ok(SpinResult {
                spin_id,
                wheel_id: wheel.id.clone(),
                kind,
                segment_index: index,
                label: segment.label.clone(),
                reward,
                experience: grant.experience,
                streak: transition.after,
                streak_bonus,
                gift_code: grant.gift_code,
                level,
                applied_bonuses: grant.applied_bonuses,
                progress,
            });
        }

        Err(RepoError::Conflict(format!(
            "spin for {} kept conflicting after {} attempts",
            user_id, attempts
        ))
        .into())
    }

    fn spin_grant<R: Rng + ?Sized>(
        &self,
        reward: &SegmentReward,
        bonuses: &[SkillBonus],
        user_id: &str,
        spin_id: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> EngineResult<SpinGrant> {
        let mut grant = SpinGrant {
            ledger: Vec::new(),
            inventory: Vec::new(),
            experience: 0,
            applied_bonuses: Vec::new(),
            gift_code: None,
        };

        match reward {
            SegmentReward::Currency { amount } => {
                grant.ledger.push(LedgerEntry {
                    currency: Currency::Orydors,
                    amount: i64::from(*amount),
                    reason: LedgerReason::WheelSpin,
                    reference_id: spin_id.to_string(),
                });
            }
            SegmentReward::Experience { amount } => {
                let (xp, applied) = boosted_experience(bonuses, u64::from(*amount));
                grant.experience = xp;
                grant.applied_bonuses = applied;
                grant.ledger.push(LedgerEntry {
                    currency: Currency::Experience,
                    amount: signed(xp),
                    reason: LedgerReason::WheelSpin,
                    reference_id: spin_id.to_string(),
                });
            }
            SegmentReward::Item {
                reward_id,
                quantity,
            } => {
                grant.inventory.push(InventoryDelta {
                    reward_id: reward_id.clone(),
                    quantity: i64::from(*quantity),
                });
            }
            SegmentReward::GiftCard { value_cents } => {
                grant.gift_code = Some(giftcard::mint(
                    self.store(),
                    rng,
                    user_id,
                    *value_cents,
                    now.date_naive(),
                    self.config().gift_code_validity_months,
                )?);
            }
        }

        Ok(grant)
    }
}
