//! Challenge progress.
//!
//! Reading and collecting events advance every matching objective of the
//! challenges active at the time of the event. Individual challenges count
//! per user, guild challenges count per guild. Completion is detected from
//! the store's atomic increment, so concurrent events never double-stamp it.
//!
//! Items granted by chests and spins count in the same transaction as the
//! grant. A completed challenge is settled once per subject; if paying it out
//! fails, the next matching event tries again.

use crate::engine::{boosted_experience, signed, Engine};
use crate::error::EngineResult;
use crate::repository::{ProgressIncrement, ProgressUpdate, RepoError, RewardStore};
use crate::skills;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Something a user did that may count towards objectives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    BookCompleted {
        user_id: String,
        content_id: String,
        #[serde(default)]
        genres: Vec<String>,
    },
    ChapterCompleted {
        user_id: String,
        book_id: String,
        #[serde(default)]
        genres: Vec<String>,
    },
    ItemCollected {
        user_id: String,
        reward_id: String,
        quantity: u32,
    },
}

impl ProgressEvent {
    pub fn user_id(&self) -> &str {
        match self {
            Self::BookCompleted { user_id, .. }
            | Self::ChapterCompleted { user_id, .. }
            | Self::ItemCollected { user_id, .. } => user_id,
        }
    }
}

fn intersects(a: &[String], b: &[String]) -> bool {
    a.iter().any(|x| b.contains(x))
}

/// How much an event advances an objective (0 when it does not match)
pub fn event_weight(objective: &ObjectiveType, event: &ProgressEvent) -> u32 {
    let matched = match (objective, event) {
        (ObjectiveType::ReadBook { content_id }, ProgressEvent::BookCompleted { content_id: read, .. }) => {
            content_id == read
        }
        (ObjectiveType::ReadAnyBook, ProgressEvent::BookCompleted { .. }) => true,
        (
            ObjectiveType::ReadBookFromSet { content_ids },
            ProgressEvent::BookCompleted { content_id, .. },
        ) => content_ids.contains(content_id),
        (ObjectiveType::ReadBooksOfGenre { genres }, ProgressEvent::BookCompleted { genres: read, .. }) => {
            intersects(genres, read)
        }
        (
            ObjectiveType::ReadChaptersOfBook { content_id },
            ProgressEvent::ChapterCompleted { book_id, .. },
        ) => content_id == book_id,
        (
            ObjectiveType::ReadChaptersOfGenre { genres },
            ProgressEvent::ChapterCompleted { genres: read, .. },
        ) => intersects(genres, read),
        (
            ObjectiveType::ReadChaptersOfSelection { content_ids },
            ProgressEvent::ChapterCompleted { book_id, .. },
        ) => content_ids.contains(book_id),
        (
            ObjectiveType::CollectItem { reward_id },
            ProgressEvent::ItemCollected {
                reward_id: collected,
                quantity,
                ..
            },
        ) => return if reward_id == collected { *quantity } else { 0 },
        _ => false,
    };
    u32::from(matched)
}

/// Progress of one objective after an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressResult {
    pub challenge_id: String,
    pub objective_id: String,
    pub subject: Subject,
    pub current_count: u32,
    pub target_count: u32,
    pub completed: bool,
    /// True only for the event that completed the objective
    pub newly_completed: bool,
    /// Users paid out while handling this event
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paid_users: Vec<String>,
    /// The challenge is complete but its payout could not be written yet
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub payout_pending: bool,
}

impl<S: RewardStore> Engine<S> {
    /// Advance every active objective matching the event
    pub fn advance(&self, event: &ProgressEvent, now: DateTime<Utc>) -> EngineResult<Vec<ProgressResult>> {
        let increments = self.plan_progress(std::slice::from_ref(event), now)?;
        if increments.is_empty() {
            return Ok(Vec::new());
        }

        let attempts = self.config().progress_write_attempts;
        let updates = self.retry_transient(attempts, "objective progress", || {
            self.store().advance_objectives(&increments, now)
        })?;
        Ok(self.finish_progress(increments, updates, now))
    }

    /// Increments for items granted by a chest or a spin, committed with the grant
    pub(crate) fn collection_progress(
        &self,
        user_id: &str,
        inventory: &[InventoryDelta],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<ProgressIncrement>> {
        let events: Vec<ProgressEvent> = inventory
            .iter()
            .filter(|delta| delta.quantity > 0)
            .map(|delta| ProgressEvent::ItemCollected {
                user_id: user_id.to_string(),
                reward_id: delta.reward_id.clone(),
                quantity: u32::try_from(delta.quantity).unwrap_or(u32::MAX),
            })
            .collect();
        self.plan_progress(&events, now)
    }

    /// Increments the events of one user would apply, without writing them
    fn plan_progress(
        &self,
        events: &[ProgressEvent],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<ProgressIncrement>> {
        let Some(user_id) = events.first().map(ProgressEvent::user_id) else {
            return Ok(Vec::new());
        };
        let objectives = self.store().active_objectives(now)?;
        if objectives.is_empty() {
            return Ok(Vec::new());
        }

        let guild_id = self
            .store()
            .user_profile(user_id)?
            .and_then(|profile| profile.guild_id);
        let mut increments = Vec::new();

        for event in events {
            for objective in &objectives {
                let delta = event_weight(&objective.objective, event);
                if delta == 0 {
                    continue;
                }

                let subject = match objective.scope {
                    ChallengeScope::Individual => Subject::User(user_id.to_string()),
                    ChallengeScope::Guild => match &guild_id {
                        Some(guild) => Subject::Guild(guild.clone()),
                        None => {
                            tracing::debug!(
                                user = user_id,
                                objective = %objective.id,
                                "skipping guild objective for user without a guild"
                            );
                            continue;
                        }
                    },
                };

                increments.push(ProgressIncrement {
                    challenge_id: objective.challenge_id.clone(),
                    objective_id: objective.id.clone(),
                    subject,
                    delta,
                    target: objective.target_count,
                });
            }
        }

        Ok(increments)
    }

    /// Results of committed increments, settling every completed challenge.
    /// The progress is already durable, so a failed settlement is reported
    /// through `payout_pending` instead of an error.
    pub(crate) fn finish_progress(
        &self,
        increments: Vec<ProgressIncrement>,
        updates: Vec<ProgressUpdate>,
        now: DateTime<Utc>,
    ) -> Vec<ProgressResult> {
        let mut settled: HashSet<(String, Subject)> = HashSet::new();
        let mut results = Vec::with_capacity(updates.len());

        for (increment, update) in increments.into_iter().zip(updates) {
            if update.newly_completed {
                tracing::info!(
                    objective = %increment.objective_id,
                    subject = increment.subject.id(),
                    "objective completed"
                );
            }

            let mut paid_users = Vec::new();
            let mut payout_pending = false;
            if update.progress.completed
                && settled.insert((increment.challenge_id.clone(), increment.subject.clone()))
            {
                match self.settle_challenge(&increment.challenge_id, &increment.subject, now) {
                    Ok(paid) => paid_users = paid,
                    Err(e) => {
                        tracing::error!(
                            challenge = %increment.challenge_id,
                            subject = increment.subject.id(),
                            error = %e,
                            "challenge payout failed, will retry on the next matching event"
                        );
                        payout_pending = true;
                    }
                }
            }

            results.push(ProgressResult {
                challenge_id: increment.challenge_id,
                objective_id: increment.objective_id,
                subject: increment.subject,
                current_count: update.progress.current_count,
                target_count: increment.target,
                completed: update.progress.completed,
                newly_completed: update.newly_completed,
                paid_users,
                payout_pending,
            });
        }

        results
    }

    /// Progress of a subject on one objective, if any was recorded
    pub fn progress(&self, objective_id: &str, subject: &Subject) -> EngineResult<Option<ObjectiveProgress>> {
        Ok(self.store().get_progress(objective_id, subject)?)
    }

    /// Pay the challenge out if every objective is complete for the subject.
    ///
    /// Guild challenges pay the members at settlement time. A settled subject
    /// is never paid again, and a partly failed settlement only pays the
    /// users that were missed.
    pub fn settle_challenge(
        &self,
        challenge_id: &str,
        subject: &Subject,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<String>> {
        if self.store().challenge_settled(challenge_id, subject)? {
            return Ok(Vec::new());
        }
        let Some(challenge) = self.store().get_challenge(challenge_id)? else {
            return Ok(Vec::new());
        };

        for objective in &challenge.objectives {
            let done = self
                .store()
                .get_progress(&objective.id, subject)?
                .is_some_and(|p| p.completed);
            if !done {
                return Ok(Vec::new());
            }
        }

        let recipients = match subject {
            Subject::User(user) => vec![user.clone()],
            Subject::Guild(guild) => self.store().guild_members(guild)?,
        };

        let mut orydors: u64 = 0;
        let mut experience: u64 = 0;
        let mut inventory = Vec::new();
        for grant in &challenge.payouts {
            let reward = self
                .store()
                .get_reward(&grant.reward_id)?
                .ok_or_else(|| RepoError::NotFound(format!("reward {}", grant.reward_id)))?;
            let quantity = u64::from(grant.quantity);
            match reward.kind {
                RewardKind::Currency { amount } => orydors += u64::from(amount) * quantity,
                RewardKind::Experience { amount } => experience += u64::from(amount) * quantity,
                _ => inventory.push(InventoryDelta {
                    reward_id: grant.reward_id.clone(),
                    quantity: i64::from(grant.quantity),
                }),
            }
        }

        let attempts = self.config().progress_write_attempts;
        let mut paid = Vec::new();
        for user in recipients {
            let mut ledger = Vec::new();
            if orydors > 0 {
                ledger.push(LedgerEntry {
                    currency: Currency::Orydors,
                    amount: signed(orydors),
                    reason: LedgerReason::ChallengePayout,
                    reference_id: challenge.id.clone(),
                });
            }
            if experience > 0 {
                let bonuses = skills::active_bonuses(self.store(), &user)?;
                let (xp, _) = boosted_experience(&bonuses, experience);
                ledger.push(LedgerEntry {
                    currency: Currency::Experience,
                    amount: signed(xp),
                    reason: LedgerReason::ChallengePayout,
                    reference_id: challenge.id.clone(),
                });
            }

            let newly_paid = self.retry_transient(attempts, "challenge payout", || {
                self.store()
                    .commit_challenge_payout(&challenge.id, &user, &ledger, &inventory, now)
            })?;
            if newly_paid {
                tracing::info!(challenge = %challenge.id, user = %user, "challenge paid out");
                paid.push(user);
            }
        }

        self.retry_transient(attempts, "challenge settlement", || {
            self.store().mark_challenge_settled(&challenge.id, subject, now)
        })?;
        Ok(paid)
    }
}
