//! Repository traits for the reward engine's storage.
//!
//! The engine never talks to a database directly; it is handed something
//! implementing [`RewardStore`]. Every method that must be atomic takes the
//! whole write set at once so the backend can apply it in one transaction.

use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    /// The database was locked by another writer past the busy timeout
    #[error("Database busy: {0}")]
    Busy(String),

    /// A compare-and-swap guard did not match
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RepoError {
    /// Whether retrying the same idempotent write may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Conflict(_))
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Read access to collaborator-owned user data
pub trait ProfileRepository {
    /// Profile of a user, `None` if unknown
    fn user_profile(&self, user_id: &str) -> RepoResult<Option<UserProfile>>;

    /// Current orydor and experience balances (zero for unknown users)
    fn balance(&self, user_id: &str) -> RepoResult<Balance>;

    /// Quantity of a reward held by a user
    fn inventory_quantity(&self, user_id: &str, reward_id: &str) -> RepoResult<i64>;

    /// Every reward a user holds a positive quantity of
    fn inventory(&self, user_id: &str) -> RepoResult<Vec<InventoryEntry>>;

    /// User ids of every member of a guild
    fn guild_members(&self, guild_id: &str) -> RepoResult<Vec<String>>;

    /// Unlocked skill bonuses of a user
    fn unlocked_skill_bonuses(&self, user_id: &str) -> RepoResult<Vec<SkillBonus>>;
}

/// Admin-authored configuration: reward catalog, loot tables, wheels, challenges
pub trait CatalogRepository {
    /// Initialize the database schema
    fn init(&self) -> RepoResult<()>;

    fn get_reward(&self, reward_id: &str) -> RepoResult<Option<RewardDescriptor>>;

    fn list_rewards(&self) -> RepoResult<Vec<RewardDescriptor>>;

    fn get_content(&self, content_id: &str) -> RepoResult<Option<ContentItem>>;

    /// Every loot entry for the tier; scope filtering is done by the resolver
    fn loot_entries(&self, tier: ChestTier) -> RepoResult<Vec<LootTableEntry>>;

    /// The wheel in effect on `day` (latest start wins on overlap)
    fn active_wheel(&self, day: NaiveDate) -> RepoResult<Option<WheelConfig>>;

    /// Streak bonuses ordered by ascending threshold
    fn streak_bonuses(&self) -> RepoResult<Vec<StreakBonus>>;

    /// Objectives of every challenge whose window contains `now`
    fn active_objectives(&self, now: DateTime<Utc>) -> RepoResult<Vec<ChallengeObjective>>;

    fn get_challenge(&self, challenge_id: &str) -> RepoResult<Option<Challenge>>;

    // === Admin writes (validated by the caller) ===

    /// Insert a reward descriptor; descriptors are immutable once saved
    fn insert_reward(&self, reward: &RewardDescriptor) -> RepoResult<()>;

    fn upsert_content(&self, content: &ContentItem) -> RepoResult<()>;

    fn insert_loot_entry(&self, entry: &LootTableEntry) -> RepoResult<i64>;

    fn upsert_wheel(&self, wheel: &WheelConfig) -> RepoResult<()>;

    fn insert_streak_bonus(&self, bonus: &StreakBonus) -> RepoResult<()>;

    fn upsert_skill_node(&self, node: &SkillNode) -> RepoResult<()>;

    fn upsert_challenge(&self, challenge: &Challenge) -> RepoResult<()>;

    fn upsert_user(&self, profile: &UserProfile) -> RepoResult<()>;

    fn unlock_skill(&self, user_id: &str, skill_id: &str) -> RepoResult<()>;
}

/// Everything the chest path writes, applied in one transaction
#[derive(Debug, Clone)]
pub struct ChestCommit {
    pub user_id: String,
    pub content_id: String,
    pub period_key: String,
    /// Key spent to reopen a claimed chest
    pub bypass_key: Option<String>,
    /// Admin openings are logged but never recorded as claims
    pub record_claim: bool,
    pub ledger: Vec<LedgerEntry>,
    pub inventory: Vec<InventoryDelta>,
    /// Objective increments for the collected items
    pub progress: Vec<ProgressIncrement>,
    pub opened_at: DateTime<Utc>,
    /// Serialized bundle kept for audit
    pub summary_json: String,
}

/// Outcome of [`ProgressionRepository::commit_chest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChestCommitOutcome {
    /// Everything was written, with the objective updates in increment order
    Committed { progress: Vec<ProgressUpdate> },
    /// The claim record already existed; nothing was written
    AlreadyClaimed,
    /// The bypass key could not be spent; nothing was written
    KeyUnavailable,
}

/// Everything the wheel path writes, applied in one transaction
#[derive(Debug, Clone)]
pub struct SpinCommit {
    pub spin_id: String,
    pub user_id: String,
    pub wheel_id: String,
    pub kind: SpinKind,
    pub segment_index: usize,
    pub spun_at: DateTime<Utc>,
    /// The whole streak record as read before the spin, used as the compare-and-swap guard
    pub previous_streak: Option<UserStreak>,
    pub streak: UserStreak,
    pub ledger: Vec<LedgerEntry>,
    pub inventory: Vec<InventoryDelta>,
    pub progress: Vec<ProgressIncrement>,
    pub gift_code: Option<GiftCode>,
}

/// Outcome of [`ProgressionRepository::commit_spin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinCommitOutcome {
    Committed { progress: Vec<ProgressUpdate> },
    /// A free spin was already recorded for that day
    FreeSpinTaken,
    /// The streak changed since it was read
    StreakConflict,
    /// The minted gift code collided at insert time
    GiftCodeTaken,
}

/// Outcome of [`ProgressionRepository::recover_streak`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered { restored: u32 },
    NoBrokenStreak,
    InsufficientFunds { balance: i64 },
}

/// One objective increment, clamped to `target` when applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressIncrement {
    pub challenge_id: String,
    pub objective_id: String,
    pub subject: Subject,
    pub delta: u32,
    pub target: u32,
}

/// Result of an atomic objective increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub progress: ObjectiveProgress,
    /// True only on the transition from incomplete to complete
    pub newly_completed: bool,
}

/// Engine-owned state: claims, spins, streaks, balances, progress
pub trait ProgressionRepository {
    /// Whether a claim record exists for (user, content, period)
    fn has_claim(&self, user_id: &str, content_id: &str, period_key: &str) -> RepoResult<bool>;

    /// Apply a chest resolution; the claim record is the last write
    fn commit_chest(&self, commit: &ChestCommit) -> RepoResult<ChestCommitOutcome>;

    /// Whether a free spin is recorded for `day`
    fn has_free_spin(&self, user_id: &str, day: NaiveDate) -> RepoResult<bool>;

    fn get_streak(&self, user_id: &str) -> RepoResult<Option<UserStreak>>;

    fn commit_spin(&self, commit: &SpinCommit) -> RepoResult<SpinCommitOutcome>;

    fn gift_code_exists(&self, code: &str) -> RepoResult<bool>;

    fn gift_codes(&self, user_id: &str) -> RepoResult<Vec<GiftCode>>;

    /// Debit `cost` orydors and restore the broken streak, atomically
    fn recover_streak(
        &self,
        user_id: &str,
        cost: i64,
        at: DateTime<Utc>,
    ) -> RepoResult<RecoveryOutcome>;

    /// Apply increments in one transaction, in order
    fn advance_objectives(
        &self,
        increments: &[ProgressIncrement],
        at: DateTime<Utc>,
    ) -> RepoResult<Vec<ProgressUpdate>>;

    fn get_progress(
        &self,
        objective_id: &str,
        subject: &Subject,
    ) -> RepoResult<Option<ObjectiveProgress>>;

    /// Pay a challenge out to one user at most once. Returns false if already paid.
    fn commit_challenge_payout(
        &self,
        challenge_id: &str,
        user_id: &str,
        ledger: &[LedgerEntry],
        inventory: &[InventoryDelta],
        at: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Whether the challenge was already settled for the subject
    fn challenge_settled(&self, challenge_id: &str, subject: &Subject) -> RepoResult<bool>;

    /// Record that every recipient of the subject was paid
    fn mark_challenge_settled(
        &self,
        challenge_id: &str,
        subject: &Subject,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
}

/// Full storage surface required by [`crate::Engine`]
pub trait RewardStore: ProfileRepository + CatalogRepository + ProgressionRepository {}

impl<T> RewardStore for T where T: ProfileRepository + CatalogRepository + ProgressionRepository {}
