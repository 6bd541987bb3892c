//! Shared SQL constants for the SQLite backend.
//!
//! Tables are grouped by owner: collaborator data the engine only reads
//! (users, skills), admin configuration (rewards, loot, wheels, challenges)
//! and engine-owned records (balances, claims, spins, streaks, progress).

/// SQLite schema definitions
pub mod schema {
    /// Users as seen by the engine (subscription, admin flag, guild)
    pub const USERS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            is_admin BOOLEAN NOT NULL DEFAULT FALSE,
            premium_until TEXT,
            guild_id TEXT
        )
    "#;

    pub const BALANCES_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS balances (
            user_id TEXT PRIMARY KEY NOT NULL,
            orydors INTEGER NOT NULL DEFAULT 0,
            experience INTEGER NOT NULL DEFAULT 0
        )
    "#;

    pub const LEDGER_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            currency TEXT NOT NULL,
            amount INTEGER NOT NULL,
            reason TEXT NOT NULL,
            reference_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
    "#;

    pub const INVENTORY_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS inventory (
            user_id TEXT NOT NULL,
            reward_id TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, reward_id)
        )
    "#;

    /// Reward descriptors; `kind_json` holds the category-tagged metadata
    pub const REWARDS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS rewards (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            rarity TEXT NOT NULL DEFAULT 'common',
            category TEXT NOT NULL,
            kind_json TEXT NOT NULL
        )
    "#;

    pub const CONTENTS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS contents (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            reward_value INTEGER NOT NULL,
            genres_json TEXT NOT NULL DEFAULT '[]'
        )
    "#;

    pub const LOOT_ENTRIES_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS loot_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scope_json TEXT NOT NULL,
            tier TEXT NOT NULL,
            reward_id TEXT NOT NULL REFERENCES rewards(id),
            drop_chance REAL NOT NULL,
            min_quantity INTEGER NOT NULL,
            max_quantity INTEGER NOT NULL
        )
    "#;

    pub const WHEELS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS wheels (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            premium_only BOOLEAN NOT NULL DEFAULT FALSE,
            starts_on TEXT NOT NULL,
            ends_on TEXT,
            segments_json TEXT NOT NULL
        )
    "#;

    pub const STREAK_BONUSES_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS streak_bonuses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            threshold_days INTEGER NOT NULL,
            kind_json TEXT NOT NULL
        )
    "#;

    pub const SKILL_NODES_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS skill_nodes (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            bonus_json TEXT NOT NULL
        )
    "#;

    pub const USER_SKILLS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS user_skills (
            user_id TEXT NOT NULL,
            skill_id TEXT NOT NULL REFERENCES skill_nodes(id),
            PRIMARY KEY (user_id, skill_id)
        )
    "#;

    pub const USER_STREAKS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS user_streaks (
            user_id TEXT PRIMARY KEY NOT NULL,
            current_streak INTEGER NOT NULL DEFAULT 0,
            max_streak INTEGER NOT NULL DEFAULT 0,
            last_participation_date TEXT,
            broken_streak_value INTEGER
        )
    "#;

    /// One row per (user, content, period). The primary key is the claim guard.
    pub const CLAIM_RECORDS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS claim_records (
            user_id TEXT NOT NULL,
            content_id TEXT NOT NULL,
            period_key TEXT NOT NULL,
            claimed_at TEXT NOT NULL,
            PRIMARY KEY (user_id, content_id, period_key)
        )
    "#;

    /// Every opening, including key reopenings and admin openings
    pub const CHEST_OPENINGS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS chest_openings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            content_id TEXT NOT NULL,
            period_key TEXT NOT NULL,
            bypass_key TEXT,
            summary_json TEXT NOT NULL,
            opened_at TEXT NOT NULL
        )
    "#;

    /// `free_spin_day` is NULL for paid spins, so the unique pair only caps free spins
    pub const SPIN_HISTORY_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS spin_history (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            wheel_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            segment_index INTEGER NOT NULL,
            spun_at TEXT NOT NULL,
            free_spin_day TEXT,
            UNIQUE (user_id, free_spin_day)
        )
    "#;

    pub const GIFT_CODES_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS gift_codes (
            code TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            value_cents INTEGER NOT NULL,
            issued_on TEXT NOT NULL,
            expires_on TEXT NOT NULL,
            spin_id TEXT NOT NULL
        )
    "#;

    pub const CHALLENGES_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS challenges (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            scope TEXT NOT NULL,
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL,
            payouts_json TEXT NOT NULL DEFAULT '[]'
        )
    "#;

    pub const OBJECTIVES_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS challenge_objectives (
            id TEXT PRIMARY KEY NOT NULL,
            challenge_id TEXT NOT NULL REFERENCES challenges(id) ON DELETE CASCADE,
            objective_json TEXT NOT NULL,
            target_count INTEGER NOT NULL
        )
    "#;

    pub const OBJECTIVE_PROGRESS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS objective_progress (
            objective_id TEXT NOT NULL,
            subject_kind TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            current_count INTEGER NOT NULL DEFAULT 0,
            completed BOOLEAN NOT NULL DEFAULT FALSE,
            completed_at TEXT,
            PRIMARY KEY (objective_id, subject_kind, subject_id)
        )
    "#;

    /// Guards challenge payouts to once per (challenge, user)
    pub const CHALLENGE_PAYOUTS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS challenge_payouts (
            challenge_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            paid_at TEXT NOT NULL,
            PRIMARY KEY (challenge_id, user_id)
        )
    "#;

    /// Marks a challenge as fully paid for a user or guild
    pub const CHALLENGE_SETTLEMENTS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS challenge_settlements (
            challenge_id TEXT NOT NULL,
            subject_kind TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            settled_at TEXT NOT NULL,
            PRIMARY KEY (challenge_id, subject_kind, subject_id)
        )
    "#;

    /// Every table of the base schema, in creation order
    pub const BASE_TABLES: &[&str] = &[
        USERS_TABLE,
        BALANCES_TABLE,
        LEDGER_TABLE,
        INVENTORY_TABLE,
        REWARDS_TABLE,
        CONTENTS_TABLE,
        LOOT_ENTRIES_TABLE,
        WHEELS_TABLE,
        STREAK_BONUSES_TABLE,
        SKILL_NODES_TABLE,
        USER_SKILLS_TABLE,
        USER_STREAKS_TABLE,
        CLAIM_RECORDS_TABLE,
        CHEST_OPENINGS_TABLE,
        SPIN_HISTORY_TABLE,
        GIFT_CODES_TABLE,
        CHALLENGES_TABLE,
        OBJECTIVES_TABLE,
        OBJECTIVE_PROGRESS_TABLE,
        CHALLENGE_PAYOUTS_TABLE,
    ];

    pub const INDEXES: &str = r#"
        CREATE INDEX IF NOT EXISTS idx_ledger_user ON ledger_entries(user_id);
        CREATE INDEX IF NOT EXISTS idx_loot_entries_tier ON loot_entries(tier);
        CREATE INDEX IF NOT EXISTS idx_spin_history_user ON spin_history(user_id);
        CREATE INDEX IF NOT EXISTS idx_gift_codes_user ON gift_codes(user_id);
        CREATE INDEX IF NOT EXISTS idx_objectives_challenge ON challenge_objectives(challenge_id);
        CREATE INDEX IF NOT EXISTS idx_users_guild ON users(guild_id);
    "#;
}

/// Balance column touched by a ledger currency
pub fn balance_column(currency: crate::types::Currency) -> &'static str {
    match currency {
        crate::types::Currency::Orydors => "orydors",
        crate::types::Currency::Experience => "experience",
    }
}

/// Upsert adding a signed amount to one balance column
pub fn balance_upsert_sql(currency: crate::types::Currency) -> String {
    let column = balance_column(currency);
    format!(
        "INSERT INTO balances (user_id, {col}) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET {col} = {col} + excluded.{col}",
        col = column
    )
}
