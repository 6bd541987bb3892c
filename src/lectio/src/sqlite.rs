//! SQLite implementation using rusqlite (synchronous).
//!
//! Every multi-row write runs inside an `IMMEDIATE` transaction so that the
//! write lock is taken up front and concurrent requests on other
//! connections serialize on it instead of interleaving.

use crate::repository::*;
use crate::shared::{self, schema};
use crate::types::*;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// Default database location
pub const DEFAULT_DB_PATH: &str = "share/lectio.db";

/// How long a writer waits for another connection's lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed reward store
pub struct SqliteDb {
    conn: Connection,
}

fn db_err(e: rusqlite::Error) -> RepoError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            RepoError::Busy(e.to_string())
        }
        _ => RepoError::Database(e.to_string()),
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn apply_ledger(
    conn: &Connection,
    user_id: &str,
    entry: &LedgerEntry,
    at: DateTime<Utc>,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO ledger_entries (user_id, currency, amount, reason, reference_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            entry.currency.to_string(),
            entry.amount,
            entry.reason.to_string(),
            entry.reference_id,
            timestamp(at)
        ],
    )
    .map_err(db_err)?;
    conn.execute(
        &shared::balance_upsert_sql(entry.currency),
        params![user_id, entry.amount],
    )
    .map_err(db_err)?;
    Ok(())
}

fn apply_inventory(conn: &Connection, user_id: &str, delta: &InventoryDelta) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO inventory (user_id, reward_id, quantity) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id, reward_id) DO UPDATE SET quantity = quantity + excluded.quantity",
        params![user_id, delta.reward_id, delta.quantity],
    )
    .map_err(db_err)?;
    Ok(())
}

fn row_to_progress(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, u32, bool, Option<String>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn progress_from_row(
    raw: (String, String, String, u32, bool, Option<String>),
) -> RepoResult<ObjectiveProgress> {
    let (objective_id, kind, subject_id, current_count, completed, completed_at) = raw;
    let subject = match kind.as_str() {
        "guild" => Subject::Guild(subject_id),
        _ => Subject::User(subject_id),
    };
    Ok(ObjectiveProgress {
        objective_id,
        subject,
        current_count,
        completed,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

impl SqliteDb {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    fn immediate(&self) -> RepoResult<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate).map_err(db_err)
    }

    /// Check if a migration has been applied
    fn is_migration_applied(&self, version: &str) -> RepoResult<bool> {
        let result: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM schema_migrations WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(result.is_some())
    }

    /// Mark a migration as applied
    fn mark_migration_applied(&self, version: &str) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO schema_migrations (version) VALUES (?1)",
                params![version],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Run pending migrations
    fn run_migrations(&self) -> RepoResult<()> {
        if !self.is_migration_applied("0001_base_schema")? {
            for table in schema::BASE_TABLES {
                self.conn.execute_batch(table).map_err(db_err)?;
            }
            self.mark_migration_applied("0001_base_schema")?;
            tracing::info!("SQLite: applied migration 0001_base_schema");
        }

        if !self.is_migration_applied("0002_challenge_settlements")? {
            self.conn
                .execute_batch(schema::CHALLENGE_SETTLEMENTS_TABLE)
                .map_err(db_err)?;
            self.mark_migration_applied("0002_challenge_settlements")?;
            tracing::info!("SQLite: applied migration 0002_challenge_settlements");
        }

        self.conn.execute_batch(schema::INDEXES).map_err(db_err)?;
        Ok(())
    }

    /// Grant or revoke a balance directly (seeding and support tooling)
    pub fn adjust_balance(&self, user_id: &str, entry: &LedgerEntry) -> RepoResult<()> {
        let tx = self.immediate()?;
        apply_ledger(&tx, user_id, entry, Utc::now())?;
        tx.commit().map_err(db_err)
    }

    /// Add items directly to an inventory (seeding and support tooling)
    pub fn adjust_inventory(&self, user_id: &str, delta: &InventoryDelta) -> RepoResult<()> {
        apply_inventory(&self.conn, user_id, delta)
    }

    /// Number of claim records, for diagnostics
    pub fn claim_count(&self) -> RepoResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM claim_records", [], |row| row.get(0))
            .map_err(db_err)
    }

    /// Overwrite a streak record (seeding and support tooling)
    pub fn put_streak(&self, streak: &UserStreak) -> RepoResult<()> {
        write_streak(&self.conn, streak)
    }
}

fn read_streak(conn: &Connection, user_id: &str) -> RepoResult<Option<UserStreak>> {
    let row = conn
        .query_row(
            "SELECT user_id, current_streak, max_streak, last_participation_date, broken_streak_value
             FROM user_streaks WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<u32>>(4)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;

    row.map(|(user_id, current_streak, max_streak, last, broken_streak_value)| {
        Ok(UserStreak {
            user_id,
            current_streak,
            max_streak,
            last_participation_date: last.as_deref().map(parse_day).transpose()?,
            broken_streak_value,
        })
    })
    .transpose()
}

/// Additive upsert clamped to the target; `completed_at` is stamped once
fn increment_progress(
    conn: &Connection,
    increment: &ProgressIncrement,
    at: DateTime<Utc>,
) -> RepoResult<ProgressUpdate> {
    let ProgressIncrement {
        objective_id,
        subject,
        delta,
        target,
        ..
    } = increment;

    let was_completed: bool = conn
        .query_row(
            "SELECT completed FROM objective_progress
             WHERE objective_id = ?1 AND subject_kind = ?2 AND subject_id = ?3",
            params![objective_id, subject.kind(), subject.id()],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?
        .unwrap_or(false);

    conn.execute(
        "INSERT INTO objective_progress
            (objective_id, subject_kind, subject_id, current_count, completed, completed_at)
         VALUES (?1, ?2, ?3, MIN(?4, ?5), ?4 >= ?5, CASE WHEN ?4 >= ?5 THEN ?6 END)
         ON CONFLICT(objective_id, subject_kind, subject_id) DO UPDATE SET
            current_count = MIN(objective_progress.current_count + ?4, ?5),
            completed = (objective_progress.current_count + ?4 >= ?5),
            completed_at = COALESCE(
                objective_progress.completed_at,
                CASE WHEN objective_progress.current_count + ?4 >= ?5 THEN ?6 END
            )",
        params![objective_id, subject.kind(), subject.id(), delta, target, timestamp(at)],
    )
    .map_err(db_err)?;

    let raw = conn
        .query_row(
            "SELECT objective_id, subject_kind, subject_id, current_count, completed, completed_at
             FROM objective_progress
             WHERE objective_id = ?1 AND subject_kind = ?2 AND subject_id = ?3",
            params![objective_id, subject.kind(), subject.id()],
            row_to_progress,
        )
        .map_err(db_err)?;
    let progress = progress_from_row(raw)?;

    let newly_completed = progress.completed && !was_completed;
    Ok(ProgressUpdate {
        progress,
        newly_completed,
    })
}

fn write_streak(conn: &Connection, streak: &UserStreak) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO user_streaks (user_id, current_streak, max_streak, last_participation_date, broken_streak_value)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
            current_streak = excluded.current_streak,
            max_streak = excluded.max_streak,
            last_participation_date = excluded.last_participation_date,
            broken_streak_value = excluded.broken_streak_value",
        params![
            streak.user_id,
            streak.current_streak,
            streak.max_streak,
            streak.last_participation_date.map(|d| d.to_string()),
            streak.broken_streak_value
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

impl ProfileRepository for SqliteDb {
    fn user_profile(&self, user_id: &str) -> RepoResult<Option<UserProfile>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, is_admin, premium_until, guild_id FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        row.map(|(id, is_admin, premium_until, guild_id)| {
            Ok(UserProfile {
                id,
                is_admin,
                premium_until: premium_until.as_deref().map(parse_timestamp).transpose()?,
                guild_id,
            })
        })
        .transpose()
    }

    fn balance(&self, user_id: &str) -> RepoResult<Balance> {
        let balance = self
            .conn
            .query_row(
                "SELECT orydors, experience FROM balances WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(Balance {
                        orydors: row.get(0)?,
                        experience: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?;
        Ok(balance.unwrap_or_default())
    }

    fn inventory_quantity(&self, user_id: &str, reward_id: &str) -> RepoResult<i64> {
        let quantity: Option<i64> = self
            .conn
            .query_row(
                "SELECT quantity FROM inventory WHERE user_id = ?1 AND reward_id = ?2",
                params![user_id, reward_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(quantity.unwrap_or(0))
    }

    fn inventory(&self, user_id: &str) -> RepoResult<Vec<InventoryEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT reward_id, quantity FROM inventory
                 WHERE user_id = ?1 AND quantity > 0 ORDER BY reward_id",
            )
            .map_err(db_err)?;
        let entries = stmt
            .query_map(params![user_id], |row| {
                Ok(InventoryEntry {
                    reward_id: row.get(0)?,
                    quantity: row.get(1)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(entries)
    }

    fn guild_members(&self, guild_id: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users WHERE guild_id = ?1 ORDER BY id")
            .map_err(db_err)?;
        let members = stmt
            .query_map(params![guild_id], |row| row.get(0))
            .map_err(db_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(db_err)?;
        Ok(members)
    }

    fn unlocked_skill_bonuses(&self, user_id: &str) -> RepoResult<Vec<SkillBonus>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT n.id, n.bonus_json FROM user_skills u
                 JOIN skill_nodes n ON n.id = u.skill_id
                 WHERE u.user_id = ?1 ORDER BY n.id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(skill_id, json)| {
                Ok(SkillBonus {
                    skill_id,
                    kind: serde_json::from_str(&json)?,
                })
            })
            .collect()
    }
}

impl CatalogRepository for SqliteDb {
    fn init(&self) -> RepoResult<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version TEXT PRIMARY KEY NOT NULL,
                    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )
            .map_err(db_err)?;

        self.run_migrations()
    }

    fn get_reward(&self, reward_id: &str) -> RepoResult<Option<RewardDescriptor>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, rarity, kind_json FROM rewards WHERE id = ?1",
                params![reward_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        row.map(|(id, name, rarity, kind_json)| {
            Ok(RewardDescriptor {
                id,
                name,
                rarity: rarity.parse()?,
                kind: serde_json::from_str(&kind_json)?,
            })
        })
        .transpose()
    }

    fn list_rewards(&self) -> RepoResult<Vec<RewardDescriptor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, rarity, kind_json FROM rewards ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(id, name, rarity, kind_json)| {
                Ok(RewardDescriptor {
                    id,
                    name,
                    rarity: rarity.parse()?,
                    kind: serde_json::from_str(&kind_json)?,
                })
            })
            .collect()
    }

    fn get_content(&self, content_id: &str) -> RepoResult<Option<ContentItem>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, reward_value, genres_json FROM contents WHERE id = ?1",
                params![content_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        row.map(|(id, title, reward_value, genres_json)| {
            Ok(ContentItem {
                id,
                title,
                reward_value,
                genres: serde_json::from_str(&genres_json)?,
            })
        })
        .transpose()
    }

    fn loot_entries(&self, tier: ChestTier) -> RepoResult<Vec<LootTableEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, scope_json, tier, reward_id, drop_chance, min_quantity, max_quantity
                 FROM loot_entries WHERE tier = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![tier.to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(
                |(id, scope_json, tier, reward_id, drop_chance, min_quantity, max_quantity)| {
                    Ok(LootTableEntry {
                        id,
                        scope: serde_json::from_str(&scope_json)?,
                        tier: tier.parse()?,
                        reward_id,
                        drop_chance,
                        min_quantity,
                        max_quantity,
                    })
                },
            )
            .collect()
    }

    fn active_wheel(&self, day: NaiveDate) -> RepoResult<Option<WheelConfig>> {
        let day_str = day.to_string();
        let row = self
            .conn
            .query_row(
                "SELECT id, name, premium_only, starts_on, ends_on, segments_json FROM wheels
                 WHERE starts_on <= ?1 AND (ends_on IS NULL OR ends_on >= ?1)
                 ORDER BY starts_on DESC, id LIMIT 1",
                params![day_str],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        row.map(|(id, name, premium_only, starts_on, ends_on, segments_json)| {
            Ok(WheelConfig {
                id,
                name,
                premium_only,
                starts_on: parse_day(&starts_on)?,
                ends_on: ends_on.as_deref().map(parse_day).transpose()?,
                segments: serde_json::from_str(&segments_json)?,
            })
        })
        .transpose()
    }

    fn streak_bonuses(&self) -> RepoResult<Vec<StreakBonus>> {
        let mut stmt = self
            .conn
            .prepare("SELECT threshold_days, kind_json FROM streak_bonuses ORDER BY threshold_days, id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(threshold_days, kind_json)| {
                Ok(StreakBonus {
                    threshold_days,
                    kind: serde_json::from_str(&kind_json)?,
                })
            })
            .collect()
    }

    fn active_objectives(&self, now: DateTime<Utc>) -> RepoResult<Vec<ChallengeObjective>> {
        let now_str = timestamp(now);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT o.id, o.challenge_id, o.objective_json, o.target_count, c.scope
                 FROM challenge_objectives o
                 JOIN challenges c ON c.id = o.challenge_id
                 WHERE c.starts_at <= ?1 AND c.ends_at > ?1
                 ORDER BY o.challenge_id, o.id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![now_str], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(id, challenge_id, objective_json, target_count, scope)| {
                Ok(ChallengeObjective {
                    id,
                    challenge_id,
                    objective: serde_json::from_str(&objective_json)?,
                    target_count,
                    scope: scope.parse()?,
                })
            })
            .collect()
    }

    fn get_challenge(&self, challenge_id: &str) -> RepoResult<Option<Challenge>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, scope, starts_at, ends_at, payouts_json FROM challenges WHERE id = ?1",
                params![challenge_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        let Some((id, name, scope, starts_at, ends_at, payouts_json)) = row else {
            return Ok(None);
        };
        let scope: ChallengeScope = scope.parse()?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, objective_json, target_count FROM challenge_objectives
                 WHERE challenge_id = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let objective_rows = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        let objectives = objective_rows
            .into_iter()
            .map(|(objective_id, json, target_count)| {
                Ok(ChallengeObjective {
                    id: objective_id,
                    challenge_id: id.clone(),
                    objective: serde_json::from_str(&json)?,
                    target_count,
                    scope,
                })
            })
            .collect::<RepoResult<Vec<_>>>()?;

        Ok(Some(Challenge {
            id,
            name,
            scope,
            starts_at: parse_timestamp(&starts_at)?,
            ends_at: parse_timestamp(&ends_at)?,
            payouts: serde_json::from_str(&payouts_json)?,
            objectives,
        }))
    }

    fn insert_reward(&self, reward: &RewardDescriptor) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO rewards (id, name, rarity, category, kind_json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    reward.id,
                    reward.name,
                    reward.rarity.to_string(),
                    reward.kind.category(),
                    serde_json::to_string(&reward.kind)?
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn upsert_content(&self, content: &ContentItem) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO contents (id, title, reward_value, genres_json) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    reward_value = excluded.reward_value,
                    genres_json = excluded.genres_json",
                params![
                    content.id,
                    content.title,
                    content.reward_value,
                    serde_json::to_string(&content.genres)?
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn insert_loot_entry(&self, entry: &LootTableEntry) -> RepoResult<i64> {
        self.conn
            .execute(
                "INSERT INTO loot_entries (scope_json, tier, reward_id, drop_chance, min_quantity, max_quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    serde_json::to_string(&entry.scope)?,
                    entry.tier.to_string(),
                    entry.reward_id,
                    entry.drop_chance,
                    entry.min_quantity,
                    entry.max_quantity
                ],
            )
            .map_err(db_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn upsert_wheel(&self, wheel: &WheelConfig) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO wheels (id, name, premium_only, starts_on, ends_on, segments_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    premium_only = excluded.premium_only,
                    starts_on = excluded.starts_on,
                    ends_on = excluded.ends_on,
                    segments_json = excluded.segments_json",
                params![
                    wheel.id,
                    wheel.name,
                    wheel.premium_only,
                    wheel.starts_on.to_string(),
                    wheel.ends_on.map(|d| d.to_string()),
                    serde_json::to_string(&wheel.segments)?
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn insert_streak_bonus(&self, bonus: &StreakBonus) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO streak_bonuses (threshold_days, kind_json) VALUES (?1, ?2)",
                params![bonus.threshold_days, serde_json::to_string(&bonus.kind)?],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn upsert_skill_node(&self, node: &SkillNode) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO skill_nodes (id, name, bonus_json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, bonus_json = excluded.bonus_json",
                params![node.id, node.name, serde_json::to_string(&node.bonus)?],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn upsert_challenge(&self, challenge: &Challenge) -> RepoResult<()> {
        let tx = self.immediate()?;
        tx.execute(
            "INSERT INTO challenges (id, name, scope, starts_at, ends_at, payouts_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                scope = excluded.scope,
                starts_at = excluded.starts_at,
                ends_at = excluded.ends_at,
                payouts_json = excluded.payouts_json",
            params![
                challenge.id,
                challenge.name,
                challenge.scope.to_string(),
                timestamp(challenge.starts_at),
                timestamp(challenge.ends_at),
                serde_json::to_string(&challenge.payouts)?
            ],
        )
        .map_err(db_err)?;

        for objective in &challenge.objectives {
            tx.execute(
                "INSERT INTO challenge_objectives (id, challenge_id, objective_json, target_count)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    challenge_id = excluded.challenge_id,
                    objective_json = excluded.objective_json,
                    target_count = excluded.target_count",
                params![
                    objective.id,
                    challenge.id,
                    serde_json::to_string(&objective.objective)?,
                    objective.target_count
                ],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)
    }

    fn upsert_user(&self, profile: &UserProfile) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, is_admin, premium_until, guild_id) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    is_admin = excluded.is_admin,
                    premium_until = excluded.premium_until,
                    guild_id = excluded.guild_id",
                params![
                    profile.id,
                    profile.is_admin,
                    profile.premium_until.map(timestamp),
                    profile.guild_id
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn unlock_skill(&self, user_id: &str, skill_id: &str) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO user_skills (user_id, skill_id) VALUES (?1, ?2)",
                params![user_id, skill_id],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

impl ProgressionRepository for SqliteDb {
    fn has_claim(&self, user_id: &str, content_id: &str, period_key: &str) -> RepoResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM claim_records WHERE user_id = ?1 AND content_id = ?2 AND period_key = ?3",
                params![user_id, content_id, period_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    fn commit_chest(&self, commit: &ChestCommit) -> RepoResult<ChestCommitOutcome> {
        let tx = self.immediate()?;

        if let Some(key) = &commit.bypass_key {
            let spent = tx
                .execute(
                    "UPDATE inventory SET quantity = quantity - 1
                     WHERE user_id = ?1 AND reward_id = ?2 AND quantity > 0",
                    params![commit.user_id, key],
                )
                .map_err(db_err)?;
            if spent == 0 {
                return Ok(ChestCommitOutcome::KeyUnavailable);
            }
        }

        for entry in &commit.ledger {
            apply_ledger(&tx, &commit.user_id, entry, commit.opened_at)?;
        }
        for delta in &commit.inventory {
            apply_inventory(&tx, &commit.user_id, delta)?;
        }
        let mut progress = Vec::with_capacity(commit.progress.len());
        for increment in &commit.progress {
            progress.push(increment_progress(&tx, increment, commit.opened_at)?);
        }

        tx.execute(
            "INSERT INTO chest_openings (user_id, content_id, period_key, bypass_key, summary_json, opened_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                commit.user_id,
                commit.content_id,
                commit.period_key,
                commit.bypass_key,
                commit.summary_json,
                timestamp(commit.opened_at)
            ],
        )
        .map_err(db_err)?;

        // Claim record goes last; a key reopening leaves the original in place
        if commit.record_claim && commit.bypass_key.is_none() {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO claim_records (user_id, content_id, period_key, claimed_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        commit.user_id,
                        commit.content_id,
                        commit.period_key,
                        timestamp(commit.opened_at)
                    ],
                )
                .map_err(db_err)?;
            if inserted == 0 {
                return Ok(ChestCommitOutcome::AlreadyClaimed);
            }
        }

        tx.commit().map_err(db_err)?;
        Ok(ChestCommitOutcome::Committed { progress })
    }

    fn has_free_spin(&self, user_id: &str, day: NaiveDate) -> RepoResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM spin_history WHERE user_id = ?1 AND free_spin_day = ?2",
                params![user_id, day.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    fn get_streak(&self, user_id: &str) -> RepoResult<Option<UserStreak>> {
        read_streak(&self.conn, user_id)
    }

    fn commit_spin(&self, commit: &SpinCommit) -> RepoResult<SpinCommitOutcome> {
        let tx = self.immediate()?;

        // Recovery rewrites the count without touching the date, so compare the whole record
        if read_streak(&tx, &commit.user_id)? != commit.previous_streak {
            return Ok(SpinCommitOutcome::StreakConflict);
        }

        let free_spin_day = match commit.kind {
            SpinKind::Free => Some(commit.spun_at.date_naive().to_string()),
            SpinKind::Paid => None,
        };
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO spin_history (id, user_id, wheel_id, kind, segment_index, spun_at, free_spin_day)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    commit.spin_id,
                    commit.user_id,
                    commit.wheel_id,
                    commit.kind.to_string(),
                    commit.segment_index as i64,
                    timestamp(commit.spun_at),
                    free_spin_day
                ],
            )
            .map_err(db_err)?;
        if inserted == 0 {
            return Ok(SpinCommitOutcome::FreeSpinTaken);
        }

        write_streak(&tx, &commit.streak)?;

        for entry in &commit.ledger {
            apply_ledger(&tx, &commit.user_id, entry, commit.spun_at)?;
        }
        for delta in &commit.inventory {
            apply_inventory(&tx, &commit.user_id, delta)?;
        }
        let mut progress = Vec::with_capacity(commit.progress.len());
        for increment in &commit.progress {
            progress.push(increment_progress(&tx, increment, commit.spun_at)?);
        }

        if let Some(code) = &commit.gift_code {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO gift_codes (code, user_id, value_cents, issued_on, expires_on, spin_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        code.code,
                        code.user_id,
                        code.value_cents,
                        code.issued_on.to_string(),
                        code.expires_on.to_string(),
                        commit.spin_id
                    ],
                )
                .map_err(db_err)?;
            if inserted == 0 {
                return Ok(SpinCommitOutcome::GiftCodeTaken);
            }
        }

        tx.commit().map_err(db_err)?;
        Ok(SpinCommitOutcome::Committed { progress })
    }

    fn gift_code_exists(&self, code: &str) -> RepoResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM gift_codes WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    fn gift_codes(&self, user_id: &str) -> RepoResult<Vec<GiftCode>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT code, user_id, value_cents, issued_on, expires_on FROM gift_codes
                 WHERE user_id = ?1 ORDER BY issued_on DESC, code",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(code, user_id, value_cents, issued_on, expires_on)| {
                Ok(GiftCode {
                    code,
                    user_id,
                    value_cents,
                    issued_on: parse_day(&issued_on)?,
                    expires_on: parse_day(&expires_on)?,
                })
            })
            .collect()
    }

    fn recover_streak(
        &self,
        user_id: &str,
        cost: i64,
        at: DateTime<Utc>,
    ) -> RepoResult<RecoveryOutcome> {
        let tx = self.immediate()?;

        let broken: Option<Option<u32>> = tx
            .query_row(
                "SELECT broken_streak_value FROM user_streaks WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        let Some(restored) = broken.flatten() else {
            return Ok(RecoveryOutcome::NoBrokenStreak);
        };

        let debited = tx
            .execute(
                "UPDATE balances SET orydors = orydors - ?2 WHERE user_id = ?1 AND orydors >= ?2",
                params![user_id, cost],
            )
            .map_err(db_err)?;
        if debited == 0 {
            let balance: Option<i64> = tx
                .query_row(
                    "SELECT orydors FROM balances WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            return Ok(RecoveryOutcome::InsufficientFunds {
                balance: balance.unwrap_or(0),
            });
        }

        tx.execute(
            "INSERT INTO ledger_entries (user_id, currency, amount, reason, reference_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                Currency::Orydors.to_string(),
                -cost,
                LedgerReason::StreakRecovery.to_string(),
                format!("streak:{}", user_id),
                timestamp(at)
            ],
        )
        .map_err(db_err)?;

        tx.execute(
            "UPDATE user_streaks SET
                current_streak = ?2,
                max_streak = MAX(max_streak, ?2),
                broken_streak_value = NULL
             WHERE user_id = ?1",
            params![user_id, restored],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(RecoveryOutcome::Recovered { restored })
    }

    fn advance_objectives(
        &self,
        increments: &[ProgressIncrement],
        at: DateTime<Utc>,
    ) -> RepoResult<Vec<ProgressUpdate>> {
        let tx = self.immediate()?;
        let updates = increments
            .iter()
            .map(|increment| increment_progress(&tx, increment, at))
            .collect::<RepoResult<Vec<_>>>()?;
        tx.commit().map_err(db_err)?;
        Ok(updates)
    }

    fn get_progress(
        &self,
        objective_id: &str,
        subject: &Subject,
    ) -> RepoResult<Option<ObjectiveProgress>> {
        let raw = self
            .conn
            .query_row(
                "SELECT objective_id, subject_kind, subject_id, current_count, completed, completed_at
                 FROM objective_progress
                 WHERE objective_id = ?1 AND subject_kind = ?2 AND subject_id = ?3",
                params![objective_id, subject.kind(), subject.id()],
                row_to_progress,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(progress_from_row).transpose()
    }

    fn commit_challenge_payout(
        &self,
        challenge_id: &str,
        user_id: &str,
        ledger: &[LedgerEntry],
        inventory: &[InventoryDelta],
        at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let tx = self.immediate()?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO challenge_payouts (challenge_id, user_id, paid_at) VALUES (?1, ?2, ?3)",
                params![challenge_id, user_id, timestamp(at)],
            )
            .map_err(db_err)?;
        if inserted == 0 {
            return Ok(false);
        }

        for entry in ledger {
            apply_ledger(&tx, user_id, entry, at)?;
        }
        for delta in inventory {
            apply_inventory(&tx, user_id, delta)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(true)
    }

    fn challenge_settled(&self, challenge_id: &str, subject: &Subject) -> RepoResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM challenge_settlements
                 WHERE challenge_id = ?1 AND subject_kind = ?2 AND subject_id = ?3",
                params![challenge_id, subject.kind(), subject.id()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    fn mark_challenge_settled(
        &self,
        challenge_id: &str,
        subject: &Subject,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO challenge_settlements (challenge_id, subject_kind, subject_id, settled_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![challenge_id, subject.kind(), subject.id(), timestamp(at)],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> SqliteDb {
        let db = SqliteDb::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn chest_commit(user: &str, content: &str, period: &str) -> ChestCommit {
        ChestCommit {
            user_id: user.to_string(),
            content_id: content.to_string(),
            period_key: period.to_string(),
            bypass_key: None,
            record_claim: true,
            ledger: vec![LedgerEntry {
                currency: Currency::Orydors,
                amount: 120,
                reason: LedgerReason::Chest,
                reference_id: content.to_string(),
            }],
            inventory: vec![InventoryDelta {
                reward_id: "card-1".to_string(),
                quantity: 2,
            }],
            progress: vec![],
            opened_at: at("2026-10-17T09:00:00Z"),
            summary_json: "{}".to_string(),
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let db = setup_db();
        db.init().unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_reward_round_trip_and_immutability() {
        let db = setup_db();
        let key = RewardDescriptor {
            id: "chest-key".to_string(),
            name: "Chest Key".to_string(),
            rarity: Rarity::Rare,
            kind: RewardKind::Item {
                effect: ItemEffect::ChestKey,
            },
        };
        db.insert_reward(&key).unwrap();
        assert_eq!(db.get_reward("chest-key").unwrap(), Some(key.clone()));
        assert!(db.insert_reward(&key).is_err());
        assert!(db.get_reward("missing").unwrap().is_none());
    }

    #[test]
    fn test_commit_chest_writes_claim_last() {
        let db = setup_db();
        let commit = chest_commit("alice", "book-1", "2026-10");

        assert!(!db.has_claim("alice", "book-1", "2026-10").unwrap());
        assert_eq!(
            db.commit_chest(&commit).unwrap(),
            ChestCommitOutcome::Committed { progress: vec![] }
        );
        assert!(db.has_claim("alice", "book-1", "2026-10").unwrap());
        assert_eq!(db.balance("alice").unwrap().orydors, 120);
        assert_eq!(db.inventory_quantity("alice", "card-1").unwrap(), 2);

        // Second commit rolls back entirely
        assert_eq!(
            db.commit_chest(&commit).unwrap(),
            ChestCommitOutcome::AlreadyClaimed
        );
        assert_eq!(db.balance("alice").unwrap().orydors, 120);
        assert_eq!(db.inventory_quantity("alice", "card-1").unwrap(), 2);
        assert_eq!(db.claim_count().unwrap(), 1);
    }

    #[test]
    fn test_commit_chest_spends_key() {
        let db = setup_db();
        db.commit_chest(&chest_commit("alice", "book-1", "2026-10"))
            .unwrap();

        let mut reopen = chest_commit("alice", "book-1", "2026-10");
        reopen.bypass_key = Some("chest-key".to_string());
        assert_eq!(
            db.commit_chest(&reopen).unwrap(),
            ChestCommitOutcome::KeyUnavailable
        );
        assert_eq!(db.balance("alice").unwrap().orydors, 120);

        db.adjust_inventory(
            "alice",
            &InventoryDelta {
                reward_id: "chest-key".to_string(),
                quantity: 1,
            },
        )
        .unwrap();
        assert_eq!(
            db.commit_chest(&reopen).unwrap(),
            ChestCommitOutcome::Committed { progress: vec![] }
        );
        assert_eq!(db.inventory_quantity("alice", "chest-key").unwrap(), 0);
        assert_eq!(db.balance("alice").unwrap().orydors, 240);
    }

    fn increment(objective: &str, subject: &Subject, delta: u32, target: u32) -> ProgressIncrement {
        ProgressIncrement {
            challenge_id: "ch-1".to_string(),
            objective_id: objective.to_string(),
            subject: subject.clone(),
            delta,
            target,
        }
    }

    #[test]
    fn test_advance_objectives_clamps_and_stamps_once() {
        let db = setup_db();
        let subject = Subject::User("alice".to_string());

        let first = db
            .advance_objectives(
                &[increment("obj-1", &subject, 2, 3)],
                at("2026-10-17T09:00:00Z"),
            )
            .unwrap();
        assert_eq!(first[0].progress.current_count, 2);
        assert!(!first[0].newly_completed);
        assert!(first[0].progress.completed_at.is_none());

        let second = db
            .advance_objectives(
                &[increment("obj-1", &subject, 5, 3)],
                at("2026-10-17T10:00:00Z"),
            )
            .unwrap();
        assert_eq!(second[0].progress.current_count, 3);
        assert!(second[0].newly_completed);
        assert_eq!(
            second[0].progress.completed_at,
            Some(at("2026-10-17T10:00:00Z"))
        );

        let third = db
            .advance_objectives(
                &[increment("obj-1", &subject, 1, 3)],
                at("2026-10-17T11:00:00Z"),
            )
            .unwrap();
        assert_eq!(third[0].progress.current_count, 3);
        assert!(!third[0].newly_completed);
        assert_eq!(
            third[0].progress.completed_at,
            Some(at("2026-10-17T10:00:00Z"))
        );
    }

    #[test]
    fn test_advance_objectives_keys_guild_separately() {
        let db = setup_db();
        let user = Subject::User("g1".to_string());
        let guild = Subject::Guild("g1".to_string());
        let updates = db
            .advance_objectives(
                &[increment("obj-1", &user, 1, 10), increment("obj-1", &guild, 4, 10)],
                at("2026-10-17T09:00:00Z"),
            )
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(db.get_progress("obj-1", &user).unwrap().unwrap().current_count, 1);
        assert_eq!(db.get_progress("obj-1", &guild).unwrap().unwrap().current_count, 4);
    }

    #[test]
    fn test_commit_chest_applies_progress_with_the_grant() {
        let db = setup_db();
        let alice = Subject::User("alice".to_string());
        let mut commit = chest_commit("alice", "book-1", "2026-10");
        commit.progress = vec![increment("collect-cards", &alice, 2, 2)];

        let ChestCommitOutcome::Committed { progress } = db.commit_chest(&commit).unwrap() else {
            panic!("chest was not committed");
        };
        assert_eq!(progress.len(), 1);
        assert!(progress[0].newly_completed);
        assert_eq!(
            progress[0].progress.completed_at,
            Some(at("2026-10-17T09:00:00Z"))
        );

        // A rolled back opening leaves progress untouched
        let mut other = chest_commit("alice", "book-1", "2026-10");
        other.progress = vec![increment("collect-more", &alice, 1, 5)];
        assert_eq!(
            db.commit_chest(&other).unwrap(),
            ChestCommitOutcome::AlreadyClaimed
        );
        assert!(db.get_progress("collect-more", &alice).unwrap().is_none());
    }

    #[test]
    fn test_commit_spin_caps_free_spins() {
        let db = setup_db();
        let spun_at = at("2026-10-17T09:00:00Z");
        let mut streak = UserStreak::new("alice");
        streak.current_streak = 1;
        streak.max_streak = 1;
        streak.last_participation_date = Some(spun_at.date_naive());

        let commit = SpinCommit {
            spin_id: "spin-1".to_string(),
            user_id: "alice".to_string(),
            wheel_id: "daily".to_string(),
            kind: SpinKind::Free,
            segment_index: 0,
            spun_at,
            previous_streak: None,
            streak: streak.clone(),
            ledger: vec![],
            inventory: vec![],
            progress: vec![],
            gift_code: None,
        };
        assert_eq!(
            db.commit_spin(&commit).unwrap(),
            SpinCommitOutcome::Committed { progress: vec![] }
        );
        assert!(db.has_free_spin("alice", spun_at.date_naive()).unwrap());

        let again = SpinCommit {
            spin_id: "spin-2".to_string(),
            previous_streak: Some(streak.clone()),
            ..commit.clone()
        };
        assert_eq!(db.commit_spin(&again).unwrap(), SpinCommitOutcome::FreeSpinTaken);

        let paid = SpinCommit {
            spin_id: "spin-3".to_string(),
            kind: SpinKind::Paid,
            ..again
        };
        assert_eq!(
            db.commit_spin(&paid).unwrap(),
            SpinCommitOutcome::Committed { progress: vec![] }
        );
    }

    fn paid_spin(
        id: &str,
        spun_at: DateTime<Utc>,
        previous: Option<UserStreak>,
        streak: UserStreak,
    ) -> SpinCommit {
        SpinCommit {
            spin_id: id.to_string(),
            user_id: "alice".to_string(),
            wheel_id: "daily".to_string(),
            kind: SpinKind::Paid,
            segment_index: 0,
            spun_at,
            previous_streak: previous,
            streak,
            ledger: vec![],
            inventory: vec![],
            progress: vec![],
            gift_code: None,
        }
    }

    #[test]
    fn test_commit_spin_detects_streak_conflict() {
        let db = setup_db();
        let spun_at = at("2026-10-17T09:00:00Z");
        let mut seen = UserStreak::new("alice");
        seen.last_participation_date = Some(spun_at.date_naive());
        let commit = paid_spin("spin-1", spun_at, Some(seen), UserStreak::new("alice"));
        assert_eq!(
            db.commit_spin(&commit).unwrap(),
            SpinCommitOutcome::StreakConflict
        );
    }

    #[test]
    fn test_commit_spin_conflicts_with_recovery_on_same_date() {
        let db = setup_db();
        let spun_at = at("2026-10-17T09:00:00Z");
        db.put_streak(&UserStreak {
            user_id: "alice".to_string(),
            current_streak: 1,
            max_streak: 12,
            last_participation_date: Some(parse_day("2026-10-16").unwrap()),
            broken_streak_value: Some(12),
        })
        .unwrap();
        db.adjust_balance(
            "alice",
            &LedgerEntry {
                currency: Currency::Orydors,
                amount: 200,
                reason: LedgerReason::Chest,
                reference_id: "seed".to_string(),
            },
        )
        .unwrap();

        // The spin reads and advances the streak, then a recovery lands first
        let stored = db.get_streak("alice").unwrap();
        let transition = crate::streak::advance(stored.as_ref(), "alice", spun_at.date_naive());
        assert_eq!(transition.after.current_streak, 2);
        assert_eq!(
            db.recover_streak("alice", 200, spun_at).unwrap(),
            RecoveryOutcome::Recovered { restored: 12 }
        );

        let commit = paid_spin("spin-1", spun_at, transition.before, transition.after);
        assert_eq!(
            db.commit_spin(&commit).unwrap(),
            SpinCommitOutcome::StreakConflict
        );
        let streak = db.get_streak("alice").unwrap().unwrap();
        assert_eq!(streak.current_streak, 12);
        assert!(streak.broken_streak_value.is_none());

        // A retry against the recovered record continues from 12
        let stored = db.get_streak("alice").unwrap();
        let transition = crate::streak::advance(stored.as_ref(), "alice", spun_at.date_naive());
        let commit = paid_spin("spin-2", spun_at, transition.before, transition.after);
        assert_eq!(
            db.commit_spin(&commit).unwrap(),
            SpinCommitOutcome::Committed { progress: vec![] }
        );
        assert_eq!(db.get_streak("alice").unwrap().unwrap().current_streak, 13);
    }

    #[test]
    fn test_recover_streak_outcomes() {
        let db = setup_db();
        let now = at("2026-10-17T09:00:00Z");
        assert_eq!(
            db.recover_streak("alice", 200, now).unwrap(),
            RecoveryOutcome::NoBrokenStreak
        );

        db.put_streak(&UserStreak {
            user_id: "alice".to_string(),
            current_streak: 1,
            max_streak: 9,
            last_participation_date: Some(now.date_naive()),
            broken_streak_value: Some(9),
        })
        .unwrap();
        assert_eq!(
            db.recover_streak("alice", 200, now).unwrap(),
            RecoveryOutcome::InsufficientFunds { balance: 0 }
        );

        db.adjust_balance(
            "alice",
            &LedgerEntry {
                currency: Currency::Orydors,
                amount: 250,
                reason: LedgerReason::Chest,
                reference_id: "seed".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            db.recover_streak("alice", 200, now).unwrap(),
            RecoveryOutcome::Recovered { restored: 9 }
        );
        assert_eq!(db.balance("alice").unwrap().orydors, 50);
        let streak = db.get_streak("alice").unwrap().unwrap();
        assert_eq!(streak.current_streak, 9);
        assert!(streak.broken_streak_value.is_none());
    }

    #[test]
    fn test_challenge_payout_once_per_user() {
        let db = setup_db();
        let now = at("2026-10-17T09:00:00Z");
        let ledger = vec![LedgerEntry {
            currency: Currency::Experience,
            amount: 300,
            reason: LedgerReason::ChallengePayout,
            reference_id: "ch-1".to_string(),
        }];
        assert!(db
            .commit_challenge_payout("ch-1", "alice", &ledger, &[], now)
            .unwrap());
        assert!(!db
            .commit_challenge_payout("ch-1", "alice", &ledger, &[], now)
            .unwrap());
        assert_eq!(db.balance("alice").unwrap().experience, 300);
    }

    #[test]
    fn test_challenge_settlement_is_per_subject() {
        let db = setup_db();
        let now = at("2026-10-17T09:00:00Z");
        let guild = Subject::Guild("g1".to_string());
        assert!(!db.challenge_settled("ch-1", &guild).unwrap());
        db.mark_challenge_settled("ch-1", &guild, now).unwrap();
        db.mark_challenge_settled("ch-1", &guild, now).unwrap();
        assert!(db.challenge_settled("ch-1", &guild).unwrap());
        assert!(!db.challenge_settled("ch-1", &Subject::User("g1".to_string())).unwrap());
    }

    #[test]
    fn test_active_wheel_picks_latest_start() {
        let db = setup_db();
        let mut base = WheelConfig {
            id: "base".to_string(),
            name: "Everyday".to_string(),
            premium_only: false,
            starts_on: parse_day("2026-01-01").unwrap(),
            ends_on: None,
            segments: vec![WheelSegment {
                label: "10".to_string(),
                reward: SegmentReward::Currency { amount: 10 },
                weight: 100,
            }],
        };
        db.upsert_wheel(&base).unwrap();
        base.id = "halloween".to_string();
        base.starts_on = parse_day("2026-10-25").unwrap();
        base.ends_on = Some(parse_day("2026-10-31").unwrap());
        db.upsert_wheel(&base).unwrap();

        let day = parse_day("2026-10-17").unwrap();
        assert_eq!(db.active_wheel(day).unwrap().unwrap().id, "base");
        let day = parse_day("2026-10-28").unwrap();
        assert_eq!(db.active_wheel(day).unwrap().unwrap().id, "halloween");
    }
}
