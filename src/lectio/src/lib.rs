//! Reward Resolution & Progression Engine
//!
//! Decides what a reader receives for finishing a book, opening a chest,
//! spinning the daily wheel or advancing a challenge, and commits the result
//! through a storage trait so that claim limits hold under concurrency.
//!
//! # Features
//!
//! - `sqlite` (default) - SQLite store using rusqlite
//!
//! # Example
//!
//! ```no_run
//! use lectio::{Engine, EngineConfig, SqliteDb, CatalogRepository, SpinKind};
//!
//! let db = SqliteDb::open("lectio.db").unwrap();
//! db.init().unwrap();
//! let engine = Engine::new(db, EngineConfig::default());
//!
//! let now = chrono::Utc::now();
//! let chest = engine.open_chest("alice", "book-1", None, now).unwrap();
//! println!("{} orydors", chest.orydors);
//!
//! let spin = engine.spin("alice", SpinKind::Free, now).unwrap();
//! println!("won {}", spin.label);
//! ```

pub mod catalog;
pub mod challenge;
pub mod chest;
pub mod config;
pub mod engine;
pub mod error;
pub mod giftcard;
pub mod level;
pub mod loot;
pub mod repository;
pub mod shared;
pub mod skills;
pub mod streak;
pub mod types;
pub mod validate;
pub mod wheel;

#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export types
pub use types::*;

pub use catalog::{CatalogImport, ImportSummary, SkillUnlock};
pub use challenge::{ProgressEvent, ProgressResult};
pub use chest::ChestResult;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult, ValidationError};
pub use giftcard::{GiftCodeNotifier, LogNotifier, NotifyError};
pub use level::{level_for, LevelChange};
pub use loot::RewardBundle;
pub use repository::{
    CatalogRepository, ProfileRepository, ProgressionRepository, RepoError, RepoResult,
    RewardStore,
};
pub use streak::RecoveryResult;
pub use wheel::SpinResult;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDb, DEFAULT_DB_PATH};
