//! Command handlers for the lectio CLI
//!
//! Each subcommand has its own module with handler functions. Handlers take
//! an already opened [`Engine`] so they can be driven from tests against an
//! in-memory store.

pub mod balance;
pub mod catalog;
pub mod chest;
pub mod configure;
pub mod progress;
pub mod streak;
pub mod wheel;

use anyhow::{Context, Result};
use lectio::{CatalogRepository, Engine, EngineConfig, EngineError, SqliteDb};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::Path;

/// Open (and migrate) the database, wrapping it in an engine
pub fn open_engine(db: &Path, config: EngineConfig) -> Result<Engine<SqliteDb>> {
    if let Some(parent) = db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = SqliteDb::open(db)
        .with_context(|| format!("Failed to open database at {}", db.display()))?;
    store.init().context("Failed to apply database migrations")?;
    Ok(Engine::new(store, config))
}

/// Seeded RNG when a seed is given, entropy otherwise
pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Turn an engine error into something printable.
///
/// Eligibility and lookup failures are shown as the end-user message;
/// internal errors keep their detail for the operator.
pub fn engine_error(err: EngineError) -> anyhow::Error {
    match err {
        EngineError::Internal(_) => anyhow::Error::new(err),
        other => anyhow::anyhow!(other.user_message()),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize result")?
    );
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_engine_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("share").join("lectio.db");
        let engine = open_engine(&path, EngineConfig::default()).unwrap();
        assert!(path.exists());
        assert_eq!(engine.balance("nobody").unwrap().orydors, 0);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let a: u64 = rng(Some(7)).gen();
        let b: u64 = rng(Some(7)).gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_engine_error_messages() {
        let err = engine_error(EngineError::AlreadyClaimed(
            "opened this chest this period".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "You have already opened this chest this period."
        );
    }
}
