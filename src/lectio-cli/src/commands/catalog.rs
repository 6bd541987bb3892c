//! Database setup and catalog import handlers

use anyhow::{Context, Result};
use lectio::{CatalogImport, Engine, RewardStore};
use std::path::Path;

use super::{engine_error, print_json};
use crate::cli::OutputFormat;

/// Handle `init`; the migrations already ran when the engine was opened
pub fn init(db: &Path) -> Result<()> {
    println!("Your database is ready at {}", db.display());
    Ok(())
}

/// Handle `import`
pub fn import<S: RewardStore>(engine: &Engine<S>, file: &Path, format: OutputFormat) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read catalog from {}", file.display()))?;
    let catalog: CatalogImport = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse catalog {}", file.display()))?;

    let summary = engine.import_catalog(&catalog).map_err(engine_error)?;

    if format == OutputFormat::Json {
        return print_json(&summary);
    }

    println!("Imported {}", file.display());
    println!(
        "  Rewards:        {} ({} unchanged)",
        summary.rewards, summary.rewards_unchanged
    );
    println!("  Contents:       {}", summary.contents);
    println!("  Loot entries:   {}", summary.loot);
    println!("  Wheels:         {}", summary.wheels);
    println!("  Streak bonuses: {}", summary.streak_bonuses);
    println!("  Skills:         {}", summary.skills);
    println!("  Challenges:     {}", summary.challenges);
    println!("  Users:          {}", summary.users);
    println!("  Unlocks:        {}", summary.unlocks);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::engine;
    use lectio::CatalogRepository;

    #[test]
    fn test_import_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{
                "rewards": [{"id": "coins", "name": "Coins", "kind": {"category": "currency", "amount": 25}}],
                "contents": [{"id": "book-1", "title": "Ember Crown", "reward_value": 80}]
            }"#,
        )
        .unwrap();

        let engine = engine();
        import(&engine, &path, OutputFormat::Text).unwrap();
        assert!(engine.store().get_reward("coins").unwrap().is_some());
        assert!(engine.store().get_content("book-1").unwrap().is_some());
    }

    #[test]
    fn test_invalid_catalog_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"contents": [{"id": "", "title": "Nameless", "reward_value": 10}]}"#,
        )
        .unwrap();

        let err = import(&engine(), &path, OutputFormat::Text).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = import(&engine(), Path::new("/nonexistent/catalog.json"), OutputFormat::Json)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog"));
    }
}
