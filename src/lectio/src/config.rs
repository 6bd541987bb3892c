//! Engine tunables.

use serde::{Deserialize, Serialize};

/// Tunable constants of the engine. Every field has a default so a partial
/// `[engine]` table in the CLI config is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Currency segments at or above this value count as notable for probability boosts
    pub notable_currency_threshold: u32,
    /// Orydors charged to restore a broken streak
    pub streak_recovery_cost: u32,
    /// Validity of minted gift codes
    pub gift_code_validity_months: u32,
    /// Whole-spin retries after a streak compare-and-swap conflict
    pub spin_attempts: u32,
    /// Retries for additive progress writes hitting a busy database
    pub progress_write_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notable_currency_threshold: 500,
            streak_recovery_cost: 200,
            gift_code_validity_months: 12,
            spin_attempts: 3,
            progress_write_attempts: 3,
        }
    }
}
