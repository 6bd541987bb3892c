//! Experience to level mapping.

use serde::{Deserialize, Serialize};

/// Cumulative XP required for levels 1 through 20
pub const LEVEL_THRESHOLDS: [u64; 20] = [
    0, 100, 250, 450, 700, 1000, 1400, 1900, 2500, 3200, 4000, 5000, 6200, 7600, 9200, 11000,
    13000, 15500, 18500, 22000,
];

/// XP per level past the end of the table
pub const XP_PER_LEVEL_AFTER_TABLE: u64 = 4000;

/// Highest level whose threshold is at most `xp`. Defined for every `xp`.
pub fn level_for(xp: u64) -> u32 {
    let last = LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1];
    if xp >= last {
        let extra = (xp - last) / XP_PER_LEVEL_AFTER_TABLE;
        return (LEVEL_THRESHOLDS.len() as u64)
            .saturating_add(extra)
            .min(u64::from(u32::MAX)) as u32;
    }
    // partition_point counts thresholds <= xp, which is the level itself
    LEVEL_THRESHOLDS.partition_point(|&t| t <= xp) as u32
}

/// Cumulative XP at which `level` starts
pub fn threshold_for(level: u32) -> u64 {
    match level {
        0 | 1 => 0,
        l if (l as usize) <= LEVEL_THRESHOLDS.len() => LEVEL_THRESHOLDS[l as usize - 1],
        l => {
            let past = u64::from(l) - LEVEL_THRESHOLDS.len() as u64;
            LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1]
                .saturating_add(past.saturating_mul(XP_PER_LEVEL_AFTER_TABLE))
        }
    }
}

/// XP still needed to reach the next level
pub fn xp_to_next_level(xp: u64) -> u64 {
    threshold_for(level_for(xp).saturating_add(1)).saturating_sub(xp)
}

/// Level before and after an XP grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChange {
    pub before: u32,
    pub after: u32,
}

impl LevelChange {
    pub fn from_xp(before_xp: i64, after_xp: i64) -> Self {
        Self {
            before: level_for(before_xp.max(0) as u64),
            after: level_for(after_xp.max(0) as u64),
        }
    }

    pub fn leveled_up(&self) -> bool {
        self.after > self.before
    }
}
