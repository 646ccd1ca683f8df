//! ============================================================================
//! Engine Configuration
//! ============================================================================
//! Host-supplied behavior switches: remembered-access policy and the
//! wrong-code penalty ladder. Loaded once at startup and handed to the
//! engine by value; changing policy means restarting the engine.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Behavior switches for the code-lock engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeLockConfig {
    /// Let a lock's owner back in silently, without re-entering the code.
    pub remember_owner: bool,
    /// Let every remembered user (owner included) back in silently.
    pub remember_users: bool,
    /// Failed-entry throttling and penalties.
    pub attempts: AttemptsConfig,
}

impl Default for CodeLockConfig {
    fn default() -> Self {
        Self {
            remember_owner: true,
            remember_users: true,
            attempts: AttemptsConfig::default(),
        }
    }
}

/// Sliding-window settings for wrong-code entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttemptsConfig {
    /// Seconds a failed entry keeps counting toward the penalty tier.
    pub cooldown_secs: i64,
    /// Damage per consecutive-failure tier. Tiers past the end of the table
    /// wrap back to the first entry; an empty table disables penalties.
    pub damages: Vec<u8>,
}

impl Default for AttemptsConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 60,
            damages: vec![5, 10, 20],
        }
    }
}
