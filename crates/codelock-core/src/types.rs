//! ============================================================================
//! Core Types for Code Locks
//! ============================================================================
//! Identifiers and decision results shared across the lock store, the
//! throttle, and the decision engine. Everything here is serialized to JSON,
//! either into the lock registry or into host-facing event payloads.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// An actor in the simulated world (a connected player, an admin console).
/// Identity is stable across sessions; the host assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lockable object instance (a door, a storage container). Instance ids
/// survive world save/load, which is what makes the lock registry durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verdict handed back to the host's access-check interception point.
///
/// `intercepted == false` means the engine has no lock on the object and the
/// host should fall through to its default access rules. When `intercepted`
/// is true, `allowed` is authoritative for this check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCheck {
    pub intercepted: bool,
    pub allowed: bool,
}

impl AccessCheck {
    /// No lock here; defer to the host's own rules.
    pub fn no_opinion() -> Self {
        Self { intercepted: false, allowed: false }
    }

    /// Locked, and this actor gets through.
    pub fn allow() -> Self {
        Self { intercepted: true, allowed: true }
    }

    /// Locked, and this actor is stopped (usually pending a code entry).
    pub fn deny() -> Self {
        Self { intercepted: true, allowed: false }
    }
}

/// Pure classification of an access attempt, before any side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    /// Object carries no lock.
    NoOpinion,
    /// Remembered actor; silent access.
    Allow,
    /// Locked and not remembered; the actor must enter the code.
    Challenge,
}

/// Result of a code submitted through the keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeEntryOutcome {
    /// Correct code. `remembered` is whether the actor was newly added to the
    /// lock's user list, `reissued` whether the intercepted action was
    /// replayed against the live object.
    Granted { remembered: bool, reissued: bool },
    /// Wrong code. `tier` counts consecutive recent failures for this
    /// actor/object pair and `damage` is the penalty that was applied.
    Denied { tier: u32, damage: u8 },
    /// The lock (or its object) vanished between keypad and submission; the
    /// entry is dropped without side effects.
    Stale,
}

/// What a store upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// A new lock was created for the object.
    Created,
    /// An existing lock got a new code; its user list was kept.
    Changed,
}
