//! ============================================================================
//! CODELOCK-CORE: Keypad Code Locks
//! ============================================================================
//! Access control for code-locked doors and storage in a shared simulated
//! world:
//! - Persisted lock registry keyed by object instance id
//! - Synchronous allow / challenge / no-opinion decisions at the host's
//!   access-check interception point
//! - Escalating wrong-code penalties over a sliding time window
//! - Post-load reconciliation of persisted locks against live objects
//!
//! The host wires its world, keypad UI, and damage systems in through the
//! traits in [`host`], then drives a [`CodeLockEngine`] from its simulation
//! thread:
//!
//! ```rust,ignore
//! use codelock_core::{CodeLockConfig, CodeLockEngine, LockStore};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut store = LockStore::new("locks.json");
//! store.load()?;
//!
//! let engine = CodeLockEngine::new(
//!     Rc::new(RefCell::new(store)),
//!     CodeLockConfig::default(),
//!     Box::new(world),
//!     Box::new(keypad),
//!     Box::new(damage),
//! );
//! engine.on_world_loaded();
//!
//! // per access attempt:
//! let check = engine.on_access_check(actor_id, instance_id);
//! ```
//! ============================================================================

pub mod config;
pub mod engine;
pub mod host;
pub mod locks;
pub mod reconcile;
pub mod throttle;
pub mod types;

// Re-export main types for convenience
pub use config::{AttemptsConfig, CodeLockConfig};
pub use engine::CodeLockEngine;
pub use host::{KeypadUi, ObjectHandle, ObjectKind, ObjectSync, PenaltyApplier};
pub use locks::{CodeLock, InvalidCode, LoadError, LockCode, LockStore, SaveError, MAX_CODE};
pub use reconcile::ReconcileSummary;
pub use throttle::{damage_for_tier, Attempt, AttemptThrottle};
pub use types::{
    AccessCheck, AccessDecision, ActorId, CodeEntryOutcome, InstanceId, UpsertOutcome,
};
