//! ============================================================================
//! Locks Module - Code-lock records and their persisted registry
//! ============================================================================
//! A `CodeLock` pairs a protected object with a four-digit code and the
//! ordered list of actors remembered on it. The `LockStore` owns every
//! record and the JSON registry file they live in between sessions.
//!
//! ## Usage
//! ```rust,ignore
//! use codelock_core::locks::{LockCode, LockStore};
//!
//! let mut store = LockStore::new("locks.json");
//! store.load()?;
//! store.upsert(instance_id, "1234".parse::<LockCode>()?, actor_id);
//! store.save()?;
//! ```
//! ============================================================================

mod store;
mod types;

// Re-export public types
pub use store::{LoadError, LockStore, SaveError};
pub use types::{CodeLock, InvalidCode, LockCode, MAX_CODE};
