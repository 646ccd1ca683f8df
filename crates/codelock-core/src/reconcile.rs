//! ============================================================================
//! Lifecycle Reconciliation
//! ============================================================================
//! One-shot sweep that runs after the world finishes loading, before any
//! access attempt is evaluated. Locks whose object no longer exists are
//! dropped from the store; locks with a live object get their world
//! representation refreshed.
//! ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::host::ObjectSync;
use crate::locks::LockStore;

/// Outcome of a reconciliation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Locks whose object still exists.
    pub retained: usize,
    /// Orphaned locks removed from the store.
    pub removed: usize,
}

/// Walk every persisted lock once, dropping records whose object is gone.
///
/// The store is borrowed per record, never across a `resolve` or
/// `notify_changed` call, so host callbacks may read the registry mid-sweep.
pub fn sweep(store: &Rc<RefCell<LockStore>>, objects: &dyn ObjectSync) -> ReconcileSummary {
    let mut summary = ReconcileSummary {
        retained: 0,
        removed: 0,
    };

    let snapshot = store.borrow().snapshot();
    for lock in snapshot {
        match objects.resolve(lock.instance_id) {
            Some(_) => {
                objects.notify_changed(lock.instance_id, None);
                summary.retained += 1;
            }
            None => {
                debug!("lock {} has no live object, dropping it", lock.instance_id);
                store.borrow_mut().remove(lock.instance_id);
                summary.removed += 1;
            }
        }
    }

    info!(
        "reconciled code locks: {} retained, {} removed",
        summary.retained, summary.removed
    );
    summary
}
