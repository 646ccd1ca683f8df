//! ============================================================================
//! Host Collaborators
//! ============================================================================
//! The engine never touches live world objects, UI surfaces, or actor
//! vitality directly; it talks to these traits. The host wires concrete
//! implementations in at startup, tests substitute recording mocks.
//! ============================================================================

use crate::locks::CodeLock;
use crate::types::{ActorId, InstanceId};

/// What kind of interactive object a lock protects. Doors and storage have
/// a default action the engine can replay after a correct code entry; other
/// kinds are guarded but never replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Door,
    Storage,
    Other,
}

impl ObjectKind {
    /// Whether a successful code entry replays the intercepted action.
    pub fn reissues_access(self) -> bool {
        matches!(self, ObjectKind::Door | ObjectKind::Storage)
    }
}

/// A persisted instance id resolved to a live world object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle {
    pub instance_id: InstanceId,
    pub kind: ObjectKind,
}

/// Bridge between persisted lock records and live world objects.
pub trait ObjectSync {
    /// Resolve an instance id to its live object, if it still exists.
    fn resolve(&self, instance_id: InstanceId) -> Option<ObjectHandle>;

    /// A lock's state changed (set, removed, user remembered); refresh the
    /// object's world representation. `last_actor_id` is the actor whose
    /// action caused the change, when there is one.
    fn notify_changed(&self, instance_id: InstanceId, last_actor_id: Option<ActorId>);

    /// Replay the action the engine intercepted (toggle the door, open the
    /// storage). The replay runs the host's access check again and may
    /// re-enter [`CodeLockEngine::on_access_check`] before this returns.
    ///
    /// [`CodeLockEngine::on_access_check`]: crate::engine::CodeLockEngine::on_access_check
    fn reissue_access(&self, actor_id: ActorId, handle: &ObjectHandle);
}

/// Presents the code-entry keypad to an actor.
pub trait KeypadUi {
    /// Show the keypad for a lock. Fire-and-forget: the actor's later input
    /// comes back through [`CodeLockEngine::submit_code`]. Returns `false`
    /// when the actor cannot be resolved to a live session, in which case
    /// the engine abandons the challenge without side effects.
    ///
    /// [`CodeLockEngine::submit_code`]: crate::engine::CodeLockEngine::submit_code
    fn show_keypad(&self, actor_id: ActorId, lock: &CodeLock) -> bool;
}

/// Applies wrong-code penalties to an actor's vitality.
pub trait PenaltyApplier {
    /// Fire-and-forget. Implementations tolerate an actor that has already
    /// disconnected; a zero amount is still reported.
    fn apply_damage(&self, actor_id: ActorId, amount: u8);
}
