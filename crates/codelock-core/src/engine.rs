//! ============================================================================
//! Access Decision Engine
//! ============================================================================
//! Sits behind the host's access-check interception point and decides, per
//! attempt, whether to stay out of the way, grant silent access, or challenge
//! the actor with a keypad. Verifies submitted codes, throttles and punishes
//! wrong entries, and replays the intercepted action after a correct one
//! through a one-shot bypass so the replay is not re-challenged.
//!
//! One logical thread drives the engine: interception, keypad callbacks, and
//! lifecycle events all arrive on the host's simulation step. State therefore
//! lives in `RefCell`/`Cell` rather than behind locks, and every interior
//! borrow is dropped before a collaborator call-out so a replay may re-enter
//! `on_access_check` while `submit_code` is still on the stack.
//! ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CodeLockConfig;
use crate::host::{KeypadUi, ObjectSync, PenaltyApplier};
use crate::locks::{CodeLock, LockCode, LockStore, SaveError};
use crate::reconcile::{self, ReconcileSummary};
use crate::throttle::{damage_for_tier, AttemptThrottle};
use crate::types::{
    AccessCheck, AccessDecision, ActorId, CodeEntryOutcome, InstanceId, UpsertOutcome,
};

/// The access-control decision engine for code-locked objects.
pub struct CodeLockEngine {
    locks: Rc<RefCell<LockStore>>,
    throttle: RefCell<AttemptThrottle>,
    config: CodeLockConfig,
    objects: Box<dyn ObjectSync>,
    keypad: Box<dyn KeypadUi>,
    penalty: Box<dyn PenaltyApplier>,
    /// One-shot trust flag for replayed actions; armed only while
    /// `reissue_access` is on the stack.
    bypass: Cell<bool>,
}

impl CodeLockEngine {
    pub fn new(
        locks: Rc<RefCell<LockStore>>,
        config: CodeLockConfig,
        objects: Box<dyn ObjectSync>,
        keypad: Box<dyn KeypadUi>,
        penalty: Box<dyn PenaltyApplier>,
    ) -> Self {
        Self {
            locks,
            throttle: RefCell::new(AttemptThrottle::new()),
            config,
            objects,
            keypad,
            penalty,
            bypass: Cell::new(false),
        }
    }

    /// Shared handle to the lock store, for save triggers and inspection.
    pub fn locks(&self) -> Rc<RefCell<LockStore>> {
        Rc::clone(&self.locks)
    }

    // ===== Interception boundary =====

    /// The host calls this before permitting access to an object; the result
    /// is authoritative whenever `intercepted` is true. Synchronous and free
    /// of I/O; the only side effect is presenting a keypad on `Challenge`.
    pub fn on_access_check(&self, actor_id: ActorId, instance_id: InstanceId) -> AccessCheck {
        // A replayed action was already authorized by a correct code entry;
        // wave it through before any lookup.
        if self.bypass.get() {
            return AccessCheck::allow();
        }

        // Copy the record out so no store borrow is held across the keypad
        // call.
        let lock = match self.locks.borrow().get(instance_id) {
            Some(lock) => lock.clone(),
            None => return AccessCheck::no_opinion(),
        };

        if self.policy_allows(&lock, actor_id) {
            debug!("silent access for {} on {}", actor_id, instance_id);
            return AccessCheck::allow();
        }

        if !self.keypad.show_keypad(actor_id, &lock) {
            debug!(
                "challenge for {} on {} abandoned, actor has no live session",
                actor_id, instance_id
            );
            return AccessCheck::deny();
        }

        debug!("challenging {} for the code to {}", actor_id, instance_id);
        AccessCheck::deny()
    }

    /// Pure classification of an access attempt. Same policy as
    /// `on_access_check`, with no keypad and no bypass handling.
    pub fn evaluate(&self, actor_id: ActorId, instance_id: InstanceId) -> AccessDecision {
        let locks = self.locks.borrow();
        let Some(lock) = locks.get(instance_id) else {
            return AccessDecision::NoOpinion;
        };

        if self.policy_allows(lock, actor_id) {
            AccessDecision::Allow
        } else {
            AccessDecision::Challenge
        }
    }

    /// The remembered-access policy: a listed actor gets silent access when
    /// they own the lock and owners are remembered, or when remembered users
    /// are enabled at all (owners fall through to that check too).
    fn policy_allows(&self, lock: &CodeLock, actor_id: ActorId) -> bool {
        lock.remembers(actor_id)
            && ((lock.is_owner(actor_id) && self.config.remember_owner)
                || self.config.remember_users)
    }

    // ===== Keypad callback path =====

    /// Verify a code submitted through the keypad.
    ///
    /// Tolerates stale invocations: if the lock vanished between keypad and
    /// submission (object destroyed, lock removed), the entry is dropped
    /// without side effects.
    pub fn submit_code(
        &self,
        actor_id: ActorId,
        instance_id: InstanceId,
        entered: LockCode,
    ) -> CodeEntryOutcome {
        let lock = match self.locks.borrow().get(instance_id) {
            Some(lock) => lock.clone(),
            None => {
                debug!(
                    "dropping stale code entry by {} for vanished lock {}",
                    actor_id, instance_id
                );
                return CodeEntryOutcome::Stale;
            }
        };

        if entered == lock.code {
            self.grant_entry(actor_id, instance_id)
        } else {
            self.deny_entry(actor_id, instance_id)
        }
    }

    fn grant_entry(&self, actor_id: ActorId, instance_id: InstanceId) -> CodeEntryOutcome {
        let remembered = self.config.remember_users
            && self.locks.borrow_mut().remember_user(instance_id, actor_id);

        self.throttle.borrow_mut().clear(actor_id, instance_id);

        // No interior borrows held past this point; the collaborators below
        // may call back into the engine.
        self.objects.notify_changed(instance_id, Some(actor_id));

        let reissued = match self.objects.resolve(instance_id) {
            Some(handle) if handle.kind.reissues_access() => {
                let _guard = BypassGuard::arm(&self.bypass);
                self.objects.reissue_access(actor_id, &handle);
                true
            }
            _ => false,
        };

        info!(
            "correct code by {} on {} (remembered: {}, reissued: {})",
            actor_id, instance_id, remembered, reissued
        );
        CodeEntryOutcome::Granted {
            remembered,
            reissued,
        }
    }

    fn deny_entry(&self, actor_id: ActorId, instance_id: InstanceId) -> CodeEntryOutcome {
        let attempts = &self.config.attempts;
        let now = chrono::Utc::now().timestamp();
        let tier = self.throttle.borrow_mut().record_failure(
            actor_id,
            instance_id,
            now,
            attempts.cooldown_secs,
        );
        let damage = damage_for_tier(&attempts.damages, tier);

        warn!(
            "wrong code by {} on {} (tier {}, damage {})",
            actor_id, instance_id, tier, damage
        );
        self.penalty.apply_damage(actor_id, damage);
        CodeEntryOutcome::Denied { tier, damage }
    }

    // ===== Lock management =====

    /// Set or change the code on an object. Who may lock what is the host's
    /// call; the engine records whatever it is handed.
    pub fn set_code(
        &self,
        actor_id: ActorId,
        instance_id: InstanceId,
        code: LockCode,
    ) -> UpsertOutcome {
        let outcome = self.locks.borrow_mut().upsert(instance_id, code, actor_id);
        self.objects.notify_changed(instance_id, Some(actor_id));
        match outcome {
            UpsertOutcome::Created => info!("{} locked {}", actor_id, instance_id),
            UpsertOutcome::Changed => info!("{} changed the code on {}", actor_id, instance_id),
        }
        outcome
    }

    /// Remove the lock from an object. Returns whether one existed.
    pub fn remove_lock(&self, actor_id: ActorId, instance_id: InstanceId) -> bool {
        let removed = self.locks.borrow_mut().remove(instance_id);
        if removed {
            self.objects.notify_changed(instance_id, Some(actor_id));
            info!("{} unlocked {}", actor_id, instance_id);
        }
        removed
    }

    // ===== Lifecycle events =====

    /// The protected object was destroyed; its lock goes with it.
    pub fn on_object_destroyed(&self, instance_id: InstanceId) {
        if self.locks.borrow_mut().remove(instance_id) {
            debug!("dropped lock for destroyed object {}", instance_id);
        }
    }

    /// The world finished loading: drop locks whose object no longer
    /// resolves and refresh the rest. Must run before the host starts
    /// feeding access checks. The sweep borrows the store per record, so
    /// refresh callbacks may read `locks()` while it runs.
    pub fn on_world_loaded(&self) -> ReconcileSummary {
        reconcile::sweep(&self.locks, self.objects.as_ref())
    }

    /// The host is saving the world: snapshot the registry and write it on a
    /// blocking worker so decision traffic never waits on disk.
    pub fn on_world_save(&self) -> JoinHandle<Result<(), SaveError>> {
        self.locks.borrow().save_in_background()
    }
}

/// Arms the trusted-bypass flag for the duration of a replayed action and
/// clears it on every exit path, unwinding included.
struct BypassGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> BypassGuard<'a> {
    fn arm(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for BypassGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
