//! ============================================================================
//! Attempt Throttle
//! ============================================================================
//! Sliding-window tracker for failed code entries, keyed by the
//! (actor, object) pair. Each new failure purges that pair's stale attempts,
//! records itself, and reports a 1-based penalty tier. Attempts live in
//! memory only; every process start begins with a clean slate.
//! ============================================================================

use tracing::debug;

use crate::types::{ActorId, InstanceId};

/// One failed code entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub actor_id: ActorId,
    pub instance_id: InstanceId,
    /// Epoch seconds at which the wrong code was submitted.
    pub timestamp: i64,
}

impl Attempt {
    fn matches(&self, actor_id: ActorId, instance_id: InstanceId) -> bool {
        self.actor_id == actor_id && self.instance_id == instance_id
    }
}

/// Tracks recent failed entries and derives escalating penalty tiers.
#[derive(Debug, Default)]
pub struct AttemptThrottle {
    attempts: Vec<Attempt>,
}

impl AttemptThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed entry and return its penalty tier: the 1-based count
    /// of this pair's failures still inside the cooldown window.
    ///
    /// Attempts strictly older than `now - cooldown_secs` are dropped first;
    /// an attempt exactly `cooldown_secs` old still counts. Only the failing
    /// pair is purged, other pairs keep their history untouched. Failures in
    /// the same second each advance the tier.
    pub fn record_failure(
        &mut self,
        actor_id: ActorId,
        instance_id: InstanceId,
        now: i64,
        cooldown_secs: i64,
    ) -> u32 {
        let expiry = now - cooldown_secs;
        self.attempts
            .retain(|a| !(a.matches(actor_id, instance_id) && a.timestamp < expiry));

        self.attempts.push(Attempt {
            actor_id,
            instance_id,
            timestamp: now,
        });

        let tier = self
            .attempts
            .iter()
            .filter(|a| a.matches(actor_id, instance_id))
            .count() as u32;
        debug!(
            "failed entry by {} on {} (tier {})",
            actor_id, instance_id, tier
        );
        tier
    }

    /// Forget every attempt for the pair. A correct entry wipes the slate.
    pub fn clear(&mut self, actor_id: ActorId, instance_id: InstanceId) {
        self.attempts.retain(|a| !a.matches(actor_id, instance_id));
    }

    /// Attempts currently on record, all pairs included.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// Damage for a penalty tier. Tier 1 maps to the first table entry; tiers
/// past the end wrap back to the first entry. An empty table (or tier 0)
/// deals no damage.
pub fn damage_for_tier(damages: &[u8], tier: u32) -> u8 {
    if damages.is_empty() || tier == 0 {
        return 0;
    }
    let index = tier as usize - 1;
    if index >= damages.len() {
        damages[0]
    } else {
        damages[index]
    }
}
