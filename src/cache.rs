//! Persisted copy of the last resolved entitlement snapshot.
//!
//! One fixed key, no TTL. Staleness is resolved by the next network load,
//! not by expiry; the point of this cache is that a restarted session has
//! an answer before the first fetch completes.

use std::sync::Arc;

use crate::plan::PlanWithUsage;
use crate::storage::KeyValueStore;

/// Fixed storage key holding the serialized [`PlanWithUsage`].
pub const PLAN_CACHE_KEY: &str = "subscription_plan";

/// Cache wrapper over the key/value port. Nothing in here propagates
/// errors: a corrupt or unreadable entry is a miss, a failed write is a
/// warning, and resolution continues either way.
pub struct EntitlementCache {
    store: Arc<dyn KeyValueStore>,
}

impl EntitlementCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist `snapshot` under the fixed key.
    pub fn save(&self, snapshot: &PlanWithUsage) {
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize entitlement snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(PLAN_CACHE_KEY, &json) {
            tracing::warn!("Failed to persist entitlement snapshot: {}", e);
        }
    }

    /// Restore the cached snapshot, if any. Corruption is a miss.
    pub fn load(&self) -> Option<PlanWithUsage> {
        let raw = match self.store.get(PLAN_CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Entitlement cache unreadable, treating as miss: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Corrupt entitlement cache entry, treating as miss: {}", e);
                None
            }
        }
    }

    /// Remove the cached snapshot.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(PLAN_CACHE_KEY) {
            tracing::warn!("Failed to clear entitlement cache: {}", e);
        }
    }
}
