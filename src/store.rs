//! Entitlement store: single source of truth for the resolved plan.
//!
//! The store holds at most one [`PlanWithUsage`] and moves between two
//! observable states: unresolved (fresh process or after `clear`) and
//! resolved. Construction restores any cached snapshot synchronously so
//! consumers have an answer before the first network round-trip; `load`
//! then fetches the authoritative plan, merges it with the organization's
//! usage counts, persists and publishes it. Resolution never fails open:
//! anything that prevents reaching an authoritative source lands on the
//! restrictive default policy.
//!
//! Every query method is total. Entitlement checks gate navigation and
//! rendering, so nothing here panics or propagates an error to consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::sync::Mutex as AsyncMutex;

use crate::api::PlanFetcher;
use crate::cache::EntitlementCache;
use crate::capabilities::{feature_flag, limit_value, FeatureKey, LimitKey, ResourceKind};
use crate::organization::OrganizationContext;
use crate::plan::{PlanCode, PlanWithUsage, UNLIMITED};
use crate::storage::KeyValueStore;

/// Overall deadline for one plan fetch. A hung request degrades to the
/// default policy instead of leaving callers on a stale snapshot forever.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Structured usage report for one countable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub current: i64,
    pub max: i64,
    pub percentage: i64,
    pub remaining: i64,
    pub can_add: bool,
    pub is_unlimited: bool,
}

impl ResourceUsage {
    /// Shape reported while nothing is resolved: deny additions without
    /// claiming any headroom exists.
    fn unresolved() -> Self {
        Self {
            current: 0,
            max: 0,
            percentage: 100,
            remaining: 0,
            can_add: false,
            is_unlimited: false,
        }
    }

    fn compute(current: i64, max: i64) -> Self {
        if max == UNLIMITED {
            // Percentage and remaining are not-applicable-but-safe
            // stand-ins, not computed ratios.
            return Self {
                current,
                max,
                percentage: 0,
                remaining: UNLIMITED,
                can_add: true,
                is_unlimited: true,
            };
        }
        let percentage = if max <= 0 {
            0
        } else {
            (100.0 * current as f64 / max as f64).round() as i64
        };
        Self {
            current,
            max,
            percentage,
            remaining: (max - current).max(0),
            can_add: current < max,
            is_unlimited: false,
        }
    }
}

/// Single source of truth for the session's entitlements.
pub struct EntitlementStore {
    cache: EntitlementCache,
    organizations: Arc<dyn OrganizationContext>,
    fetcher: Arc<dyn PlanFetcher>,
    state: watch::Sender<Option<PlanWithUsage>>,
    load_lock: AsyncMutex<()>,
    generation: AtomicU64,
    fetch_timeout: Duration,
}

impl EntitlementStore {
    /// Builds the store and restores any cached snapshot before the value
    /// is shared, so no consumer can observe a pre-bootstrap store.
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        organizations: Arc<dyn OrganizationContext>,
        fetcher: Arc<dyn PlanFetcher>,
    ) -> Self {
        let cache = EntitlementCache::new(storage);
        let restored = cache.load();
        if restored.is_some() {
            tracing::debug!("Restored entitlement snapshot from cache");
        }
        let (state, _) = watch::channel(restored);
        Self {
            cache,
            organizations,
            fetcher,
            state,
            load_lock: AsyncMutex::new(()),
            generation: AtomicU64::new(0),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolves the current plan and usage. Total: always produces a
    /// snapshot, falling back to the default policy whenever no
    /// authoritative source can be reached.
    ///
    /// Re-entrant-safe: callers that overlap an in-flight `load` coalesce
    /// onto its result instead of racing a second fetch. The last
    /// completed resolution is the one persisted.
    pub async fn load(&self) -> PlanWithUsage {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.load_lock.lock().await;
        if self.generation.load(Ordering::Acquire) != seen {
            // Another caller completed a resolution while we waited.
            if let Some(current) = self.current() {
                return current;
            }
        }

        let snapshot = self.resolve().await;
        self.cache.save(&snapshot);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.state.send_replace(Some(snapshot.clone()));
        snapshot
    }

    /// Alias for [`load`], exposed for explicit cache-busting triggers
    /// such as an organization creation or upgrade completing.
    pub async fn reload(&self) -> PlanWithUsage {
        self.load().await
    }

    async fn resolve(&self) -> PlanWithUsage {
        let Some(organization) = self.organizations.current() else {
            tracing::debug!("No organization context, resolving to default policy");
            return PlanWithUsage::default_policy();
        };
        let Some(subscription_id) = organization.subscription_id.clone() else {
            tracing::debug!(
                "Organization {:?} has no subscription, resolving to default policy",
                organization.id
            );
            return PlanWithUsage::default_policy();
        };

        let usage = organization.usage_snapshot();
        let fetch = self.fetcher.fetch_plan(&subscription_id);
        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(plan)) => {
                tracing::debug!(
                    "Resolved plan {} for subscription {}",
                    plan.plan_code.as_str(),
                    subscription_id
                );
                PlanWithUsage::new(plan, usage)
            }
            Ok(Err(e)) => {
                tracing::error!("Plan fetch failed, resolving to default policy: {}", e);
                PlanWithUsage::default_policy()
            }
            Err(_) => {
                tracing::error!(
                    "Plan fetch timed out after {:?}, resolving to default policy",
                    self.fetch_timeout
                );
                PlanWithUsage::default_policy()
            }
        }
    }

    /// Drops the resolved snapshot and purges the cache. Used at logout.
    pub fn clear(&self) {
        tracing::debug!("Clearing entitlement state");
        self.cache.clear();
        self.state.send_replace(None);
    }

    // ========================================================================
    // Queries (all total)
    // ========================================================================

    /// Whether the resolved plan grants `key`. `false` while unresolved.
    pub fn has_feature(&self, key: FeatureKey) -> bool {
        match self.state.borrow().as_ref() {
            Some(snapshot) => feature_flag(&snapshot.plan, key),
            None => false,
        }
    }

    /// String-keyed variant for call-sites holding route or config
    /// strings. Unknown names deny.
    pub fn has_feature_named(&self, name: &str) -> bool {
        match FeatureKey::parse(name) {
            Some(key) => self.has_feature(key),
            None => {
                tracing::warn!("Unknown feature key {:?}, denying", name);
                false
            }
        }
    }

    /// Numeric limit for `key`; `0` while unresolved, `-1` passed through
    /// verbatim so callers can distinguish unlimited from a zero cap.
    pub fn get_limit(&self, key: LimitKey) -> i64 {
        match self.state.borrow().as_ref() {
            Some(snapshot) => limit_value(snapshot, key),
            None => 0,
        }
    }

    pub fn get_limit_named(&self, name: &str) -> i64 {
        match LimitKey::parse(name) {
            Some(key) => self.get_limit(key),
            None => {
                tracing::warn!("Unknown limit key {:?}, returning 0", name);
                0
            }
        }
    }

    /// Whether `resource` is at or over its cap. Denies while unresolved;
    /// an unlimited cap is never reached.
    pub fn has_reached_limit(&self, resource: ResourceKind) -> bool {
        let state = self.state.borrow();
        let Some(snapshot) = state.as_ref() else {
            return true;
        };
        let max = limit_value(snapshot, resource.limit_key());
        let current = limit_value(snapshot, resource.usage_key());
        max != UNLIMITED && current >= max
    }

    pub fn usage(&self, resource: ResourceKind) -> ResourceUsage {
        self.usage_between(resource.usage_key(), resource.limit_key())
    }

    /// Usage report for the monthly notification budget.
    pub fn notification_usage(&self) -> ResourceUsage {
        self.usage_between(
            LimitKey::NotificationsSentThisMonth,
            LimitKey::MonthlyNotificationLimit,
        )
    }

    fn usage_between(&self, current_key: LimitKey, max_key: LimitKey) -> ResourceUsage {
        let state = self.state.borrow();
        let Some(snapshot) = state.as_ref() else {
            return ResourceUsage::unresolved();
        };
        ResourceUsage::compute(
            limit_value(snapshot, current_key),
            limit_value(snapshot, max_key),
        )
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Receiver over the snapshot stream. Carries the latest value
    /// immediately, so late subscribers never miss the current state.
    pub fn subscribe(&self) -> watch::Receiver<Option<PlanWithUsage>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Option<PlanWithUsage> {
        self.state.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn plan_code(&self) -> Option<PlanCode> {
        self.state
            .borrow()
            .as_ref()
            .map(|snapshot| snapshot.plan.plan_code.clone())
    }
}
