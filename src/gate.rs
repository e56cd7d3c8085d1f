//! Conditional render primitive.
//!
//! A [`FeatureGate`] keeps one view subtree mounted exactly while the
//! resolved plan grants one feature. Attaching evaluates synchronously
//! against the store's current value, so a session restored from cache
//! renders the right state on first paint; afterwards the gate follows
//! every snapshot transition until detached.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::capabilities::{feature_flag, FeatureKey};
use crate::store::EntitlementStore;

/// Structural collaborator: the host materializes and tears down the
/// guarded subtree.
pub trait GateView: Send + Sync {
    fn mount(&self);
    fn unmount(&self);
}

struct Subscription {
    cancel: CancellationToken,
}

/// Mount/unmount driver for one feature key.
///
/// `attach` must be called from within a tokio runtime; the transition
/// listener runs as a spawned task until `detach` (or drop).
pub struct FeatureGate {
    feature: FeatureKey,
    view: Arc<dyn GateView>,
    mounted: Arc<Mutex<bool>>,
    subscription: Mutex<Option<Subscription>>,
}

impl FeatureGate {
    pub fn new(feature: FeatureKey, view: Arc<dyn GateView>) -> Self {
        Self {
            feature,
            view,
            mounted: Arc::new(Mutex::new(false)),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to `store` and immediately reflects its current value.
    /// Attaching an already-attached gate re-homes it: the previous
    /// subscription is torn down first.
    pub fn attach(&self, store: &EntitlementStore) {
        self.detach();

        let mut rx = store.subscribe();
        let granted = rx
            .borrow_and_update()
            .as_ref()
            .map(|snapshot| feature_flag(&snapshot.plan, self.feature))
            .unwrap_or(false);
        transition(&self.view, &mut self.mounted.lock(), granted);

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let view = self.view.clone();
        let mounted = self.mounted.clone();
        let feature = self.feature;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    // Detach signal
                    _ = task_cancel.cancelled() => break,

                    // Snapshot transition
                    changed = rx.changed() => {
                        if changed.is_err() {
                            // Store dropped; no further transitions.
                            break;
                        }
                        let granted = rx
                            .borrow_and_update()
                            .as_ref()
                            .map(|snapshot| feature_flag(&snapshot.plan, feature))
                            .unwrap_or(false);
                        // Holding the flag lock makes the cancellation
                        // check and the view transition one step, so a
                        // concurrent detach cannot interleave between
                        // them.
                        let mut flag = mounted.lock();
                        if task_cancel.is_cancelled() {
                            break;
                        }
                        transition(&view, &mut flag, granted);
                    }
                }
            }
        });

        *self.subscription.lock() = Some(Subscription { cancel });
    }

    /// Stops following the store and unmounts anything still showing.
    /// Detaching an unattached gate is a no-op; re-attach is supported.
    pub fn detach(&self) {
        let subscription = self.subscription.lock().take();
        let mut flag = self.mounted.lock();
        if let Some(subscription) = subscription {
            subscription.cancel.cancel();
        }
        // Teardown is a forced deny.
        transition(&self.view, &mut flag, false);
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn is_mounted(&self) -> bool {
        *self.mounted.lock()
    }

    pub fn feature(&self) -> FeatureKey {
        self.feature
    }
}

impl Drop for FeatureGate {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Transitions the view only on actual state changes, never re-mounting
/// a mounted view or re-unmounting a hidden one. Callers hold the flag
/// lock for as long as the transition must stay atomic.
fn transition(view: &Arc<dyn GateView>, mounted: &mut bool, granted: bool) {
    if granted && !*mounted {
        view.mount();
        *mounted = true;
    } else if !granted && *mounted {
        view.unmount();
        *mounted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StubPlanFetcher;
    use crate::cache::EntitlementCache;
    use crate::organization::{OrganizationRecord, SessionOrganizationContext};
    use crate::plan::{NotificationChannels, Plan, PlanWithUsage, UsageSnapshot};
    use crate::storage::MemoryKeyValueStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingView {
        mounts: AtomicUsize,
        unmounts: AtomicUsize,
    }

    impl CountingView {
        fn mounts(&self) -> usize {
            self.mounts.load(Ordering::SeqCst)
        }

        fn unmounts(&self) -> usize {
            self.unmounts.load(Ordering::SeqCst)
        }
    }

    impl GateView for CountingView {
        fn mount(&self) {
            self.mounts.fetch_add(1, Ordering::SeqCst);
        }

        fn unmount(&self) {
            self.unmounts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn reporting_plan() -> Plan {
        Plan {
            has_advanced_reports: true,
            ..Plan::default()
        }
    }

    /// Store bootstrapped from a pre-seeded cache.
    fn resolved_store(plan: Plan) -> EntitlementStore {
        let storage = Arc::new(MemoryKeyValueStore::new());
        EntitlementCache::new(storage.clone())
            .save(&PlanWithUsage::new(plan, UsageSnapshot::default()));
        EntitlementStore::new(
            storage,
            Arc::new(SessionOrganizationContext::new()),
            Arc::new(StubPlanFetcher::returning(Plan::default())),
        )
    }

    /// Store wired to a session with a subscription, so `load` follows
    /// the stub fetcher.
    fn loadable_store(fetcher: Arc<StubPlanFetcher>) -> EntitlementStore {
        let session = Arc::new(SessionOrganizationContext::new());
        session.set(OrganizationRecord {
            id: "org-1".to_string(),
            name: "Acme Rentals".to_string(),
            subscription_id: Some("sub-1".to_string()),
            ..OrganizationRecord::default()
        });
        EntitlementStore::new(Arc::new(MemoryKeyValueStore::new()), session, fetcher)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 500ms");
    }

    #[tokio::test]
    async fn test_attach_mounts_synchronously_when_granted() {
        let store = resolved_store(reporting_plan());
        let view = Arc::new(CountingView::default());
        let gate = FeatureGate::new(FeatureKey::AdvancedReports, view.clone());

        gate.attach(&store);
        // Before any scheduling: the cached grant is already reflected.
        assert!(gate.is_mounted());
        assert_eq!(view.mounts(), 1);
        assert_eq!(view.unmounts(), 0);
    }

    #[tokio::test]
    async fn test_attach_keeps_denied_feature_hidden() {
        let store = resolved_store(Plan::default());
        let view = Arc::new(CountingView::default());
        let gate = FeatureGate::new(FeatureKey::AdvancedReports, view.clone());

        gate.attach(&store);
        assert!(!gate.is_mounted());
        assert_eq!(view.mounts(), 0);
    }

    #[tokio::test]
    async fn test_gate_follows_resolution_and_teardown() {
        let fetcher = Arc::new(StubPlanFetcher::returning(reporting_plan()));
        let store = loadable_store(fetcher.clone());
        let view = Arc::new(CountingView::default());
        let gate = FeatureGate::new(FeatureKey::AdvancedReports, view.clone());

        gate.attach(&store);
        assert!(!gate.is_mounted());

        let _ = store.load().await;
        wait_until(|| gate.is_mounted()).await;
        assert_eq!(view.mounts(), 1);

        store.clear();
        wait_until(|| !gate.is_mounted()).await;
        assert_eq!(view.unmounts(), 1);

        // Re-resolution without the feature keeps it hidden.
        fetcher.set_response(Ok(Plan::default()));
        let _ = store.load().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!gate.is_mounted());
        assert_eq!(view.mounts(), 1);
    }

    #[tokio::test]
    async fn test_detach_unmounts_and_stops_following() {
        let fetcher = Arc::new(StubPlanFetcher::returning(reporting_plan()));
        let store = loadable_store(fetcher);
        let view = Arc::new(CountingView::default());
        let gate = FeatureGate::new(FeatureKey::AdvancedReports, view.clone());

        gate.attach(&store);
        let _ = store.load().await;
        wait_until(|| gate.is_mounted()).await;

        gate.detach();
        assert!(!gate.is_attached());
        assert!(!gate.is_mounted());
        assert_eq!(view.unmounts(), 1);

        // Transitions after detach are ignored.
        store.clear();
        let _ = store.load().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(view.mounts(), 1);
        assert_eq!(view.unmounts(), 1);
    }

    #[tokio::test]
    async fn test_reattach_replaces_subscription() {
        let store = resolved_store(reporting_plan());
        let view = Arc::new(CountingView::default());
        let gate = FeatureGate::new(FeatureKey::AdvancedReports, view.clone());

        gate.attach(&store);
        gate.attach(&store);
        assert!(gate.is_attached());
        // Second attach tears down and re-mounts once, not twice.
        assert_eq!(view.mounts(), 2);
        assert_eq!(view.unmounts(), 1);

        // Exactly one live subscription reacts to the next transition.
        store.clear();
        wait_until(|| view.unmounts() == 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(view.unmounts(), 2);
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let store = resolved_store(reporting_plan());
        let view = Arc::new(CountingView::default());
        {
            let gate = FeatureGate::new(FeatureKey::AdvancedReports, view.clone());
            gate.attach(&store);
            assert!(gate.is_mounted());
        }
        assert_eq!(view.unmounts(), 1);
    }

    #[tokio::test]
    async fn test_gate_on_derived_feature() {
        let plan = Plan {
            notification_channels: Some(NotificationChannels::Both),
            ..Plan::default()
        };
        let store = resolved_store(plan);
        let view = Arc::new(CountingView::default());
        let gate = FeatureGate::new(FeatureKey::MultiChannelNotifications, view.clone());

        gate.attach(&store);
        assert!(gate.is_mounted());
    }
}
