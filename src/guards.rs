//! Route guards over the entitlement store.
//!
//! Guards answer one question per navigation: may this route activate
//! under the resolved plan? Denials never error; they redirect to the
//! upgrade page with enough context for it to explain what was missing.
//! Decisions are pure functions over (route metadata, store state) so the
//! policy is testable without a router; the guard structs add the single
//! redirect side effect on top.

use std::sync::Arc;

use crate::capabilities::{FeatureKey, ResourceKind};
use crate::plan::PlanCode;
use crate::store::EntitlementStore;

/// Path of the upgrade page blocked navigations are sent to.
pub const UPGRADE_ROUTE: &str = "/dashboard/subscription/upgrade";

/// What a guard does with a route that declares no requirement it can
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingMetadataPolicy {
    Allow,
    Deny,
}

/// Routes without entitlement metadata pass. Guard declarations are
/// opt-in; this constant is the one place that stance lives.
pub const MISSING_METADATA_POLICY: MissingMetadataPolicy = MissingMetadataPolicy::Allow;

/// Static declaration a route registers for guard evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMetadata {
    pub path: String,
    pub required_feature: Option<String>,
    pub required_resource: Option<String>,
}

impl RouteMetadata {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required_feature: None,
            required_resource: None,
        }
    }

    pub fn require_feature(mut self, feature: impl Into<String>) -> Self {
        self.required_feature = Some(feature.into());
        self
    }

    pub fn require_resource(mut self, resource: impl Into<String>) -> Self {
        self.required_resource = Some(resource.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    FeatureMissing,
    LimitReached,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::FeatureMissing => "feature_missing",
            DenialReason::LimitReached => "limit_reached",
        }
    }
}

/// Context handed to the upgrade page when navigation is blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRedirect {
    pub reason: DenialReason,
    /// Denied feature identifier; the raw declared string when it did not
    /// parse to a known key.
    pub feature: Option<String>,
    pub resource: Option<String>,
    pub plan: Option<PlanCode>,
}

impl UpgradeRedirect {
    pub fn route(&self) -> &'static str {
        UPGRADE_ROUTE
    }

    /// Query parameters for the upgrade page.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(feature) = &self.feature {
            params.push(("feature".to_string(), feature.clone()));
        }
        if let Some(resource) = &self.resource {
            params.push(("resource".to_string(), resource.clone()));
            params.push(("reason".to_string(), self.reason.as_str().to_string()));
        }
        if let Some(plan) = &self.plan {
            params.push(("plan".to_string(), plan.as_str().to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Block(UpgradeRedirect),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Navigation collaborator. The guard decides; the host performs the
/// actual route change.
pub trait UpgradeRouter: Send + Sync {
    fn redirect_to_upgrade(&self, redirect: &UpgradeRedirect);
}

fn missing_metadata_decision(store: &EntitlementStore) -> GuardDecision {
    match MISSING_METADATA_POLICY {
        MissingMetadataPolicy::Allow => GuardDecision::Allow,
        MissingMetadataPolicy::Deny => GuardDecision::Block(UpgradeRedirect {
            reason: DenialReason::FeatureMissing,
            feature: None,
            resource: None,
            plan: store.plan_code(),
        }),
    }
}

/// Decision for a feature-gated route. A declared-but-unknown feature is
/// denied; an undeclared one falls under [`MISSING_METADATA_POLICY`].
pub fn evaluate_feature_route(store: &EntitlementStore, route: &RouteMetadata) -> GuardDecision {
    let Some(declared) = route.required_feature.as_deref() else {
        tracing::warn!(
            "Route {:?} is feature-guarded but declares no feature, applying missing-metadata policy",
            route.path
        );
        return missing_metadata_decision(store);
    };
    match FeatureKey::parse(declared) {
        Some(feature) if store.has_feature(feature) => GuardDecision::Allow,
        Some(feature) => GuardDecision::Block(UpgradeRedirect {
            reason: DenialReason::FeatureMissing,
            feature: Some(feature.as_str().to_string()),
            resource: None,
            plan: store.plan_code(),
        }),
        None => {
            tracing::warn!(
                "Route {:?} requires unknown feature {:?}, blocking",
                route.path,
                declared
            );
            GuardDecision::Block(UpgradeRedirect {
                reason: DenialReason::FeatureMissing,
                feature: Some(declared.to_string()),
                resource: None,
                plan: store.plan_code(),
            })
        }
    }
}

/// Decision for a limit-gated route. An unparseable resource declaration
/// is treated as missing metadata, not as a denial.
pub fn evaluate_limit_route(store: &EntitlementStore, route: &RouteMetadata) -> GuardDecision {
    let Some(declared) = route.required_resource.as_deref() else {
        tracing::warn!(
            "Route {:?} is limit-guarded but declares no resource, applying missing-metadata policy",
            route.path
        );
        return missing_metadata_decision(store);
    };
    let Some(resource) = ResourceKind::parse(declared) else {
        tracing::warn!(
            "Route {:?} declares unknown resource {:?}, applying missing-metadata policy",
            route.path,
            declared
        );
        return missing_metadata_decision(store);
    };
    if store.has_reached_limit(resource) {
        GuardDecision::Block(UpgradeRedirect {
            reason: DenialReason::LimitReached,
            feature: None,
            resource: Some(resource.as_str().to_string()),
            plan: store.plan_code(),
        })
    } else {
        GuardDecision::Allow
    }
}

/// Blocks routes whose declared feature the resolved plan does not grant.
pub struct FeatureGuard {
    store: Arc<EntitlementStore>,
    router: Arc<dyn UpgradeRouter>,
}

impl FeatureGuard {
    pub fn new(store: Arc<EntitlementStore>, router: Arc<dyn UpgradeRouter>) -> Self {
        Self { store, router }
    }

    /// Router-facing entry point: `true` lets navigation proceed. Denial
    /// redirects to the upgrade page as its single side effect.
    pub fn can_activate(&self, route: &RouteMetadata) -> bool {
        match evaluate_feature_route(&self.store, route) {
            GuardDecision::Allow => true,
            GuardDecision::Block(redirect) => {
                tracing::debug!(
                    "Blocking navigation to {:?}: {}",
                    route.path,
                    redirect.reason.as_str()
                );
                self.router.redirect_to_upgrade(&redirect);
                false
            }
        }
    }
}

/// Blocks routes whose declared resource is at or over its cap.
pub struct LimitGuard {
    store: Arc<EntitlementStore>,
    router: Arc<dyn UpgradeRouter>,
}

impl LimitGuard {
    pub fn new(store: Arc<EntitlementStore>, router: Arc<dyn UpgradeRouter>) -> Self {
        Self { store, router }
    }

    pub fn can_activate(&self, route: &RouteMetadata) -> bool {
        match evaluate_limit_route(&self.store, route) {
            GuardDecision::Allow => true,
            GuardDecision::Block(redirect) => {
                tracing::debug!(
                    "Blocking navigation to {:?}: {}",
                    route.path,
                    redirect.reason.as_str()
                );
                self.router.redirect_to_upgrade(&redirect);
                false
            }
        }
    }
}
