//! Rentora Entitlements - subscription plan resolution and gating
//!
//! This library is the client-side entitlement engine for the Rentora
//! property-management suite: it resolves the organization's subscription
//! plan, merges it with live usage counts, caches the merged snapshot, and
//! answers every feature/limit question the host UI asks.
//!
//! ## Features
//!
//! - **Cache-then-network resolution**: a restored snapshot answers
//!   immediately, the authoritative fetch replaces it
//! - **Fail-closed fallback**: any unreachable source resolves to the
//!   restrictive Starter policy, never to "everything unlocked"
//! - **Replay-last push stream**: late subscribers observe the current
//!   snapshot the moment they attach
//! - **Total queries**: feature, limit, and usage checks always return a
//!   value; nothing here can crash navigation or rendering
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rentora_entitlements::{
//!     EntitlementStore, FeatureKey, FileKeyValueStore, HttpPlanFetcher,
//!     ResourceKind, SessionOrganizationContext, StaticTokenProvider,
//! };
//!
//! # async fn run() {
//! let storage = Arc::new(FileKeyValueStore::default_location());
//! let session = Arc::new(SessionOrganizationContext::new());
//! let fetcher = Arc::new(HttpPlanFetcher::new(
//!     "https://api.rentora.app",
//!     Arc::new(StaticTokenProvider::new("token")),
//! ));
//!
//! let store = EntitlementStore::new(storage, session, fetcher);
//! let snapshot = store.load().await;
//! println!("resolved plan: {}", snapshot.plan.plan_name);
//!
//! if store.has_feature(FeatureKey::AdvancedReports) {
//!     // render the reports entry
//! }
//! let usage = store.usage(ResourceKind::Properties);
//! println!("{} of {} properties in use", usage.current, usage.max);
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod capabilities;
pub mod gate;
pub mod guards;
pub mod organization;
pub mod plan;
pub mod storage;
pub mod store;

// Re-exports for convenience
pub use api::{
    FetchError, HttpPlanFetcher, PlanFetcher, StaticTokenProvider, StubPlanFetcher, TokenProvider,
};
pub use cache::{EntitlementCache, PLAN_CACHE_KEY};
pub use capabilities::{feature_flag, limit_value, FeatureKey, LimitKey, ResourceKind};
pub use gate::{FeatureGate, GateView};
pub use guards::{
    evaluate_feature_route, evaluate_limit_route, DenialReason, FeatureGuard, GuardDecision,
    LimitGuard, MissingMetadataPolicy, RouteMetadata, UpgradeRedirect, UpgradeRouter,
    MISSING_METADATA_POLICY, UPGRADE_ROUTE,
};
pub use organization::{
    KvOrganizationContext, OrganizationContext, OrganizationRecord, SessionOrganizationContext,
    ORGANIZATION_KEY,
};
pub use plan::{
    NotificationChannels, Plan, PlanCode, PlanWithUsage, UsageSnapshot, WhiteLabelLevel, UNLIMITED,
};
pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, StorageError};
pub use store::{EntitlementStore, ResourceUsage, DEFAULT_FETCH_TIMEOUT};
