//! Organization context port.
//!
//! Resolution needs to know which organization the session belongs to and
//! what that organization currently consumes. Absence of an organization
//! is a valid, expected state (fresh signup, logged-out session), never an
//! error.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::plan::UsageSnapshot;
use crate::storage::KeyValueStore;

/// Storage key under which the session's organization record lives.
pub const ORGANIZATION_KEY: &str = "organization";

/// The organization record as the session layer stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationRecord {
    pub id: String,
    pub name: String,
    pub subscription_id: Option<String>,
    pub current_properties_count: i64,
    pub current_users_count: i64,
    pub notifications_sent_this_month: i64,
}

impl OrganizationRecord {
    /// Projects the live counts into the snapshot merged with the plan.
    pub fn usage_snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            current_properties: self.current_properties_count,
            current_users: self.current_users_count,
            notifications_sent_this_month: self.notifications_sent_this_month,
        }
    }
}

/// Supplier of the session's current organization record.
pub trait OrganizationContext: Send + Sync {
    fn current(&self) -> Option<OrganizationRecord>;
}

/// Session-held organization context: login sets it, logout clears it.
#[derive(Debug, Default)]
pub struct SessionOrganizationContext {
    record: Mutex<Option<OrganizationRecord>>,
}

impl SessionOrganizationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, record: OrganizationRecord) {
        *self.record.lock() = Some(record);
    }

    pub fn clear(&self) {
        *self.record.lock() = None;
    }
}

impl OrganizationContext for SessionOrganizationContext {
    fn current(&self) -> Option<OrganizationRecord> {
        self.record.lock().clone()
    }
}

/// Organization context read from the key/value store, for hosts that
/// persist the record alongside the entitlement cache. Corrupt entries
/// read as absent.
pub struct KvOrganizationContext {
    store: Arc<dyn KeyValueStore>,
}

impl KvOrganizationContext {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl OrganizationContext for KvOrganizationContext {
    fn current(&self) -> Option<OrganizationRecord> {
        let raw = match self.store.get(ORGANIZATION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Organization record unreadable: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Corrupt organization record, treating as absent: {}", e);
                None
            }
        }
    }
}
