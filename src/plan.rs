//! Plan and usage data model shared by the resolution and query layers.
//!
//! A [`Plan`] describes a subscription tier as the backend reports it; a
//! [`UsageSnapshot`] carries the organization's point-in-time counts. The
//! store only ever holds the two merged as a [`PlanWithUsage`], replaced
//! wholesale on each resolution.

use serde::{Deserialize, Serialize};

/// Sentinel limit value meaning "no cap". Preserved verbatim across the
/// wire, the cache, and every query so callers can distinguish it from a
/// literal zero limit.
pub const UNLIMITED: i64 = -1;

/// Stable tier identifier. Known codes get variants; anything else the
/// backend mints (promos, legacy tiers) survives as `Custom` with its raw
/// wire string intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanCode {
    Starter,
    Professional,
    Business,
    Enterprise,
    Custom(String),
}

impl PlanCode {
    pub fn as_str(&self) -> &str {
        match self {
            PlanCode::Starter => "STARTER",
            PlanCode::Professional => "PROFESSIONAL",
            PlanCode::Business => "BUSINESS",
            PlanCode::Enterprise => "ENTERPRISE",
            PlanCode::Custom(code) => code,
        }
    }
}

impl Default for PlanCode {
    fn default() -> Self {
        PlanCode::Starter
    }
}

impl From<String> for PlanCode {
    fn from(value: String) -> Self {
        match value.trim().to_uppercase().as_str() {
            "STARTER" => PlanCode::Starter,
            "PROFESSIONAL" => PlanCode::Professional,
            "BUSINESS" => PlanCode::Business,
            "ENTERPRISE" => PlanCode::Enterprise,
            _ => PlanCode::Custom(value),
        }
    }
}

impl From<PlanCode> for String {
    fn from(value: PlanCode) -> Self {
        value.as_str().to_string()
    }
}

/// Delivery channels a plan's notifications may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannels {
    Sms,
    Whatsapp,
    Both,
    Unlimited,
}

impl NotificationChannels {
    /// Whether this channel set counts as multi-channel delivery.
    pub fn is_multi_channel(&self) -> bool {
        matches!(self, NotificationChannels::Both | NotificationChannels::Unlimited)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhiteLabelLevel {
    Basic,
    Full,
}

/// Immutable subscription tier description as fetched from the backend.
///
/// Missing fields in a partial server payload fall back to the values of
/// [`Plan::default`], which is the restrictive Starter baseline, so a
/// truncated payload can only under-grant, never over-grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Plan {
    pub plan_code: PlanCode,
    pub plan_name: String,

    // Numeric limits; non-negative or UNLIMITED (-1).
    pub max_properties: i64,
    pub max_users: i64,
    pub max_active_contracts: i64,
    pub storage_limit_mb: i64,
    pub images_per_property: i64,
    pub report_history_days: i64,
    pub monthly_notification_limit: i64,

    // Stored feature flags.
    pub has_notifications: bool,
    pub has_maintenance_photos: bool,
    pub has_advanced_reports: bool,
    pub has_pdf_reports: bool,
    pub has_data_export: bool,
    pub has_admin_digest: bool,
    pub has_late_reminders: bool,
    pub has_white_label: bool,
    pub has_api_access: bool,
    pub has_multi_currency: bool,
    pub has_document_management: bool,
    pub has_e_signature: bool,
    pub has_tenant_portal: bool,
    pub has_mobile_app: bool,
    pub has_integrations: bool,
    pub has_maintenance_scheduling: bool,
    pub allows_images: bool,
    pub has_overdue_notifications: bool,

    pub notification_channels: Option<NotificationChannels>,
    pub white_label_level: Option<WhiteLabelLevel>,
}

impl Default for Plan {
    /// The Starter baseline: three properties, one user, nothing else.
    fn default() -> Self {
        Self {
            plan_code: PlanCode::Starter,
            plan_name: "Starter".to_string(),
            max_properties: 3,
            max_users: 1,
            max_active_contracts: 0,
            storage_limit_mb: 0,
            images_per_property: 0,
            report_history_days: 0,
            monthly_notification_limit: 0,
            has_notifications: false,
            has_maintenance_photos: false,
            has_advanced_reports: false,
            has_pdf_reports: false,
            has_data_export: false,
            has_admin_digest: false,
            has_late_reminders: false,
            has_white_label: false,
            has_api_access: false,
            has_multi_currency: false,
            has_document_management: false,
            has_e_signature: false,
            has_tenant_portal: false,
            has_mobile_app: false,
            has_integrations: false,
            has_maintenance_scheduling: false,
            allows_images: false,
            has_overdue_notifications: false,
            notification_channels: None,
            white_label_level: None,
        }
    }
}

/// Point-in-time organization counts. These come from the organization
/// record, not from the plan endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageSnapshot {
    pub current_properties: i64,
    pub current_users: i64,
    pub notifications_sent_this_month: i64,
}

/// The one entity the store holds: plan and usage merged at load time.
/// Serializes flat, so the cached JSON is a single merged object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWithUsage {
    #[serde(flatten)]
    pub plan: Plan,
    #[serde(flatten)]
    pub usage: UsageSnapshot,
}

impl PlanWithUsage {
    /// The compiled-in fallback entitlement: Starter tier, every feature
    /// off, zeroed usage. Resolution falls back to this whenever no
    /// authoritative source can be reached.
    pub fn default_policy() -> Self {
        Self::default()
    }

    pub fn new(plan: Plan, usage: UsageSnapshot) -> Self {
        Self { plan, usage }
    }

    pub fn plan_code(&self) -> &PlanCode {
        &self.plan.plan_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_restrictive() {
        let policy = PlanWithUsage::default_policy();
        assert_eq!(policy.plan.plan_code, PlanCode::Starter);
        assert_eq!(policy.plan.max_properties, 3);
        assert_eq!(policy.plan.max_users, 1);
        assert!(!policy.plan.has_white_label);
        assert!(!policy.plan.has_advanced_reports);
        assert!(!policy.plan.has_notifications);
        assert!(policy.plan.notification_channels.is_none());
        assert_eq!(policy.usage.current_properties, 0);
    }

    #[test]
    fn test_plan_code_wire_round_trip() {
        let json = serde_json::to_string(&PlanCode::Professional).unwrap();
        assert_eq!(json, "\"PROFESSIONAL\"");
        let parsed: PlanCode = serde_json::from_str("\"business\"").unwrap();
        assert_eq!(parsed, PlanCode::Business);
        let custom: PlanCode = serde_json::from_str("\"LEGACY_PROMO_2023\"").unwrap();
        assert_eq!(custom, PlanCode::Custom("LEGACY_PROMO_2023".to_string()));
        assert_eq!(custom.as_str(), "LEGACY_PROMO_2023");
    }

    #[test]
    fn test_partial_payload_degrades_to_starter_values() {
        let plan: Plan = serde_json::from_str(
            r#"{"planCode":"PROFESSIONAL","planName":"Professional","maxProperties":25,"hasAdvancedReports":true}"#,
        )
        .unwrap();
        assert_eq!(plan.plan_code, PlanCode::Professional);
        assert_eq!(plan.max_properties, 25);
        assert!(plan.has_advanced_reports);
        // Fields the payload omitted stay at the restrictive baseline.
        assert_eq!(plan.max_users, 1);
        assert!(!plan.has_white_label);
    }

    #[test]
    fn test_plan_with_usage_serializes_flat() {
        let merged = PlanWithUsage::new(
            Plan {
                max_properties: 10,
                ..Plan::default()
            },
            UsageSnapshot {
                current_properties: 4,
                ..UsageSnapshot::default()
            },
        );
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value["maxProperties"], 10);
        assert_eq!(value["currentProperties"], 4);
        let back: PlanWithUsage = serde_json::from_value(value).unwrap();
        assert_eq!(back, merged);
    }

    #[test]
    fn test_notification_channels_multi_channel() {
        assert!(NotificationChannels::Both.is_multi_channel());
        assert!(NotificationChannels::Unlimited.is_multi_channel());
        assert!(!NotificationChannels::Sms.is_multi_channel());
        assert!(!NotificationChannels::Whatsapp.is_multi_channel());
        let parsed: NotificationChannels = serde_json::from_str("\"WHATSAPP\"").unwrap();
        assert_eq!(parsed, NotificationChannels::Whatsapp);
    }
}
