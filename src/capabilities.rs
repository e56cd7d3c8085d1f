//! Capability registry mapping feature and limit identifiers to plan fields.
//!
//! This module is the single source of truth for what can be gated. The
//! tables are static and versioned with the build, never sourced from the
//! network, so a new backend field cannot silently grant a feature the
//! client does not yet know how to gate.

use crate::plan::{Plan, PlanWithUsage};

/// Closed enumeration of gateable features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    Notifications,
    MaintenancePhotos,
    AdvancedReports,
    PdfReports,
    DataExport,
    AdminDigest,
    LateReminders,
    WhiteLabel,
    ApiAccess,
    MultiCurrency,
    DocumentManagement,
    ESignature,
    TenantPortal,
    MobileApp,
    Integrations,
    MaintenanceScheduling,
    MultiChannelNotifications,
    AllowsImages,
    OverdueNotifications,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 19] = [
        FeatureKey::Notifications,
        FeatureKey::MaintenancePhotos,
        FeatureKey::AdvancedReports,
        FeatureKey::PdfReports,
        FeatureKey::DataExport,
        FeatureKey::AdminDigest,
        FeatureKey::LateReminders,
        FeatureKey::WhiteLabel,
        FeatureKey::ApiAccess,
        FeatureKey::MultiCurrency,
        FeatureKey::DocumentManagement,
        FeatureKey::ESignature,
        FeatureKey::TenantPortal,
        FeatureKey::MobileApp,
        FeatureKey::Integrations,
        FeatureKey::MaintenanceScheduling,
        FeatureKey::MultiChannelNotifications,
        FeatureKey::AllowsImages,
        FeatureKey::OverdueNotifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Notifications => "NOTIFICATIONS",
            FeatureKey::MaintenancePhotos => "MAINTENANCE_PHOTOS",
            FeatureKey::AdvancedReports => "ADVANCED_REPORTS",
            FeatureKey::PdfReports => "PDF_REPORTS",
            FeatureKey::DataExport => "DATA_EXPORT",
            FeatureKey::AdminDigest => "ADMIN_DIGEST",
            FeatureKey::LateReminders => "LATE_REMINDERS",
            FeatureKey::WhiteLabel => "WHITE_LABEL",
            FeatureKey::ApiAccess => "API_ACCESS",
            FeatureKey::MultiCurrency => "MULTI_CURRENCY",
            FeatureKey::DocumentManagement => "DOCUMENT_MANAGEMENT",
            FeatureKey::ESignature => "E_SIGNATURE",
            FeatureKey::TenantPortal => "TENANT_PORTAL",
            FeatureKey::MobileApp => "MOBILE_APP",
            FeatureKey::Integrations => "INTEGRATIONS",
            FeatureKey::MaintenanceScheduling => "MAINTENANCE_SCHEDULING",
            FeatureKey::MultiChannelNotifications => "MULTI_CHANNEL_NOTIFICATIONS",
            FeatureKey::AllowsImages => "ALLOWS_IMAGES",
            FeatureKey::OverdueNotifications => "OVERDUE_NOTIFICATIONS",
        }
    }

    /// Parses a feature identifier from route metadata or call-sites.
    /// Case- and separator-insensitive; unrecognized input yields `None`
    /// so unknown features always resolve as denied.
    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "notifications" => Some(FeatureKey::Notifications),
            "maintenancephotos" => Some(FeatureKey::MaintenancePhotos),
            "advancedreports" => Some(FeatureKey::AdvancedReports),
            "pdfreports" => Some(FeatureKey::PdfReports),
            "dataexport" => Some(FeatureKey::DataExport),
            "admindigest" => Some(FeatureKey::AdminDigest),
            "latereminders" => Some(FeatureKey::LateReminders),
            "whitelabel" => Some(FeatureKey::WhiteLabel),
            "apiaccess" => Some(FeatureKey::ApiAccess),
            "multicurrency" => Some(FeatureKey::MultiCurrency),
            "documentmanagement" => Some(FeatureKey::DocumentManagement),
            "esignature" => Some(FeatureKey::ESignature),
            "tenantportal" => Some(FeatureKey::TenantPortal),
            "mobileapp" => Some(FeatureKey::MobileApp),
            "integrations" => Some(FeatureKey::Integrations),
            "maintenancescheduling" => Some(FeatureKey::MaintenanceScheduling),
            "multichannelnotifications" => Some(FeatureKey::MultiChannelNotifications),
            "allowsimages" => Some(FeatureKey::AllowsImages),
            "overduenotifications" => Some(FeatureKey::OverdueNotifications),
            _ => None,
        }
    }
}

/// Closed enumeration of numeric limit and usage fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKey {
    MaxProperties,
    MaxUsers,
    MaxActiveContracts,
    ImagesPerProperty,
    MonthlyNotificationLimit,
    StorageLimitMb,
    ReportHistoryDays,
    CurrentProperties,
    CurrentUsers,
    NotificationsSentThisMonth,
}

impl LimitKey {
    pub const ALL: [LimitKey; 10] = [
        LimitKey::MaxProperties,
        LimitKey::MaxUsers,
        LimitKey::MaxActiveContracts,
        LimitKey::ImagesPerProperty,
        LimitKey::MonthlyNotificationLimit,
        LimitKey::StorageLimitMb,
        LimitKey::ReportHistoryDays,
        LimitKey::CurrentProperties,
        LimitKey::CurrentUsers,
        LimitKey::NotificationsSentThisMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKey::MaxProperties => "maxProperties",
            LimitKey::MaxUsers => "maxUsers",
            LimitKey::MaxActiveContracts => "maxActiveContracts",
            LimitKey::ImagesPerProperty => "imagesPerProperty",
            LimitKey::MonthlyNotificationLimit => "monthlyNotificationLimit",
            LimitKey::StorageLimitMb => "storageLimitMb",
            LimitKey::ReportHistoryDays => "reportHistoryDays",
            LimitKey::CurrentProperties => "currentProperties",
            LimitKey::CurrentUsers => "currentUsers",
            LimitKey::NotificationsSentThisMonth => "notificationsSentThisMonth",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "maxproperties" => Some(LimitKey::MaxProperties),
            "maxusers" => Some(LimitKey::MaxUsers),
            "maxactivecontracts" => Some(LimitKey::MaxActiveContracts),
            "imagesperproperty" => Some(LimitKey::ImagesPerProperty),
            "monthlynotificationlimit" => Some(LimitKey::MonthlyNotificationLimit),
            "storagelimitmb" => Some(LimitKey::StorageLimitMb),
            "reporthistorydays" => Some(LimitKey::ReportHistoryDays),
            "currentproperties" => Some(LimitKey::CurrentProperties),
            "currentusers" => Some(LimitKey::CurrentUsers),
            "notificationssentthismonth" => Some(LimitKey::NotificationsSentThisMonth),
            _ => None,
        }
    }
}

/// Countable resources with both a cap and a live count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Properties,
    Users,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Properties => "properties",
            ResourceKind::Users => "users",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "properties" | "property" => Some(ResourceKind::Properties),
            "users" | "user" => Some(ResourceKind::Users),
            _ => None,
        }
    }

    pub fn limit_key(&self) -> LimitKey {
        match self {
            ResourceKind::Properties => LimitKey::MaxProperties,
            ResourceKind::Users => LimitKey::MaxUsers,
        }
    }

    pub fn usage_key(&self) -> LimitKey {
        match self {
            ResourceKind::Properties => LimitKey::CurrentProperties,
            ResourceKind::Users => LimitKey::CurrentUsers,
        }
    }
}

fn normalize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect()
}

/// Resolves a feature key against a plan. `MultiChannelNotifications` is
/// derived from the channel enumeration before any stored flag is
/// consulted; it has no backing field of its own.
pub fn feature_flag(plan: &Plan, key: FeatureKey) -> bool {
    match key {
        FeatureKey::MultiChannelNotifications => plan
            .notification_channels
            .map(|channels| channels.is_multi_channel())
            .unwrap_or(false),
        FeatureKey::Notifications => plan.has_notifications,
        FeatureKey::MaintenancePhotos => plan.has_maintenance_photos,
        FeatureKey::AdvancedReports => plan.has_advanced_reports,
        FeatureKey::PdfReports => plan.has_pdf_reports,
        FeatureKey::DataExport => plan.has_data_export,
        FeatureKey::AdminDigest => plan.has_admin_digest,
        FeatureKey::LateReminders => plan.has_late_reminders,
        FeatureKey::WhiteLabel => plan.has_white_label,
        FeatureKey::ApiAccess => plan.has_api_access,
        FeatureKey::MultiCurrency => plan.has_multi_currency,
        FeatureKey::DocumentManagement => plan.has_document_management,
        FeatureKey::ESignature => plan.has_e_signature,
        FeatureKey::TenantPortal => plan.has_tenant_portal,
        FeatureKey::MobileApp => plan.has_mobile_app,
        FeatureKey::Integrations => plan.has_integrations,
        FeatureKey::MaintenanceScheduling => plan.has_maintenance_scheduling,
        FeatureKey::AllowsImages => plan.allows_images,
        FeatureKey::OverdueNotifications => plan.has_overdue_notifications,
    }
}

/// Resolves a limit key against the merged snapshot. The `-1` unlimited
/// sentinel is passed through verbatim.
pub fn limit_value(merged: &PlanWithUsage, key: LimitKey) -> i64 {
    match key {
        LimitKey::MaxProperties => merged.plan.max_properties,
        LimitKey::MaxUsers => merged.plan.max_users,
        LimitKey::MaxActiveContracts => merged.plan.max_active_contracts,
        LimitKey::ImagesPerProperty => merged.plan.images_per_property,
        LimitKey::MonthlyNotificationLimit => merged.plan.monthly_notification_limit,
        LimitKey::StorageLimitMb => merged.plan.storage_limit_mb,
        LimitKey::ReportHistoryDays => merged.plan.report_history_days,
        LimitKey::CurrentProperties => merged.usage.current_properties,
        LimitKey::CurrentUsers => merged.usage.current_users,
        LimitKey::NotificationsSentThisMonth => merged.usage.notifications_sent_this_month,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{NotificationChannels, UsageSnapshot, UNLIMITED};

    #[test]
    fn test_feature_key_parse_is_separator_insensitive() {
        assert_eq!(
            FeatureKey::parse("ADVANCED_REPORTS"),
            Some(FeatureKey::AdvancedReports)
        );
        assert_eq!(
            FeatureKey::parse("advanced-reports"),
            Some(FeatureKey::AdvancedReports)
        );
        assert_eq!(
            FeatureKey::parse(" Advanced Reports "),
            Some(FeatureKey::AdvancedReports)
        );
        assert_eq!(FeatureKey::parse("NOT_A_REAL_FEATURE"), None);
        assert_eq!(FeatureKey::parse(""), None);
    }

    #[test]
    fn test_limit_key_parse_accepts_both_spellings() {
        assert_eq!(LimitKey::parse("maxProperties"), Some(LimitKey::MaxProperties));
        assert_eq!(LimitKey::parse("MAX_PROPERTIES"), Some(LimitKey::MaxProperties));
        assert_eq!(
            LimitKey::parse("notificationsSentThisMonth"),
            Some(LimitKey::NotificationsSentThisMonth)
        );
        assert_eq!(LimitKey::parse("maxWidgets"), None);
    }

    #[test]
    fn test_every_key_round_trips_through_parse() {
        for key in FeatureKey::ALL {
            assert_eq!(FeatureKey::parse(key.as_str()), Some(key));
        }
        for key in LimitKey::ALL {
            assert_eq!(LimitKey::parse(key.as_str()), Some(key));
        }
    }

    #[test]
    fn test_feature_flag_reads_stored_fields() {
        let plan = Plan {
            has_pdf_reports: true,
            ..Plan::default()
        };
        assert!(feature_flag(&plan, FeatureKey::PdfReports));
        assert!(!feature_flag(&plan, FeatureKey::DataExport));
        assert!(!feature_flag(&plan, FeatureKey::WhiteLabel));
    }

    #[test]
    fn test_multi_channel_is_derived_from_channels() {
        let mut plan = Plan::default();
        assert!(!feature_flag(&plan, FeatureKey::MultiChannelNotifications));

        plan.notification_channels = Some(NotificationChannels::Sms);
        assert!(!feature_flag(&plan, FeatureKey::MultiChannelNotifications));

        plan.notification_channels = Some(NotificationChannels::Both);
        assert!(feature_flag(&plan, FeatureKey::MultiChannelNotifications));

        plan.notification_channels = Some(NotificationChannels::Unlimited);
        assert!(feature_flag(&plan, FeatureKey::MultiChannelNotifications));
    }

    #[test]
    fn test_limit_value_passes_unlimited_through() {
        let merged = PlanWithUsage::new(
            Plan {
                max_properties: UNLIMITED,
                max_users: 5,
                ..Plan::default()
            },
            UsageSnapshot {
                current_properties: 912,
                current_users: 2,
                notifications_sent_this_month: 0,
            },
        );
        assert_eq!(limit_value(&merged, LimitKey::MaxProperties), UNLIMITED);
        assert_eq!(limit_value(&merged, LimitKey::MaxUsers), 5);
        assert_eq!(limit_value(&merged, LimitKey::CurrentProperties), 912);
    }

    #[test]
    fn test_resource_kind_maps_to_key_pair() {
        assert_eq!(ResourceKind::parse("properties"), Some(ResourceKind::Properties));
        assert_eq!(ResourceKind::parse("USERS"), Some(ResourceKind::Users));
        assert_eq!(ResourceKind::parse("contracts"), None);
        assert_eq!(ResourceKind::Properties.limit_key(), LimitKey::MaxProperties);
        assert_eq!(ResourceKind::Properties.usage_key(), LimitKey::CurrentProperties);
        assert_eq!(ResourceKind::Users.limit_key(), LimitKey::MaxUsers);
        assert_eq!(ResourceKind::Users.usage_key(), LimitKey::CurrentUsers);
    }
}
