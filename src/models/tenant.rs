use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Feature, Lifecycle, Locale, SubscriptionPlan};

/// Tenant key reserved for the platform super-administrator.
pub const SUPERADMIN_TENANT: &str = "SUPERADMIN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: SubscriptionPlan,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub max_users: u32,
    pub max_patients: u32,
}

impl Subscription {
    /// A subscription is valid iff it is active and `now <= expiry_date`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.expiry_date
    }
}

/// Named module switches. Stored as a JSON object on the tenant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct FeatureFlags {
    pub analytics: bool,
    pub lab_module: bool,
    pub nursing_module: bool,
    pub billing_module: bool,
    pub cloud_storage: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            analytics: false,
            lab_module: true,
            nursing_module: true,
            billing_module: true,
            cloud_storage: false,
        }
    }
}

impl FeatureFlags {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Analytics => self.analytics,
            Feature::LabModule => self.lab_module,
            Feature::NursingModule => self.nursing_module,
            Feature::BillingModule => self.billing_module,
            Feature::CloudStorage => self.cloud_storage,
        }
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::Analytics => self.analytics = enabled,
            Feature::LabModule => self.lab_module = enabled,
            Feature::NursingModule => self.nursing_module = enabled,
            Feature::BillingModule => self.billing_module = enabled,
            Feature::CloudStorage => self.cloud_storage = enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub tenant_key: String,
    pub clinic_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subscription: Subscription,
    pub features: FeatureFlags,
    pub default_locale: Locale,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which tenants a query may see. Super-admin reads are unscoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    All,
    Only(String),
}

impl TenantScope {
    /// Bind value for `(?N IS NULL OR tenant_key = ?N)` filters.
    pub fn key(&self) -> Option<&str> {
        match self {
            TenantScope::All => None,
            TenantScope::Only(key) => Some(key.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(is_active: bool, expiry_offset_days: i64) -> Subscription {
        let now = Utc::now();
        Subscription {
            plan: SubscriptionPlan::Premium,
            is_active,
            start_date: now - Duration::days(30),
            expiry_date: now + Duration::days(expiry_offset_days),
            max_users: 50,
            max_patients: 1000,
        }
    }

    #[test]
    fn active_and_unexpired_is_valid() {
        assert!(subscription(true, 30).is_valid_at(Utc::now()));
    }

    #[test]
    fn inactive_is_invalid_even_before_expiry() {
        assert!(!subscription(false, 30).is_valid_at(Utc::now()));
    }

    #[test]
    fn expired_is_invalid() {
        assert!(!subscription(true, -1).is_valid_at(Utc::now()));
    }

    #[test]
    fn expiry_instant_itself_is_still_valid() {
        let sub = subscription(true, 1);
        assert!(sub.is_valid_at(sub.expiry_date));
    }

    #[test]
    fn feature_flags_default_and_toggle() {
        let mut flags = FeatureFlags::default();
        assert!(!flags.is_enabled(Feature::Analytics));
        assert!(flags.is_enabled(Feature::LabModule));
        flags.set(Feature::Analytics, true);
        assert!(flags.is_enabled(Feature::Analytics));
    }

    #[test]
    fn missing_flags_deserialize_to_defaults() {
        let flags: FeatureFlags = serde_json::from_str(r#"{"analytics":true}"#).unwrap();
        assert!(flags.analytics);
        assert!(flags.nursing_module);
        assert!(!flags.cloud_storage);
    }
}
