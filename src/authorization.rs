//! Authorization rules: the role capability table and the tenant
//! entitlement checks (subscription window, feature flags, plan limits).
//!
//! Pure functions over already-loaded data. The HTTP gate in
//! `api::middleware` loads the identity and tenant and calls in here.
//! Default-deny: an action not listed for a role is refused.

use chrono::{DateTime, Utc};

use crate::models::enums::{Feature, Role};
use crate::models::{Identity, Tenant, TenantScope};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Every operation the gate can be asked to permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ProfileRead,
    UserManage,
    TenantManage,
    PatientCreate,
    PatientRead,
    PatientUpdate,
    RecordCreate,
    RecordRead,
    NursingOrderCreate,
    NursingOrderRead,
    NursingOrderExecute,
    NursingOrderCancel,
    LabCatalogRead,
    LabCatalogToggle,
    LabOrderCreate,
    LabOrderRead,
    LabOrderExecute,
    AnalyticsView,
}

/// Why a tenant-level check refused the request. Each maps to a
/// machine-readable code the client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    SubscriptionInactive,
    SubscriptionExpired,
    FeatureNotAvailable(Feature),
    PlanLimitReached,
}

impl Denial {
    pub fn code(self) -> &'static str {
        match self {
            Denial::SubscriptionInactive => "SUBSCRIPTION_INACTIVE",
            Denial::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            Denial::FeatureNotAvailable(_) => "FEATURE_NOT_AVAILABLE",
            Denial::PlanLimitReached => "PLAN_LIMIT_REACHED",
        }
    }

    pub fn message(self) -> String {
        match self {
            Denial::SubscriptionInactive => {
                "Your organization's subscription is inactive".to_string()
            }
            Denial::SubscriptionExpired => {
                "Your organization's subscription has expired".to_string()
            }
            Denial::FeatureNotAvailable(feature) => {
                format!("The {feature} feature is not enabled for your organization")
            }
            Denial::PlanLimitReached => "Your subscription plan limit has been reached".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Capability table
// ═══════════════════════════════════════════════════════════

const DOCTOR: &[Action] = &[
    Action::ProfileRead,
    Action::PatientCreate,
    Action::PatientRead,
    Action::PatientUpdate,
    Action::RecordCreate,
    Action::RecordRead,
    Action::NursingOrderCreate,
    Action::NursingOrderRead,
    Action::NursingOrderCancel,
    Action::LabCatalogRead,
    Action::LabOrderCreate,
    Action::LabOrderRead,
    Action::AnalyticsView,
];

const NURSE: &[Action] = &[
    Action::ProfileRead,
    Action::PatientRead,
    Action::RecordRead,
    Action::NursingOrderRead,
    Action::NursingOrderExecute,
    Action::NursingOrderCancel,
    Action::LabCatalogRead,
];

const RECEPTIONIST: &[Action] = &[
    Action::ProfileRead,
    Action::PatientCreate,
    Action::PatientRead,
    Action::PatientUpdate,
    Action::LabCatalogRead,
];

const LAB: &[Action] = &[
    Action::ProfileRead,
    Action::PatientRead,
    Action::LabCatalogRead,
    Action::LabCatalogToggle,
    Action::LabOrderRead,
    Action::LabOrderExecute,
];

impl Role {
    /// Whether this role may perform `action`.
    pub fn permits(self, action: Action) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => action != Action::TenantManage,
            Role::Doctor => DOCTOR.contains(&action),
            Role::Nurse => NURSE.contains(&action),
            Role::Receptionist => RECEPTIONIST.contains(&action),
            Role::Lab => LAB.contains(&action),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tenant entitlement checks
// ═══════════════════════════════════════════════════════════

/// Inactive is reported before expired: a suspended tenant is told it is
/// suspended regardless of its expiry date.
pub fn check_subscription(tenant: &Tenant, now: DateTime<Utc>) -> Result<(), Denial> {
    if !tenant.subscription.is_active {
        return Err(Denial::SubscriptionInactive);
    }
    if now > tenant.subscription.expiry_date {
        return Err(Denial::SubscriptionExpired);
    }
    Ok(())
}

pub fn check_feature(tenant: &Tenant, feature: Feature) -> Result<(), Denial> {
    if tenant.features.is_enabled(feature) {
        Ok(())
    } else {
        Err(Denial::FeatureNotAvailable(feature))
    }
}

/// Refuse creating one more entity when `current` already meets `max`.
pub fn check_plan_limit(current: u32, max: u32) -> Result<(), Denial> {
    if current >= max {
        Err(Denial::PlanLimitReached)
    } else {
        Ok(())
    }
}

/// Tenant visibility for reads: everything for the super-admin, own tenant
/// for everyone else.
pub fn read_scope(identity: &Identity) -> TenantScope {
    if identity.is_super_admin() {
        TenantScope::All
    } else {
        TenantScope::Only(identity.tenant_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use chrono::Duration;

    const ALL: &[Action] = &[
        Action::ProfileRead,
        Action::UserManage,
        Action::TenantManage,
        Action::PatientCreate,
        Action::PatientRead,
        Action::PatientUpdate,
        Action::RecordCreate,
        Action::RecordRead,
        Action::NursingOrderCreate,
        Action::NursingOrderRead,
        Action::NursingOrderExecute,
        Action::NursingOrderCancel,
        Action::LabCatalogRead,
        Action::LabCatalogToggle,
        Action::LabOrderCreate,
        Action::LabOrderRead,
        Action::LabOrderExecute,
        Action::AnalyticsView,
    ];

    #[test]
    fn super_admin_may_do_everything() {
        assert!(ALL.iter().all(|a| Role::SuperAdmin.permits(*a)));
    }

    #[test]
    fn admin_cannot_manage_tenants() {
        assert!(!Role::Admin.permits(Action::TenantManage));
        assert!(ALL
            .iter()
            .filter(|a| **a != Action::TenantManage)
            .all(|a| Role::Admin.permits(*a)));
    }

    #[test]
    fn receptionist_registers_patients_but_not_nursing() {
        assert!(Role::Receptionist.permits(Action::PatientCreate));
        for action in [
            Action::NursingOrderCreate,
            Action::NursingOrderRead,
            Action::NursingOrderExecute,
            Action::NursingOrderCancel,
        ] {
            assert!(!Role::Receptionist.permits(action));
        }
    }

    #[test]
    fn clinical_split() {
        assert!(Role::Doctor.permits(Action::NursingOrderCreate));
        assert!(!Role::Doctor.permits(Action::NursingOrderExecute));
        assert!(Role::Nurse.permits(Action::NursingOrderExecute));
        assert!(!Role::Nurse.permits(Action::NursingOrderCreate));
        assert!(Role::Lab.permits(Action::LabCatalogToggle));
        assert!(!Role::Doctor.permits(Action::LabCatalogToggle));
        assert!(!Role::Nurse.permits(Action::AnalyticsView));
        assert!(!Role::Doctor.permits(Action::UserManage));
    }

    #[test]
    fn inactive_beats_expired() {
        let mut tenant = fixtures::tenant("ORG001");
        tenant.subscription.is_active = false;
        tenant.subscription.expiry_date = Utc::now() - Duration::days(10);
        assert_eq!(check_subscription(&tenant, Utc::now()), Err(Denial::SubscriptionInactive));

        tenant.subscription.expiry_date = Utc::now() + Duration::days(10);
        assert_eq!(check_subscription(&tenant, Utc::now()), Err(Denial::SubscriptionInactive));
    }

    #[test]
    fn expired_subscription_denied() {
        let mut tenant = fixtures::tenant("ORG001");
        tenant.subscription.expiry_date = Utc::now() - Duration::seconds(1);
        assert_eq!(check_subscription(&tenant, Utc::now()), Err(Denial::SubscriptionExpired));
    }

    #[test]
    fn valid_subscription_passes() {
        let tenant = fixtures::tenant("ORG001");
        assert_eq!(check_subscription(&tenant, Utc::now()), Ok(()));
        let expiry = tenant.subscription.expiry_date;
        assert_eq!(check_subscription(&tenant, expiry), Ok(()));
    }

    #[test]
    fn feature_flags_gate() {
        let mut tenant = fixtures::tenant("ORG001");
        assert!(check_feature(&tenant, Feature::Analytics).is_ok());
        tenant.features.analytics = false;
        let denial = check_feature(&tenant, Feature::Analytics).unwrap_err();
        assert_eq!(denial.code(), "FEATURE_NOT_AVAILABLE");
    }

    #[test]
    fn plan_limit_boundary() {
        assert!(check_plan_limit(4, 5).is_ok());
        assert_eq!(check_plan_limit(5, 5), Err(Denial::PlanLimitReached));
    }

    #[test]
    fn read_scope_by_role() {
        let admin = fixtures::identity("SUPERADMIN", "root", Role::SuperAdmin);
        assert_eq!(read_scope(&admin), TenantScope::All);
        let doctor = fixtures::identity("ORG001", "dr.smith", Role::Doctor);
        assert_eq!(read_scope(&doctor), TenantScope::Only("ORG001".into()));
    }
}
