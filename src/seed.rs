//! Demo data: one premium clinic, the platform super-admin, one user per
//! clinic role and a starter lab catalog.
//!
//! Idempotent. Anything already present is left untouched, so running the
//! seed twice creates nothing the second time.

use chrono::{Duration, Utc};

use crate::core_state::CoreState;
use crate::db;
use crate::identity::{self, AuthError};
use crate::models::enums::{LabCategory, Lifecycle, Locale, Role, SubscriptionPlan};
use crate::models::{
    FeatureFlags, LabTest, LabTestInput, LocalizedText, NewIdentity, Subscription, Tenant,
    TenantScope, SUPERADMIN_TENANT,
};

pub const DEMO_TENANT: &str = "ORG001";
pub const SUPERADMIN_SECRET: &str = "Admin@123!";
pub const STAFF_SECRET: &str = "Password123!";

/// What a seed run actually created.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub tenant_created: bool,
    pub users_created: Vec<String>,
    pub tests_created: Vec<String>,
}

struct StaffMember {
    username: &'static str,
    email: &'static str,
    role: Role,
    full_name: &'static str,
    specialization: Option<&'static str>,
}

const STAFF: &[StaffMember] = &[
    StaffMember {
        username: "clinic.admin",
        email: "admin@nicotine.com",
        role: Role::Admin,
        full_name: "Clinic Administrator",
        specialization: None,
    },
    StaffMember {
        username: "dr.smith",
        email: "dr.smith@nicotine.com",
        role: Role::Doctor,
        full_name: "Dr. John Smith",
        specialization: Some("General Medicine"),
    },
    StaffMember {
        username: "nurse.jane",
        email: "nurse.jane@nicotine.com",
        role: Role::Nurse,
        full_name: "Jane Doe",
        specialization: None,
    },
    StaffMember {
        username: "reception",
        email: "reception@nicotine.com",
        role: Role::Receptionist,
        full_name: "Sarah Johnson",
        specialization: None,
    },
    StaffMember {
        username: "lab.tech",
        email: "lab@nicotine.com",
        role: Role::Lab,
        full_name: "Mike Wilson",
        specialization: None,
    },
];

fn demo_tenant() -> Tenant {
    let now = Utc::now();
    Tenant {
        tenant_key: DEMO_TENANT.to_string(),
        clinic_name: "Nicotine Medical Center".to_string(),
        email: "admin@nicotine.com".to_string(),
        phone: Some("+1234567890".to_string()),
        subscription: Subscription {
            plan: SubscriptionPlan::Premium,
            is_active: true,
            start_date: now,
            expiry_date: now + Duration::days(30),
            max_users: 50,
            max_patients: 1000,
        },
        features: FeatureFlags {
            analytics: true,
            lab_module: true,
            nursing_module: true,
            billing_module: true,
            cloud_storage: true,
        },
        default_locale: Locale::En,
        lifecycle: Lifecycle::Active,
        created_at: now,
        updated_at: now,
    }
}

fn catalog() -> Vec<LabTestInput> {
    let test = |code: &str, en: &str, ar: &str, de: &str, category, price| LabTestInput {
        test_code: code.to_string(),
        test_name: LocalizedText {
            en: Some(en.to_string()),
            ar: Some(ar.to_string()),
            de: Some(de.to_string()),
        },
        category,
        price: Some(price),
    };
    vec![
        test("CBC", "Complete Blood Count", "تعداد الدم الكامل", "Blutbild", LabCategory::Hematology, 50.0),
        test("GLUC", "Blood Glucose", "سكر الدم", "Blutzucker", LabCategory::Biochemistry, 30.0),
        test("LIPID", "Lipid Profile", "فحص الدهون", "Lipidprofil", LabCategory::Biochemistry, 70.0),
        test("XRAY", "X-Ray", "أشعة سينية", "Röntgen", LabCategory::Radiology, 100.0),
    ]
}

/// Create whatever part of the demo data is missing.
pub async fn seed_demo(core: &CoreState) -> Result<SeedReport, AuthError> {
    let mut report = SeedReport::default();

    {
        let conn = core.db()?;
        if db::get_tenant(&conn, DEMO_TENANT)?.is_none() {
            db::insert_tenant(&conn, &demo_tenant())?;
            report.tenant_created = true;
            tracing::info!(tenant = DEMO_TENANT, "Seeded organization");
        }
    }

    let superadmin = NewIdentity {
        tenant_key: SUPERADMIN_TENANT.to_string(),
        username: "superadmin".to_string(),
        email: "superadmin@nicotine.com".to_string(),
        secret: SUPERADMIN_SECRET.to_string(),
        role: Role::SuperAdmin,
        full_name: "Super Administrator".to_string(),
        phone: None,
        specialization: None,
    };
    let mut wanted = vec![superadmin];
    wanted.extend(STAFF.iter().map(|member| NewIdentity {
        tenant_key: DEMO_TENANT.to_string(),
        username: member.username.to_string(),
        email: member.email.to_string(),
        secret: STAFF_SECRET.to_string(),
        role: member.role,
        full_name: member.full_name.to_string(),
        phone: None,
        specialization: member.specialization.map(str::to_string),
    }));

    for new in wanted {
        let exists = {
            let conn = core.db()?;
            !db::find_login_candidates(&conn, &new.username, Some(&new.tenant_key))?.is_empty()
        };
        if exists {
            continue;
        }
        let username = new.username.clone();
        identity::create_identity(core, new).await?;
        tracing::info!(%username, "Seeded user");
        report.users_created.push(username);
    }

    let conn = core.db()?;
    let scope = TenantScope::Only(DEMO_TENANT.to_string());
    let present: Vec<String> = db::list_catalog(&conn, &scope, None, None)?
        .into_iter()
        .map(|t| t.test_code)
        .collect();
    let now = Utc::now();
    for input in catalog() {
        if present.contains(&input.test_code) {
            continue;
        }
        let test = LabTest::from_input(DEMO_TENANT, input, now);
        db::insert_lab_test(&conn, &test)?;
        tracing::info!(code = %test.test_code, "Seeded lab test");
        report.tests_created.push(test.test_code);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn core() -> CoreState {
        CoreState::in_memory(AppConfig::for_tests()).unwrap()
    }

    #[tokio::test]
    async fn seeds_everything_once() {
        let core = core();
        let first = seed_demo(&core).await.unwrap();
        assert!(first.tenant_created);
        assert_eq!(first.users_created.len(), 1 + STAFF.len());
        assert_eq!(first.tests_created, vec!["CBC", "GLUC", "LIPID", "XRAY"]);

        let second = seed_demo(&core).await.unwrap();
        assert!(!second.tenant_created);
        assert!(second.users_created.is_empty());
        assert!(second.tests_created.is_empty());
    }

    #[tokio::test]
    async fn seeded_credentials_log_in() {
        let core = core();
        seed_demo(&core).await.unwrap();

        let doctor = identity::verify_credential(&core, "dr.smith", STAFF_SECRET, Some(DEMO_TENANT))
            .await
            .unwrap();
        assert_eq!(doctor.role, Role::Doctor);
        assert_eq!(doctor.specialization.as_deref(), Some("General Medicine"));

        let root = identity::verify_credential(&core, "superadmin", SUPERADMIN_SECRET, None)
            .await
            .unwrap();
        assert_eq!(root.tenant_key, SUPERADMIN_TENANT);
        assert!(root.is_super_admin());
    }

    #[tokio::test]
    async fn seeded_tenant_has_every_feature_and_a_live_subscription() {
        let core = core();
        seed_demo(&core).await.unwrap();
        let conn = core.db().unwrap();
        let tenant = db::get_tenant(&conn, DEMO_TENANT).unwrap().unwrap();
        assert!(tenant.subscription.is_valid_at(Utc::now()));
        assert!(tenant.features.analytics && tenant.features.nursing_module);
        assert_eq!(tenant.subscription.plan, SubscriptionPlan::Premium);
    }
}
