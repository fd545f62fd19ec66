use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{enum_col, json_col};
use crate::db::DatabaseError;
use crate::models::*;

const TENANT_COLUMNS: &str = "tenant_key, clinic_name, email, phone, plan, subscription_active,
     subscription_start, subscription_expiry, max_users, max_patients, features,
     default_locale, lifecycle, created_at, updated_at";

fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        tenant_key: row.get(0)?,
        clinic_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        subscription: Subscription {
            plan: enum_col(row, 4)?,
            is_active: row.get(5)?,
            start_date: row.get(6)?,
            expiry_date: row.get(7)?,
            max_users: row.get(8)?,
            max_patients: row.get(9)?,
        },
        features: json_col(row, 10)?,
        default_locale: enum_col(row, 11)?,
        lifecycle: enum_col(row, 12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

pub fn insert_tenant(conn: &Connection, tenant: &Tenant) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO tenants ({TENANT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"),
        params![
            tenant.tenant_key,
            tenant.clinic_name,
            tenant.email,
            tenant.phone,
            tenant.subscription.plan.as_str(),
            tenant.subscription.is_active,
            tenant.subscription.start_date,
            tenant.subscription.expiry_date,
            tenant.subscription.max_users,
            tenant.subscription.max_patients,
            serde_json::to_string(&tenant.features)?,
            tenant.default_locale.as_str(),
            tenant.lifecycle.as_str(),
            tenant.created_at,
            tenant.updated_at,
        ],
    )?;
    Ok(())
}

/// Fetch a tenant that has not been soft-deleted.
pub fn get_tenant(conn: &Connection, tenant_key: &str) -> Result<Option<Tenant>, DatabaseError> {
    let tenant = conn
        .query_row(
            &format!(
                "SELECT {TENANT_COLUMNS} FROM tenants WHERE tenant_key = ?1 AND lifecycle != 'deleted'"
            ),
            params![tenant_key],
            tenant_from_row,
        )
        .optional()?;
    Ok(tenant)
}

/// Replace the subscription window. Returns false when the tenant does not exist.
pub fn update_subscription(
    conn: &Connection,
    tenant_key: &str,
    subscription: &Subscription,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE tenants SET plan = ?2, subscription_active = ?3, subscription_start = ?4,
             subscription_expiry = ?5, max_users = ?6, max_patients = ?7, updated_at = ?8
         WHERE tenant_key = ?1 AND lifecycle != 'deleted'",
        params![
            tenant_key,
            subscription.plan.as_str(),
            subscription.is_active,
            subscription.start_date,
            subscription.expiry_date,
            subscription.max_users,
            subscription.max_patients,
            chrono::Utc::now(),
        ],
    )?;
    Ok(changed == 1)
}

pub fn update_features(
    conn: &Connection,
    tenant_key: &str,
    features: &FeatureFlags,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE tenants SET features = ?2, updated_at = ?3
         WHERE tenant_key = ?1 AND lifecycle != 'deleted'",
        params![tenant_key, serde_json::to_string(features)?, chrono::Utc::now()],
    )?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::db::open_memory_database;
    use crate::models::enums::Feature;
    use chrono::{Duration, Utc};

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let tenant = fixtures::seed_tenant(&conn, "ORG001");
        let loaded = get_tenant(&conn, "ORG001").unwrap().unwrap();
        assert_eq!(loaded.clinic_name, tenant.clinic_name);
        assert!(loaded.features.is_enabled(Feature::Analytics));
        assert!(loaded.subscription.is_valid_at(Utc::now()));
    }

    #[test]
    fn missing_tenant_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_tenant(&conn, "NOPE").unwrap().is_none());
    }

    #[test]
    fn duplicate_key_is_constraint_violation() {
        let conn = open_memory_database().unwrap();
        fixtures::seed_tenant(&conn, "ORG001");
        let err = insert_tenant(&conn, &fixtures::tenant("ORG001")).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn subscription_update_persists() {
        let conn = open_memory_database().unwrap();
        let mut tenant = fixtures::seed_tenant(&conn, "ORG001");
        tenant.subscription.is_active = false;
        tenant.subscription.expiry_date = Utc::now() - Duration::days(2);
        assert!(update_subscription(&conn, "ORG001", &tenant.subscription).unwrap());

        let loaded = get_tenant(&conn, "ORG001").unwrap().unwrap();
        assert!(!loaded.subscription.is_active);
        assert!(!update_subscription(&conn, "OTHER", &tenant.subscription).unwrap());
    }

    #[test]
    fn feature_update_persists() {
        let conn = open_memory_database().unwrap();
        let mut tenant = fixtures::seed_tenant(&conn, "ORG001");
        tenant.features.set(Feature::Analytics, false);
        assert!(update_features(&conn, "ORG001", &tenant.features).unwrap());
        let loaded = get_tenant(&conn, "ORG001").unwrap().unwrap();
        assert!(!loaded.features.analytics);
    }
}
