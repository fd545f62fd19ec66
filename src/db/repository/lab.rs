use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, json_col, opt_json_col, opt_uuid_col, uuid_col};
use super::{insert_order_event, list_order_events};
use crate::db::DatabaseError;
use crate::models::enums::{LabCategory, OrderKind, OrderStatus};
use crate::models::*;

const TEST_COLUMNS: &str = "id, tenant_key, test_code, test_name, category, is_available,
     unavailable_reason, price, last_toggled_by, last_toggled_at, lifecycle, created_at";

const LAB_ORDER_COLUMNS: &str = "id, tenant_key, test_number, patient_id, doctor_id, catalog_id,
     test_name, priority, status, results, reported_at, lifecycle, created_at, updated_at";

fn test_from_row(row: &Row<'_>) -> rusqlite::Result<LabTest> {
    Ok(LabTest {
        id: uuid_col(row, 0)?,
        tenant_key: row.get(1)?,
        test_code: row.get(2)?,
        test_name: json_col(row, 3)?,
        category: enum_col(row, 4)?,
        is_available: row.get(5)?,
        unavailable_reason: row.get(6)?,
        price: row.get(7)?,
        last_toggled_by: opt_uuid_col(row, 8)?,
        last_toggled_at: row.get(9)?,
        lifecycle: enum_col(row, 10)?,
        created_at: row.get(11)?,
    })
}

fn lab_order_from_row(row: &Row<'_>) -> rusqlite::Result<LabOrder> {
    Ok(LabOrder {
        id: uuid_col(row, 0)?,
        tenant_key: row.get(1)?,
        test_number: row.get(2)?,
        patient_id: uuid_col(row, 3)?,
        doctor_id: uuid_col(row, 4)?,
        catalog_id: uuid_col(row, 5)?,
        test_name: row.get(6)?,
        priority: enum_col(row, 7)?,
        status: enum_col(row, 8)?,
        events: Vec::new(),
        results: opt_json_col(row, 9)?,
        reported_at: row.get(10)?,
        lifecycle: enum_col(row, 11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub fn insert_lab_test(conn: &Connection, test: &LabTest) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO lab_catalog ({TEST_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            test.id.to_string(),
            test.tenant_key,
            test.test_code,
            serde_json::to_string(&test.test_name)?,
            test.category.as_str(),
            test.is_available,
            test.unavailable_reason,
            test.price,
            test.last_toggled_by.map(|id| id.to_string()),
            test.last_toggled_at,
            test.lifecycle.as_str(),
            test.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_lab_test(
    conn: &Connection,
    scope: &TenantScope,
    id: &Uuid,
) -> Result<Option<LabTest>, DatabaseError> {
    let test = conn
        .query_row(
            &format!(
                "SELECT {TEST_COLUMNS} FROM lab_catalog
                 WHERE id = ?1 AND (?2 IS NULL OR tenant_key = ?2) AND lifecycle = 'active'"
            ),
            params![id.to_string(), scope.key()],
            test_from_row,
        )
        .optional()?;
    Ok(test)
}

/// Catalog entries grouped by category, then by code.
pub fn list_catalog(
    conn: &Connection,
    scope: &TenantScope,
    category: Option<LabCategory>,
    available: Option<bool>,
) -> Result<Vec<LabTest>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEST_COLUMNS} FROM lab_catalog
         WHERE (?1 IS NULL OR tenant_key = ?1) AND lifecycle = 'active'
           AND (?2 IS NULL OR category = ?2)
           AND (?3 IS NULL OR is_available = ?3)
         ORDER BY category ASC, test_code ASC"
    ))?;
    let tests = stmt
        .query_map(
            params![scope.key(), category.map(|c| c.as_str()), available],
            test_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tests)
}

/// Flip availability. Enabling clears any stored reason.
pub fn set_test_availability(
    conn: &Connection,
    id: &Uuid,
    available: bool,
    reason: Option<&str>,
    toggled_by: &Uuid,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let reason = if available { None } else { reason };
    let changed = conn.execute(
        "UPDATE lab_catalog SET is_available = ?2, unavailable_reason = ?3,
             last_toggled_by = ?4, last_toggled_at = ?5
         WHERE id = ?1 AND lifecycle = 'active'",
        params![id.to_string(), available, reason, toggled_by.to_string(), at],
    )?;
    Ok(changed == 1)
}

pub fn insert_lab_order(conn: &Connection, order: &LabOrder) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO lab_orders ({LAB_ORDER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            order.id.to_string(),
            order.tenant_key,
            order.test_number,
            order.patient_id.to_string(),
            order.doctor_id.to_string(),
            order.catalog_id.to_string(),
            order.test_name,
            order.priority.as_str(),
            order.status.as_str(),
            order
                .results
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            order.reported_at,
            order.lifecycle.as_str(),
            order.created_at,
            order.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_lab_order(
    conn: &Connection,
    scope: &TenantScope,
    id: &Uuid,
) -> Result<Option<LabOrder>, DatabaseError> {
    let order = conn
        .query_row(
            &format!(
                "SELECT {LAB_ORDER_COLUMNS} FROM lab_orders
                 WHERE id = ?1 AND (?2 IS NULL OR tenant_key = ?2) AND lifecycle = 'active'"
            ),
            params![id.to_string(), scope.key()],
            lab_order_from_row,
        )
        .optional()?;
    match order {
        Some(mut order) => {
            order.events = list_order_events(conn, OrderKind::Lab, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

/// Compare-and-set status change for a lab order, appending `event` in the
/// same transaction. `results` is stored (and `reported_at` stamped) when given.
pub fn transition_lab_order(
    conn: &Connection,
    order: &LabOrder,
    expected: OrderStatus,
    next: OrderStatus,
    event: &ExecutionEvent,
    results: Option<&serde_json::Value>,
) -> Result<bool, DatabaseError> {
    let results = results.map(serde_json::to_string).transpose()?;
    let reported_at = results.as_ref().map(|_| event.timestamp);

    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE lab_orders SET status = ?3, updated_at = ?4,
             results = COALESCE(?5, results),
             reported_at = COALESCE(?6, reported_at)
         WHERE id = ?1 AND status = ?2 AND lifecycle = 'active'",
        params![
            order.id.to_string(),
            expected.as_str(),
            next.as_str(),
            event.timestamp,
            results,
            reported_at,
        ],
    )?;
    if changed != 1 {
        return Ok(false);
    }
    insert_order_event(&tx, OrderKind::Lab, &order.id, event)?;
    tx.commit()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::db::open_memory_database;
    use crate::models::enums::{ExecutionAction, Gender, Lifecycle, Priority, Role};

    fn catalog_entry(tenant_key: &str, code: &str, category: LabCategory) -> LabTest {
        LabTest {
            id: Uuid::new_v4(),
            tenant_key: tenant_key.into(),
            test_code: code.into(),
            test_name: LocalizedText {
                en: Some(format!("{code} test")),
                ..LocalizedText::default()
            },
            category,
            is_available: true,
            unavailable_reason: None,
            price: Some(25.0),
            last_toggled_by: None,
            last_toggled_at: None,
            lifecycle: Lifecycle::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn catalog_filters_by_category_and_availability() {
        let conn = open_memory_database().unwrap();
        let tech = fixtures::seed_identity(&conn, "ORG001", "lab.tech", Role::Lab);
        let cbc = catalog_entry("ORG001", "CBC", LabCategory::Hematology);
        insert_lab_test(&conn, &cbc).unwrap();
        insert_lab_test(&conn, &catalog_entry("ORG001", "GLUC", LabCategory::Biochemistry)).unwrap();
        insert_lab_test(&conn, &catalog_entry("ORG002", "CBC", LabCategory::Hematology)).unwrap();

        let scope = TenantScope::Only("ORG001".into());
        assert_eq!(list_catalog(&conn, &scope, None, None).unwrap().len(), 2);
        let hema = list_catalog(&conn, &scope, Some(LabCategory::Hematology), None).unwrap();
        assert_eq!(hema.len(), 1);

        assert!(set_test_availability(&conn, &cbc.id, false, Some("reagent out"), &tech.id, Utc::now()).unwrap());
        let unavailable = list_catalog(&conn, &scope, None, Some(false)).unwrap();
        assert_eq!(unavailable.len(), 1);
        assert_eq!(unavailable[0].unavailable_reason.as_deref(), Some("reagent out"));
        assert_eq!(unavailable[0].last_toggled_by, Some(tech.id));

        set_test_availability(&conn, &cbc.id, true, Some("ignored"), &tech.id, Utc::now()).unwrap();
        let cbc = get_lab_test(&conn, &scope, &cbc.id).unwrap().unwrap();
        assert!(cbc.is_available);
        assert!(cbc.unavailable_reason.is_none());
    }

    #[test]
    fn duplicate_test_code_in_tenant_is_rejected() {
        let conn = open_memory_database().unwrap();
        insert_lab_test(&conn, &catalog_entry("ORG001", "CBC", LabCategory::Hematology)).unwrap();
        let err = insert_lab_test(&conn, &catalog_entry("ORG001", "CBC", LabCategory::Hematology))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn reporting_results_stores_payload_and_event() {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::seed_identity(&conn, "ORG001", "dr.smith", Role::Doctor);
        let tech = fixtures::seed_identity(&conn, "ORG001", "lab.tech", Role::Lab);
        let patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Female, Some(33));
        let test = catalog_entry("ORG001", "CBC", LabCategory::Hematology);
        insert_lab_test(&conn, &test).unwrap();

        let now = Utc::now();
        let order = LabOrder {
            id: Uuid::new_v4(),
            tenant_key: "ORG001".into(),
            test_number: "LAB-2026-0001".into(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            catalog_id: test.id,
            test_name: "CBC test".into(),
            priority: Priority::Urgent,
            status: OrderStatus::Pending,
            events: vec![],
            results: None,
            reported_at: None,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        };
        insert_lab_order(&conn, &order).unwrap();

        let event = ExecutionEvent {
            action: ExecutionAction::Completed,
            timestamp: Utc::now(),
            performed_by: tech.id,
            notes: None,
        };
        let results = serde_json::json!({"wbc": 6.1});
        assert!(transition_lab_order(&conn, &order, OrderStatus::Pending, OrderStatus::Completed, &event, Some(&results)).unwrap());
        assert!(!transition_lab_order(&conn, &order, OrderStatus::Pending, OrderStatus::Completed, &event, Some(&results)).unwrap());

        let loaded = get_lab_order(&conn, &TenantScope::All, &order.id).unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Completed);
        assert_eq!(loaded.results, Some(results));
        assert!(loaded.reported_at.is_some());
        assert_eq!(loaded.events.len(), 1);
    }
}
