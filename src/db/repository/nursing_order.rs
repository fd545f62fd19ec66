use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, json_col, opt_enum_col, opt_json, opt_json_col, opt_uuid_col, uuid_col};
use super::{insert_order_event, list_order_events};
use crate::db::DatabaseError;
use crate::models::enums::{NursingActionType, OrderKind, OrderStatus, Priority};
use crate::models::*;

const ORDER_COLUMNS: &str = "o.id, o.tenant_key, o.order_number, o.patient_id, o.doctor_id,
     o.action_type, o.medication_name, o.administration_method, o.dosage, o.frequency,
     o.special_instructions, o.priority, o.scheduled_for, o.status, o.administered_by,
     o.administered_at, o.administration_notes, o.lifecycle, o.created_at, o.updated_at";

/// Number of columns in `ORDER_COLUMNS`; joined columns start here.
const ORDER_COLUMN_COUNT: usize = 20;

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<NursingOrder> {
    Ok(NursingOrder {
        id: uuid_col(row, 0)?,
        tenant_key: row.get(1)?,
        order_number: row.get(2)?,
        patient_id: uuid_col(row, 3)?,
        doctor_id: uuid_col(row, 4)?,
        action_type: enum_col(row, 5)?,
        medication_name: row.get(6)?,
        administration_method: opt_enum_col(row, 7)?,
        dosage: row.get(8)?,
        frequency: row.get(9)?,
        special_instructions: opt_json_col(row, 10)?,
        priority: enum_col(row, 11)?,
        scheduled_for: row.get(12)?,
        status: enum_col(row, 13)?,
        events: Vec::new(),
        administered_by: opt_uuid_col(row, 14)?,
        administered_at: row.get(15)?,
        administration_notes: row.get(16)?,
        lifecycle: enum_col(row, 17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

/// Who administered a completed order, and when.
#[derive(Debug, Clone)]
pub struct Administration {
    pub by: Uuid,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
}

pub fn insert_nursing_order(conn: &Connection, order: &NursingOrder) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO nursing_orders (id, tenant_key, order_number, patient_id, doctor_id,
             action_type, medication_name, administration_method, dosage, frequency,
             special_instructions, priority, scheduled_for, status, administered_by,
             administered_at, administration_notes, lifecycle, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20)",
        params![
            order.id.to_string(),
            order.tenant_key,
            order.order_number,
            order.patient_id.to_string(),
            order.doctor_id.to_string(),
            order.action_type.as_str(),
            order.medication_name,
            order.administration_method.map(|m| m.as_str()),
            order.dosage,
            order.frequency,
            opt_json(&order.special_instructions)?,
            order.priority.as_str(),
            order.scheduled_for,
            order.status.as_str(),
            order.administered_by.map(|id| id.to_string()),
            order.administered_at,
            order.administration_notes,
            order.lifecycle.as_str(),
            order.created_at,
            order.updated_at,
        ],
    )?;
    Ok(())
}

/// Fetch an active order, with its execution log, visible in `scope`.
pub fn get_nursing_order(
    conn: &Connection,
    scope: &TenantScope,
    id: &Uuid,
) -> Result<Option<NursingOrder>, DatabaseError> {
    let order = conn
        .query_row(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM nursing_orders o
                 WHERE o.id = ?1 AND (?2 IS NULL OR o.tenant_key = ?2) AND o.lifecycle = 'active'"
            ),
            params![id.to_string(), scope.key()],
            order_from_row,
        )
        .optional()?;
    match order {
        Some(mut order) => {
            order.events = list_order_events(conn, OrderKind::Nursing, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

/// Pending orders, most urgent first, then oldest first, with patient and
/// doctor summaries joined in.
pub fn list_pending_orders(
    conn: &Connection,
    scope: &TenantScope,
    priority: Option<Priority>,
    action_type: Option<NursingActionType>,
) -> Result<Vec<PendingOrderView>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ORDER_COLUMNS}, p.mrn, p.full_name, p.age, p.gender, p.allergies,
                u.full_name, u.specialization
         FROM nursing_orders o
         JOIN patients p ON p.id = o.patient_id
         LEFT JOIN users u ON u.id = o.doctor_id
         WHERE (?1 IS NULL OR o.tenant_key = ?1) AND o.lifecycle = 'active'
           AND o.status = 'pending'
           AND (?2 IS NULL OR o.priority = ?2)
           AND (?3 IS NULL OR o.action_type = ?3)
         ORDER BY CASE o.priority WHEN 'stat' THEN 0 WHEN 'urgent' THEN 1 ELSE 2 END,
                  o.created_at ASC"
    ))?;
    let base = ORDER_COLUMN_COUNT;
    let rows = stmt
        .query_map(
            params![
                scope.key(),
                priority.map(|p| p.as_str()),
                action_type.map(|a| a.as_str()),
            ],
            |row| {
                let doctor_name: Option<String> = row.get(base + 5)?;
                Ok(PendingOrderView {
                    order: order_from_row(row)?,
                    patient: OrderPatientSummary {
                        mrn: row.get(base)?,
                        full_name: row.get(base + 1)?,
                        age: row.get(base + 2)?,
                        gender: row.get(base + 3)?,
                        allergies: json_col(row, base + 4)?,
                    },
                    doctor: match doctor_name {
                        Some(full_name) => Some(OrderDoctorSummary {
                            full_name,
                            specialization: row.get(base + 6)?,
                        }),
                        None => None,
                    },
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut views = rows;
    for view in &mut views {
        view.order.events = list_order_events(conn, OrderKind::Nursing, &view.order.id)?;
    }
    Ok(views)
}

/// Move an order from `expected` to `next` and append `event`, atomically.
///
/// The status update is a compare-and-set on `expected`: it returns false
/// (and appends nothing) when another writer changed the order first.
pub fn transition_nursing_order(
    conn: &Connection,
    order: &NursingOrder,
    expected: OrderStatus,
    next: OrderStatus,
    event: &ExecutionEvent,
    administration: Option<&Administration>,
) -> Result<bool, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE nursing_orders SET status = ?3, updated_at = ?4,
             administered_by = COALESCE(?5, administered_by),
             administered_at = COALESCE(?6, administered_at),
             administration_notes = COALESCE(?7, administration_notes)
         WHERE id = ?1 AND status = ?2 AND lifecycle = 'active'",
        params![
            order.id.to_string(),
            expected.as_str(),
            next.as_str(),
            event.timestamp,
            administration.map(|a| a.by.to_string()),
            administration.map(|a| a.at),
            administration.and_then(|a| a.notes.clone()),
        ],
    )?;
    if changed != 1 {
        return Ok(false);
    }
    insert_order_event(&tx, OrderKind::Nursing, &order.id, event)?;
    tx.commit()?;
    Ok(true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::db::open_memory_database;
    use crate::models::enums::{ExecutionAction, Gender, Lifecycle, Role};

    pub(crate) fn order(
        tenant_key: &str,
        number: &str,
        patient_id: Uuid,
        doctor_id: Uuid,
        priority: Priority,
    ) -> NursingOrder {
        let now = Utc::now();
        NursingOrder {
            id: Uuid::new_v4(),
            tenant_key: tenant_key.to_string(),
            order_number: number.to_string(),
            patient_id,
            doctor_id,
            action_type: NursingActionType::Injection,
            medication_name: Some("Ceftriaxone".into()),
            administration_method: None,
            dosage: Some("1g".into()),
            frequency: None,
            special_instructions: None,
            priority,
            scheduled_for: None,
            status: OrderStatus::Pending,
            events: vec![],
            administered_by: None,
            administered_at: None,
            administration_notes: None,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_queue_orders_by_priority() {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::seed_identity(&conn, "ORG001", "dr.smith", Role::Doctor);
        let patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, Some(50));
        for (n, p) in [("NO-2026-0001", Priority::Routine), ("NO-2026-0002", Priority::Stat), ("NO-2026-0003", Priority::Urgent)] {
            insert_nursing_order(&conn, &order("ORG001", n, patient.id, doctor.id, p)).unwrap();
        }
        let scope = TenantScope::Only("ORG001".into());
        let queue = list_pending_orders(&conn, &scope, None, None).unwrap();
        let numbers: Vec<_> = queue.iter().map(|v| v.order.order_number.as_str()).collect();
        assert_eq!(numbers, vec!["NO-2026-0002", "NO-2026-0003", "NO-2026-0001"]);
        assert_eq!(queue[0].patient.mrn, "REF-2026-0001");
        assert_eq!(queue[0].doctor.as_ref().unwrap().full_name, doctor.full_name);

        let urgent = list_pending_orders(&conn, &scope, Some(Priority::Urgent), None).unwrap();
        assert_eq!(urgent.len(), 1);
    }

    #[test]
    fn transition_is_compare_and_set() {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::seed_identity(&conn, "ORG001", "dr.smith", Role::Doctor);
        let nurse = fixtures::seed_identity(&conn, "ORG001", "nurse.jane", Role::Nurse);
        let patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, None);
        let o = order("ORG001", "NO-2026-0001", patient.id, doctor.id, Priority::Routine);
        insert_nursing_order(&conn, &o).unwrap();

        let event = ExecutionEvent {
            action: ExecutionAction::Started,
            timestamp: Utc::now(),
            performed_by: nurse.id,
            notes: None,
        };
        assert!(transition_nursing_order(&conn, &o, OrderStatus::Pending, OrderStatus::InProgress, &event, None).unwrap());
        // A second writer still believing the order is pending loses.
        assert!(!transition_nursing_order(&conn, &o, OrderStatus::Pending, OrderStatus::InProgress, &event, None).unwrap());

        let scope = TenantScope::Only("ORG001".into());
        let loaded = get_nursing_order(&conn, &scope, &o.id).unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::InProgress);
        assert_eq!(loaded.events.len(), 1);
        assert_eq!(loaded.events[0].action, ExecutionAction::Started);
    }

    #[test]
    fn completion_records_administration() {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::seed_identity(&conn, "ORG001", "dr.smith", Role::Doctor);
        let nurse = fixtures::seed_identity(&conn, "ORG001", "nurse.jane", Role::Nurse);
        let patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, None);
        let o = order("ORG001", "NO-2026-0001", patient.id, doctor.id, Priority::Routine);
        insert_nursing_order(&conn, &o).unwrap();

        let now = Utc::now();
        let event = ExecutionEvent {
            action: ExecutionAction::Completed,
            timestamp: now,
            performed_by: nurse.id,
            notes: Some("given left deltoid".into()),
        };
        let admin = Administration {
            by: nurse.id,
            at: now,
            notes: Some("given left deltoid".into()),
        };
        assert!(transition_nursing_order(&conn, &o, OrderStatus::Pending, OrderStatus::Completed, &event, Some(&admin)).unwrap());
        let loaded = get_nursing_order(&conn, &TenantScope::All, &o.id).unwrap().unwrap();
        assert_eq!(loaded.administered_by, Some(nurse.id));
        assert_eq!(loaded.administration_notes.as_deref(), Some("given left deltoid"));
    }
}
