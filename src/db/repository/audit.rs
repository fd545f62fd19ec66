use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{enum_col, json_col};
use crate::db::DatabaseError;
use crate::models::*;

/// Append one audit record.
pub fn insert_audit_record(conn: &Connection, record: &AuditRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (tenant_key, actor_id, actor_name, actor_role, action,
             resource_type, resource_id, details, status, source_address, user_agent, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.actor.tenant_key,
            record.actor.actor_id.to_string(),
            record.actor.actor_name,
            record.actor.actor_role.as_str(),
            record.event.action(),
            record.resource_type.as_str(),
            record.resource_id,
            serde_json::to_string(&record.event.details())?,
            record.status.as_str(),
            record.source_address,
            record.user_agent,
            record.timestamp,
        ],
    )?;
    Ok(())
}

/// Delete audit records written before `cutoff`.
pub fn prune_audit_log(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM audit_log WHERE timestamp < ?1", params![cutoff])?;
    Ok(deleted)
}

/// A tenant's audit trail since `since`, newest first.
pub fn query_audit_by_tenant(
    conn: &Connection,
    tenant_key: &str,
    since: DateTime<Utc>,
) -> Result<Vec<StoredAuditRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_key, actor_id, actor_name, actor_role, action, resource_type,
                resource_id, details, status, source_address, timestamp
         FROM audit_log
         WHERE tenant_key = ?1 AND timestamp >= ?2
         ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![tenant_key, since], |row| {
            Ok(StoredAuditRecord {
                id: row.get(0)?,
                tenant_key: row.get(1)?,
                actor_id: row.get(2)?,
                actor_name: row.get(3)?,
                actor_role: row.get(4)?,
                action: row.get(5)?,
                resource_type: row.get(6)?,
                resource_id: row.get(7)?,
                details: json_col(row, 8)?,
                status: enum_col(row, 9)?,
                source_address: row.get(10)?,
                timestamp: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::enums::{AuditStatus, ResourceType, Role};
    use chrono::Duration;
    use uuid::Uuid;

    fn actor(tenant_key: &str) -> AuditActor {
        AuditActor {
            tenant_key: tenant_key.into(),
            actor_id: Uuid::new_v4(),
            actor_name: "Dr. Smith".into(),
            actor_role: Role::Doctor,
        }
    }

    #[test]
    fn records_round_trip_with_details() {
        let conn = open_memory_database().unwrap();
        let record = AuditRecord::new(
            actor("ORG001"),
            AuditEvent::PatientCreate {
                mrn: "REF-2026-0001".into(),
                full_name: "Jane Roe".into(),
            },
            ResourceType::Patient,
        )
        .resource("p-1")
        .source(Some("10.0.0.1".into()), None);
        insert_audit_record(&conn, &record).unwrap();
        insert_audit_record(
            &conn,
            &AuditRecord::new(actor("ORG002"), AuditEvent::Login, ResourceType::User),
        )
        .unwrap();

        let rows = query_audit_by_tenant(&conn, "ORG001", Utc::now() - Duration::hours(1)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "patient_create");
        assert_eq!(rows[0].details["mrn"], "REF-2026-0001");
        assert_eq!(rows[0].status, AuditStatus::Success);
        assert_eq!(rows[0].source_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn prune_removes_only_old_records() {
        let conn = open_memory_database().unwrap();
        let mut old = AuditRecord::new(actor("ORG001"), AuditEvent::Login, ResourceType::User);
        old.timestamp = Utc::now() - Duration::days(400);
        insert_audit_record(&conn, &old).unwrap();
        insert_audit_record(
            &conn,
            &AuditRecord::new(actor("ORG001"), AuditEvent::Login, ResourceType::User),
        )
        .unwrap();

        let deleted = prune_audit_log(&conn, Utc::now() - Duration::days(365)).unwrap();
        assert_eq!(deleted, 1);
        let rows = query_audit_by_tenant(&conn, "ORG001", Utc::now() - Duration::days(1000)).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
