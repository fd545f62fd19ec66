use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, json_col, opt_json, opt_json_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::*;

const RECORD_COLUMNS: &str = "id, tenant_key, patient_id, doctor_id, visit_date, chief_complaint,
     examination_findings, vital_signs, diagnosis_primary, diagnosis_primary_ar,
     diagnosis_primary_de, diagnosis_secondary, treatment_plan, lifecycle, created_at";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    Ok(MedicalRecord {
        id: uuid_col(row, 0)?,
        tenant_key: row.get(1)?,
        patient_id: uuid_col(row, 2)?,
        doctor_id: uuid_col(row, 3)?,
        visit_date: row.get(4)?,
        chief_complaint: opt_json_col(row, 5)?,
        examination_findings: row.get(6)?,
        vital_signs: opt_json_col(row, 7)?,
        diagnosis: Diagnosis {
            primary: row.get(8)?,
            primary_ar: row.get(9)?,
            primary_de: row.get(10)?,
            secondary: json_col(row, 11)?,
        },
        treatment_plan: row.get(12)?,
        lifecycle: enum_col(row, 13)?,
        created_at: row.get(14)?,
    })
}

pub fn insert_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO medical_records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            record.id.to_string(),
            record.tenant_key,
            record.patient_id.to_string(),
            record.doctor_id.to_string(),
            record.visit_date,
            opt_json(&record.chief_complaint)?,
            record.examination_findings,
            opt_json(&record.vital_signs)?,
            record.diagnosis.primary,
            record.diagnosis.primary_ar,
            record.diagnosis.primary_de,
            serde_json::to_string(&record.diagnosis.secondary)?,
            record.treatment_plan,
            record.lifecycle.as_str(),
            record.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_record(
    conn: &Connection,
    scope: &TenantScope,
    id: &Uuid,
) -> Result<Option<MedicalRecord>, DatabaseError> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM medical_records
                 WHERE id = ?1 AND (?2 IS NULL OR tenant_key = ?2) AND lifecycle = 'active'"
            ),
            params![id.to_string(), scope.key()],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// A patient's encounters, most recent visit first.
pub fn list_records_for_patient(
    conn: &Connection,
    scope: &TenantScope,
    patient_id: &Uuid,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records
         WHERE patient_id = ?1 AND (?2 IS NULL OR tenant_key = ?2) AND lifecycle = 'active'
         ORDER BY visit_date DESC"
    ))?;
    let records = stmt
        .query_map(params![patient_id.to_string(), scope.key()], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Soft-delete. Returns false when nothing visible in `scope` matched.
pub fn soft_delete_record(
    conn: &Connection,
    scope: &TenantScope,
    id: &Uuid,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medical_records SET lifecycle = 'deleted'
         WHERE id = ?1 AND (?2 IS NULL OR tenant_key = ?2) AND lifecycle = 'active'",
        params![id.to_string(), scope.key()],
    )?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::db::open_memory_database;
    use crate::models::enums::{Gender, Role};
    use chrono::{Duration, Utc};

    #[test]
    fn records_list_newest_first_and_hide_deleted() {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::seed_identity(&conn, "ORG001", "dr.smith", Role::Doctor);
        let patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, Some(30));
        let now = Utc::now();
        let old = fixtures::record("ORG001", patient.id, doctor.id, "Influenza", now - Duration::days(3));
        let new = fixtures::record("ORG001", patient.id, doctor.id, "Migraine", now);
        insert_record(&conn, &old).unwrap();
        insert_record(&conn, &new).unwrap();

        let scope = TenantScope::Only("ORG001".into());
        let list = list_records_for_patient(&conn, &scope, &patient.id).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].diagnosis.primary, "Migraine");

        assert!(soft_delete_record(&conn, &scope, &new.id).unwrap());
        assert!(!soft_delete_record(&conn, &scope, &new.id).unwrap());
        assert!(get_record(&conn, &scope, &new.id).unwrap().is_none());
        assert_eq!(list_records_for_patient(&conn, &scope, &patient.id).unwrap().len(), 1);
    }

    #[test]
    fn soft_delete_is_tenant_scoped() {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::seed_identity(&conn, "ORG001", "dr.smith", Role::Doctor);
        let patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, None);
        let record = fixtures::record("ORG001", patient.id, doctor.id, "Flu", Utc::now());
        insert_record(&conn, &record).unwrap();

        let other = TenantScope::Only("ORG002".into());
        assert!(!soft_delete_record(&conn, &other, &record.id).unwrap());
    }
}
