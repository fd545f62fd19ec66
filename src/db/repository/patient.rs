use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, json_col, opt_enum_col, opt_json, opt_json_col, opt_uuid_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, tenant_key, mrn, full_name, full_name_ar, full_name_de,
     date_of_birth, age, gender, phone, email, address, emergency_contact, blood_type,
     allergies, chronic_diseases, notes, registered_by, last_visit, lifecycle,
     created_at, updated_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: uuid_col(row, 0)?,
        tenant_key: row.get(1)?,
        mrn: row.get(2)?,
        full_name: row.get(3)?,
        full_name_ar: row.get(4)?,
        full_name_de: row.get(5)?,
        date_of_birth: row.get(6)?,
        age: row.get(7)?,
        gender: enum_col(row, 8)?,
        phone: row.get(9)?,
        email: row.get(10)?,
        address: opt_json_col(row, 11)?,
        emergency_contact: opt_json_col(row, 12)?,
        blood_type: opt_enum_col(row, 13)?,
        allergies: json_col(row, 14)?,
        chronic_diseases: json_col(row, 15)?,
        notes: row.get(16)?,
        registered_by: opt_uuid_col(row, 17)?,
        last_visit: row.get(18)?,
        lifecycle: enum_col(row, 19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO patients ({PATIENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22)"
        ),
        params![
            patient.id.to_string(),
            patient.tenant_key,
            patient.mrn,
            patient.full_name,
            patient.full_name_ar,
            patient.full_name_de,
            patient.date_of_birth,
            patient.age,
            patient.gender.as_str(),
            patient.phone,
            patient.email,
            opt_json(&patient.address)?,
            opt_json(&patient.emergency_contact)?,
            patient.blood_type.map(|b| b.as_str()),
            serde_json::to_string(&patient.allergies)?,
            serde_json::to_string(&patient.chronic_diseases)?,
            patient.notes,
            patient.registered_by.map(|id| id.to_string()),
            patient.last_visit,
            patient.lifecycle.as_str(),
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

/// Fetch an active patient visible in `scope`.
pub fn get_patient(
    conn: &Connection,
    scope: &TenantScope,
    id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            &format!(
                "SELECT {PATIENT_COLUMNS} FROM patients
                 WHERE id = ?1 AND (?2 IS NULL OR tenant_key = ?2) AND lifecycle = 'active'"
            ),
            params![id.to_string(), scope.key()],
            patient_from_row,
        )
        .optional()?;
    Ok(patient)
}

/// One page of patients, newest first, plus the total match count.
/// `search` matches name, MRN or phone, case-insensitively.
pub fn list_patients(
    conn: &Connection,
    scope: &TenantScope,
    search: &PatientSearch,
) -> Result<(Vec<Patient>, u32), DatabaseError> {
    let term = search
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let predicate = "(?1 IS NULL OR tenant_key = ?1) AND lifecycle = 'active'
         AND (?2 IS NULL
              OR instr(lower(full_name), lower(?2)) > 0
              OR instr(lower(mrn), lower(?2)) > 0
              OR instr(lower(phone), lower(?2)) > 0)";

    let total: u32 = conn.query_row(
        &format!("SELECT COUNT(*) FROM patients WHERE {predicate}"),
        params![scope.key(), term],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE {predicate}
         ORDER BY created_at DESC, mrn DESC LIMIT ?3 OFFSET ?4"
    ))?;
    let patients = stmt
        .query_map(
            params![scope.key(), term, search.limit(), search.offset()],
            patient_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((patients, total))
}

/// Overwrite the mutable fields of a stored patient. The MRN and tenant never change.
pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET full_name = ?3, full_name_ar = ?4, full_name_de = ?5,
             date_of_birth = ?6, age = ?7, gender = ?8, phone = ?9, email = ?10,
             address = ?11, emergency_contact = ?12, blood_type = ?13, allergies = ?14,
             chronic_diseases = ?15, notes = ?16, updated_at = ?17
         WHERE id = ?1 AND tenant_key = ?2 AND lifecycle = 'active'",
        params![
            patient.id.to_string(),
            patient.tenant_key,
            patient.full_name,
            patient.full_name_ar,
            patient.full_name_de,
            patient.date_of_birth,
            patient.age,
            patient.gender.as_str(),
            patient.phone,
            patient.email,
            opt_json(&patient.address)?,
            opt_json(&patient.emergency_contact)?,
            patient.blood_type.map(|b| b.as_str()),
            serde_json::to_string(&patient.allergies)?,
            serde_json::to_string(&patient.chronic_diseases)?,
            patient.notes,
            patient.updated_at,
        ],
    )?;
    Ok(changed == 1)
}

pub fn touch_last_visit(conn: &Connection, id: &Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE patients SET last_visit = ?2 WHERE id = ?1 AND (last_visit IS NULL OR last_visit < ?2)",
        params![id.to_string(), at],
    )?;
    Ok(())
}

pub fn count_active_patients(conn: &Connection, tenant_key: &str) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE tenant_key = ?1 AND lifecycle = 'active'",
        params![tenant_key],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::db::open_memory_database;
    use crate::models::enums::{BloodType, Gender};

    #[test]
    fn round_trip_preserves_structured_fields() {
        let conn = open_memory_database().unwrap();
        let mut patient = fixtures::patient("ORG001", "REF-2026-0001", Gender::Female, Some(41));
        patient.blood_type = Some(BloodType::ONegative);
        patient.allergies = vec!["penicillin".into()];
        patient.address = Some(Address {
            city: Some("Berlin".into()),
            ..Address::default()
        });
        insert_patient(&conn, &patient).unwrap();

        let scope = TenantScope::Only("ORG001".into());
        let loaded = get_patient(&conn, &scope, &patient.id).unwrap().unwrap();
        assert_eq!(loaded.blood_type, Some(BloodType::ONegative));
        assert_eq!(loaded.allergies, vec!["penicillin".to_string()]);
        assert_eq!(loaded.address.unwrap().city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn other_tenant_cannot_see_patient() {
        let conn = open_memory_database().unwrap();
        let patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, None);
        let other = TenantScope::Only("ORG002".into());
        assert!(get_patient(&conn, &other, &patient.id).unwrap().is_none());
        assert!(get_patient(&conn, &TenantScope::All, &patient.id).unwrap().is_some());
    }

    #[test]
    fn search_matches_name_mrn_and_phone() {
        let conn = open_memory_database().unwrap();
        fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, None);
        let mut p = fixtures::patient("ORG001", "REF-2026-0002", Gender::Female, None);
        p.full_name = "Layla Haddad".into();
        p.phone = "+49 555 0199".into();
        insert_patient(&conn, &p).unwrap();

        let scope = TenantScope::Only("ORG001".into());
        let by_name = PatientSearch {
            search: Some("haddad".into()),
            ..Default::default()
        };
        assert_eq!(list_patients(&conn, &scope, &by_name).unwrap().1, 1);

        let by_mrn = PatientSearch {
            search: Some("ref-2026".into()),
            ..Default::default()
        };
        assert_eq!(list_patients(&conn, &scope, &by_mrn).unwrap().1, 2);

        let by_phone = PatientSearch {
            search: Some("0199".into()),
            ..Default::default()
        };
        let (rows, total) = list_patients(&conn, &scope, &by_phone).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].mrn, "REF-2026-0002");
    }

    #[test]
    fn pagination_limits_rows_but_not_total() {
        let conn = open_memory_database().unwrap();
        for i in 1..=5 {
            fixtures::seed_patient(&conn, "ORG001", &format!("REF-2026-{i:04}"), Gender::Other, None);
        }
        let scope = TenantScope::Only("ORG001".into());
        let page = PatientSearch {
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        };
        let (rows, total) = list_patients(&conn, &scope, &page).unwrap();
        assert_eq!(total, 5);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn update_cannot_cross_tenants() {
        let conn = open_memory_database().unwrap();
        let mut patient = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Male, None);
        patient.full_name = "Renamed".into();
        assert!(update_patient(&conn, &patient).unwrap());

        patient.tenant_key = "ORG002".into();
        assert!(!update_patient(&conn, &patient).unwrap());
        assert_eq!(count_active_patients(&conn, "ORG001").unwrap(), 1);
    }
}
