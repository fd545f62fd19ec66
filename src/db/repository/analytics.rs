use rusqlite::{params, Connection};

use super::{enum_col, json_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::*;

/// Encounters matching the record-level filters (tenant, diagnosis substring,
/// visit window), joined to their active patient and authoring clinician,
/// most recent visit first. Patient-level filters are left to the caller.
pub fn fetch_encounters(
    conn: &Connection,
    scope: &TenantScope,
    filters: &AnalyticsFilters,
) -> Result<Vec<EncounterRow>, DatabaseError> {
    let diagnosis = filters
        .diagnosis
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let mut stmt = conn.prepare(
        "SELECT r.id, r.visit_date, r.diagnosis_primary, r.diagnosis_primary_ar,
                r.diagnosis_primary_de, r.diagnosis_secondary,
                p.mrn, p.full_name, p.gender, p.age, u.full_name
         FROM medical_records r
         JOIN patients p ON p.id = r.patient_id AND p.lifecycle = 'active'
         LEFT JOIN users u ON u.id = r.doctor_id
         WHERE (?1 IS NULL OR r.tenant_key = ?1) AND r.lifecycle = 'active'
           AND (?2 IS NULL OR instr(lower(r.diagnosis_primary), lower(?2)) > 0)
           AND (?3 IS NULL OR r.visit_date >= ?3)
           AND (?4 IS NULL OR r.visit_date <= ?4)
         ORDER BY r.visit_date DESC",
    )?;
    let rows = stmt
        .query_map(
            params![scope.key(), diagnosis, filters.visit_from, filters.visit_to],
            |row| {
                let doctor_name: Option<String> = row.get(10)?;
                Ok(EncounterRow {
                    record_id: uuid_col(row, 0)?,
                    visit_date: row.get(1)?,
                    diagnosis: Diagnosis {
                        primary: row.get(2)?,
                        primary_ar: row.get(3)?,
                        primary_de: row.get(4)?,
                        secondary: json_col(row, 5)?,
                    },
                    patient: EncounterPatient {
                        mrn: row.get(6)?,
                        full_name: row.get(7)?,
                        gender: enum_col(row, 8)?,
                        age: row.get(9)?,
                    },
                    doctor: doctor_name.map(|full_name| EncounterDoctor { full_name }),
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most frequent primary diagnoses, highest count first.
pub fn diagnosis_breakdown(
    conn: &Connection,
    scope: &TenantScope,
    limit: u32,
) -> Result<Vec<DiagnosisCount>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT diagnosis_primary, COUNT(*) AS total FROM medical_records
         WHERE (?1 IS NULL OR tenant_key = ?1) AND lifecycle = 'active'
         GROUP BY diagnosis_primary
         ORDER BY total DESC, diagnosis_primary ASC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![scope.key(), limit], |row| {
            Ok(DiagnosisCount {
                diagnosis: row.get(0)?,
                total_cases: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
