//! Analytics aggregator.
//!
//! Two stages: the database applies the record-level predicates and the
//! patient/clinician joins, then patient-level predicates (gender, age range)
//! run here over the joined rows. The summary is computed over the same
//! filtered set as the rows.

use rusqlite::Connection;

use crate::db::{self, DatabaseError};
use crate::models::*;

pub const DEFAULT_BREAKDOWN_LIMIT: u32 = 10;
pub const MAX_BREAKDOWN_LIMIT: u32 = 100;

/// `aggregate(tenant, filters) -> { rows, summary }`.
pub fn aggregate(
    conn: &Connection,
    scope: &TenantScope,
    filters: &AnalyticsFilters,
) -> Result<AnalyticsReport, DatabaseError> {
    let mut rows = db::fetch_encounters(conn, scope, filters)?;
    rows.retain(|row| matches_patient(&row.patient, filters));
    let summary = summarize(&rows);

    Ok(AnalyticsReport {
        filters: AppliedFilters {
            diagnosis: filters.diagnosis.clone(),
            gender: filters.gender,
            age_range: filters.age_range_label(),
        },
        summary,
        count: rows.len(),
        results: rows,
    })
}

/// Patient-level predicates. A patient without a recorded age fails any age
/// bound.
pub fn matches_patient(patient: &EncounterPatient, filters: &AnalyticsFilters) -> bool {
    if let Some(gender) = filters.gender {
        if patient.gender != gender {
            return false;
        }
    }
    if filters.age_min.is_some() || filters.age_max.is_some() {
        let Some(age) = patient.age else {
            return false;
        };
        if filters.age_min.is_some_and(|min| age < min) {
            return false;
        }
        if filters.age_max.is_some_and(|max| age > max) {
            return false;
        }
    }
    true
}

pub fn summarize(rows: &[EncounterRow]) -> AnalyticsSummary {
    let ages: Vec<u32> = rows.iter().filter_map(|r| r.patient.age).collect();
    let avg_age = if ages.is_empty() {
        0.0
    } else {
        ages.iter().map(|a| f64::from(*a)).sum::<f64>() / ages.len() as f64
    };
    AnalyticsSummary {
        total_cases: rows.len(),
        avg_age,
        gender_distribution: rows.iter().map(|r| r.patient.gender).collect(),
        diagnosis_distribution: rows.iter().map(|r| r.diagnosis.primary.clone()).collect(),
    }
}

/// Top primary diagnoses; `limit` defaults to 10 and is capped at 100.
pub fn breakdown(
    conn: &Connection,
    scope: &TenantScope,
    limit: Option<u32>,
) -> Result<Vec<DiagnosisCount>, DatabaseError> {
    let limit = limit
        .unwrap_or(DEFAULT_BREAKDOWN_LIMIT)
        .clamp(1, MAX_BREAKDOWN_LIMIT);
    db::diagnosis_breakdown(conn, scope, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, insert_record, open_memory_database};
    use crate::models::enums::{Gender, Role};
    use chrono::{Duration, Utc};

    fn seeded() -> Connection {
        let conn = open_memory_database().unwrap();
        let doctor = fixtures::seed_identity(&conn, "ORG001", "dr.smith", Role::Doctor);
        let young = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0001", Gender::Female, Some(20));
        let old = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0002", Gender::Male, Some(70));
        let unknown = fixtures::seed_patient(&conn, "ORG001", "REF-2026-0003", Gender::Female, None);
        let now = Utc::now();
        for (patient, diagnosis, days) in [
            (young.id, "Influenza", 1),
            (old.id, "influenza", 2),
            (unknown.id, "Flu-like illness", 3),
            (old.id, "Hypertension", 4),
        ] {
            let record = fixtures::record("ORG001", patient, doctor.id, diagnosis, now - Duration::days(days));
            insert_record(&conn, &record).unwrap();
        }
        conn
    }

    fn scope() -> TenantScope {
        TenantScope::Only("ORG001".into())
    }

    #[test]
    fn summary_counts_case_insensitive_matches() {
        let conn = seeded();
        let filters = AnalyticsFilters {
            diagnosis: Some("FLU".into()),
            ..Default::default()
        };
        let report = aggregate(&conn, &scope(), &filters).unwrap();
        assert_eq!(report.count, 3);
        assert_eq!(report.summary.total_cases, 3);
        assert_eq!(report.summary.avg_age, 45.0);
        assert_eq!(report.summary.gender_distribution.len(), 3);
        assert_eq!(report.summary.diagnosis_distribution[0], "Influenza");
    }

    #[test]
    fn patient_filters_apply_after_join() {
        let conn = seeded();
        let filters = AnalyticsFilters {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        let report = aggregate(&conn, &scope(), &filters).unwrap();
        assert_eq!(report.count, 2);

        let filters = AnalyticsFilters {
            age_min: Some(18),
            age_max: Some(30),
            ..Default::default()
        };
        let report = aggregate(&conn, &scope(), &filters).unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.results[0].patient.mrn, "REF-2026-0001");
        assert_eq!(report.filters.age_range.as_deref(), Some("18-30"));
    }

    #[test]
    fn missing_age_fails_age_bounds() {
        let patient = EncounterPatient {
            mrn: "REF-2026-0009".into(),
            full_name: "No Age".into(),
            gender: Gender::Other,
            age: None,
        };
        let filters = AnalyticsFilters {
            age_max: Some(200),
            ..Default::default()
        };
        assert!(!matches_patient(&patient, &filters));
        assert!(matches_patient(&patient, &AnalyticsFilters::default()));
    }

    #[test]
    fn empty_result_has_zero_average() {
        let conn = seeded();
        let filters = AnalyticsFilters {
            diagnosis: Some("nothing-matches".into()),
            ..Default::default()
        };
        let report = aggregate(&conn, &scope(), &filters).unwrap();
        assert_eq!(report.summary, AnalyticsSummary::default());
        assert!(report.results.is_empty());
    }

    #[test]
    fn breakdown_limit_defaults_and_clamps() {
        let conn = seeded();
        assert_eq!(breakdown(&conn, &scope(), None).unwrap().len(), 4);
        assert_eq!(breakdown(&conn, &scope(), Some(0)).unwrap().len(), 1);
    }
}
