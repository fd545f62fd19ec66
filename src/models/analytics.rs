use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::Gender;
use super::record::Diagnosis;

/// One encounter as shown in an analytics table: only the fields needed for
/// display, never the full clinical record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRow {
    pub record_id: Uuid,
    pub visit_date: DateTime<Utc>,
    pub diagnosis: Diagnosis,
    pub patient: EncounterPatient,
    pub doctor: Option<EncounterDoctor>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterPatient {
    pub mrn: String,
    pub full_name: String,
    pub gender: Gender,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterDoctor {
    pub full_name: String,
}

/// Aggregate over the filtered encounter set. The distributions are the raw
/// per-encounter values, left for the client to tally.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_cases: usize,
    pub avg_age: f64,
    pub gender_distribution: Vec<Gender>,
    pub diagnosis_distribution: Vec<String>,
}

/// Echo of the applied filters in the analytics response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub diagnosis: Option<String>,
    pub gender: Option<Gender>,
    pub age_range: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub filters: AppliedFilters,
    pub summary: AnalyticsSummary,
    pub results: Vec<EncounterRow>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisCount {
    pub diagnosis: String,
    pub total_cases: u32,
}
