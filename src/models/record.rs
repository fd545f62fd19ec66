use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Lifecycle;

/// Free text in the three supported interface languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedText {
    pub en: Option<String>,
    pub ar: Option<String>,
    pub de: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodPressure {
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSigns {
    pub temperature: Option<f64>,
    pub pulse: Option<u32>,
    pub blood_pressure: Option<BloodPressure>,
    pub respiratory_rate: Option<u32>,
    pub oxygen_saturation: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub primary: String,
    pub primary_ar: Option<String>,
    pub primary_de: Option<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
}

/// A clinical encounter. Written once; only the lifecycle may change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub id: Uuid,
    pub tenant_key: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub visit_date: DateTime<Utc>,
    pub chief_complaint: Option<LocalizedText>,
    pub examination_findings: Option<String>,
    pub vital_signs: Option<VitalSigns>,
    pub diagnosis: Diagnosis,
    pub treatment_plan: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecordInput {
    pub patient_id: Uuid,
    pub visit_date: Option<DateTime<Utc>>,
    pub chief_complaint: Option<LocalizedText>,
    pub examination_findings: Option<String>,
    pub vital_signs: Option<VitalSigns>,
    pub diagnosis: Diagnosis,
    pub treatment_plan: Option<String>,
}
