use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    AdministrationMethod, ExecutionAction, Lifecycle, NursingActionType, OrderStatus, Priority,
};
use super::record::LocalizedText;

/// One entry of an order's append-only execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    pub action: ExecutionAction,
    pub timestamp: DateTime<Utc>,
    pub performed_by: Uuid,
    pub notes: Option<String>,
}

/// Nursing order. `status` caches the outcome of the last event in `events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NursingOrder {
    pub id: Uuid,
    pub tenant_key: String,
    pub order_number: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub action_type: NursingActionType,
    pub medication_name: Option<String>,
    pub administration_method: Option<AdministrationMethod>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub special_instructions: Option<LocalizedText>,
    pub priority: Priority,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub events: Vec<ExecutionEvent>,
    pub administered_by: Option<Uuid>,
    pub administered_at: Option<DateTime<Utc>>,
    pub administration_notes: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NursingOrderInput {
    pub order_number: Option<String>,
    pub patient_id: Uuid,
    pub action_type: NursingActionType,
    pub medication_name: Option<String>,
    pub administration_method: Option<AdministrationMethod>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub special_instructions: Option<LocalizedText>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Patient and doctor summaries joined onto the pending-order queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderView {
    #[serde(flatten)]
    pub order: NursingOrder,
    pub patient: OrderPatientSummary,
    pub doctor: Option<OrderDoctorSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatientSummary {
    pub mrn: String,
    pub full_name: String,
    pub age: Option<u32>,
    pub gender: String,
    pub allergies: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDoctorSummary {
    pub full_name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabOrder {
    pub id: Uuid,
    pub tenant_key: String,
    pub test_number: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub catalog_id: Uuid,
    pub test_name: String,
    pub priority: Priority,
    pub status: OrderStatus,
    pub events: Vec<ExecutionEvent>,
    pub results: Option<serde_json::Value>,
    pub reported_at: Option<DateTime<Utc>>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabOrderInput {
    pub test_number: Option<String>,
    pub patient_id: Uuid,
    pub catalog_id: Uuid,
    #[serde(default = "default_priority")]
    pub priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Routine
}
