use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{LabCategory, Lifecycle};
use super::record::LocalizedText;

/// One orderable test in a tenant's lab catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTest {
    pub id: Uuid,
    pub tenant_key: String,
    pub test_code: String,
    pub test_name: LocalizedText,
    pub category: LabCategory,
    pub is_available: bool,
    pub unavailable_reason: Option<String>,
    pub price: Option<f64>,
    pub last_toggled_by: Option<Uuid>,
    pub last_toggled_at: Option<DateTime<Utc>>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTestInput {
    pub test_code: String,
    pub test_name: LocalizedText,
    pub category: LabCategory,
    pub price: Option<f64>,
}

impl LabTest {
    /// New catalog entry, available until someone toggles it off.
    pub fn from_input(tenant_key: &str, input: LabTestInput, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_key: tenant_key.to_string(),
            test_code: input.test_code.trim().to_uppercase(),
            test_name: input.test_name,
            category: input.category,
            is_available: true,
            unavailable_reason: None,
            price: input.price,
            last_toggled_by: None,
            last_toggled_at: None,
            lifecycle: Lifecycle::Active,
            created_at: now,
        }
    }
}
