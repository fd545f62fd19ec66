use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AuditStatus, ExecutionAction, ResourceType, Role, SubscriptionPlan};
use super::filters::AnalyticsFilters;
use super::identity::Identity;
use super::tenant::FeatureFlags;

/// What happened. The serde tag doubles as the stored `action` column and the
/// content becomes the stored `details` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "details", rename_all = "snake_case")]
pub enum AuditEvent {
    Login,
    LoginFailed,
    CredentialChange,
    SubscriptionBlocked {
        reason: String,
    },
    AnalyticsView {
        filters: AnalyticsFilters,
        result_count: usize,
    },
    DiagnosisBreakdownView {
        limit: u32,
        result_count: usize,
    },
    PatientCreate {
        mrn: String,
        full_name: String,
    },
    PatientUpdate {
        mrn: String,
    },
    MedicalRecordCreate {
        patient_id: Uuid,
    },
    MedicalRecordDelete {
        patient_id: Uuid,
    },
    NursingOrderCreate {
        order_number: String,
    },
    NursingOrderUpdate {
        transition: ExecutionAction,
        order_number: String,
    },
    NursingOrderComplete {
        order_number: String,
    },
    NursingOrderCancel {
        order_number: String,
    },
    LabAvailabilityToggle {
        test_code: String,
        before: bool,
        after: bool,
    },
    LabOrderCreate {
        test_number: String,
    },
    LabOrderUpdate {
        transition: ExecutionAction,
        test_number: String,
    },
    UserCreate {
        username: String,
        role: Role,
    },
    TenantCreate {
        tenant_key: String,
    },
    SubscriptionUpdate {
        plan: SubscriptionPlan,
        is_active: bool,
        expiry_date: DateTime<Utc>,
    },
    FeatureUpdate {
        features: FeatureFlags,
    },
}

impl AuditEvent {
    /// Stored `action` column value.
    pub fn action(&self) -> String {
        self.split().0
    }

    /// Stored `details` payload; `{}` for events without one.
    pub fn details(&self) -> serde_json::Value {
        self.split().1
    }

    fn split(&self) -> (String, serde_json::Value) {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        let action = value
            .get("action")
            .and_then(|a| a.as_str())
            .unwrap_or("unknown")
            .to_string();
        let details = value
            .get_mut("details")
            .map(serde_json::Value::take)
            .unwrap_or_else(|| serde_json::json!({}));
        (action, details)
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditActor {
    pub tenant_key: String,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub actor_role: Role,
}

impl AuditActor {
    pub fn of(identity: &Identity) -> Self {
        Self {
            tenant_key: identity.tenant_key.clone(),
            actor_id: identity.id,
            actor_name: identity.full_name.clone(),
            actor_role: identity.role,
        }
    }
}

/// Append-only fact: who did what to what, when, with what outcome.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub actor: AuditActor,
    pub event: AuditEvent,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    pub status: AuditStatus,
    pub source_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(actor: AuditActor, event: AuditEvent, resource_type: ResourceType) -> Self {
        Self {
            actor,
            event,
            resource_type,
            resource_id: None,
            status: AuditStatus::Success,
            source_address: None,
            user_agent: None,
            timestamp: Utc::now(),
        }
    }

    pub fn resource(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn status(mut self, status: AuditStatus) -> Self {
        self.status = status;
        self
    }

    pub fn source(mut self, address: Option<String>, user_agent: Option<String>) -> Self {
        self.source_address = address;
        self.user_agent = user_agent;
        self
    }
}

/// An audit row as read back from storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAuditRecord {
    pub id: i64,
    pub tenant_key: String,
    pub actor_id: String,
    pub actor_name: String,
    pub actor_role: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub status: AuditStatus,
    pub source_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}
