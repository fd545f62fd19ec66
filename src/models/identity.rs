use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Lifecycle, Locale, Role};

/// A user account. The credential hash is deliberately absent: it is only
/// loaded through `db::repository::get_credential_hash` when verifying.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub tenant_key: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub language: Locale,
    pub last_login: Option<DateTime<Utc>>,
    pub credential_changed_at: DateTime<Utc>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }
}

/// Fields needed to create an identity. `secret` is the plaintext credential,
/// hashed before it reaches the repository.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIdentity {
    pub tenant_key: String,
    pub username: String,
    pub email: String,
    pub secret: String,
    pub role: Role,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
}
