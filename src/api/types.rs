//! Shared types for the HTTP layer: router context, the authenticated
//! caller, request metadata and the JSON extractors that render rejections
//! through `ApiError`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::authorization;
use crate::core_state::CoreState;
use crate::models::enums::{AuditStatus, ResourceType};
use crate::models::{AuditActor, AuditEvent, AuditRecord, Identity, Tenant, TenantScope};
use crate::token::Claims;
use crate::{audit, db};

/// Header a super-admin uses to name the tenant a write targets.
pub const TENANT_HEADER: &str = "X-Tenant-Key";

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Load a tenant, 404 when it is unknown.
    pub fn load_tenant(&self, tenant_key: &str) -> Result<Tenant, ApiError> {
        let conn = self.core.db()?;
        db::get_tenant(&conn, tenant_key)?
            .ok_or_else(|| ApiError::NotFound("Organization not found".into()))
    }
}

// ═══════════════════════════════════════════════════════════
// Authenticated caller, injected by `require_auth`
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    pub claims: Claims,
}

impl AuthContext {
    pub fn is_super_admin(&self) -> bool {
        self.identity.is_super_admin()
    }

    pub fn read_scope(&self) -> TenantScope {
        authorization::read_scope(&self.identity)
    }

    /// Tenant a write lands in: the caller's own, or for the super-admin the
    /// one named by `X-Tenant-Key`.
    pub fn write_tenant(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        if !self.is_super_admin() {
            return Ok(self.identity.tenant_key.clone());
        }
        headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_uppercase())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Validation(format!("{TENANT_HEADER} header is required")))
    }

    pub fn actor(&self) -> AuditActor {
        AuditActor::of(&self.identity)
    }

    /// Write a successful audit record for this caller.
    pub fn audit(
        &self,
        core: &CoreState,
        client: &ClientInfo,
        event: AuditEvent,
        resource_type: ResourceType,
        resource_id: Option<String>,
    ) {
        let mut record = AuditRecord::new(self.actor(), event, resource_type)
            .status(AuditStatus::Success)
            .source(client.address.clone(), client.user_agent.clone());
        record.resource_id = resource_id;
        audit::record(core, record);
    }
}

/// Tenant resolved by the subscription guard, reused by later stages and
/// handlers.
#[derive(Debug, Clone)]
pub struct ResolvedTenant(pub Tenant);

// ═══════════════════════════════════════════════════════════
// Request metadata
// ═══════════════════════════════════════════════════════════

/// Caller network address and user agent, for audit records.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_parts(headers: &HeaderMap, extensions: &axum::http::Extensions) -> Self {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let address = forwarded.or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self { address, user_agent }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_parts(&parts.headers, &parts.extensions))
    }
}

// ═══════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════

/// `Json<T>` whose rejection renders as a 400 failure envelope.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}

/// `Query<T>` whose rejection renders as a 400 failure envelope.
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection: QueryRejection| ApiError::Validation(rejection.body_text()))
    }
}

pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation(format!("Invalid {what} id")))
}

// ═══════════════════════════════════════════════════════════
// Success envelopes
// ═══════════════════════════════════════════════════════════

/// `{success: true, data}`.
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiSuccess<T>> {
    Json(ApiSuccess {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiSuccess<T>>) {
    (StatusCode::CREATED, ok(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::models::enums::Role;
    use axum::http::HeaderValue;

    fn auth(role: Role, tenant: &str) -> AuthContext {
        let identity = fixtures::identity(tenant, "someone", role);
        let claims = Claims {
            sub: identity.id,
            tenant: identity.tenant_key.clone(),
            role,
            iat: 0,
            exp: 0,
        };
        AuthContext { identity, claims }
    }

    #[test]
    fn write_tenant_is_own_for_tenant_users() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("ORG002"));
        let doctor = auth(Role::Doctor, "ORG001");
        assert_eq!(doctor.write_tenant(&headers).unwrap(), "ORG001");
    }

    #[test]
    fn super_admin_writes_need_header() {
        let admin = auth(Role::SuperAdmin, "SUPERADMIN");
        assert!(matches!(
            admin.write_tenant(&HeaderMap::new()),
            Err(ApiError::Validation(_))
        ));
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static(" org002 "));
        assert_eq!(admin.write_tenant(&headers).unwrap(), "ORG002");
    }

    #[test]
    fn client_address_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        headers.insert("User-Agent", HeaderValue::from_static("test-agent"));
        let mut extensions = axum::http::Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        let info = ClientInfo::from_parts(&headers, &extensions);
        assert_eq!(info.address.as_deref(), Some("10.0.0.7"));
        assert_eq!(info.user_agent.as_deref(), Some("test-agent"));

        let info = ClientInfo::from_parts(&HeaderMap::new(), &extensions);
        assert_eq!(info.address.as_deref(), Some("127.0.0.1"));
    }
}
