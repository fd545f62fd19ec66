//! Endpoint handlers, one module per resource.
//!
//! Handlers lock `core.db()` in a scoped block, run repository calls and
//! release the guard before any `.await`.

pub mod analytics;
pub mod auth;
pub mod health;
pub mod lab;
pub mod nursing;
pub mod patients;
pub mod records;
pub mod tenants;
pub mod users;

use axum::http::HeaderMap;
use axum::Extension;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, ResolvedTenant};
use crate::models::Tenant;

/// Tenant a write targets, reusing the one the subscription guard resolved
/// when it is the same.
pub(crate) fn tenant_for_write(
    ctx: &ApiContext,
    auth: &AuthContext,
    resolved: Option<Extension<ResolvedTenant>>,
    headers: &HeaderMap,
) -> Result<Tenant, ApiError> {
    let key = auth.write_tenant(headers)?;
    match resolved {
        Some(Extension(ResolvedTenant(tenant))) if tenant.tenant_key == key => Ok(tenant),
        _ => ctx.load_tenant(&key),
    }
}
