//! `POST /api/users`: staff account creation.
//!
//! Admins create users in their own tenant; the super-admin names the target
//! tenant with `X-Tenant-Key`. Only the super-admin may create another
//! super-admin. The tenant's `max_users` caps active accounts.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::endpoints::auth::MIN_SECRET_LENGTH;
use crate::api::endpoints::tenant_for_write;
use crate::api::error::ApiError;
use crate::api::types::{
    created, ApiContext, ApiJson, ApiSuccess, AuthContext, ClientInfo, ResolvedTenant,
};
use crate::authorization;
use crate::db;
use crate::identity;
use crate::models::enums::{ResourceType, Role};
use crate::models::{AuditEvent, Identity, NewIdentity, SUPERADMIN_TENANT};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    resolved: Option<Extension<ResolvedTenant>>,
    headers: HeaderMap,
    client: ClientInfo,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiSuccess<Identity>>), ApiError> {
    if body.role == Role::SuperAdmin && !auth.is_super_admin() {
        return Err(ApiError::Forbidden(
            "Only a super-admin may create super-admin accounts".into(),
        ));
    }
    for (value, name) in [
        (&body.username, "username"),
        (&body.email, "email"),
        (&body.full_name, "full name"),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!("The {name} is required")));
        }
    }
    if body.password.chars().count() < MIN_SECRET_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_SECRET_LENGTH} characters"
        )));
    }

    let limit = if body.role == Role::SuperAdmin {
        None
    } else {
        let tenant = tenant_for_write(&ctx, &auth, resolved, &headers)?;
        Some((tenant.tenant_key, tenant.subscription.max_users))
    };
    let tenant_key = match &limit {
        Some((key, _)) => key.clone(),
        None => SUPERADMIN_TENANT.to_string(),
    };

    let prepared = identity::prepare_identity(
        &ctx.core,
        NewIdentity {
            tenant_key,
            username: body.username,
            email: body.email,
            secret: body.password,
            role: body.role,
            full_name: body.full_name,
            phone: body.phone,
            specialization: body.specialization,
        },
    )
    .await?;

    // Count and insert under one guard so concurrent creations cannot all
    // pass the limit.
    let user = {
        let conn = ctx.core.db()?;
        if let Some((_, max_users)) = limit {
            let current = db::count_active_identities(&conn, prepared.tenant_key())?;
            authorization::check_plan_limit(current, max_users)?;
        }
        identity::store_identity(&conn, prepared)?
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::UserCreate {
            username: user.username.clone(),
            role: user.role,
        },
        ResourceType::User,
        Some(user.id.to_string()),
    );
    tracing::info!(user = %user.id, tenant = %user.tenant_key, role = %user.role, "User created");
    Ok(created(user))
}
