//! Session endpoints.
//!
//! `POST /api/auth/login`: Unprotected: credential check, token issue
//! `GET  /api/auth/me`: current identity
//! `PUT  /api/auth/preferences`: interface language
//! `PUT  /api/auth/password`: credential change; older tokens stop working

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ok, ApiContext, ApiJson, ApiSuccess, AuthContext, ClientInfo};
use crate::audit;
use crate::identity::{self, LoginAttempt};
use crate::models::enums::{AuditStatus, Locale, ResourceType};
use crate::models::{AuditActor, AuditEvent, AuditRecord, Identity};

/// Shortest credential accepted on change or user creation.
pub const MIN_SECRET_LENGTH: usize = 8;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: Identity,
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    client: ClientInfo,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide username and password".into(),
        ));
    }

    let attempt =
        identity::check_login(&ctx.core, &body.username, &body.password, body.tenant.as_deref())
            .await?;

    match attempt {
        LoginAttempt::Verified(user) => {
            identity::record_login(&ctx.core, &user.id)?;
            let token = ctx.core.tokens().issue(&user)?;
            audit::record(
                &ctx.core,
                AuditRecord::new(AuditActor::of(&user), AuditEvent::Login, ResourceType::System)
                    .source(client.address, client.user_agent),
            );
            tracing::info!(user = %user.id, tenant = %user.tenant_key, "Login");
            Ok(Json(LoginResponse {
                success: true,
                token,
                user,
            }))
        }
        LoginAttempt::Rejected(known) => {
            if let Some(user) = known {
                audit::record(
                    &ctx.core,
                    AuditRecord::new(
                        AuditActor::of(&user),
                        AuditEvent::LoginFailed,
                        ResourceType::System,
                    )
                    .status(AuditStatus::Failure)
                    .source(client.address, client.user_agent),
                );
            }
            Err(ApiError::Unauthenticated("Invalid credentials".into()))
        }
    }
}

/// `GET /api/auth/me`
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<ApiSuccess<Identity>> {
    ok(auth.identity)
}

#[derive(Deserialize)]
pub struct PreferencesRequest {
    pub language: Locale,
}

/// `PUT /api/auth/preferences`
pub async fn preferences(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(body): ApiJson<PreferencesRequest>,
) -> Result<Json<ApiSuccess<Identity>>, ApiError> {
    identity::update_language(&ctx.core, &auth.identity, body.language)?;
    let mut updated = auth.identity;
    updated.language = body.language;
    Ok(ok(updated))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct PasswordResponse {
    pub success: bool,
    pub message: &'static str,
    pub token: String,
}

/// `PUT /api/auth/password`: returns a fresh token, since the presented
/// one is now stale.
pub async fn password(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    client: ClientInfo,
    ApiJson(body): ApiJson<PasswordRequest>,
) -> Result<Json<PasswordResponse>, ApiError> {
    if body.new_password.chars().count() < MIN_SECRET_LENGTH {
        return Err(ApiError::Validation(format!(
            "New password must be at least {MIN_SECRET_LENGTH} characters"
        )));
    }
    if body.new_password == body.current_password {
        return Err(ApiError::Validation(
            "New password must differ from the current one".into(),
        ));
    }

    match identity::change_credential(
        &ctx.core,
        &auth.identity,
        &body.current_password,
        &body.new_password,
    )
    .await
    {
        Ok(()) => {}
        Err(identity::AuthError::InvalidCredentials) => {
            return Err(ApiError::Validation("Current password is incorrect".into()))
        }
        Err(e) => return Err(e.into()),
    }

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::CredentialChange,
        ResourceType::User,
        Some(auth.identity.id.to_string()),
    );
    let token = ctx.core.tokens().issue(&auth.identity)?;
    Ok(Json(PasswordResponse {
        success: true,
        message: "Password updated",
        token,
    }))
}
