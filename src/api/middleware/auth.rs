//! Authenticate stage: bearer token → live identity.
//!
//! Extracts `Authorization: Bearer <token>`, verifies it, re-fetches the
//! identity and rejects stale or inactive callers with 401. On success the
//! `AuthContext` is injected into request extensions.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::identity::{self, AuthError};
use crate::token::extract_bearer;

pub async fn require_auth(req: Request, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer)
        .ok_or_else(|| ApiError::Unauthenticated("No token provided".into()))?;

    let (identity, claims) = match identity::authenticate_token(&ctx.core, token) {
        Ok(found) => found,
        Err(AuthError::Core(e)) => return Err(e.into()),
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            return Err(e.into());
        }
    };

    req.extensions_mut().insert(AuthContext { identity, claims });
    Ok(next.run(req).await)
}
