//! Tenant entitlement stages.
//!
//! `subscription_guard` loads the caller's tenant, refuses an inactive or
//! expired subscription and attaches the tenant as `ResolvedTenant`.
//! `feature_guard` checks one feature flag, reusing that tenant when present.
//! The super-admin passes both untouched.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, ClientInfo, ResolvedTenant};
use crate::audit;
use crate::authorization::{self, Denial};
use crate::models::enums::{AuditStatus, Feature, ResourceType};
use crate::models::{AuditEvent, AuditRecord};

pub async fn subscription_guard(req: Request, next: Next) -> Response {
    match subscription_guard_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn subscription_guard_inner(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let (ctx, auth) = request_context(&req)?;
    if auth.is_super_admin() {
        return Ok(next.run(req).await);
    }

    let tenant = ctx.load_tenant(&auth.identity.tenant_key)?;
    if let Err(denial) = authorization::check_subscription(&tenant, Utc::now()) {
        if denial == Denial::SubscriptionInactive {
            let client = ClientInfo::from_parts(req.headers(), req.extensions());
            let record = AuditRecord::new(
                auth.actor(),
                AuditEvent::SubscriptionBlocked {
                    reason: "inactive".into(),
                },
                ResourceType::System,
            )
            .resource(&tenant.tenant_key)
            .status(AuditStatus::Failure)
            .source(client.address, client.user_agent);
            audit::record(&ctx.core, record);
        }
        tracing::info!(tenant = %tenant.tenant_key, code = denial.code(), "Subscription check failed");
        return Err(denial.into());
    }

    req.extensions_mut().insert(ResolvedTenant(tenant));
    Ok(next.run(req).await)
}

/// Used as `from_fn_with_state(Feature::X, feature_guard)`.
pub async fn feature_guard(State(feature): State<Feature>, req: Request, next: Next) -> Response {
    match feature_guard_inner(feature, req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn feature_guard_inner(
    feature: Feature,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (ctx, auth) = request_context(&req)?;
    if auth.is_super_admin() {
        return Ok(next.run(req).await);
    }

    let allowed = match req.extensions().get::<ResolvedTenant>() {
        Some(ResolvedTenant(tenant)) => authorization::check_feature(tenant, feature),
        None => {
            let tenant = ctx.load_tenant(&auth.identity.tenant_key)?;
            authorization::check_feature(&tenant, feature)
        }
    };
    allowed?;
    Ok(next.run(req).await)
}

fn request_context(req: &Request) -> Result<(ApiContext, AuthContext), ApiError> {
    let ctx = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthenticated("Not authenticated".into()))?;
    Ok((ctx, auth))
}
