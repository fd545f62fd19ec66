//! Tenant provisioning (super-admin only).
//!
//! `POST /api/tenants`
//! `PUT  /api/tenants/:key/subscription`
//! `PUT  /api/tenants/:key/features`

use std::collections::HashMap;
use std::sync::LazyLock;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{created, ok, ApiContext, ApiJson, ApiSuccess, AuthContext, ClientInfo};
use crate::db;
use crate::models::enums::{Feature, Lifecycle, Locale, ResourceType, SubscriptionPlan};
use crate::models::{AuditEvent, FeatureFlags, Subscription, Tenant, SUPERADMIN_TENANT};

/// Subscription length when a new tenant names no expiry.
pub const DEFAULT_SUBSCRIPTION_DAYS: i64 = 30;

static TENANT_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_-]{2,32}$").unwrap());

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub tenant_key: String,
    pub clinic_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub plan: Option<SubscriptionPlan>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_users: Option<u32>,
    #[serde(default)]
    pub max_patients: Option<u32>,
    #[serde(default)]
    pub features: Option<FeatureFlags>,
    #[serde(default)]
    pub default_locale: Option<Locale>,
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    client: ClientInfo,
    ApiJson(body): ApiJson<CreateTenantRequest>,
) -> Result<(StatusCode, Json<ApiSuccess<Tenant>>), ApiError> {
    let tenant_key = body.tenant_key.trim().to_uppercase();
    if !TENANT_KEY_PATTERN.is_match(&tenant_key) || tenant_key == SUPERADMIN_TENANT {
        return Err(ApiError::Validation(format!(
            "Invalid organization key '{tenant_key}'"
        )));
    }
    if body.clinic_name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(ApiError::Validation(
            "Clinic name and email are required".into(),
        ));
    }

    let now = Utc::now();
    let plan = body.plan.unwrap_or(SubscriptionPlan::Trial);
    let tenant = Tenant {
        tenant_key,
        clinic_name: body.clinic_name.trim().to_string(),
        email: body.email.trim().to_lowercase(),
        phone: body.phone,
        subscription: Subscription {
            plan,
            is_active: true,
            start_date: now,
            expiry_date: body
                .expiry_date
                .unwrap_or(now + Duration::days(DEFAULT_SUBSCRIPTION_DAYS)),
            max_users: body.max_users.unwrap_or(5),
            max_patients: body.max_patients.unwrap_or(1000),
        },
        features: body.features.unwrap_or_default(),
        default_locale: body.default_locale.unwrap_or(Locale::En),
        lifecycle: Lifecycle::Active,
        created_at: now,
        updated_at: now,
    };

    {
        let conn = ctx.core.db()?;
        db::insert_tenant(&conn, &tenant)?;
    }

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::TenantCreate {
            tenant_key: tenant.tenant_key.clone(),
        },
        ResourceType::Organization,
        Some(tenant.tenant_key.clone()),
    );
    tracing::info!(tenant = %tenant.tenant_key, plan = %plan, "Tenant provisioned");
    Ok(created(tenant))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub plan: Option<SubscriptionPlan>,
    pub is_active: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub max_users: Option<u32>,
    pub max_patients: Option<u32>,
}

impl SubscriptionRequest {
    fn apply(self, subscription: &mut Subscription) {
        if let Some(plan) = self.plan {
            subscription.plan = plan;
        }
        if let Some(is_active) = self.is_active {
            subscription.is_active = is_active;
        }
        if let Some(start) = self.start_date {
            subscription.start_date = start;
        }
        if let Some(expiry) = self.expiry_date {
            subscription.expiry_date = expiry;
        }
        if let Some(max) = self.max_users {
            subscription.max_users = max;
        }
        if let Some(max) = self.max_patients {
            subscription.max_patients = max;
        }
    }
}

fn find_tenant(conn: &Connection, key: &str) -> Result<Tenant, ApiError> {
    db::get_tenant(conn, &key.to_uppercase())?
        .ok_or_else(|| ApiError::NotFound("Organization not found".into()))
}

pub async fn update_subscription(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(key): Path<String>,
    client: ClientInfo,
    ApiJson(body): ApiJson<SubscriptionRequest>,
) -> Result<Json<ApiSuccess<Tenant>>, ApiError> {
    // Read, patch and write under one guard so concurrent updates to the same
    // tenant cannot overwrite each other.
    let tenant = {
        let conn = ctx.core.db()?;
        let mut tenant = find_tenant(&conn, &key)?;
        body.apply(&mut tenant.subscription);
        if tenant.subscription.expiry_date < tenant.subscription.start_date {
            return Err(ApiError::Validation(
                "Expiry date must not precede start date".into(),
            ));
        }
        db::update_subscription(&conn, &tenant.tenant_key, &tenant.subscription)?;
        tenant
    };

    let subscription = &tenant.subscription;
    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::SubscriptionUpdate {
            plan: subscription.plan,
            is_active: subscription.is_active,
            expiry_date: subscription.expiry_date,
        },
        ResourceType::Organization,
        Some(tenant.tenant_key.clone()),
    );
    Ok(ok(tenant))
}

pub async fn update_features(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(key): Path<String>,
    client: ClientInfo,
    ApiJson(body): ApiJson<HashMap<Feature, bool>>,
) -> Result<Json<ApiSuccess<Tenant>>, ApiError> {
    let tenant = {
        let conn = ctx.core.db()?;
        let mut tenant = find_tenant(&conn, &key)?;
        for (feature, enabled) in body {
            tenant.features.set(feature, enabled);
        }
        db::update_features(&conn, &tenant.tenant_key, &tenant.features)?;
        tenant
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::FeatureUpdate {
            features: tenant.features.clone(),
        },
        ResourceType::Organization,
        Some(tenant.tenant_key.clone()),
    );
    Ok(ok(tenant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    #[test]
    fn tenant_key_shape() {
        assert!(TENANT_KEY_PATTERN.is_match("ORG001"));
        assert!(TENANT_KEY_PATTERN.is_match("NORTH-CLINIC_2"));
        assert!(!TENANT_KEY_PATTERN.is_match("O"));
        assert!(!TENANT_KEY_PATTERN.is_match("org001"));
        assert!(!TENANT_KEY_PATTERN.is_match("ORG 001"));
    }

    #[test]
    fn subscription_patch_touches_only_given_fields() {
        let mut subscription = fixtures::tenant("ORG001").subscription;
        let expiry = subscription.expiry_date;
        SubscriptionRequest {
            is_active: Some(false),
            max_users: Some(3),
            ..Default::default()
        }
        .apply(&mut subscription);
        assert!(!subscription.is_active);
        assert_eq!(subscription.max_users, 3);
        assert_eq!(subscription.expiry_date, expiry);
        assert_eq!(subscription.plan, SubscriptionPlan::Premium);
    }
}
