//! Lab module: test catalog and lab test orders.
//!
//! `GET /api/lab/catalog`: filter by category / availability
//! `PUT /api/lab/catalog/:id/toggle`: availability switch
//! `POST /api/lab/orders`: order number prefix `LAB`
//! `GET /api/lab/orders/:id`
//! `PUT /api/lab/orders/:id/start`
//! `PUT /api/lab/orders/:id/results`

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{
    created, ok, parse_id, ApiContext, ApiJson, ApiQuery, ApiSuccess, AuthContext, ClientInfo,
};
use crate::db;
use crate::models::enums::{ExecutionAction, LabCategory, Lifecycle, OrderStatus, ResourceType};
use crate::models::{AuditEvent, ExecutionEvent, LabOrder, LabOrderInput, LabTest, TenantScope};
use crate::orders::{self, TransitionError};
use crate::sequence::{self, EntityPrefix};

// ═══════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub category: Option<LabCategory>,
    pub is_available: Option<bool>,
}

pub async fn catalog(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> Result<Json<ApiSuccess<Vec<LabTest>>>, ApiError> {
    let conn = ctx.core.db()?;
    let tests = db::list_catalog(&conn, &auth.read_scope(), query.category, query.is_available)?;
    Ok(ok(tests))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    /// Target state; flips the current one when absent.
    pub is_available: Option<bool>,
    pub unavailable_reason: Option<String>,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: LabTest,
}

pub async fn toggle(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
    body: Option<ApiJson<ToggleRequest>>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let id = parse_id(&id, "test")?;
    let body = body.map(|ApiJson(b)| b).unwrap_or_default();
    let scope = auth.read_scope();

    let (before, test) = {
        let conn = ctx.core.db()?;
        let test = db::get_lab_test(&conn, &scope, &id)?
            .ok_or_else(|| ApiError::NotFound("Test not found".into()))?;
        let before = test.is_available;
        let after = body.is_available.unwrap_or(!before);
        db::set_test_availability(
            &conn,
            &id,
            after,
            body.unavailable_reason.as_deref(),
            &auth.identity.id,
            Utc::now(),
        )?;
        let test = db::get_lab_test(&conn, &scope, &id)?
            .ok_or_else(|| ApiError::NotFound("Test not found".into()))?;
        (before, test)
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::LabAvailabilityToggle {
            test_code: test.test_code.clone(),
            before,
            after: test.is_available,
        },
        ResourceType::LabTest,
        Some(test.id.to_string()),
    );
    Ok(Json(ToggleResponse {
        success: true,
        message: if test.is_available { "Test enabled" } else { "Test disabled" },
        data: test,
    }))
}

// ═══════════════════════════════════════════════════════════
// Lab test orders
// ═══════════════════════════════════════════════════════════

pub async fn create_order(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    client: ClientInfo,
    ApiJson(input): ApiJson<LabOrderInput>,
) -> Result<(StatusCode, Json<ApiSuccess<LabOrder>>), ApiError> {
    let supplied = match input.test_number.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(raw) => Some(
            sequence::normalize_supplied(raw, EntityPrefix::LabOrder)
                .ok_or_else(|| ApiError::Validation(format!("Invalid test number '{raw}'")))?,
        ),
        None => None,
    };
    let tenant_key = auth.write_tenant(&headers)?;
    let scope = TenantScope::Only(tenant_key.clone());

    let now = Utc::now();
    let order = {
        let conn = ctx.core.db()?;
        db::get_patient(&conn, &scope, &input.patient_id)?
            .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
        let test = db::get_lab_test(&conn, &scope, &input.catalog_id)?
            .ok_or_else(|| ApiError::NotFound("Test not found".into()))?;
        if !test.is_available {
            let reason = test.unavailable_reason.as_deref().unwrap_or("no reason given");
            return Err(ApiError::Validation(format!(
                "Test {} is currently unavailable ({reason})",
                test.test_code
            )));
        }

        let test_number = sequence::assign(&conn, EntityPrefix::LabOrder, supplied)?;
        let order = LabOrder {
            id: Uuid::new_v4(),
            tenant_key,
            test_number,
            patient_id: input.patient_id,
            doctor_id: auth.identity.id,
            catalog_id: test.id,
            test_name: test.test_name.en.clone().unwrap_or_else(|| test.test_code.clone()),
            priority: input.priority,
            status: OrderStatus::Pending,
            events: Vec::new(),
            results: None,
            reported_at: None,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        };
        db::insert_lab_order(&conn, &order)?;
        order
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::LabOrderCreate {
            test_number: order.test_number.clone(),
        },
        ResourceType::LabTest,
        Some(order.id.to_string()),
    );
    Ok(created(order))
}

pub async fn order_detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiSuccess<LabOrder>>, ApiError> {
    let id = parse_id(&id, "order")?;
    let conn = ctx.core.db()?;
    let order = db::get_lab_order(&conn, &auth.read_scope(), &id)?
        .ok_or_else(|| ApiError::NotFound("Lab order not found".into()))?;
    Ok(ok(order))
}

#[derive(Deserialize, Default)]
pub struct StartRequest {
    pub notes: Option<String>,
}

pub async fn start_order(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
    body: Option<ApiJson<StartRequest>>,
) -> Result<Json<ApiSuccess<LabOrder>>, ApiError> {
    let notes = body.and_then(|ApiJson(b)| b.notes);
    let order = transition(&ctx, &auth, &id, ExecutionAction::Started, notes, None)?;
    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::LabOrderUpdate {
            transition: ExecutionAction::Started,
            test_number: order.test_number.clone(),
        },
        ResourceType::LabTest,
        Some(order.id.to_string()),
    );
    Ok(ok(order))
}

#[derive(Deserialize)]
pub struct ResultsRequest {
    pub results: serde_json::Value,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn record_results(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
    ApiJson(body): ApiJson<ResultsRequest>,
) -> Result<Json<ApiSuccess<LabOrder>>, ApiError> {
    if body.results.is_null() {
        return Err(ApiError::Validation("Results are required".into()));
    }
    let order = transition(
        &ctx,
        &auth,
        &id,
        ExecutionAction::Completed,
        body.notes,
        Some(&body.results),
    )?;
    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::LabOrderUpdate {
            transition: ExecutionAction::Completed,
            test_number: order.test_number.clone(),
        },
        ResourceType::LabTest,
        Some(order.id.to_string()),
    );
    Ok(ok(order))
}

fn transition(
    ctx: &ApiContext,
    auth: &AuthContext,
    id: &str,
    action: ExecutionAction,
    notes: Option<String>,
    results: Option<&serde_json::Value>,
) -> Result<LabOrder, ApiError> {
    let id = parse_id(id, "order")?;
    let scope = auth.read_scope();
    let conn = ctx.core.db()?;
    let order = db::get_lab_order(&conn, &scope, &id)?
        .ok_or_else(|| ApiError::NotFound("Lab order not found".into()))?;

    let next = orders::next_status(order.status, action)?;
    let event = ExecutionEvent {
        action,
        timestamp: Utc::now(),
        performed_by: auth.identity.id,
        notes,
    };
    if !db::transition_lab_order(&conn, &order, order.status, next, &event, results)? {
        return Err(TransitionError::Conflict.into());
    }
    tracing::info!(order = %order.test_number, from = %order.status, to = %next, "Lab order transition");

    db::get_lab_order(&conn, &scope, &id)?
        .ok_or_else(|| ApiError::NotFound("Lab order not found".into()))
}
