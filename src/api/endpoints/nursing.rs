//! Nursing orders.
//!
//! `POST /api/nursing/orders`: doctor issues an order (number prefix `NO`)
//! `GET  /api/nursing/orders/pending`: work queue, most urgent first
//! `PUT  /api/nursing/orders/:id/start`
//! `PUT  /api/nursing/orders/:id/complete`
//! `PUT  /api/nursing/orders/:id/cancel`

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{
    created, parse_id, ApiContext, ApiJson, ApiQuery, ApiSuccess, AuthContext, ClientInfo,
};
use crate::db::{self, Administration};
use crate::models::enums::{
    ExecutionAction, Lifecycle, NursingActionType, OrderStatus, Priority, ResourceType,
};
use crate::models::{
    AuditEvent, ExecutionEvent, NursingOrder, NursingOrderInput, PendingOrderView, TenantScope,
};
use crate::orders::{self, TransitionError};
use crate::sequence::{self, EntityPrefix};

/// Action types that administer a drug and so need a medication name.
fn requires_medication(action: NursingActionType) -> bool {
    matches!(
        action,
        NursingActionType::Injection | NursingActionType::IvDrip | NursingActionType::Medication
    )
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    client: ClientInfo,
    ApiJson(input): ApiJson<NursingOrderInput>,
) -> Result<(StatusCode, Json<ApiSuccess<NursingOrder>>), ApiError> {
    if requires_medication(input.action_type)
        && input.medication_name.as_deref().map_or(true, |m| m.trim().is_empty())
    {
        return Err(ApiError::Validation(format!(
            "A medication name is required for {} orders",
            input.action_type
        )));
    }
    let supplied = match input.order_number.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(raw) => Some(
            sequence::normalize_supplied(raw, EntityPrefix::NursingOrder)
                .ok_or_else(|| ApiError::Validation(format!("Invalid order number '{raw}'")))?,
        ),
        None => None,
    };
    let tenant_key = auth.write_tenant(&headers)?;

    let now = Utc::now();
    let order = {
        let conn = ctx.core.db()?;
        db::get_patient(&conn, &TenantScope::Only(tenant_key.clone()), &input.patient_id)?
            .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
        let order_number = sequence::assign(&conn, EntityPrefix::NursingOrder, supplied)?;
        let order = NursingOrder {
            id: Uuid::new_v4(),
            tenant_key,
            order_number,
            patient_id: input.patient_id,
            doctor_id: auth.identity.id,
            action_type: input.action_type,
            medication_name: input.medication_name,
            administration_method: input.administration_method,
            dosage: input.dosage,
            frequency: input.frequency,
            special_instructions: input.special_instructions,
            priority: input.priority,
            scheduled_for: input.scheduled_for,
            status: OrderStatus::Pending,
            events: Vec::new(),
            administered_by: None,
            administered_at: None,
            administration_notes: None,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        };
        db::insert_nursing_order(&conn, &order)?;
        order
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::NursingOrderCreate {
            order_number: order.order_number.clone(),
        },
        ResourceType::NursingOrder,
        Some(order.id.to_string()),
    );
    Ok(created(order))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    pub priority: Option<Priority>,
    pub action_type: Option<NursingActionType>,
}

#[derive(Serialize)]
pub struct PendingResponse {
    pub success: bool,
    pub data: Vec<PendingOrderView>,
    pub count: usize,
}

pub async fn pending(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<PendingQuery>,
) -> Result<Json<PendingResponse>, ApiError> {
    let orders = {
        let conn = ctx.core.db()?;
        db::list_pending_orders(&conn, &auth.read_scope(), query.priority, query.action_type)?
    };
    Ok(Json(PendingResponse {
        success: true,
        count: orders.len(),
        data: orders,
    }))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub notes: Option<String>,
    pub administration_notes: Option<String>,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: NursingOrder,
}

pub async fn start(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
    body: Option<ApiJson<TransitionRequest>>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let body = body.map(|ApiJson(b)| b).unwrap_or_default();
    let order = transition(
        &ctx,
        &auth,
        &id,
        ExecutionAction::Started,
        body.notes.or_else(|| Some("Started".into())),
    )?;
    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::NursingOrderUpdate {
            transition: ExecutionAction::Started,
            order_number: order.order_number.clone(),
        },
        ResourceType::NursingOrder,
        Some(order.id.to_string()),
    );
    Ok(Json(TransitionResponse {
        success: true,
        message: "Order started",
        data: order,
    }))
}

pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
    body: Option<ApiJson<TransitionRequest>>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let body = body.map(|ApiJson(b)| b).unwrap_or_default();
    let notes = body.administration_notes.or(body.notes);
    let order = transition(&ctx, &auth, &id, ExecutionAction::Completed, notes)?;
    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::NursingOrderComplete {
            order_number: order.order_number.clone(),
        },
        ResourceType::NursingOrder,
        Some(order.id.to_string()),
    );
    Ok(Json(TransitionResponse {
        success: true,
        message: "Order completed",
        data: order,
    }))
}

pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
    body: Option<ApiJson<TransitionRequest>>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let body = body.map(|ApiJson(b)| b).unwrap_or_default();
    let order = transition(
        &ctx,
        &auth,
        &id,
        ExecutionAction::Cancelled,
        body.reason.or(body.notes),
    )?;
    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::NursingOrderCancel {
            order_number: order.order_number.clone(),
        },
        ResourceType::NursingOrder,
        Some(order.id.to_string()),
    );
    Ok(Json(TransitionResponse {
        success: true,
        message: "Order cancelled",
        data: order,
    }))
}

/// Load, check the move against the state machine, then compare-and-set.
fn transition(
    ctx: &ApiContext,
    auth: &AuthContext,
    id: &str,
    action: ExecutionAction,
    notes: Option<String>,
) -> Result<NursingOrder, ApiError> {
    let id = parse_id(id, "order")?;
    let scope = auth.read_scope();
    let conn = ctx.core.db()?;
    let order = db::get_nursing_order(&conn, &scope, &id)?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;

    let next = orders::next_status(order.status, action)?;
    let now = Utc::now();
    let event = ExecutionEvent {
        action,
        timestamp: now,
        performed_by: auth.identity.id,
        notes: notes.clone(),
    };
    let administration = (action == ExecutionAction::Completed).then(|| Administration {
        by: auth.identity.id,
        at: now,
        notes,
    });

    if !db::transition_nursing_order(
        &conn,
        &order,
        order.status,
        next,
        &event,
        administration.as_ref(),
    )? {
        return Err(TransitionError::Conflict.into());
    }
    tracing::info!(order = %order.order_number, from = %order.status, to = %next, "Nursing order transition");

    db::get_nursing_order(&conn, &scope, &id)?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))
}
