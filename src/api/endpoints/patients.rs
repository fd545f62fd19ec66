//! Patient registry.
//!
//! `POST /api/patients`: register; MRN generated unless supplied
//! `GET  /api/patients`: search + pagination
//! `GET  /api/patients/:id`
//! `PUT  /api/patients/:id`

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::api::endpoints::tenant_for_write;
use crate::api::error::ApiError;
use crate::api::types::{
    created, ok, parse_id, ApiContext, ApiJson, ApiQuery, ApiSuccess, AuthContext, ClientInfo,
    ResolvedTenant,
};
use crate::authorization;
use crate::db::{self, DatabaseError};
use crate::models::enums::ResourceType;
use crate::models::{AuditEvent, Patient, PatientInput, PatientSearch, PatientUpdate};
use crate::sequence::{self, EntityPrefix};

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    resolved: Option<Extension<ResolvedTenant>>,
    headers: HeaderMap,
    client: ClientInfo,
    ApiJson(input): ApiJson<PatientInput>,
) -> Result<(StatusCode, Json<ApiSuccess<Patient>>), ApiError> {
    if input.full_name.trim().is_empty() {
        return Err(ApiError::Validation("Full name is required".into()));
    }
    if input.phone.trim().is_empty() {
        return Err(ApiError::Validation("Phone is required".into()));
    }
    let supplied = match input.mrn.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(raw) => Some(
            sequence::normalize_supplied(raw, EntityPrefix::Patient).ok_or_else(|| {
                ApiError::Validation(format!("Invalid MRN '{raw}', expected e.g. REF-2026-0001"))
            })?,
        ),
        None => None,
    };

    let tenant = tenant_for_write(&ctx, &auth, resolved, &headers)?;
    let patient = {
        let conn = ctx.core.db()?;
        let current = db::count_active_patients(&conn, &tenant.tenant_key)?;
        authorization::check_plan_limit(current, tenant.subscription.max_patients)?;

        let mrn = sequence::assign(&conn, EntityPrefix::Patient, supplied)?;
        let patient = Patient::register(
            tenant.tenant_key.clone(),
            mrn,
            input,
            auth.identity.id,
            Utc::now(),
        );
        match db::insert_patient(&conn, &patient) {
            Ok(()) => patient,
            Err(DatabaseError::ConstraintViolation(_)) => {
                return Err(ApiError::Validation(format!(
                    "A patient with MRN {} already exists",
                    patient.mrn
                )))
            }
            Err(e) => return Err(e.into()),
        }
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::PatientCreate {
            mrn: patient.mrn.clone(),
            full_name: patient.full_name.clone(),
        },
        ResourceType::Patient,
        Some(patient.id.to_string()),
    );
    tracing::info!(tenant = %patient.tenant_key, mrn = %patient.mrn, "Patient registered");
    Ok(created(patient))
}

#[derive(Serialize)]
pub struct Pagination {
    pub total: u32,
    pub page: u32,
    pub pages: u32,
    pub limit: u32,
}

#[derive(Serialize)]
pub struct PatientListResponse {
    pub success: bool,
    pub data: Vec<Patient>,
    pub pagination: Pagination,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(search): ApiQuery<PatientSearch>,
) -> Result<Json<PatientListResponse>, ApiError> {
    let (patients, total) = {
        let conn = ctx.core.db()?;
        db::list_patients(&conn, &auth.read_scope(), &search)?
    };
    let limit = search.limit();
    Ok(Json(PatientListResponse {
        success: true,
        data: patients,
        pagination: Pagination {
            total,
            page: search.page(),
            pages: total.div_ceil(limit),
            limit,
        },
    }))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiSuccess<Patient>>, ApiError> {
    let id = parse_id(&id, "patient")?;
    let conn = ctx.core.db()?;
    let patient = db::get_patient(&conn, &auth.read_scope(), &id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    Ok(ok(patient))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
    ApiJson(changes): ApiJson<PatientUpdate>,
) -> Result<Json<ApiSuccess<Patient>>, ApiError> {
    let id = parse_id(&id, "patient")?;
    if changes.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::Validation("Full name cannot be empty".into()));
    }

    let patient = {
        let conn = ctx.core.db()?;
        let mut patient = db::get_patient(&conn, &auth.read_scope(), &id)?
            .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
        changes.apply(&mut patient, Utc::now());
        if !db::update_patient(&conn, &patient)? {
            return Err(ApiError::NotFound("Patient not found".into()));
        }
        patient
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::PatientUpdate {
            mrn: patient.mrn.clone(),
        },
        ResourceType::Patient,
        Some(patient.id.to_string()),
    );
    Ok(ok(patient))
}
