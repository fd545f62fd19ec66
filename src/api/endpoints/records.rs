//! Medical records (clinical encounters).
//!
//! `POST   /api/records`
//! `GET    /api/patients/:id/records`
//! `DELETE /api/records/:id`: soft delete

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{
    created, ok, parse_id, ApiContext, ApiJson, ApiSuccess, AuthContext, ClientInfo,
};
use crate::db;
use crate::models::enums::{Lifecycle, ResourceType};
use crate::models::{AuditEvent, MedicalRecord, MedicalRecordInput, TenantScope};

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    client: ClientInfo,
    ApiJson(input): ApiJson<MedicalRecordInput>,
) -> Result<(StatusCode, Json<ApiSuccess<MedicalRecord>>), ApiError> {
    if input.diagnosis.primary.trim().is_empty() {
        return Err(ApiError::Validation("Primary diagnosis is required".into()));
    }
    let tenant_key = auth.write_tenant(&headers)?;

    let now = Utc::now();
    let record = {
        let conn = ctx.core.db()?;
        db::get_patient(&conn, &TenantScope::Only(tenant_key.clone()), &input.patient_id)?
            .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

        let record = MedicalRecord {
            id: Uuid::new_v4(),
            tenant_key,
            patient_id: input.patient_id,
            doctor_id: auth.identity.id,
            visit_date: input.visit_date.unwrap_or(now),
            chief_complaint: input.chief_complaint,
            examination_findings: input.examination_findings,
            vital_signs: input.vital_signs,
            diagnosis: input.diagnosis,
            treatment_plan: input.treatment_plan,
            lifecycle: Lifecycle::Active,
            created_at: now,
        };
        db::insert_record(&conn, &record)?;
        db::touch_last_visit(&conn, &record.patient_id, record.visit_date)?;
        record
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::MedicalRecordCreate {
            patient_id: record.patient_id,
        },
        ResourceType::MedicalRecord,
        Some(record.id.to_string()),
    );
    Ok(created(record))
}

pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<ApiSuccess<Vec<MedicalRecord>>>, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let scope = auth.read_scope();
    let conn = ctx.core.db()?;
    db::get_patient(&conn, &scope, &patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    let records = db::list_records_for_patient(&conn, &scope, &patient_id)?;
    Ok(ok(records))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: &'static str,
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    client: ClientInfo,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id, "record")?;
    let scope = auth.read_scope();
    let record = {
        let conn = ctx.core.db()?;
        let record = db::get_record(&conn, &scope, &id)?
            .ok_or_else(|| ApiError::NotFound("Medical record not found".into()))?;
        if !db::soft_delete_record(&conn, &scope, &id)? {
            return Err(ApiError::NotFound("Medical record not found".into()));
        }
        record
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::MedicalRecordDelete {
            patient_id: record.patient_id,
        },
        ResourceType::MedicalRecord,
        Some(record.id.to_string()),
    );
    Ok(Json(DeleteResponse {
        success: true,
        message: "Medical record deleted",
    }))
}
