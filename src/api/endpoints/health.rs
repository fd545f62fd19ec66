use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub timestamp: String,
}

/// `GET /api/health`: liveness plus a database round-trip.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = {
        let conn = ctx.core.db()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok()
    };

    Ok(Json(HealthResponse {
        success: true,
        status: "ok",
        version: crate::config::APP_VERSION,
        database,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
