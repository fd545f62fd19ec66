//! Analytics endpoints.
//!
//! `GET /api/analytics/dynamic`: filtered encounters plus summary
//! `GET /api/analytics/diagnosis-breakdown`: top primary diagnoses
//!
//! Both audit the filter set and the result count, never the rows.

use std::str::FromStr;

use axum::extract::State;
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::analytics;
use crate::api::error::ApiError;
use crate::api::types::{ok, ApiContext, ApiQuery, ApiSuccess, AuthContext, ClientInfo};
use crate::models::enums::{Gender, ResourceType};
use crate::models::{AnalyticsFilters, AnalyticsReport, AuditEvent, DiagnosisCount};

/// Raw query strings; parsed by `into_filters` so bad input yields a 400
/// with a specific message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub diagnosis: Option<String>,
    pub gender: Option<String>,
    pub age_min: Option<String>,
    pub age_max: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl AnalyticsQuery {
    pub fn into_filters(self) -> Result<AnalyticsFilters, ApiError> {
        let gender = non_empty(self.gender)
            .map(|g| {
                Gender::from_str(&g.to_lowercase())
                    .map_err(|_| ApiError::Validation(format!("Unknown gender '{g}'")))
            })
            .transpose()?;
        let age_min = parse_age(self.age_min, "ageMin")?;
        let age_max = parse_age(self.age_max, "ageMax")?;
        if let (Some(min), Some(max)) = (age_min, age_max) {
            if min > max {
                return Err(ApiError::Validation("ageMin must not exceed ageMax".into()));
            }
        }
        let visit_from = non_empty(self.start_date)
            .map(|d| parse_date(&d, NaiveTime::MIN))
            .transpose()?;
        let visit_to = non_empty(self.end_date)
            .map(|d| parse_date(&d, end_of_day()))
            .transpose()?;

        Ok(AnalyticsFilters {
            diagnosis: non_empty(self.diagnosis),
            gender,
            age_min,
            age_max,
            visit_from,
            visit_to,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_age(raw: Option<String>, name: &str) -> Result<Option<u32>, ApiError> {
    non_empty(raw)
        .map(|v| {
            v.parse::<u32>()
                .map_err(|_| ApiError::Validation(format!("{name} must be a whole number")))
        })
        .transpose()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken at `time_of_day` UTC.
/// A date-only end bound therefore covers the whole day.
fn parse_date(raw: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(time_of_day).and_utc())
        .map_err(|_| ApiError::Validation(format!("Invalid date '{raw}'")))
}

pub async fn dynamic(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    client: ClientInfo,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ApiSuccess<AnalyticsReport>>, ApiError> {
    let filters = query.into_filters()?;
    let report = {
        let conn = ctx.core.db()?;
        analytics::aggregate(&conn, &auth.read_scope(), &filters)?
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::AnalyticsView {
            filters,
            result_count: report.count,
        },
        ResourceType::System,
        None,
    );
    Ok(ok(report))
}

#[derive(Debug, Deserialize)]
pub struct BreakdownQuery {
    pub limit: Option<u32>,
}

pub async fn diagnosis_breakdown(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    client: ClientInfo,
    ApiQuery(query): ApiQuery<BreakdownQuery>,
) -> Result<Json<ApiSuccess<Vec<DiagnosisCount>>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(analytics::DEFAULT_BREAKDOWN_LIMIT)
        .clamp(1, analytics::MAX_BREAKDOWN_LIMIT);
    let breakdown = {
        let conn = ctx.core.db()?;
        analytics::breakdown(&conn, &auth.read_scope(), Some(limit))?
    };

    auth.audit(
        &ctx.core,
        &client,
        AuditEvent::DiagnosisBreakdownView {
            limit,
            result_count: breakdown.len(),
        },
        ResourceType::System,
        None,
    );
    Ok(ok(breakdown))
}
