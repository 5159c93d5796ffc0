// src/handlers/reports.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{PermReportsRead, RequirePermission},
    models::report::ReportRange,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub top: Option<usize>,
}

// 1. Cards do topo: vendas, despesas, lucro
pub async fn get_summary(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermReportsRead>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state
        .reports
        .summary(ReportRange {
            from: query.from,
            to: query.to,
        })
        .await?;
    Ok((StatusCode::OK, Json(summary)))
}

// 2. Série diária + ranking de itens
pub async fn get_analytics(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermReportsRead>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let analytics = app_state
        .reports
        .analytics(
            ReportRange {
                from: query.from,
                to: query.to,
            },
            query.top,
        )
        .await?;
    Ok((StatusCode::OK, Json(analytics)))
}
