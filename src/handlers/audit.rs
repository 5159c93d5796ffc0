// src/handlers/audit.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{PermAuditRead, RequirePermission},
    models::audit::AuditFilter,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub actor_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_audit_logs(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermAuditRead>,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, AppError> {
    let entries = app_state
        .audit
        .list(AuditFilter {
            entity_type: query.entity_type,
            actor_id: query.actor_id,
            limit: query.limit.unwrap_or(0),
        })
        .await?;
    Ok((StatusCode::OK, Json(entries)))
}
