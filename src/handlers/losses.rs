// src/handlers/losses.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{PermInventoryRead, PermLossesDelete, PermLossesWrite, RequirePermission},
    models::{audit::Actor, loss::RecordLoss},
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordLossPayload {
    pub inventory_id: Uuid,

    #[validate(range(min = 1, max = 1000000, message = "A quantidade deve estar entre 1 e 1000000."))]
    pub quantity: i32,

    #[validate(length(min = 1, max = 100, message = "O motivo é obrigatório (máx. 100)."))]
    pub reason: String,

    #[validate(length(max = 1000, message = "As observações passam de 1000 caracteres."))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLossesQuery {
    pub inventory_id: Option<Uuid>,
}

pub async fn record_loss(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermLossesWrite>,
    actor: Actor,
    Json(payload): Json<RecordLossPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let loss = app_state
        .loss_recorder
        .record_loss(
            RecordLoss {
                inventory_id: payload.inventory_id,
                quantity: payload.quantity,
                reason: payload.reason,
                notes: payload.notes,
            },
            &actor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(loss)))
}

pub async fn list_losses(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryRead>,
    Query(query): Query<ListLossesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let losses = app_state.loss_recorder.list_losses(query.inventory_id).await?;
    Ok((StatusCode::OK, Json(losses)))
}

pub async fn get_loss(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryRead>,
    Path(loss_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let loss = app_state.loss_recorder.get_loss(loss_id).await?;
    Ok((StatusCode::OK, Json(loss)))
}

// Estorno: apaga o registro e devolve a quantidade ao estoque
pub async fn reverse_loss(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermLossesDelete>,
    actor: Actor,
    Path(loss_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.loss_recorder.reverse_loss(loss_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
