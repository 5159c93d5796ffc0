// src/handlers/inventory.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{
        PermInventoryDelete, PermInventoryRead, PermInventoryWrite, RequirePermission,
    },
    models::{
        audit::Actor,
        inventory::{InventoryItemPatch, NewInventoryItem},
    },
};

// ---
// Validação Customizada
// ---
pub fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemPayload {
    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório (máx. 100)."))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "A qualidade é obrigatória (máx. 50)."))]
    pub quality_tier: String,

    #[validate(range(min = 0, max = 1000000, message = "A quantidade inicial deve estar entre 0 e 1000000."))]
    #[serde(default)]
    pub quantity: i32,

    #[validate(custom(function = "validate_not_negative"))]
    pub unit_price: Decimal,
}

// A quantidade não é editável: só muda via perdas e transações
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemPayload {
    #[validate(length(min = 1, max = 100, message = "O nome não pode ser vazio (máx. 100)."))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "A qualidade não pode ser vazia (máx. 50)."))]
    pub quality_tier: Option<String>,

    #[validate(custom(function = "validate_not_negative"))]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

// ---
// Handlers
// ---
pub async fn create_item(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryWrite>,
    actor: Actor,
    Json(payload): Json<CreateItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state
        .ledger
        .create_item(
            NewInventoryItem {
                name: payload.name,
                quality_tier: payload.quality_tier,
                quantity: payload.quantity,
                unit_price: payload.unit_price,
            },
            &actor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_all_items(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryRead>,
    Query(query): Query<ListItemsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let items = app_state.ledger.list_items(query.include_inactive).await?;
    Ok((StatusCode::OK, Json(items)))
}

pub async fn get_item(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryRead>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = app_state.ledger.get_item(item_id).await?;
    Ok((StatusCode::OK, Json(item)))
}

pub async fn update_item(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryWrite>,
    actor: Actor,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state
        .ledger
        .update_item(
            item_id,
            InventoryItemPatch {
                name: payload.name,
                quality_tier: payload.quality_tier,
                unit_price: payload.unit_price,
            },
            &actor,
        )
        .await?;

    Ok((StatusCode::OK, Json(item)))
}

pub async fn archive_item(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryWrite>,
    actor: Actor,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = app_state.ledger.archive(item_id, &actor).await?;
    Ok((StatusCode::OK, Json(item)))
}

pub async fn restore_item(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryWrite>,
    actor: Actor,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = app_state.ledger.restore(item_id, &actor).await?;
    Ok((StatusCode::OK, Json(item)))
}

pub async fn delete_item(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermInventoryDelete>,
    actor: Actor,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.ledger.delete_item(item_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
