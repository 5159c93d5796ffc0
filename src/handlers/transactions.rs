// src/handlers/transactions.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::inventory::validate_not_negative,
    middleware::{
        i18n::Locale,
        rbac::{
            PermTransactionsDelete, PermTransactionsRead, PermTransactionsWrite,
            RequirePermission,
        },
    },
    models::{
        audit::Actor,
        transaction::{
            CreateTransaction, LineItemRequest, PaymentMethod, TransactionFilter,
            TransactionPatch, TransactionType,
        },
    },
};

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemPayload {
    pub inventory_id: Uuid,

    #[validate(range(min = 1, max = 1000000, message = "A quantidade deve estar entre 1 e 1000000."))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionPayload {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<LineItemPayload>,

    pub payment_method: PaymentMethod,

    #[validate(length(max = 100, message = "Vendedor com mais de 100 caracteres."))]
    pub sales_agent: Option<String>,

    #[validate(length(max = 150, message = "Cliente com mais de 150 caracteres."))]
    pub customer_name: Option<String>,

    #[validate(length(max = 1000, message = "As observações passam de 1000 caracteres."))]
    pub notes: Option<String>,

    #[validate(custom(function = "validate_not_negative"))]
    pub manual_total_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionPayload {
    pub payment_method: Option<PaymentMethod>,

    #[validate(length(max = 100, message = "Vendedor com mais de 100 caracteres."))]
    pub sales_agent: Option<String>,

    #[validate(length(max = 150, message = "Cliente com mais de 150 caracteres."))]
    pub customer_name: Option<String>,

    #[validate(length(max = 1000, message = "As observações passam de 1000 caracteres."))]
    pub notes: Option<String>,

    pub message_sent: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ParseTransactionPayload {
    #[validate(length(min = 1, max = 2000, message = "O texto deve ter entre 1 e 2000 caracteres."))]
    pub prompt: String,

    // Sobrescreve o Accept-Language
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub payment_method: Option<PaymentMethod>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub customer: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl From<ListTransactionsQuery> for TransactionFilter {
    fn from(q: ListTransactionsQuery) -> Self {
        TransactionFilter {
            transaction_type: q.transaction_type,
            payment_method: q.payment_method,
            from: q.from,
            to: q.to,
            customer: q.customer,
            page: q.page.unwrap_or(1),
            per_page: q.per_page.unwrap_or(0),
        }
    }
}

// ---
// Handlers
// ---
pub async fn create_transaction(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermTransactionsWrite>,
    actor: Actor,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let cmd = CreateTransaction {
        transaction_type: payload.transaction_type,
        items: payload
            .items
            .into_iter()
            .map(|l| LineItemRequest {
                inventory_id: l.inventory_id,
                quantity: l.quantity,
            })
            .collect(),
        payment_method: payload.payment_method,
        sales_agent: payload.sales_agent,
        customer_name: payload.customer_name,
        notes: payload.notes,
        manual_total_amount: payload.manual_total_amount,
    };

    let created = app_state
        .transaction_engine
        .create_transaction(cmd, &actor)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_transactions(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermTransactionsRead>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state
        .transaction_engine
        .list_transactions(query.into())
        .await?;
    Ok((StatusCode::OK, Json(page)))
}

pub async fn get_transaction(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermTransactionsRead>,
    Path(transaction_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = app_state
        .transaction_engine
        .get_transaction(transaction_id)
        .await?;
    Ok((StatusCode::OK, Json(tx)))
}

pub async fn update_transaction(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermTransactionsWrite>,
    actor: Actor,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<UpdateTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let patch = TransactionPatch {
        payment_method: payload.payment_method,
        sales_agent: payload.sales_agent,
        customer_name: payload.customer_name,
        notes: payload.notes,
        message_sent: payload.message_sent,
    };
    let tx = app_state
        .transaction_engine
        .update_transaction(transaction_id, patch, &actor)
        .await?;
    Ok((StatusCode::OK, Json(tx)))
}

pub async fn delete_transaction(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermTransactionsDelete>,
    actor: Actor,
    Path(transaction_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .transaction_engine
        .delete_transaction(transaction_id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Texto livre -> rascunho. Nada é gravado aqui.
pub async fn parse_transaction(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermTransactionsWrite>,
    locale: Locale,
    Json(payload): Json<ParseTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let language = payload
        .language
        .map(|l| Locale::from_header(Some(&l)).0)
        .unwrap_or(locale.0);
    let catalog = app_state.ledger.list_items(false).await?;

    let draft = app_state
        .draft_parser
        .parse(&payload.prompt, &language, &catalog)
        .await?;
    Ok((StatusCode::OK, Json(draft)))
}
