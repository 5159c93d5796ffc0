// src/models/transaction.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum TransactionType {
    Sale,    // Vira "SALE": mercadoria sai do estoque
    Expense, // Vira "EXPENSE": mercadoria entra (compra)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,         // "CASH"
    BankTransfer, // "BANK_TRANSFER"
}

// --- Structs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub sales_agent: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub message_sent: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Linha do pedido. `unit_price` é o preço do item NO MOMENTO da transação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub inventory_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionWithItems {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
}

// --- Comandos ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    pub inventory_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub transaction_type: TransactionType,
    pub items: Vec<LineItemRequest>,
    pub payment_method: PaymentMethod,
    pub sales_agent: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub manual_total_amount: Option<Decimal>,
}

/// Patch de metadados. `None` = campo inalterado.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub payment_method: Option<PaymentMethod>,
    pub sales_agent: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub message_sent: Option<bool>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.payment_method.is_none()
            && self.sales_agent.is_none()
            && self.customer_name.is_none()
            && self.notes.is_none()
            && self.message_sent.is_none()
    }
}

// --- Linhas de persistência ---

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub sales_agent: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct NewTransactionItem {
    pub transaction_id: Uuid,
    pub inventory_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

// --- Consultas ---

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub payment_method: Option<PaymentMethod>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>, // exclusivo
    pub customer: Option<String>,  // busca parcial, sem diferenciar maiúsculas
    pub page: i64,
    pub per_page: i64,
}

impl TransactionFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.per_page
    }

    /// O filtro aceita a transação? Espelha o WHERE do repositório Postgres.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.transaction_type.is_some_and(|t| t != tx.transaction_type) {
            return false;
        }
        if self.payment_method.is_some_and(|p| p != tx.payment_method) {
            return false;
        }
        if self.from.is_some_and(|from| tx.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| tx.created_at >= to) {
            return false;
        }
        if let Some(customer) = &self.customer {
            let needle = customer.to_lowercase();
            return tx
                .customer_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle));
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

// --- Rascunho gerado pelo parser de linguagem natural ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLineItem {
    pub inventory_id: Uuid,
    pub item_name: String,
    pub quality_tier: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub items: Vec<DraftLineItem>,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
    pub manual_total_amount: Option<Decimal>,
    pub notes: Option<String>,
}
