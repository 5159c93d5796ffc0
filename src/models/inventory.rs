// src/models/inventory.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Teto de uma única movimentação (linha de transação, perda, carga inicial).
pub const MAX_MOVEMENT_QUANTITY: i32 = 1_000_000;

/// Maior valor que cabe nas colunas NUMERIC(12, 2).
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

// --- Item de Estoque ---
// A chave natural é (name, quality_tier). O `id` é atribuído na criação e nunca muda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub quality_tier: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Nome de exibição usado nas mensagens de erro: "Rosa (Premium)".
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.quality_tier)
    }
}

// --- Dados para criação ---
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub name: String,
    pub quality_tier: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

// --- Patch de cadastro ---
// A quantidade NÃO está aqui: estoque só muda pelo InventoryLedger.
#[derive(Debug, Clone, Default)]
pub struct InventoryItemPatch {
    pub name: Option<String>,
    pub quality_tier: Option<String>,
    pub unit_price: Option<Decimal>,
}
