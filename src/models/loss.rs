// src/models/loss.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Perda de Estoque ---
// Só é criada ou excluída; nunca editada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLoss {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RecordLoss {
    pub inventory_id: Uuid,
    pub quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewInventoryLoss {
    pub inventory_id: Uuid,
    pub quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub recorded_by: String,
}
