// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Quem está executando a operação. O núcleo trata `id` como texto opaco.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ip_address: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateInventoryItem,
    UpdateInventoryItem,
    ArchiveInventoryItem,
    RestoreInventoryItem,
    DeleteInventoryItem,
    RecordLoss,
    ReverseLoss,
    CreateTransaction,
    UpdateTransaction,
    DeleteTransaction,
    CreateUser,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateInventoryItem => "CREATE_INVENTORY_ITEM",
            AuditAction::UpdateInventoryItem => "UPDATE_INVENTORY_ITEM",
            AuditAction::ArchiveInventoryItem => "ARCHIVE_INVENTORY_ITEM",
            AuditAction::RestoreInventoryItem => "RESTORE_INVENTORY_ITEM",
            AuditAction::DeleteInventoryItem => "DELETE_INVENTORY_ITEM",
            AuditAction::RecordLoss => "RECORD_LOSS",
            AuditAction::ReverseLoss => "REVERSE_LOSS",
            AuditAction::CreateTransaction => "CREATE_TRANSACTION",
            AuditAction::UpdateTransaction => "UPDATE_TRANSACTION",
            AuditAction::DeleteTransaction => "DELETE_TRANSACTION",
            AuditAction::CreateUser => "CREATE_USER",
        }
    }
}

// Entrada já gravada. Append-only: sem updated_at.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: String,
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditEntry {
    pub fn new(
        actor: &Actor,
        action: AuditAction,
        entity_type: &'static str,
        entity_id: Option<Uuid>,
        changes: serde_json::Value,
    ) -> Self {
        Self {
            actor_id: actor.id.clone(),
            action,
            entity_type,
            entity_id,
            changes,
            ip_address: actor.ip_address.clone(),
            user_agent: actor.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub actor_id: Option<String>,
    pub limit: i64,
}
