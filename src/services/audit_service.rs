// src/services/audit_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AuditSink,
    models::audit::{Actor, AuditAction, AuditFilter, AuditLogEntry, NewAuditEntry},
};

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Grava o evento depois do commit. Nunca falha para quem chama:
    /// uma queda da auditoria não pode derrubar a operação de negócio.
    pub async fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        entity_type: &'static str,
        entity_id: Option<Uuid>,
        changes: serde_json::Value,
    ) {
        let entry = NewAuditEntry::new(actor, action, entity_type, entity_id, changes);
        if let Err(e) = self.sink.append(entry).await {
            tracing::warn!(
                "Falha ao gravar auditoria {} de {:?} por {}: {:?}",
                action.as_str(),
                entity_id,
                actor.id,
                e
            );
        }
    }

    pub async fn list(&self, mut filter: AuditFilter) -> Result<Vec<AuditLogEntry>, AppError> {
        filter.limit = match filter.limit {
            l if l <= 0 => DEFAULT_AUDIT_LIMIT,
            l => l.min(MAX_AUDIT_LIMIT),
        };
        self.sink.list(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryAuditSink;
    use serde_json::json;

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let sink = MemoryAuditSink::new();
        sink.set_failing(true);
        let logger = AuditLogger::new(Arc::new(sink.clone()));

        logger
            .record(&Actor::new("u1"), AuditAction::CreateTransaction, "Transaction", None, json!({}))
            .await;

        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn list_clamps_limit_and_filters() {
        let sink = MemoryAuditSink::new();
        let logger = AuditLogger::new(Arc::new(sink.clone()));
        let actor = Actor::new("u1");

        logger
            .record(&actor, AuditAction::RecordLoss, "InventoryLoss", None, json!({}))
            .await;
        logger
            .record(&actor, AuditAction::CreateTransaction, "Transaction", None, json!({}))
            .await;

        let all = logger.list(AuditFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        // Mais recente primeiro
        assert_eq!(all[0].action, "CREATE_TRANSACTION");

        let only_losses = logger
            .list(AuditFilter {
                entity_type: Some("InventoryLoss".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_losses.len(), 1);
        assert_eq!(only_losses[0].actor_id, "u1");
    }
}
