// src/db/audit_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::store::AuditSink,
    models::audit::{AuditFilter, AuditLogEntry, NewAuditEntry},
};

// Grava direto na pool, fora de qualquer transação de negócio.
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for AuditRepository {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, changes, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
            .bind(&entry.actor_id)
            .bind(entry.action.as_str())
            .bind(entry.entity_type)
            .bind(entry.entity_id)
            .bind(&entry.changes)
            .bind(entry.ip_address.as_deref())
            .bind(entry.user_agent.as_deref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, AppError> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT * FROM audit_logs
            WHERE ($1::text IS NULL OR entity_type = $1)
              AND ($2::text IS NULL OR actor_id = $2)
            ORDER BY timestamp DESC
            LIMIT $3
            "#,
        )
            .bind(filter.entity_type.as_deref())
            .bind(filter.actor_id.as_deref())
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}
