// src/db/loss_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::loss::{InventoryLoss, NewInventoryLoss},
};

#[derive(Clone, Copy, Default)]
pub struct LossRepository;

impl LossRepository {
    pub async fn insert_loss<'e, E>(
        &self,
        executor: E,
        new: &NewInventoryLoss,
    ) -> Result<InventoryLoss, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // recorded_at vem do DEFAULT NOW() do banco
        let loss = sqlx::query_as::<_, InventoryLoss>(
            r#"
            INSERT INTO inventory_losses (inventory_id, quantity, reason, notes, recorded_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
            .bind(new.inventory_id)
            .bind(new.quantity)
            .bind(&new.reason)
            .bind(new.notes.as_deref())
            .bind(&new.recorded_by)
            .fetch_one(executor)
            .await?;
        Ok(loss)
    }

    pub async fn get_loss<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<InventoryLoss>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let loss = sqlx::query_as::<_, InventoryLoss>("SELECT * FROM inventory_losses WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(loss)
    }

    pub async fn list_losses<'e, E>(
        &self,
        executor: E,
        inventory_id: Option<Uuid>,
    ) -> Result<Vec<InventoryLoss>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let losses = sqlx::query_as::<_, InventoryLoss>(
            r#"
            SELECT * FROM inventory_losses
            WHERE ($1::uuid IS NULL OR inventory_id = $1)
            ORDER BY recorded_at DESC
            "#,
        )
            .bind(inventory_id)
            .fetch_all(executor)
            .await?;
        Ok(losses)
    }

    // DELETE ... RETURNING: duas reversões concorrentes não devolvem o estoque duas vezes
    pub async fn delete_loss<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<InventoryLoss>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let loss = sqlx::query_as::<_, InventoryLoss>(
            "DELETE FROM inventory_losses WHERE id = $1 RETURNING *",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(loss)
    }
}
