// src/db/inventory_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{InventoryItem, NewInventoryItem},
};

// Nome que o Postgres dá à constraint UNIQUE (name, quality_tier) da migration
const NATURAL_KEY_CONSTRAINT: &str = "inventory_items_name_quality_tier_key";

#[derive(Clone, Copy, Default)]
pub struct InventoryRepository;

impl InventoryRepository {
    // ---
    // Funções de "Leitura"
    // ---

    pub async fn get_item<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<InventoryItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(item)
    }

    /// Trava a linha do item até o fim da transação.
    /// Duas vendas concorrentes do mesmo item ficam serializadas aqui.
    pub async fn lock_item<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<InventoryItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(item)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        include_inactive: bool,
    ) -> Result<Vec<InventoryItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE is_active OR $1
            ORDER BY name ASC, quality_tier ASC
            "#,
        )
            .bind(include_inactive)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    pub async fn count_transaction_items_for<'e, E>(
        &self,
        executor: E,
        inventory_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transaction_items WHERE inventory_id = $1",
        )
            .bind(inventory_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    // ---
    // Funções de "Escrita" (sempre dentro de uma transação)
    // ---

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        new: &NewInventoryItem,
    ) -> Result<InventoryItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO inventory_items (name, quality_tier, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
            .bind(&new.name)
            .bind(&new.quality_tier)
            .bind(new.quantity)
            .bind(new.unit_price)
            .fetch_one(executor)
            .await
            .map_err(|e| map_natural_key_violation(e, &new.name, &new.quality_tier))
    }

    pub async fn update_item<'e, E>(
        &self,
        executor: E,
        item: &InventoryItem,
    ) -> Result<InventoryItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory_items
            SET name = $2, quality_tier = $3, unit_price = $4, is_active = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(item.id)
            .bind(&item.name)
            .bind(&item.quality_tier)
            .bind(item.unit_price)
            .bind(item.is_active)
            .fetch_optional(executor)
            .await
            .map_err(|e| map_natural_key_violation(e, &item.name, &item.quality_tier))?
            .ok_or_else(|| AppError::not_found("Item de estoque", item.id))
    }

    /// Baixa condicional: o WHERE garante o piso zero mesmo sob concorrência.
    pub async fn decrement_if_available<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        amount: i32,
    ) -> Result<Option<i32>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quantity = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE inventory_items
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE id = $1 AND quantity >= $2
            RETURNING quantity
            "#,
        )
            .bind(id)
            .bind(amount)
            .fetch_optional(executor)
            .await?;
        Ok(quantity)
    }

    pub async fn add_quantity<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        delta: i32,
    ) -> Result<Option<i32>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quantity = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE inventory_items
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING quantity
            "#,
        )
            .bind(id)
            .bind(delta)
            .fetch_optional(executor)
            .await?;
        Ok(quantity)
    }

    pub async fn delete_item<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// Converte erro de violação de chave única em um erro de conflito amigável
fn map_natural_key_violation(e: sqlx::Error, name: &str, quality_tier: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() && db_err.constraint() == Some(NATURAL_KEY_CONSTRAINT) {
            return AppError::DuplicateItem {
                name: name.to_string(),
                quality_tier: quality_tier.to_string(),
            };
        }
    }
    e.into()
}
