// src/db/transaction_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        report::ReportRange,
        transaction::{
            NewTransaction, NewTransactionItem, Transaction, TransactionFilter, TransactionItem,
        },
    },
};

// O mesmo WHERE serve para a página e para a contagem
const FILTER_CLAUSE: &str = r#"
    WHERE ($1::transaction_type IS NULL OR transaction_type = $1)
      AND ($2::payment_method IS NULL OR payment_method = $2)
      AND ($3::timestamptz IS NULL OR created_at >= $3)
      AND ($4::timestamptz IS NULL OR created_at < $4)
      AND ($5::text IS NULL OR customer_name ILIKE '%' || $5 || '%')
"#;

#[derive(Clone, Copy, Default)]
pub struct TransactionRepository;

impl TransactionRepository {
    // =========================================================================
    //  CABEÇALHO
    // =========================================================================

    pub async fn insert_transaction<'e, E>(
        &self,
        executor: E,
        new: &NewTransaction,
    ) -> Result<Transaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tx = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                transaction_type, total_amount, payment_method,
                sales_agent, customer_name, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
            .bind(new.transaction_type)
            .bind(new.total_amount)
            .bind(new.payment_method)
            .bind(new.sales_agent.as_deref())
            .bind(new.customer_name.as_deref())
            .bind(new.notes.as_deref())
            .bind(&new.created_by)
            .fetch_one(executor)
            .await?;
        Ok(tx)
    }

    pub async fn get_transaction<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(tx)
    }

    // Trava o cabeçalho: duas exclusões concorrentes não revertem o estoque duas vezes
    pub async fn lock_transaction<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tx = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(tx)
    }

    pub async fn update_metadata<'e, E>(
        &self,
        executor: E,
        tx: &Transaction,
    ) -> Result<Transaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET payment_method = $2, sales_agent = $3, customer_name = $4,
                notes = $5, message_sent = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(tx.id)
            .bind(tx.payment_method)
            .bind(tx.sales_agent.as_deref())
            .bind(tx.customer_name.as_deref())
            .bind(tx.notes.as_deref())
            .bind(tx.message_sent)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found("Transação", tx.id))
    }

    pub async fn delete_transaction<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // ON DELETE CASCADE leva junto as transaction_items
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_transactions<'e, E>(
        &self,
        executor: E,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT * FROM transactions {} ORDER BY created_at DESC, id ASC LIMIT $6 OFFSET $7",
            FILTER_CLAUSE
        );
        let rows = sqlx::query_as::<_, Transaction>(&sql)
            .bind(filter.transaction_type)
            .bind(filter.payment_method)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.customer.as_deref())
            .bind(filter.per_page)
            .bind(filter.offset())
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    pub async fn count_transactions<'e, E>(
        &self,
        executor: E,
        filter: &TransactionFilter,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT COUNT(*) FROM transactions {}", FILTER_CLAUSE);
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.transaction_type)
            .bind(filter.payment_method)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.customer.as_deref())
            .fetch_one(executor)
            .await?;
        Ok(total)
    }

    pub async fn transactions_in_range<'e, E>(
        &self,
        executor: E,
        range: &ReportRange,
    ) -> Result<Vec<Transaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at ASC
            "#,
        )
            .bind(range.from)
            .bind(range.to)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    // =========================================================================
    //  LINHAS
    // =========================================================================

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        new: &NewTransactionItem,
    ) -> Result<TransactionItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, TransactionItem>(
            r#"
            INSERT INTO transaction_items (transaction_id, inventory_id, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
            .bind(new.transaction_id)
            .bind(new.inventory_id)
            .bind(new.quantity)
            .bind(new.unit_price)
            .bind(new.subtotal)
            .fetch_one(executor)
            .await?;
        Ok(item)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        transaction_id: Uuid,
    ) -> Result<Vec<TransactionItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, TransactionItem>(
            "SELECT * FROM transaction_items WHERE transaction_id = $1 ORDER BY created_at ASC, id ASC",
        )
            .bind(transaction_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    pub async fn list_items_for_transactions<'e, E>(
        &self,
        executor: E,
        transaction_ids: &[Uuid],
    ) -> Result<Vec<TransactionItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, TransactionItem>(
            "SELECT * FROM transaction_items WHERE transaction_id = ANY($1)",
        )
            .bind(transaction_ids)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }
}
