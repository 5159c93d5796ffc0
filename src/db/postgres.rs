// src/db/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        store::{Store, UnitOfWork},
        InventoryRepository, LossRepository, TransactionRepository,
    },
    models::{
        inventory::{InventoryItem, NewInventoryItem},
        loss::{InventoryLoss, NewInventoryLoss},
        report::ReportRange,
        transaction::{
            NewTransaction, NewTransactionItem, Transaction, TransactionFilter, TransactionItem,
        },
    },
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        // READ COMMITTED (padrão do Postgres) + FOR UPDATE nas linhas de estoque
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork {
            tx,
            inventory: InventoryRepository,
            losses: LossRepository,
            transactions: TransactionRepository,
        }))
    }
}

/// Envolve uma `sqlx::Transaction`: se for descartada sem commit, o sqlx faz rollback.
pub struct PgUnitOfWork {
    tx: PgTransaction<'static, Postgres>,
    inventory: InventoryRepository,
    losses: LossRepository,
    transactions: TransactionRepository,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn get_item(&mut self, id: Uuid) -> Result<Option<InventoryItem>, AppError> {
        self.inventory.get_item(&mut *self.tx, id).await
    }

    async fn lock_item(&mut self, id: Uuid) -> Result<Option<InventoryItem>, AppError> {
        self.inventory.lock_item(&mut *self.tx, id).await
    }

    async fn list_items(&mut self, include_inactive: bool) -> Result<Vec<InventoryItem>, AppError> {
        self.inventory.list_items(&mut *self.tx, include_inactive).await
    }

    async fn insert_item(&mut self, new: &NewInventoryItem) -> Result<InventoryItem, AppError> {
        self.inventory.insert_item(&mut *self.tx, new).await
    }

    async fn update_item(&mut self, item: &InventoryItem) -> Result<InventoryItem, AppError> {
        self.inventory.update_item(&mut *self.tx, item).await
    }

    async fn decrement_if_available(
        &mut self,
        id: Uuid,
        amount: i32,
    ) -> Result<Option<i32>, AppError> {
        self.inventory.decrement_if_available(&mut *self.tx, id, amount).await
    }

    async fn add_quantity(&mut self, id: Uuid, delta: i32) -> Result<Option<i32>, AppError> {
        self.inventory.add_quantity(&mut *self.tx, id, delta).await
    }

    async fn delete_item(&mut self, id: Uuid) -> Result<bool, AppError> {
        self.inventory.delete_item(&mut *self.tx, id).await
    }

    async fn count_transaction_items_for(&mut self, inventory_id: Uuid) -> Result<i64, AppError> {
        self.inventory
            .count_transaction_items_for(&mut *self.tx, inventory_id)
            .await
    }

    async fn insert_loss(&mut self, new: &NewInventoryLoss) -> Result<InventoryLoss, AppError> {
        self.losses.insert_loss(&mut *self.tx, new).await
    }

    async fn get_loss(&mut self, id: Uuid) -> Result<Option<InventoryLoss>, AppError> {
        self.losses.get_loss(&mut *self.tx, id).await
    }

    async fn list_losses(
        &mut self,
        inventory_id: Option<Uuid>,
    ) -> Result<Vec<InventoryLoss>, AppError> {
        self.losses.list_losses(&mut *self.tx, inventory_id).await
    }

    async fn delete_loss(&mut self, id: Uuid) -> Result<Option<InventoryLoss>, AppError> {
        self.losses.delete_loss(&mut *self.tx, id).await
    }

    async fn insert_transaction(&mut self, new: &NewTransaction) -> Result<Transaction, AppError> {
        self.transactions.insert_transaction(&mut *self.tx, new).await
    }

    async fn insert_transaction_item(
        &mut self,
        new: &NewTransactionItem,
    ) -> Result<TransactionItem, AppError> {
        self.transactions.insert_item(&mut *self.tx, new).await
    }

    async fn get_transaction(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        self.transactions.get_transaction(&mut *self.tx, id).await
    }

    async fn lock_transaction(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        self.transactions.lock_transaction(&mut *self.tx, id).await
    }

    async fn list_transaction_items(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Vec<TransactionItem>, AppError> {
        self.transactions.list_items(&mut *self.tx, transaction_id).await
    }

    async fn list_items_for_transactions(
        &mut self,
        transaction_ids: &[Uuid],
    ) -> Result<Vec<TransactionItem>, AppError> {
        self.transactions
            .list_items_for_transactions(&mut *self.tx, transaction_ids)
            .await
    }

    async fn update_transaction(&mut self, tx: &Transaction) -> Result<Transaction, AppError> {
        self.transactions.update_metadata(&mut *self.tx, tx).await
    }

    async fn delete_transaction(&mut self, id: Uuid) -> Result<bool, AppError> {
        self.transactions.delete_transaction(&mut *self.tx, id).await
    }

    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> Result<(Vec<Transaction>, i64), AppError> {
        let rows = self.transactions.list_transactions(&mut *self.tx, filter).await?;
        let total = self.transactions.count_transactions(&mut *self.tx, filter).await?;
        Ok((rows, total))
    }

    async fn transactions_in_range(
        &mut self,
        range: &ReportRange,
    ) -> Result<Vec<Transaction>, AppError> {
        self.transactions.transactions_in_range(&mut *self.tx, range).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
