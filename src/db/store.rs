// src/db/store.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        audit::{AuditFilter, AuditLogEntry, NewAuditEntry},
        inventory::{InventoryItem, NewInventoryItem},
        loss::{InventoryLoss, NewInventoryLoss},
        report::ReportRange,
        transaction::{
            NewTransaction, NewTransactionItem, Transaction, TransactionFilter, TransactionItem,
        },
    },
};

/// Fonte de unidades de trabalho. Não guarda estado de estoque em memória:
/// toda leitura passa pela camada de persistência.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;
}

/// Uma transação de banco. Tudo que é feito aqui só é visível após `commit`.
/// Se o valor for descartado sem `commit`, nada é aplicado (rollback no drop).
#[async_trait]
pub trait UnitOfWork: Send {
    // --- Itens de estoque ---
    async fn get_item(&mut self, id: Uuid) -> Result<Option<InventoryItem>, AppError>;

    /// Lê o item travando a linha até o fim da unidade (`FOR UPDATE`).
    async fn lock_item(&mut self, id: Uuid) -> Result<Option<InventoryItem>, AppError>;

    async fn list_items(&mut self, include_inactive: bool) -> Result<Vec<InventoryItem>, AppError>;

    /// Falha com `DuplicateItem` se (name, quality_tier) já existir.
    async fn insert_item(&mut self, new: &NewInventoryItem) -> Result<InventoryItem, AppError>;

    /// Grava name, quality_tier, unit_price e is_active. Nunca a quantidade.
    async fn update_item(&mut self, item: &InventoryItem) -> Result<InventoryItem, AppError>;

    /// Baixa condicional: só aplica se `quantity >= amount`.
    /// Retorna a nova quantidade, ou `None` se o item não existe ou não tem saldo.
    async fn decrement_if_available(
        &mut self,
        id: Uuid,
        amount: i32,
    ) -> Result<Option<i32>, AppError>;

    /// Soma `delta` (positivo ou negativo) sem checar piso.
    async fn add_quantity(&mut self, id: Uuid, delta: i32) -> Result<Option<i32>, AppError>;

    async fn delete_item(&mut self, id: Uuid) -> Result<bool, AppError>;

    async fn count_transaction_items_for(&mut self, inventory_id: Uuid) -> Result<i64, AppError>;

    // --- Perdas ---
    async fn insert_loss(&mut self, new: &NewInventoryLoss) -> Result<InventoryLoss, AppError>;

    async fn get_loss(&mut self, id: Uuid) -> Result<Option<InventoryLoss>, AppError>;

    async fn list_losses(
        &mut self,
        inventory_id: Option<Uuid>,
    ) -> Result<Vec<InventoryLoss>, AppError>;

    /// Exclui e devolve a linha excluída (reivindicação atômica do registro).
    async fn delete_loss(&mut self, id: Uuid) -> Result<Option<InventoryLoss>, AppError>;

    // --- Transações ---
    async fn insert_transaction(&mut self, new: &NewTransaction) -> Result<Transaction, AppError>;

    async fn insert_transaction_item(
        &mut self,
        new: &NewTransactionItem,
    ) -> Result<TransactionItem, AppError>;

    async fn get_transaction(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError>;

    async fn lock_transaction(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError>;

    async fn list_transaction_items(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Vec<TransactionItem>, AppError>;

    async fn list_items_for_transactions(
        &mut self,
        transaction_ids: &[Uuid],
    ) -> Result<Vec<TransactionItem>, AppError>;

    /// Grava apenas os metadados (pagamento, vendedor, cliente, notas, mensagem).
    async fn update_transaction(&mut self, tx: &Transaction) -> Result<Transaction, AppError>;

    /// Remove o cabeçalho; as linhas caem em cascata.
    async fn delete_transaction(&mut self, id: Uuid) -> Result<bool, AppError>;

    /// Página de transações (mais recentes primeiro) + total sem paginação.
    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> Result<(Vec<Transaction>, i64), AppError>;

    async fn transactions_in_range(
        &mut self,
        range: &ReportRange,
    ) -> Result<Vec<Transaction>, AppError>;

    // --- Ciclo de vida ---
    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// Destino do log de auditoria. Fica FORA da unidade de trabalho.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), AppError>;

    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, AppError>;
}

/// Fecha a unidade de trabalho conforme o resultado: commit no sucesso,
/// rollback no erro. O erro original prevalece sobre uma falha de rollback.
pub async fn finish<T>(
    uow: Box<dyn UnitOfWork>,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!("Falha no rollback após erro ({}): {:?}", err, rollback_err);
            }
            Err(err)
        }
    }
}
