//! Implementações em memória do `Store` e do `AuditSink`.
//!
//! Mesmo contrato das versões Postgres: cada unidade de trabalho trabalha numa
//! cópia do estado e só publica no `commit`. Unidades concorrentes ficam
//! serializadas pelo mutex, o que equivale ao `FOR UPDATE` do banco.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{AuditSink, Store, UnitOfWork},
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

#[derive(Debug, Clone, Default)]
struct MemoryState {
    items: HashMap<Uuid, InventoryItem>,
    losses: Vec<InventoryLoss>,
    transactions: HashMap<Uuid, Transaction>,
    transaction_items: Vec<TransactionItem>,
}

impl MemoryState {
    fn natural_key_taken(&self, name: &str, quality_tier: &str, except: Option<Uuid>) -> bool {
        self.items.values().any(|i| {
            Some(i.id) != except && i.name == name && i.quality_tier == quality_tier
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_transaction_items: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faz toda inserção de linha de transação falhar como falha de infraestrutura.
    pub fn fail_transaction_item_inserts(&self, fail: bool) {
        self.fail_transaction_items.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            working,
            fail_transaction_items: self.fail_transaction_items.clone(),
        }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_transaction_items: Arc<AtomicBool>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn get_item(&mut self, id: Uuid) -> Result<Option<InventoryItem>, AppError> {
        Ok(self.working.items.get(&id).cloned())
    }

    async fn lock_item(&mut self, id: Uuid) -> Result<Option<InventoryItem>, AppError> {
        // O mutex da unidade inteira já serializa o acesso
        Ok(self.working.items.get(&id).cloned())
    }

    async fn list_items(&mut self, include_inactive: bool) -> Result<Vec<InventoryItem>, AppError> {
        let mut items: Vec<InventoryItem> = self
            .working
            .items
            .values()
            .filter(|i| include_inactive || i.is_active)
            .cloned()
            .collect();
        items.sort_by(|a, b| (&a.name, &a.quality_tier).cmp(&(&b.name, &b.quality_tier)));
        Ok(items)
    }

    async fn insert_item(&mut self, new: &NewInventoryItem) -> Result<InventoryItem, AppError> {
        if self.working.natural_key_taken(&new.name, &new.quality_tier, None) {
            return Err(AppError::DuplicateItem {
                name: new.name.clone(),
                quality_tier: new.quality_tier.clone(),
            });
        }
        let now = Utc::now();
        let item = InventoryItem {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            quality_tier: new.quality_tier.clone(),
            quantity: new.quantity,
            unit_price: new.unit_price,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.working.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item(&mut self, item: &InventoryItem) -> Result<InventoryItem, AppError> {
        if self
            .working
            .natural_key_taken(&item.name, &item.quality_tier, Some(item.id))
        {
            return Err(AppError::DuplicateItem {
                name: item.name.clone(),
                quality_tier: item.quality_tier.clone(),
            });
        }
        let stored = self
            .working
            .items
            .get_mut(&item.id)
            .ok_or_else(|| AppError::not_found("Item de estoque", item.id))?;
        stored.name = item.name.clone();
        stored.quality_tier = item.quality_tier.clone();
        stored.unit_price = item.unit_price;
        stored.is_active = item.is_active;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn decrement_if_available(
        &mut self,
        id: Uuid,
        amount: i32,
    ) -> Result<Option<i32>, AppError> {
        match self.working.items.get_mut(&id) {
            Some(item) if item.quantity >= amount => {
                item.quantity -= amount;
                item.updated_at = Utc::now();
                Ok(Some(item.quantity))
            }
            _ => Ok(None),
        }
    }

    async fn add_quantity(&mut self, id: Uuid, delta: i32) -> Result<Option<i32>, AppError> {
        let Some(item) = self.working.items.get_mut(&id) else {
            return Ok(None);
        };
        // Igual ao Postgres: INTEGER estourado é erro de banco
        item.quantity = item.quantity.checked_add(delta).ok_or_else(|| {
            AppError::DatabaseError(sqlx::Error::Protocol("integer out of range".into()))
        })?;
        item.updated_at = Utc::now();
        Ok(Some(item.quantity))
    }

    async fn delete_item(&mut self, id: Uuid) -> Result<bool, AppError> {
        if self.working.transaction_items.iter().any(|l| l.inventory_id == id) {
            return Err(AppError::InternalServerError(anyhow!(
                "violação de chave estrangeira em transaction_items"
            )));
        }
        // ON DELETE CASCADE das perdas
        self.working.losses.retain(|l| l.inventory_id != id);
        Ok(self.working.items.remove(&id).is_some())
    }

    async fn count_transaction_items_for(&mut self, inventory_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .working
            .transaction_items
            .iter()
            .filter(|l| l.inventory_id == inventory_id)
            .count() as i64)
    }

    async fn insert_loss(&mut self, new: &NewInventoryLoss) -> Result<InventoryLoss, AppError> {
        if !self.working.items.contains_key(&new.inventory_id) {
            return Err(AppError::InternalServerError(anyhow!(
                "violação de chave estrangeira em inventory_losses"
            )));
        }
        let loss = InventoryLoss {
            id: Uuid::new_v4(),
            inventory_id: new.inventory_id,
            quantity: new.quantity,
            reason: new.reason.clone(),
            notes: new.notes.clone(),
            recorded_by: new.recorded_by.clone(),
            recorded_at: Utc::now(),
        };
        self.working.losses.push(loss.clone());
        Ok(loss)
    }

    async fn get_loss(&mut self, id: Uuid) -> Result<Option<InventoryLoss>, AppError> {
        Ok(self.working.losses.iter().find(|l| l.id == id).cloned())
    }

    async fn list_losses(
        &mut self,
        inventory_id: Option<Uuid>,
    ) -> Result<Vec<InventoryLoss>, AppError> {
        let mut losses: Vec<InventoryLoss> = self
            .working
            .losses
            .iter()
            .filter(|l| inventory_id.is_none_or(|id| l.inventory_id == id))
            .cloned()
            .collect();
        losses.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(losses)
    }

    async fn delete_loss(&mut self, id: Uuid) -> Result<Option<InventoryLoss>, AppError> {
        let position = self.working.losses.iter().position(|l| l.id == id);
        Ok(position.map(|idx| self.working.losses.remove(idx)))
    }

    async fn insert_transaction(&mut self, new: &NewTransaction) -> Result<Transaction, AppError> {
        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            transaction_type: new.transaction_type,
            total_amount: new.total_amount,
            payment_method: new.payment_method,
            sales_agent: new.sales_agent.clone(),
            customer_name: new.customer_name.clone(),
            notes: new.notes.clone(),
            message_sent: false,
            created_by: new.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn insert_transaction_item(
        &mut self,
        new: &NewTransactionItem,
    ) -> Result<TransactionItem, AppError> {
        if self.fail_transaction_items.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(sqlx::Error::Protocol(
                "falha simulada ao gravar transaction_items".into(),
            )));
        }
        if !self.working.transactions.contains_key(&new.transaction_id)
            || !self.working.items.contains_key(&new.inventory_id)
        {
            return Err(AppError::InternalServerError(anyhow!(
                "violação de chave estrangeira em transaction_items"
            )));
        }
        let item = TransactionItem {
            id: Uuid::new_v4(),
            transaction_id: new.transaction_id,
            inventory_id: new.inventory_id,
            quantity: new.quantity,
            unit_price: new.unit_price,
            subtotal: new.subtotal,
            created_at: Utc::now(),
        };
        self.working.transaction_items.push(item.clone());
        Ok(item)
    }

    async fn get_transaction(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        Ok(self.working.transactions.get(&id).cloned())
    }

    async fn lock_transaction(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        Ok(self.working.transactions.get(&id).cloned())
    }

    async fn list_transaction_items(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Vec<TransactionItem>, AppError> {
        Ok(self
            .working
            .transaction_items
            .iter()
            .filter(|l| l.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn list_items_for_transactions(
        &mut self,
        transaction_ids: &[Uuid],
    ) -> Result<Vec<TransactionItem>, AppError> {
        Ok(self
            .working
            .transaction_items
            .iter()
            .filter(|l| transaction_ids.contains(&l.transaction_id))
            .cloned()
            .collect())
    }

    async fn update_transaction(&mut self, tx: &Transaction) -> Result<Transaction, AppError> {
        let stored = self
            .working
            .transactions
            .get_mut(&tx.id)
            .ok_or_else(|| AppError::not_found("Transação", tx.id))?;
        stored.payment_method = tx.payment_method;
        stored.sales_agent = tx.sales_agent.clone();
        stored.customer_name = tx.customer_name.clone();
        stored.notes = tx.notes.clone();
        stored.message_sent = tx.message_sent;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_transaction(&mut self, id: Uuid) -> Result<bool, AppError> {
        let removed = self.working.transactions.remove(&id).is_some();
        if removed {
            self.working.transaction_items.retain(|l| l.transaction_id != id);
        }
        Ok(removed)
    }

    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> Result<(Vec<Transaction>, i64), AppError> {
        let mut matching: Vec<Transaction> = self
            .working
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.per_page.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn transactions_in_range(
        &mut self,
        range: &ReportRange,
    ) -> Result<Vec<Transaction>, AppError> {
        let mut rows: Vec<Transaction> = self
            .working
            .transactions
            .values()
            .filter(|tx| range.contains(tx.created_at))
            .cloned()
            .collect();
        rows.sort_by_key(|tx| tx.created_at);
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryUnitOfWork {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        // Basta descartar a cópia de trabalho
        Ok(())
    }
}

// ---
// Auditoria em memória
// ---

#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<StdMutex<Vec<AuditLogEntry>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simula uma queda do destino de auditoria.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(anyhow!(
                "destino de auditoria indisponível"
            )));
        }
        let stored = AuditLogEntry {
            id: Uuid::new_v4(),
            actor_id: entry.actor_id,
            action: entry.action.as_str().to_string(),
            entity_type: entry.entity_type.to_string(),
            entity_id: entry.entity_id,
            changes: entry.changes,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            timestamp: Utc::now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(stored);
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, AppError> {
        let entries = self.entries();
        Ok(entries
            .into_iter()
            .rev()
            .filter(|e| filter.entity_type.as_ref().is_none_or(|t| &e.entity_type == t))
            .filter(|e| filter.actor_id.as_ref().is_none_or(|a| &e.actor_id == a))
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}
