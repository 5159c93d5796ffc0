// src/services/transaction_service.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{finish, Store, UnitOfWork},
    models::{
        audit::{Actor, AuditAction},
        inventory::{max_money, InventoryItem, MAX_MOVEMENT_QUANTITY},
        transaction::{
            CreateTransaction, LineItemRequest, NewTransaction, NewTransactionItem, Paginated,
            Transaction, TransactionFilter, TransactionPatch, TransactionType,
            TransactionWithItems,
        },
    },
    services::{audit_service::AuditLogger, ledger::InventoryLedger},
};

const ENTITY: &str = "Transaction";

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Linha já precificada, montada antes de qualquer escrita.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub inventory_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Plano completo da transação: se existe, todas as regras de negócio já passaram.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPlan {
    pub lines: Vec<PricedLine>,
    pub computed_total: Decimal,
    pub total_amount: Decimal,
}

#[derive(Clone)]
pub struct TransactionEngine {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
    audit: AuditLogger,
}

impl TransactionEngine {
    pub fn new(store: Arc<dyn Store>, ledger: InventoryLedger, audit: AuditLogger) -> Self {
        Self {
            store,
            ledger,
            audit,
        }
    }

    // =========================================================================
    //  CRIAÇÃO
    // =========================================================================

    /// Cabeçalho, linhas e movimentação de estoque numa única unidade de trabalho.
    /// Qualquer falha desfaz tudo, inclusive as linhas que passariam sozinhas.
    pub async fn create_transaction(
        &self,
        cmd: CreateTransaction,
        actor: &Actor,
    ) -> Result<TransactionWithItems, AppError> {
        validate_shape(&cmd)?;

        let mut uow = self.store.begin().await?;
        let result = self.create_in(&mut *uow, &cmd, actor).await;
        let created = finish(uow, result).await?;

        tracing::info!(
            "💰 Transação {} ({:?}) criada: {} linha(s), total {}",
            created.transaction.id,
            created.transaction.transaction_type,
            created.items.len(),
            created.transaction.total_amount
        );
        self.audit
            .record(
                actor,
                AuditAction::CreateTransaction,
                ENTITY,
                Some(created.transaction.id),
                json!({ "after": created }),
            )
            .await;
        Ok(created)
    }

    async fn create_in(
        &self,
        uow: &mut dyn UnitOfWork,
        cmd: &CreateTransaction,
        actor: &Actor,
    ) -> Result<TransactionWithItems, AppError> {
        // 1. Trava e resolve os itens (ordem fixa de ids evita deadlock)
        let catalog = lock_catalog(uow, cmd.items.iter().map(|l| l.inventory_id)).await?;
        for line in &cmd.items {
            let item = catalog.get(&line.inventory_id).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Item de estoque {} não existe",
                    line.inventory_id
                ))
            })?;
            if !item.is_active {
                return Err(AppError::InvalidInput(format!(
                    "O item {} está arquivado e não aceita novas transações",
                    item.display_name()
                )));
            }
        }

        // 2 e 3. Preços, totais e saldo: tudo validado antes da primeira escrita
        let plan = build_plan(cmd, &catalog)?;

        // 4. Escritas
        let header = uow
            .insert_transaction(&NewTransaction {
                transaction_type: cmd.transaction_type,
                total_amount: plan.total_amount,
                payment_method: cmd.payment_method,
                sales_agent: clean(cmd.sales_agent.clone()),
                customer_name: clean(cmd.customer_name.clone()),
                notes: clean(cmd.notes.clone()),
                created_by: actor.id.clone(),
            })
            .await?;

        let mut items = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let stored = uow
                .insert_transaction_item(&NewTransactionItem {
                    transaction_id: header.id,
                    inventory_id: line.inventory_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal: line.subtotal,
                })
                .await?;
            items.push(stored);

            match cmd.transaction_type {
                TransactionType::Sale => {
                    self.ledger
                        .reserve_and_decrement(uow, line.inventory_id, line.quantity)
                        .await?;
                }
                TransactionType::Expense => {
                    self.ledger
                        .increment(uow, line.inventory_id, line.quantity)
                        .await?;
                }
            }
        }

        Ok(TransactionWithItems {
            transaction: header,
            items,
        })
    }

    // =========================================================================
    //  EXCLUSÃO
    // =========================================================================

    /// Aplica o movimento inverso de cada linha e remove a transação.
    pub async fn delete_transaction(&self, id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let mut uow = self.store.begin().await?;
        let result = self.delete_in(&mut *uow, id).await;
        let removed = finish(uow, result).await?;

        tracing::info!(
            "🗑️ Transação {} excluída, {} linha(s) estornada(s)",
            id,
            removed.items.len()
        );
        self.audit
            .record(
                actor,
                AuditAction::DeleteTransaction,
                ENTITY,
                Some(id),
                json!({ "before": removed }),
            )
            .await;
        Ok(())
    }

    async fn delete_in(
        &self,
        uow: &mut dyn UnitOfWork,
        id: Uuid,
    ) -> Result<TransactionWithItems, AppError> {
        // Trava o cabeçalho: uma segunda exclusão concorrente espera e vê NotFound
        let header = uow
            .lock_transaction(id)
            .await?
            .ok_or_else(|| AppError::not_found("Transação", id))?;
        let items = uow.list_transaction_items(id).await?;

        lock_catalog(uow, items.iter().map(|l| l.inventory_id)).await?;

        for line in &items {
            match header.transaction_type {
                TransactionType::Sale => {
                    self.ledger
                        .increment(uow, line.inventory_id, line.quantity)
                        .await?;
                }
                TransactionType::Expense => {
                    self.ledger
                        .release_unchecked(uow, line.inventory_id, line.quantity)
                        .await?;
                }
            }
        }

        if !uow.delete_transaction(id).await? {
            return Err(AppError::not_found("Transação", id));
        }
        Ok(TransactionWithItems {
            transaction: header,
            items,
        })
    }

    // =========================================================================
    //  METADADOS
    // =========================================================================

    /// Patch puro: não mexe em linhas, totais nem estoque.
    pub async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
        actor: &Actor,
    ) -> Result<TransactionWithItems, AppError> {
        let mut uow = self.store.begin().await?;
        let result = update_in(&mut *uow, id, patch).await;
        let (before, after) = finish(uow, result).await?;

        if before != after.transaction {
            self.audit
                .record(
                    actor,
                    AuditAction::UpdateTransaction,
                    ENTITY,
                    Some(id),
                    json!({ "before": before, "after": after.transaction }),
                )
                .await;
        }
        Ok(after)
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn get_transaction(&self, id: Uuid) -> Result<TransactionWithItems, AppError> {
        let mut uow = self.store.begin().await?;
        let result = load_with_items(&mut *uow, id).await;
        finish(uow, result).await
    }

    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Paginated<TransactionWithItems>, AppError> {
        let filter = normalize_filter(filter)?;

        let mut uow = self.store.begin().await?;
        let result = list_in(&mut *uow, &filter).await;
        let (data, total) = finish(uow, result).await?;

        Ok(Paginated {
            data,
            total,
            page: filter.page,
            per_page: filter.per_page,
        })
    }
}

/// Regras que não dependem do banco.
fn validate_shape(cmd: &CreateTransaction) -> Result<(), AppError> {
    if let Some(line) = cmd.items.iter().find(|l| l.quantity <= 0) {
        return Err(AppError::InvalidInput(format!(
            "A quantidade do item {} deve ser maior que zero",
            line.inventory_id
        )));
    }
    if let Some(line) = cmd.items.iter().find(|l| l.quantity > MAX_MOVEMENT_QUANTITY) {
        return Err(AppError::InvalidInput(format!(
            "A quantidade do item {} passa do limite de {} por linha",
            line.inventory_id, MAX_MOVEMENT_QUANTITY
        )));
    }
    if cmd.transaction_type == TransactionType::Sale && cmd.items.is_empty() {
        return Err(AppError::InvalidInput(
            "Uma venda precisa de pelo menos um item".into(),
        ));
    }
    if cmd.items.is_empty() && cmd.manual_total_amount.is_none() {
        return Err(AppError::InvalidInput(
            "Informe itens ou um valor total manual".into(),
        ));
    }
    if cmd
        .manual_total_amount
        .is_some_and(|total| total < Decimal::ZERO)
    {
        return Err(AppError::InvalidInput(
            "O valor total não pode ser negativo".into(),
        ));
    }
    if cmd
        .manual_total_amount
        .is_some_and(|total| total.round_dp(2) > max_money())
    {
        return Err(AppError::InvalidInput(format!(
            "O valor total passa do limite de {}",
            max_money()
        )));
    }
    Ok(())
}

/// Para vendas confere o saldo e depois precifica as linhas com o preço do
/// momento. O saldo é comparado com a soma pedida por item, então linhas
/// repetidas do mesmo item não escapam da checagem.
pub fn build_plan(
    cmd: &CreateTransaction,
    catalog: &HashMap<Uuid, InventoryItem>,
) -> Result<TransactionPlan, AppError> {
    if cmd.transaction_type == TransactionType::Sale {
        check_sufficiency(&cmd.items, catalog)?;
    }

    let mut lines = Vec::with_capacity(cmd.items.len());
    let mut computed_total = Decimal::ZERO;

    for request in &cmd.items {
        let item = catalog.get(&request.inventory_id).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Item de estoque {} não existe",
                request.inventory_id
            ))
        })?;
        let subtotal = (item.unit_price * Decimal::from(request.quantity)).round_dp(2);
        computed_total += subtotal;
        if computed_total > max_money() {
            return Err(AppError::InvalidInput(format!(
                "O valor da transação passa do limite de {}",
                max_money()
            )));
        }
        lines.push(PricedLine {
            inventory_id: item.id,
            quantity: request.quantity,
            unit_price: item.unit_price,
            subtotal,
        });
    }

    let total_amount = cmd
        .manual_total_amount
        .map(|manual| manual.round_dp(2))
        .unwrap_or(computed_total);

    Ok(TransactionPlan {
        lines,
        computed_total,
        total_amount,
    })
}

fn check_sufficiency(
    requests: &[LineItemRequest],
    catalog: &HashMap<Uuid, InventoryItem>,
) -> Result<(), AppError> {
    // Somado em i64: várias linhas grandes do mesmo item não estouram
    let mut requested: HashMap<Uuid, i64> = HashMap::new();
    for line in requests {
        *requested.entry(line.inventory_id).or_default() += i64::from(line.quantity);
    }

    // Primeira violação na ordem das linhas
    for line in requests {
        let Some(item) = catalog.get(&line.inventory_id) else {
            continue;
        };
        let wanted = requested[&line.inventory_id];
        if wanted > i64::from(item.quantity) {
            return Err(AppError::InsufficientStock {
                item_id: item.id,
                item_name: item.display_name(),
                requested: wanted,
                available: item.quantity,
            });
        }
    }
    Ok(())
}

async fn lock_catalog(
    uow: &mut dyn UnitOfWork,
    ids: impl Iterator<Item = Uuid>,
) -> Result<HashMap<Uuid, InventoryItem>, AppError> {
    let ordered: BTreeSet<Uuid> = ids.collect();
    let mut catalog = HashMap::with_capacity(ordered.len());
    for id in ordered {
        if let Some(item) = uow.lock_item(id).await? {
            catalog.insert(id, item);
        }
    }
    Ok(catalog)
}

async fn update_in(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    patch: TransactionPatch,
) -> Result<(Transaction, TransactionWithItems), AppError> {
    let before = uow
        .lock_transaction(id)
        .await?
        .ok_or_else(|| AppError::not_found("Transação", id))?;

    let transaction = if patch.is_empty() {
        before.clone()
    } else {
        let mut next = before.clone();
        if let Some(method) = patch.payment_method {
            next.payment_method = method;
        }
        // String vazia limpa o campo
        if let Some(agent) = patch.sales_agent {
            next.sales_agent = clean(Some(agent));
        }
        if let Some(customer) = patch.customer_name {
            next.customer_name = clean(Some(customer));
        }
        if let Some(notes) = patch.notes {
            next.notes = clean(Some(notes));
        }
        if let Some(sent) = patch.message_sent {
            next.message_sent = sent;
        }
        uow.update_transaction(&next).await?
    };

    let items = uow.list_transaction_items(id).await?;
    Ok((before, TransactionWithItems { transaction, items }))
}

async fn load_with_items(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
) -> Result<TransactionWithItems, AppError> {
    let transaction = uow
        .get_transaction(id)
        .await?
        .ok_or_else(|| AppError::not_found("Transação", id))?;
    let items = uow.list_transaction_items(id).await?;
    Ok(TransactionWithItems { transaction, items })
}

async fn list_in(
    uow: &mut dyn UnitOfWork,
    filter: &TransactionFilter,
) -> Result<(Vec<TransactionWithItems>, i64), AppError> {
    let (rows, total) = uow.list_transactions(filter).await?;
    let ids: Vec<Uuid> = rows.iter().map(|tx| tx.id).collect();

    let mut by_tx: HashMap<Uuid, Vec<_>> = HashMap::new();
    for item in uow.list_items_for_transactions(&ids).await? {
        by_tx.entry(item.transaction_id).or_default().push(item);
    }

    let data = rows
        .into_iter()
        .map(|transaction| TransactionWithItems {
            items: by_tx.remove(&transaction.id).unwrap_or_default(),
            transaction,
        })
        .collect();
    Ok((data, total))
}

fn normalize_filter(mut filter: TransactionFilter) -> Result<TransactionFilter, AppError> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from >= to {
            return Err(AppError::InvalidInput(
                "O início do período deve ser anterior ao fim".into(),
            ));
        }
    }
    filter.page = filter.page.max(1);
    filter.per_page = match filter.per_page {
        p if p <= 0 => DEFAULT_PER_PAGE,
        p => p.min(MAX_PER_PAGE),
    };
    filter.customer = clean(filter.customer);
    Ok(filter)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
