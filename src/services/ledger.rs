// src/services/ledger.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{finish, Store, UnitOfWork},
    models::{
        audit::{Actor, AuditAction},
        inventory::{
            max_money, InventoryItem, InventoryItemPatch, NewInventoryItem, MAX_MOVEMENT_QUANTITY,
        },
    },
    services::audit_service::AuditLogger,
};

const ENTITY: &str = "InventoryItem";

/// Único ponto que altera `quantity`. Perdas e transações passam por aqui,
/// sempre dentro da unidade de trabalho de quem chama.
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn Store>,
    audit: AuditLogger,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn Store>, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    // =========================================================================
    //  MOVIMENTAÇÃO (dentro de uma unidade de trabalho)
    // =========================================================================

    /// Baixa com piso zero. O teste de saldo e a escrita são um único UPDATE
    /// condicional, então duas baixas concorrentes nunca passam juntas do saldo.
    pub async fn reserve_and_decrement(
        &self,
        uow: &mut dyn UnitOfWork,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<i32, AppError> {
        ensure_positive(quantity)?;

        if let Some(remaining) = uow.decrement_if_available(item_id, quantity).await? {
            return Ok(remaining);
        }

        // Não baixou: ou o item não existe, ou falta saldo
        let item = uow
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Item de estoque", item_id))?;

        Err(AppError::InsufficientStock {
            item_id,
            item_name: item.display_name(),
            requested: i64::from(quantity),
            available: item.quantity,
        })
    }

    /// Entrada sem teto (compras e estornos).
    pub async fn increment(
        &self,
        uow: &mut dyn UnitOfWork,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<i32, AppError> {
        ensure_positive(quantity)?;
        ensure_fits(uow, item_id, quantity).await?;
        uow.add_quantity(item_id, quantity)
            .await?
            .ok_or_else(|| AppError::not_found("Item de estoque", item_id))
    }

    /// Baixa SEM piso. Usada só no estorno de uma despesa, onde o saldo já
    /// pode ter sido vendido depois da compra.
    pub async fn release_unchecked(
        &self,
        uow: &mut dyn UnitOfWork,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<i32, AppError> {
        ensure_positive(quantity)?;
        ensure_fits(uow, item_id, -quantity).await?;
        let remaining = uow
            .add_quantity(item_id, -quantity)
            .await?
            .ok_or_else(|| AppError::not_found("Item de estoque", item_id))?;

        if remaining < 0 {
            tracing::warn!(
                "Estoque do item {} ficou negativo ({}) após estorno de despesa",
                item_id,
                remaining
            );
        }
        Ok(remaining)
    }

    // =========================================================================
    //  CADASTRO
    // =========================================================================

    pub async fn create_item(
        &self,
        new: NewInventoryItem,
        actor: &Actor,
    ) -> Result<InventoryItem, AppError> {
        let new = normalize_new_item(new)?;

        let mut uow = self.store.begin().await?;
        let result = uow.insert_item(&new).await;
        let item = finish(uow, result).await?;

        tracing::info!("📦 Item {} criado: {}", item.id, item.display_name());
        self.audit
            .record(
                actor,
                AuditAction::CreateInventoryItem,
                ENTITY,
                Some(item.id),
                json!({ "after": item }),
            )
            .await;
        Ok(item)
    }

    /// Altera cadastro (nome, qualidade, preço). A quantidade nunca passa por aqui.
    pub async fn update_item(
        &self,
        item_id: Uuid,
        patch: InventoryItemPatch,
        actor: &Actor,
    ) -> Result<InventoryItem, AppError> {
        let mut uow = self.store.begin().await?;
        let result = apply_patch(&mut *uow, item_id, patch).await;
        let (before, after) = finish(uow, result).await?;

        self.audit
            .record(
                actor,
                AuditAction::UpdateInventoryItem,
                ENTITY,
                Some(item_id),
                json!({ "before": before, "after": after }),
            )
            .await;
        Ok(after)
    }

    /// Idempotente: arquivar um item já arquivado não grava nada.
    pub async fn archive(&self, item_id: Uuid, actor: &Actor) -> Result<InventoryItem, AppError> {
        self.set_active(item_id, false, actor).await
    }

    pub async fn restore(&self, item_id: Uuid, actor: &Actor) -> Result<InventoryItem, AppError> {
        self.set_active(item_id, true, actor).await
    }

    async fn set_active(
        &self,
        item_id: Uuid,
        active: bool,
        actor: &Actor,
    ) -> Result<InventoryItem, AppError> {
        let mut uow = self.store.begin().await?;
        let result = toggle_active(&mut *uow, item_id, active).await;
        let (item, changed) = finish(uow, result).await?;

        if changed {
            let action = if active {
                AuditAction::RestoreInventoryItem
            } else {
                AuditAction::ArchiveInventoryItem
            };
            self.audit
                .record(actor, action, ENTITY, Some(item_id), json!({ "isActive": active }))
                .await;
        }
        Ok(item)
    }

    /// Exclusão definitiva. Itens com histórico de transações devem ser arquivados.
    pub async fn delete_item(&self, item_id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let mut uow = self.store.begin().await?;
        let result = remove_item(&mut *uow, item_id).await;
        let removed = finish(uow, result).await?;

        tracing::info!("🗑️ Item {} excluído", item_id);
        self.audit
            .record(
                actor,
                AuditAction::DeleteInventoryItem,
                ENTITY,
                Some(item_id),
                json!({ "before": removed }),
            )
            .await;
        Ok(())
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn get_item(&self, item_id: Uuid) -> Result<InventoryItem, AppError> {
        let mut uow = self.store.begin().await?;
        let result = uow
            .get_item(item_id)
            .await
            .and_then(|item| item.ok_or_else(|| AppError::not_found("Item de estoque", item_id)));
        finish(uow, result).await
    }

    pub async fn list_items(&self, include_inactive: bool) -> Result<Vec<InventoryItem>, AppError> {
        let mut uow = self.store.begin().await?;
        let result = uow.list_items(include_inactive).await;
        finish(uow, result).await
    }
}

fn ensure_positive(quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::InvalidInput(format!(
            "A quantidade deve ser maior que zero (recebido {})",
            quantity
        )));
    }
    Ok(())
}

/// O saldo resultante precisa caber na coluna INTEGER; estourar é erro do
/// pedido, não do banco.
async fn ensure_fits(uow: &mut dyn UnitOfWork, item_id: Uuid, delta: i32) -> Result<(), AppError> {
    let item = uow
        .lock_item(item_id)
        .await?
        .ok_or_else(|| AppError::not_found("Item de estoque", item_id))?;

    if item.quantity.checked_add(delta).is_none() {
        return Err(AppError::InvalidInput(format!(
            "Movimentação de {} unidades estoura o limite de estoque de '{}' (saldo {})",
            delta,
            item.display_name(),
            item.quantity
        )));
    }
    Ok(())
}

fn normalize_new_item(new: NewInventoryItem) -> Result<NewInventoryItem, AppError> {
    let name = required_text(&new.name, "name")?;
    let quality_tier = required_text(&new.quality_tier, "qualityTier")?;
    if new.quantity < 0 {
        return Err(AppError::InvalidInput(
            "A quantidade inicial não pode ser negativa".into(),
        ));
    }
    if new.quantity > MAX_MOVEMENT_QUANTITY {
        return Err(AppError::InvalidInput(format!(
            "A quantidade inicial passa do limite de {}",
            MAX_MOVEMENT_QUANTITY
        )));
    }
    Ok(NewInventoryItem {
        name,
        quality_tier,
        quantity: new.quantity,
        unit_price: normalize_price(new.unit_price)?,
    })
}

fn required_text(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("O campo '{}' é obrigatório", field)));
    }
    Ok(trimmed.to_string())
}

fn normalize_price(price: Decimal) -> Result<Decimal, AppError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(AppError::InvalidInput("O preço não pode ser negativo".into()));
    }
    if price > max_money() {
        return Err(AppError::InvalidInput(format!(
            "O preço passa do limite de {}",
            max_money()
        )));
    }
    Ok(price.round_dp(2))
}

async fn apply_patch(
    uow: &mut dyn UnitOfWork,
    item_id: Uuid,
    patch: InventoryItemPatch,
) -> Result<(InventoryItem, InventoryItem), AppError> {
    let before = uow
        .lock_item(item_id)
        .await?
        .ok_or_else(|| AppError::not_found("Item de estoque", item_id))?;

    let mut after = before.clone();
    if let Some(name) = patch.name {
        after.name = required_text(&name, "name")?;
    }
    if let Some(tier) = patch.quality_tier {
        after.quality_tier = required_text(&tier, "qualityTier")?;
    }
    if let Some(price) = patch.unit_price {
        after.unit_price = normalize_price(price)?;
    }

    let saved = uow.update_item(&after).await?;
    Ok((before, saved))
}

async fn toggle_active(
    uow: &mut dyn UnitOfWork,
    item_id: Uuid,
    active: bool,
) -> Result<(InventoryItem, bool), AppError> {
    let mut item = uow
        .lock_item(item_id)
        .await?
        .ok_or_else(|| AppError::not_found("Item de estoque", item_id))?;

    if item.is_active == active {
        return Ok((item, false));
    }
    item.is_active = active;
    Ok((uow.update_item(&item).await?, true))
}

async fn remove_item(uow: &mut dyn UnitOfWork, item_id: Uuid) -> Result<InventoryItem, AppError> {
    let item = uow
        .lock_item(item_id)
        .await?
        .ok_or_else(|| AppError::not_found("Item de estoque", item_id))?;

    if uow.count_transaction_items_for(item_id).await? > 0 {
        return Err(AppError::ItemHasHistory(item_id));
    }
    uow.delete_item(item_id).await?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryAuditSink, MemoryStore};
    use rust_decimal_macros::dec;

    fn ledger() -> (InventoryLedger, MemoryStore, MemoryAuditSink) {
        let store = MemoryStore::new();
        let sink = MemoryAuditSink::new();
        let ledger = InventoryLedger::new(
            Arc::new(store.clone()),
            AuditLogger::new(Arc::new(sink.clone())),
        );
        (ledger, store, sink)
    }

    fn rosa(quantity: i32) -> NewInventoryItem {
        NewInventoryItem {
            name: "Rosa".into(),
            quality_tier: "Premium".into(),
            quantity,
            unit_price: dec!(2.50),
        }
    }

    #[tokio::test]
    async fn duplicate_natural_key_conflicts_even_when_archived() {
        let (ledger, _, _) = ledger();
        let actor = Actor::new("admin");
        let item = ledger.create_item(rosa(10), &actor).await.unwrap();
        ledger.archive(item.id, &actor).await.unwrap();

        let err = ledger.create_item(rosa(3), &actor).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateItem { .. }));
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn increment_past_integer_limit_is_rejected_without_writing() {
        let (ledger, store, _) = ledger();

        // Direto na unidade de trabalho: o cadastro não aceita um saldo desses
        let mut uow = store.begin().await.unwrap();
        let item = uow.insert_item(&rosa(i32::MAX - 5)).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let err = ledger.increment(&mut *uow, item.id, 10).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(ledger.increment(&mut *uow, item.id, 5).await.unwrap(), i32::MAX);
    }

    #[tokio::test]
    async fn unchecked_release_past_integer_limit_is_rejected() {
        let (ledger, store, _) = ledger();
        let item = ledger.create_item(rosa(0), &Actor::new("admin")).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(
            ledger.release_unchecked(&mut *uow, item.id, i32::MAX).await.unwrap(),
            -i32::MAX
        );
        let err = ledger.release_unchecked(&mut *uow, item.id, 2).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn oversized_initial_quantity_and_price_are_rejected() {
        let (ledger, _, _) = ledger();
        let actor = Actor::new("admin");

        let err = ledger
            .create_item(rosa(MAX_MOVEMENT_QUANTITY + 1), &actor)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let mut pricey = rosa(1);
        pricey.unit_price = dec!(10000000000.00);
        let err = ledger.create_item(pricey, &actor).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn archive_is_idempotent() {
        let (ledger, _, sink) = ledger();
        let actor = Actor::new("admin");
        let item = ledger.create_item(rosa(10), &actor).await.unwrap();

        let once = ledger.archive(item.id, &actor).await.unwrap();
        let twice = ledger.archive(item.id, &actor).await.unwrap();

        assert!(!once.is_active);
        assert_eq!(once, twice);
        let archives = sink
            .entries()
            .into_iter()
            .filter(|e| e.action == "ARCHIVE_INVENTORY_ITEM")
            .count();
        assert_eq!(archives, 1);
    }

    #[tokio::test]
    async fn archived_items_are_hidden_unless_requested() {
        let (ledger, _, _) = ledger();
        let actor = Actor::new("admin");
        let item = ledger.create_item(rosa(10), &actor).await.unwrap();
        ledger.archive(item.id, &actor).await.unwrap();

        assert!(ledger.list_items(false).await.unwrap().is_empty());
        assert_eq!(ledger.list_items(true).await.unwrap().len(), 1);

        ledger.restore(item.id, &actor).await.unwrap();
        assert_eq!(ledger.list_items(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn decrement_reports_item_and_available_quantity() {
        let (ledger, store, _) = ledger();
        let item = ledger.create_item(rosa(5), &Actor::new("admin")).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let err = ledger
            .reserve_and_decrement(&mut *uow, item.id, 6)
            .await
            .unwrap_err();
        match err {
            AppError::InsufficientStock {
                item_name,
                requested,
                available,
                ..
            } => {
                assert_eq!(item_name, "Rosa (Premium)");
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("erro inesperado: {:?}", other),
        }

        // Várias baixas na mesma unidade enxergam o saldo já baixado
        assert_eq!(ledger.reserve_and_decrement(&mut *uow, item.id, 3).await.unwrap(), 2);
        assert!(ledger.reserve_and_decrement(&mut *uow, item.id, 3).await.is_err());
        assert_eq!(ledger.reserve_and_decrement(&mut *uow, item.id, 2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn non_positive_movements_are_rejected() {
        let (ledger, store, _) = ledger();
        let item = ledger.create_item(rosa(5), &Actor::new("admin")).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert!(matches!(
            ledger.increment(&mut *uow, item.id, 0).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.reserve_and_decrement(&mut *uow, item.id, -1).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn update_never_touches_quantity_and_rounds_price() {
        let (ledger, _, _) = ledger();
        let actor = Actor::new("admin");
        let item = ledger.create_item(rosa(7), &actor).await.unwrap();

        let updated = ledger
            .update_item(
                item.id,
                InventoryItemPatch {
                    unit_price: Some(dec!(3.456)),
                    ..Default::default()
                },
                &actor,
            )
            .await
            .unwrap();

        assert_eq!(updated.unit_price, dec!(3.46));
        assert_eq!(updated.quantity, 7);
    }

    #[tokio::test]
    async fn delete_without_history_removes_item() {
        let (ledger, _, _) = ledger();
        let actor = Actor::new("admin");
        let item = ledger.create_item(rosa(7), &actor).await.unwrap();

        ledger.delete_item(item.id, &actor).await.unwrap();

        assert!(matches!(
            ledger.get_item(item.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
