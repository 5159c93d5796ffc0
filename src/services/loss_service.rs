// src/services/loss_service.rs

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{finish, Store, UnitOfWork},
    models::{
        audit::{Actor, AuditAction},
        inventory::MAX_MOVEMENT_QUANTITY,
        loss::{InventoryLoss, NewInventoryLoss, RecordLoss},
    },
    services::{audit_service::AuditLogger, ledger::InventoryLedger},
};

const ENTITY: &str = "InventoryLoss";

#[derive(Clone)]
pub struct LossRecorder {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
    audit: AuditLogger,
}

impl LossRecorder {
    pub fn new(store: Arc<dyn Store>, ledger: InventoryLedger, audit: AuditLogger) -> Self {
        Self {
            store,
            ledger,
            audit,
        }
    }

    /// Registra a perda e baixa o estoque na mesma unidade de trabalho.
    pub async fn record_loss(
        &self,
        cmd: RecordLoss,
        actor: &Actor,
    ) -> Result<InventoryLoss, AppError> {
        let new = validate_loss(cmd, actor)?;

        let mut uow = self.store.begin().await?;
        let result = self.record_in(&mut *uow, &new).await;
        let (loss, remaining) = finish(uow, result).await?;

        tracing::info!(
            "📉 Perda {} registrada: item {} -{} (saldo {})",
            loss.id,
            loss.inventory_id,
            loss.quantity,
            remaining
        );
        self.audit
            .record(
                actor,
                AuditAction::RecordLoss,
                ENTITY,
                Some(loss.id),
                json!({ "loss": loss, "remainingQuantity": remaining }),
            )
            .await;
        Ok(loss)
    }

    async fn record_in(
        &self,
        uow: &mut dyn UnitOfWork,
        new: &NewInventoryLoss,
    ) -> Result<(InventoryLoss, i32), AppError> {
        let item = uow
            .lock_item(new.inventory_id)
            .await?
            .ok_or_else(|| AppError::not_found("Item de estoque", new.inventory_id))?;

        // Regra checada antes de qualquer escrita
        if new.quantity > item.quantity {
            return Err(AppError::InsufficientStock {
                item_id: item.id,
                item_name: item.display_name(),
                requested: i64::from(new.quantity),
                available: item.quantity,
            });
        }

        let loss = uow.insert_loss(new).await?;
        let remaining = self
            .ledger
            .reserve_and_decrement(uow, new.inventory_id, new.quantity)
            .await?;
        Ok((loss, remaining))
    }

    /// Exclui o registro e devolve a quantidade. Sem teto: a perda prova que o saldo existiu.
    pub async fn reverse_loss(&self, loss_id: Uuid, actor: &Actor) -> Result<InventoryLoss, AppError> {
        let mut uow = self.store.begin().await?;
        let result = self.reverse_in(&mut *uow, loss_id).await;
        let (loss, restored) = finish(uow, result).await?;

        tracing::info!(
            "↩️ Perda {} estornada: item {} +{} (saldo {})",
            loss.id,
            loss.inventory_id,
            loss.quantity,
            restored
        );
        self.audit
            .record(
                actor,
                AuditAction::ReverseLoss,
                ENTITY,
                Some(loss.id),
                json!({ "loss": loss, "restoredQuantity": restored }),
            )
            .await;
        Ok(loss)
    }

    async fn reverse_in(
        &self,
        uow: &mut dyn UnitOfWork,
        loss_id: Uuid,
    ) -> Result<(InventoryLoss, i32), AppError> {
        // DELETE ... RETURNING: dois estornos concorrentes não devolvem duas vezes
        let loss = uow
            .delete_loss(loss_id)
            .await?
            .ok_or_else(|| AppError::not_found("Perda", loss_id))?;

        let restored = self
            .ledger
            .increment(uow, loss.inventory_id, loss.quantity)
            .await?;
        Ok((loss, restored))
    }

    pub async fn get_loss(&self, loss_id: Uuid) -> Result<InventoryLoss, AppError> {
        let mut uow = self.store.begin().await?;
        let result = uow
            .get_loss(loss_id)
            .await
            .and_then(|loss| loss.ok_or_else(|| AppError::not_found("Perda", loss_id)));
        finish(uow, result).await
    }

    pub async fn list_losses(
        &self,
        inventory_id: Option<Uuid>,
    ) -> Result<Vec<InventoryLoss>, AppError> {
        let mut uow = self.store.begin().await?;
        let result = uow.list_losses(inventory_id).await;
        finish(uow, result).await
    }
}

fn validate_loss(cmd: RecordLoss, actor: &Actor) -> Result<NewInventoryLoss, AppError> {
    if cmd.quantity <= 0 {
        return Err(AppError::InvalidInput(
            "A quantidade perdida deve ser maior que zero".into(),
        ));
    }
    if cmd.quantity > MAX_MOVEMENT_QUANTITY {
        return Err(AppError::InvalidInput(format!(
            "A quantidade perdida passa do limite de {}",
            MAX_MOVEMENT_QUANTITY
        )));
    }
    let reason = cmd.reason.trim();
    if reason.is_empty() {
        return Err(AppError::InvalidInput("O motivo da perda é obrigatório".into()));
    }
    Ok(NewInventoryLoss {
        inventory_id: cmd.inventory_id,
        quantity: cmd.quantity,
        reason: reason.to_string(),
        notes: cmd.notes.filter(|n| !n.trim().is_empty()),
        recorded_by: actor.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryAuditSink, MemoryStore};
    use crate::models::inventory::NewInventoryItem;
    use rust_decimal_macros::dec;

    struct Fixture {
        ledger: InventoryLedger,
        recorder: LossRecorder,
        sink: MemoryAuditSink,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let sink = MemoryAuditSink::new();
        let audit = AuditLogger::new(Arc::new(sink.clone()));
        let ledger = InventoryLedger::new(store.clone(), audit.clone());
        let recorder = LossRecorder::new(store, ledger.clone(), audit);
        Fixture {
            ledger,
            recorder,
            sink,
        }
    }

    async fn item(f: &Fixture, quantity: i32) -> Uuid {
        f.ledger
            .create_item(
                NewInventoryItem {
                    name: "Lírio".into(),
                    quality_tier: "Standard".into(),
                    quantity,
                    unit_price: dec!(4.00),
                },
                &Actor::new("admin"),
            )
            .await
            .unwrap()
            .id
    }

    fn loss(inventory_id: Uuid, quantity: i32) -> RecordLoss {
        RecordLoss {
            inventory_id,
            quantity,
            reason: "Expired".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn exact_depletion_succeeds_and_one_more_fails() {
        let f = fixture();
        let actor = Actor::new("staff");
        let a = item(&f, 4).await;
        let b = item_named(&f, "Tulipa", 4).await;

        f.recorder.record_loss(loss(a, 4), &actor).await.unwrap();
        assert_eq!(f.ledger.get_item(a).await.unwrap().quantity, 0);

        let err = f.recorder.record_loss(loss(b, 5), &actor).await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert_eq!(f.ledger.get_item(b).await.unwrap().quantity, 4);
        assert!(f.recorder.list_losses(Some(b)).await.unwrap().is_empty());
    }

    async fn item_named(f: &Fixture, name: &str, quantity: i32) -> Uuid {
        f.ledger
            .create_item(
                NewInventoryItem {
                    name: name.into(),
                    quality_tier: "Standard".into(),
                    quantity,
                    unit_price: dec!(1.00),
                },
                &Actor::new("admin"),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn reversing_twice_is_not_found() {
        let f = fixture();
        let actor = Actor::new("manager");
        let id = item(&f, 10).await;
        let recorded = f.recorder.record_loss(loss(id, 3), &actor).await.unwrap();

        f.recorder.reverse_loss(recorded.id, &actor).await.unwrap();
        let err = f.recorder.reverse_loss(recorded.id, &actor).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(f.ledger.get_item(id).await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn losses_are_allowed_on_archived_items() {
        let f = fixture();
        let actor = Actor::new("admin");
        let id = item(&f, 10).await;
        f.ledger.archive(id, &actor).await.unwrap();

        f.recorder.record_loss(loss(id, 2), &actor).await.unwrap();
        assert_eq!(f.ledger.get_item(id).await.unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn blank_reason_and_zero_quantity_are_rejected() {
        let f = fixture();
        let actor = Actor::new("staff");
        let id = item(&f, 10).await;

        let mut blank = loss(id, 1);
        blank.reason = "   ".into();
        assert!(matches!(
            f.recorder.record_loss(blank, &actor).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            f.recorder.record_loss(loss(id, 0), &actor).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            f.recorder.record_loss(loss(id, i32::MAX), &actor).await,
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(f.ledger.get_item(id).await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn audit_outage_does_not_fail_the_loss() {
        let f = fixture();
        f.sink.set_failing(true);
        let id = item(&f, 10).await;

        let recorded = f
            .recorder
            .record_loss(loss(id, 1), &Actor::new("staff"))
            .await
            .unwrap();

        assert_eq!(recorded.recorded_by, "staff");
        assert_eq!(f.ledger.get_item(id).await.unwrap().quantity, 9);
    }
}
