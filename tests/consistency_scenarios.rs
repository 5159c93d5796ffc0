use std::sync::Arc;

use floricultura::{
    common::error::AppError,
    db::{MemoryAuditSink, MemoryStore, Store},
    models::{
        audit::Actor,
        inventory::NewInventoryItem,
        loss::RecordLoss,
        report::ReportRange,
        transaction::{CreateTransaction, LineItemRequest, PaymentMethod, TransactionType},
    },
    services::{AuditLogger, InventoryLedger, LossRecorder, ReportService, TransactionEngine},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

struct Shop {
    store: MemoryStore,
    audit_sink: MemoryAuditSink,
    ledger: InventoryLedger,
    losses: LossRecorder,
    engine: TransactionEngine,
    reports: ReportService,
    actor: Actor,
}

fn shop() -> Shop {
    let store = MemoryStore::new();
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let audit_sink = MemoryAuditSink::new();
    let audit = AuditLogger::new(Arc::new(audit_sink.clone()));
    let ledger = InventoryLedger::new(shared.clone(), audit.clone());
    let losses = LossRecorder::new(shared.clone(), ledger.clone(), audit.clone());
    let engine = TransactionEngine::new(shared.clone(), ledger.clone(), audit);
    let reports = ReportService::new(shared);
    Shop {
        store,
        audit_sink,
        ledger,
        losses,
        engine,
        reports,
        actor: Actor::new("user-1"),
    }
}

impl Shop {
    async fn item(&self, name: &str, quantity: i32, unit_price: Decimal) -> Uuid {
        self.ledger
            .create_item(
                NewInventoryItem {
                    name: name.into(),
                    quality_tier: "Premium".into(),
                    quantity,
                    unit_price,
                },
                &self.actor,
            )
            .await
            .unwrap()
            .id
    }

    async fn quantity(&self, id: Uuid) -> i32 {
        self.ledger.get_item(id).await.unwrap().quantity
    }

    async fn create(
        &self,
        kind: TransactionType,
        lines: &[(Uuid, i32)],
    ) -> Result<floricultura::models::transaction::TransactionWithItems, AppError> {
        self.engine
            .create_transaction(
                CreateTransaction {
                    transaction_type: kind,
                    items: lines
                        .iter()
                        .map(|&(inventory_id, quantity)| LineItemRequest {
                            inventory_id,
                            quantity,
                        })
                        .collect(),
                    payment_method: PaymentMethod::Cash,
                    sales_agent: None,
                    customer_name: None,
                    notes: None,
                    manual_total_amount: None,
                },
                &self.actor,
            )
            .await
    }
}

#[tokio::test]
async fn sale_decrements_stock_and_delete_restores_it() {
    let shop = shop();
    let rosa = shop.item("Rosa", 50, dec!(2.50)).await;

    let sale = shop.create(TransactionType::Sale, &[(rosa, 12)]).await.unwrap();
    assert_eq!(sale.transaction.total_amount, dec!(30.00));
    assert_eq!(shop.quantity(rosa).await, 38);

    shop.engine
        .delete_transaction(sale.transaction.id, &shop.actor)
        .await
        .unwrap();

    assert_eq!(shop.quantity(rosa).await, 50);
    let gone = shop.engine.get_transaction(sale.transaction.id).await.unwrap_err();
    assert!(matches!(gone, AppError::NotFound { .. }));
    let again = shop
        .engine
        .delete_transaction(sale.transaction.id, &shop.actor)
        .await
        .unwrap_err();
    assert_eq!(again.code(), "NOT_FOUND");
}

#[tokio::test]
async fn oversell_is_rejected_with_available_quantity() {
    let shop = shop();
    let rosa = shop.item("Rosa", 5, dec!(2.50)).await;

    let err = shop.create(TransactionType::Sale, &[(rosa, 6)]).await.unwrap_err();

    match &err {
        AppError::InsufficientStock {
            item_id,
            requested,
            available,
            ..
        } => {
            assert_eq!(*item_id, rosa);
            assert_eq!(*requested, 6);
            assert_eq!(*available, 5);
        }
        other => panic!("erro inesperado: {:?}", other),
    }
    assert!(err.to_string().contains("Rosa (Premium)"));
    assert_eq!(shop.quantity(rosa).await, 5);
}

#[tokio::test]
async fn exact_depletion_leaves_zero() {
    let shop = shop();
    let rosa = shop.item("Rosa", 7, dec!(1.00)).await;

    shop.create(TransactionType::Sale, &[(rosa, 7)]).await.unwrap();

    assert_eq!(shop.quantity(rosa).await, 0);
}

#[tokio::test]
async fn oversized_quantities_are_client_errors() {
    let shop = shop();
    let rosa = shop.item("Rosa", 10, dec!(2.50)).await;

    let err = shop
        .create(
            TransactionType::Sale,
            &[(rosa, 1_500_000_000), (rosa, 1_500_000_000)],
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = shop
        .create(TransactionType::Expense, &[(rosa, i32::MAX)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    assert_eq!(shop.quantity(rosa).await, 10);
    let listed = shop.engine.list_transactions(Default::default()).await.unwrap();
    assert_eq!(listed.total, 0);
}

#[tokio::test]
async fn loss_and_reversal_round_trip() {
    let shop = shop();
    let lirio = shop.item("Lírio", 20, dec!(4.00)).await;

    let loss = shop
        .losses
        .record_loss(
            RecordLoss {
                inventory_id: lirio,
                quantity: 5,
                reason: "Expired".into(),
                notes: None,
            },
            &shop.actor,
        )
        .await
        .unwrap();
    assert_eq!(shop.quantity(lirio).await, 15);
    assert_eq!(loss.recorded_by, "user-1");
    assert_eq!(shop.losses.get_loss(loss.id).await.unwrap().reason, "Expired");

    shop.losses.reverse_loss(loss.id, &shop.actor).await.unwrap();

    assert_eq!(shop.quantity(lirio).await, 20);
    assert!(matches!(
        shop.losses.get_loss(loss.id).await,
        Err(AppError::NotFound { .. })
    ));
}

#[tokio::test]
async fn multi_line_sale_is_all_or_nothing() {
    let shop = shop();
    let a = shop.item("Girassol", 10, dec!(3.00)).await;
    let b = shop.item("Orquídea", 1, dec!(30.00)).await;

    let err = shop
        .create(TransactionType::Sale, &[(a, 5), (b, 2)])
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { item_id, .. } if item_id == b));
    assert_eq!(shop.quantity(a).await, 10);
    assert_eq!(shop.quantity(b).await, 1);
    let listed = shop
        .engine
        .list_transactions(Default::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 0);
}

#[tokio::test]
async fn expense_has_no_sufficiency_check() {
    let shop = shop();
    let rosa = shop.item("Rosa", 5, dec!(2.50)).await;

    let expense = shop
        .create(TransactionType::Expense, &[(rosa, 100)])
        .await
        .unwrap();

    assert_eq!(shop.quantity(rosa).await, 105);
    assert_eq!(expense.transaction.total_amount, dec!(250.00));

    shop.engine
        .delete_transaction(expense.transaction.id, &shop.actor)
        .await
        .unwrap();
    assert_eq!(shop.quantity(rosa).await, 5);
}

#[tokio::test]
async fn item_with_history_must_be_archived() {
    let shop = shop();
    let rosa = shop.item("Rosa", 10, dec!(2.50)).await;
    shop.create(TransactionType::Sale, &[(rosa, 1)]).await.unwrap();

    let err = shop.ledger.delete_item(rosa, &shop.actor).await.unwrap_err();
    assert_eq!(err.code(), "HAS_HISTORY");

    shop.ledger.archive(rosa, &shop.actor).await.unwrap();
    let err = shop.create(TransactionType::Sale, &[(rosa, 1)]).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn infrastructure_failure_mid_create_leaves_no_trace() {
    let shop = shop();
    let a = shop.item("Rosa", 10, dec!(2.50)).await;
    let b = shop.item("Tulipa", 10, dec!(1.50)).await;
    shop.store.fail_transaction_item_inserts(true);

    let err = shop
        .create(TransactionType::Sale, &[(a, 2), (b, 3)])
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PERSISTENCE_ERROR");
    shop.store.fail_transaction_item_inserts(false);
    assert_eq!(shop.quantity(a).await, 10);
    assert_eq!(shop.quantity(b).await, 10);
    assert!(shop
        .audit_sink
        .entries()
        .iter()
        .all(|e| e.action != "CREATE_TRANSACTION"));
}

#[tokio::test]
async fn concurrent_sales_never_oversell() {
    let shop = shop();
    let rosa = shop.item("Rosa", 10, dec!(1.00)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = shop.engine.clone();
        let actor = shop.actor.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_transaction(
                    CreateTransaction {
                        transaction_type: TransactionType::Sale,
                        items: vec![LineItemRequest {
                            inventory_id: rosa,
                            quantity: 3,
                        }],
                        payment_method: PaymentMethod::Cash,
                        sales_agent: None,
                        customer_name: None,
                        notes: None,
                        manual_total_amount: None,
                    },
                    &actor,
                )
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert_eq!(e.code(), "INSUFFICIENT_STOCK"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(shop.quantity(rosa).await, 1);
}

#[tokio::test]
async fn audit_outage_never_blocks_business_operations() {
    let shop = shop();
    shop.audit_sink.set_failing(true);
    let rosa = shop.item("Rosa", 10, dec!(2.50)).await;

    let sale = shop.create(TransactionType::Sale, &[(rosa, 4)]).await.unwrap();
    shop.engine
        .delete_transaction(sale.transaction.id, &shop.actor)
        .await
        .unwrap();

    assert_eq!(shop.quantity(rosa).await, 10);
    assert!(shop.audit_sink.entries().is_empty());
}

#[tokio::test]
async fn reports_reflect_committed_transactions() {
    let shop = shop();
    let rosa = shop.item("Rosa", 50, dec!(2.50)).await;
    let tulipa = shop.item("Tulipa", 50, dec!(5.00)).await;

    shop.create(TransactionType::Sale, &[(rosa, 4), (tulipa, 1)])
        .await
        .unwrap();
    shop.create(TransactionType::Sale, &[(rosa, 2)]).await.unwrap();
    shop.create(TransactionType::Expense, &[(tulipa, 10)])
        .await
        .unwrap();

    let summary = shop.reports.summary(ReportRange::default()).await.unwrap();
    assert_eq!(summary.total_sales, dec!(20.00));
    assert_eq!(summary.total_expenses, dec!(50.00));
    assert_eq!(summary.profit, dec!(-30.00));
    assert_eq!(summary.sales_count, 2);

    let analytics = shop.reports.analytics(ReportRange::default(), None).await.unwrap();
    assert_eq!(analytics.daily_sales.len(), 1);
    assert_eq!(analytics.daily_sales[0].total, dec!(20.00));
    assert_eq!(analytics.top_items[0].inventory_id, rosa);
    assert_eq!(analytics.top_items[0].total_quantity, 6);
    assert_eq!(analytics.top_items[0].item_name, "Rosa");
    assert_eq!(analytics.top_items[1].total_revenue, dec!(5.00));
}
