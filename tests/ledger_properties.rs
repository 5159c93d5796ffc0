use std::sync::Arc;

use floricultura::{
    db::{MemoryAuditSink, MemoryStore, Store},
    models::{
        audit::Actor,
        inventory::NewInventoryItem,
        loss::RecordLoss,
        transaction::{CreateTransaction, LineItemRequest, PaymentMethod, TransactionType},
    },
    services::{AuditLogger, InventoryLedger, LossRecorder, TransactionEngine},
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

const ITEMS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Sale(Vec<(usize, i32)>),
    Expense(Vec<(usize, i32)>),
    Loss(usize, i32),
    DeleteTransaction(usize),
    ReverseLoss(usize),
}

fn line_items() -> impl Strategy<Value = Vec<(usize, i32)>> {
    prop::collection::vec((0..ITEMS, 1..15i32), 1..4)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => line_items().prop_map(Op::Sale),
        2 => line_items().prop_map(Op::Expense),
        2 => (0..ITEMS, 1..10i32).prop_map(|(i, q)| Op::Loss(i, q)),
        2 => any::<usize>().prop_map(Op::DeleteTransaction),
        1 => any::<usize>().prop_map(Op::ReverseLoss),
    ]
}

struct Harness {
    ledger: InventoryLedger,
    losses: LossRecorder,
    engine: TransactionEngine,
    actor: Actor,
}

fn harness() -> Harness {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let audit = AuditLogger::new(Arc::new(MemoryAuditSink::new()));
    let ledger = InventoryLedger::new(store.clone(), audit.clone());
    let losses = LossRecorder::new(store.clone(), ledger.clone(), audit.clone());
    let engine = TransactionEngine::new(store, ledger.clone(), audit);
    Harness {
        ledger,
        losses,
        engine,
        actor: Actor::new("prop"),
    }
}

fn command(kind: TransactionType, ids: &[Uuid], lines: &[(usize, i32)]) -> CreateTransaction {
    CreateTransaction {
        transaction_type: kind,
        items: lines
            .iter()
            .map(|&(i, quantity)| LineItemRequest {
                inventory_id: ids[i],
                quantity,
            })
            .collect(),
        payment_method: PaymentMethod::Cash,
        sales_agent: None,
        customer_name: None,
        notes: None,
        manual_total_amount: None,
    }
}

/// Soma pedida por item (linhas repetidas contam juntas).
fn demand(lines: &[(usize, i32)]) -> [i32; ITEMS] {
    let mut wanted = [0; ITEMS];
    for &(i, q) in lines {
        wanted[i] += q;
    }
    wanted
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// O estoque observado acompanha um modelo simples, e as baixas checadas
    /// nunca deixam saldo negativo.
    #[test]
    fn stock_matches_model(initial in prop::array::uniform3(0..20i32), ops in prop::collection::vec(op(), 1..30)) {
        runtime().block_on(async {
            let h = harness();
            let mut ids = Vec::new();
            for (n, qty) in initial.iter().enumerate() {
                let item = h.ledger.create_item(NewInventoryItem {
                    name: format!("Flor {}", n),
                    quality_tier: "Standard".into(),
                    quantity: *qty,
                    unit_price: Decimal::new(125 * (n as i64 + 1), 2),
                }, &h.actor).await.unwrap();
                ids.push(item.id);
            }

            let mut model = initial;
            let mut transactions: Vec<(Uuid, TransactionType, Vec<(usize, i32)>)> = Vec::new();
            let mut losses: Vec<(Uuid, usize, i32)> = Vec::new();

            for op in ops {
                match op {
                    Op::Sale(lines) => {
                        let wanted = demand(&lines);
                        let fits = (0..ITEMS).all(|i| wanted[i] <= model[i]);
                        let result = h.engine.create_transaction(command(TransactionType::Sale, &ids, &lines), &h.actor).await;
                        prop_assert_eq!(result.is_ok(), fits);
                        if let Ok(created) = result {
                            let sum: Decimal = created.items.iter().map(|l| l.subtotal).sum();
                            prop_assert_eq!(created.transaction.total_amount, sum);
                            for i in 0..ITEMS { model[i] -= wanted[i]; }
                            transactions.push((created.transaction.id, TransactionType::Sale, lines));
                        }
                    }
                    Op::Expense(lines) => {
                        let created = h.engine.create_transaction(command(TransactionType::Expense, &ids, &lines), &h.actor).await.unwrap();
                        let wanted = demand(&lines);
                        for i in 0..ITEMS { model[i] += wanted[i]; }
                        transactions.push((created.transaction.id, TransactionType::Expense, lines));
                    }
                    Op::Loss(i, qty) => {
                        let result = h.losses.record_loss(RecordLoss {
                            inventory_id: ids[i],
                            quantity: qty,
                            reason: "Murcha".into(),
                            notes: None,
                        }, &h.actor).await;
                        prop_assert_eq!(result.is_ok(), qty <= model[i]);
                        if let Ok(loss) = result {
                            model[i] -= qty;
                            prop_assert!(model[i] >= 0);
                            losses.push((loss.id, i, qty));
                        }
                    }
                    Op::DeleteTransaction(pick) => {
                        if transactions.is_empty() { continue; }
                        let (id, kind, lines) = transactions.remove(pick % transactions.len());
                        h.engine.delete_transaction(id, &h.actor).await.unwrap();
                        let wanted = demand(&lines);
                        for i in 0..ITEMS {
                            match kind {
                                TransactionType::Sale => model[i] += wanted[i],
                                TransactionType::Expense => model[i] -= wanted[i],
                            }
                        }
                    }
                    Op::ReverseLoss(pick) => {
                        if losses.is_empty() { continue; }
                        let (id, i, qty) = losses.remove(pick % losses.len());
                        h.losses.reverse_loss(id, &h.actor).await.unwrap();
                        model[i] += qty;
                    }
                }

                for i in 0..ITEMS {
                    prop_assert_eq!(h.ledger.get_item(ids[i]).await.unwrap().quantity, model[i]);
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Criar e excluir em seguida devolve cada item ao saldo anterior.
    #[test]
    fn create_then_delete_restores_stock(
        initial in prop::array::uniform3(0..50i32),
        lines in line_items(),
        is_sale in any::<bool>(),
    ) {
        runtime().block_on(async {
            let h = harness();
            let mut ids = Vec::new();
            for (n, qty) in initial.iter().enumerate() {
                let item = h.ledger.create_item(NewInventoryItem {
                    name: format!("Flor {}", n),
                    quality_tier: "Premium".into(),
                    quantity: *qty,
                    unit_price: Decimal::new(99, 2),
                }, &h.actor).await.unwrap();
                ids.push(item.id);
            }
            let kind = if is_sale { TransactionType::Sale } else { TransactionType::Expense };

            if let Ok(created) = h.engine.create_transaction(command(kind, &ids, &lines), &h.actor).await {
                h.engine.delete_transaction(created.transaction.id, &h.actor).await.unwrap();
            }

            for i in 0..ITEMS {
                prop_assert_eq!(h.ledger.get_item(ids[i]).await.unwrap().quantity, initial[i]);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
