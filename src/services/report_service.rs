// src/services/report_service.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{finish, Store, UnitOfWork},
    models::{
        inventory::InventoryItem,
        report::{DailySalesEntry, FinancialSummary, ReportRange, SalesAnalytics, TopItemEntry},
        transaction::{Transaction, TransactionItem, TransactionType},
    },
};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_TOP_ITEMS: usize = 5;
pub const MAX_TOP_ITEMS: usize = 50;

/// Projeções somente leitura. Recalculadas a cada chamada, sem cache.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn summary(&self, range: ReportRange) -> Result<FinancialSummary, AppError> {
        ensure_ordered(&range)?;

        let mut uow = self.store.begin().await?;
        let result = uow.transactions_in_range(&range).await;
        let rows = finish(uow, result).await?;

        Ok(summarize(&rows))
    }

    /// Sem datas, olha os últimos 30 dias.
    pub async fn analytics(
        &self,
        range: ReportRange,
        top: Option<usize>,
    ) -> Result<SalesAnalytics, AppError> {
        let range = with_default_window(range, Utc::now());
        ensure_ordered(&range)?;
        let top = top
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TOP_ITEMS)
            .min(MAX_TOP_ITEMS);

        // Uma única unidade: cabeçalhos, linhas e nomes vêm do mesmo retrato
        let mut uow = self.store.begin().await?;
        let result = load_sales(&mut *uow, &range).await;
        let (sales, lines, catalog) = finish(uow, result).await?;

        Ok(SalesAnalytics {
            daily_sales: daily_sales(&sales),
            top_items: top_items(&lines, &catalog, top),
        })
    }
}

async fn load_sales(
    uow: &mut dyn UnitOfWork,
    range: &ReportRange,
) -> Result<(Vec<Transaction>, Vec<TransactionItem>, HashMap<Uuid, InventoryItem>), AppError> {
    let sales: Vec<Transaction> = uow
        .transactions_in_range(range)
        .await?
        .into_iter()
        .filter(|tx| tx.transaction_type == TransactionType::Sale)
        .collect();
    let ids: Vec<Uuid> = sales.iter().map(|tx| tx.id).collect();
    let lines = uow.list_items_for_transactions(&ids).await?;

    let referenced: HashSet<Uuid> = lines.iter().map(|l| l.inventory_id).collect();
    let catalog = uow
        .list_items(true)
        .await?
        .into_iter()
        .filter(|item| referenced.contains(&item.id))
        .map(|item| (item.id, item))
        .collect();

    Ok((sales, lines, catalog))
}

fn ensure_ordered(range: &ReportRange) -> Result<(), AppError> {
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from >= to {
            return Err(AppError::InvalidInput(
                "O início do período deve ser anterior ao fim".into(),
            ));
        }
    }
    Ok(())
}

pub fn with_default_window(range: ReportRange, now: DateTime<Utc>) -> ReportRange {
    match (range.from, range.to) {
        (None, None) => ReportRange {
            from: Some(now - Duration::days(DEFAULT_WINDOW_DAYS)),
            to: None,
        },
        _ => range,
    }
}

pub fn summarize(rows: &[Transaction]) -> FinancialSummary {
    let mut summary = FinancialSummary {
        total_sales: Decimal::ZERO,
        total_expenses: Decimal::ZERO,
        profit: Decimal::ZERO,
        sales_count: 0,
        expense_count: 0,
        transaction_count: rows.len() as i64,
    };
    for tx in rows {
        match tx.transaction_type {
            TransactionType::Sale => {
                summary.total_sales += tx.total_amount;
                summary.sales_count += 1;
            }
            TransactionType::Expense => {
                summary.total_expenses += tx.total_amount;
                summary.expense_count += 1;
            }
        }
    }
    summary.profit = summary.total_sales - summary.total_expenses;
    summary
}

/// Vendas agrupadas pelo dia UTC de `created_at`. Só aparecem dias com venda.
pub fn daily_sales(rows: &[Transaction]) -> Vec<DailySalesEntry> {
    let mut buckets: BTreeMap<_, (Decimal, i64)> = BTreeMap::new();
    for tx in rows
        .iter()
        .filter(|tx| tx.transaction_type == TransactionType::Sale)
    {
        let bucket = buckets
            .entry(tx.created_at.date_naive())
            .or_insert((Decimal::ZERO, 0));
        bucket.0 += tx.total_amount;
        bucket.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(date, (total, count))| DailySalesEntry { date, total, count })
        .collect()
}

/// Ranking por quantidade vendida; empate decidido pela receita.
pub fn top_items(
    lines: &[TransactionItem],
    catalog: &HashMap<Uuid, InventoryItem>,
    top: usize,
) -> Vec<TopItemEntry> {
    let mut totals: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
    for line in lines {
        let entry = totals
            .entry(line.inventory_id)
            .or_insert((0, Decimal::ZERO));
        entry.0 += i64::from(line.quantity);
        entry.1 += line.subtotal;
    }

    let mut ranking: Vec<TopItemEntry> = totals
        .into_iter()
        .map(|(inventory_id, (total_quantity, total_revenue))| {
            let (item_name, quality_tier) = catalog
                .get(&inventory_id)
                .map(|i| (i.name.clone(), i.quality_tier.clone()))
                .unwrap_or_default();
            TopItemEntry {
                inventory_id,
                item_name,
                quality_tier,
                total_quantity,
                total_revenue,
            }
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then(b.total_revenue.cmp(&a.total_revenue))
            .then(a.item_name.cmp(&b.item_name))
    });
    ranking.truncate(top);
    ranking
}
