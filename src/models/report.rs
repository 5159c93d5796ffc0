// src/models/report.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Janela de datas: `from` inclusivo, `to` exclusivo. `None` = sem limite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReportRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at < to)
    }
}

// 1. Resumo financeiro (os cards do topo)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_sales: Decimal,
    pub total_expenses: Decimal,
    pub profit: Decimal,
    pub sales_count: i64,
    pub expense_count: i64,
    pub transaction_count: i64,
}

// 2. Série diária de vendas (dia UTC)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesEntry {
    pub date: NaiveDate,
    pub total: Decimal,
    pub count: i64,
}

// 3. Ranking de itens vendidos
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopItemEntry {
    pub inventory_id: Uuid,
    pub item_name: String,
    pub quality_tier: String,
    pub total_quantity: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalytics {
    pub daily_sales: Vec<DailySalesEntry>,
    pub top_items: Vec<TopItemEntry>,
}
