//! Stats Aggregator
//!
//! 只读统计：订单数、营收、销量、状态分布、月度曲线、按商品销量。
//! 所有指标都排除已取消订单，包括状态分布。
//! 订单行内嵌快照，按商品聚合直接在内存里折叠，不再回表扫变体。

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use chrono::{Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::models::{Order, OrderStatus};
use crate::db::repository::ProductRepository;
use crate::utils::{AppError, AppResult, money};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Optional inclusive [start, end] range in Unix millis
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl StatsRange {
    fn contains(&self, ts: i64) -> bool {
        self.start.is_none_or(|s| ts >= s) && self.end.is_none_or(|e| ts <= e)
    }
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: &'static str,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct MonthlyBucket {
    pub month: &'static str,
    pub orders: u64,
    pub revenue: f64,
}

#[derive(Debug, Serialize)]
pub struct ProductSales {
    pub product_id: String,
    pub name: String,
    pub quantity_sold: i64,
}

/// Aggregated sales report
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub total_orders: u64,
    pub total_revenue: f64,
    pub total_items_sold: i64,
    pub status_counts: Vec<StatusCount>,
    pub monthly: Vec<MonthlyBucket>,
    pub product_sales: Vec<ProductSales>,
}

#[derive(Clone)]
pub struct StatsAggregator {
    db: Surreal<Db>,
}

impl StatsAggregator {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    /// Build the sales report over the given range
    pub async fn report(&self, range: StatsRange) -> AppResult<StatsReport> {
        let orders: Vec<Order> = self
            .db
            .query("SELECT * FROM orders ORDER BY created_at ASC")
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .take(0)
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut total_orders = 0u64;
        let mut total_revenue = Decimal::ZERO;
        let mut total_items = 0i64;
        let mut by_status: HashMap<&'static str, u64> = HashMap::new();
        let mut monthly_orders = [0u64; 12];
        let mut monthly_revenue = [Decimal::ZERO; 12];
        let mut quantities: HashMap<String, i64> = HashMap::new();

        for order in orders.iter().filter(|o| range.contains(o.created_at)) {
            // 已取消订单不计入任何指标，状态分布也一样
            if order.status == OrderStatus::Cancelled {
                continue;
            }

            *by_status.entry(order.status.as_str()).or_default() += 1;
            total_orders += 1;
            let amount = money::to_decimal(order.total_amount);
            total_revenue += amount;

            if let Some(dt) = Utc.timestamp_millis_opt(order.created_at).single() {
                let m = dt.month0() as usize;
                monthly_orders[m] += 1;
                monthly_revenue[m] += amount;
            }

            for item in &order.items {
                total_items += item.quantity;
                *quantities.entry(item.product.id.to_raw()).or_default() += item.quantity;
            }
        }

        let status_counts = [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ]
        .into_iter()
        .map(|s| StatusCount {
            status: s.as_str(),
            count: by_status.get(s.as_str()).copied().unwrap_or(0),
        })
        .collect();

        let monthly = MONTHS
            .iter()
            .enumerate()
            .map(|(i, month)| MonthlyBucket {
                month,
                orders: monthly_orders[i],
                revenue: money::to_f64(monthly_revenue[i]),
            })
            .collect();

        let product_sales = self.resolve_product_names(quantities).await?;

        Ok(StatsReport {
            total_orders,
            total_revenue: money::to_f64(total_revenue),
            total_items_sold: total_items,
            status_counts,
            monthly,
            product_sales,
        })
    }

    /// Resolve product names for the aggregated quantities, best sellers first.
    /// Products deleted since the orders were placed keep their id as the label.
    async fn resolve_product_names(
        &self,
        quantities: HashMap<String, i64>,
    ) -> AppResult<Vec<ProductSales>> {
        let repo = ProductRepository::new(self.db.clone());
        let mut sales = Vec::with_capacity(quantities.len());
        for (product_id, quantity_sold) in quantities {
            let name = match repo.find_by_id(&product_id).await? {
                Some(product) => product.name,
                None => product_id.clone(),
            };
            sales.push(ProductSales {
                product_id,
                name,
                quantity_sold,
            });
        }
        sales.sort_by(|a, b| {
            b.quantity_sold
                .cmp(&a.quantity_sold)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        Ok(sales)
    }
}
