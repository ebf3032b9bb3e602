//! Inventory Reconciler
//!
//! 把库存增减收敛为按订单操作的原子事务：
//!
//! - [`InventoryReconciler::reserve`] - 下单占用库存（校验后提交，整体成败）
//! - [`InventoryReconciler::restore`] - 取消订单回补库存
//! - [`InventoryReconciler::add_stock`] / [`InventoryReconciler::reduce_stock`] - 管理员手工调整
//!
//! 扣减用 `UPDATE ... WHERE stock >= $q` 的条件更新落在存储层，
//! 并发结账同一变体时不会出现丢失更新；任何一行不满足即 THROW，
//! 整个事务回滚，不留下部分扣减。
//! `total_stock` 在同一事务内按变体现值求和重算，永不独立赋值。

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

use crate::db::models::Variant;
use crate::db::repository::{ProductRepository, RepoError, strip_table_prefix};
use crate::utils::{AppError, money, time};

/// 事务内库存不足时抛出的标记，用于把 THROW 映射回错误类型
const INSUFFICIENT_STOCK_MARKER: &str = "insufficient_stock";

/// Inventory reconciler errors
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<RepoError> for InventoryError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => InventoryError::NotFound(msg),
            RepoError::Validation(msg) => InventoryError::Validation(msg),
            RepoError::Duplicate(msg) | RepoError::Database(msg) => InventoryError::Database(msg),
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(msg) => AppError::NotFound(msg),
            InventoryError::InsufficientStock(msg) => AppError::InsufficientStock(msg),
            InventoryError::Validation(msg) => AppError::Validation(msg),
            InventoryError::Database(msg) => AppError::Database(msg),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// A requested line: which variant of which product, how many
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LineItemInput {
    pub product_id: String,
    pub variant_id: String,
    pub quantity: i64,
}

/// Composite identity of a purchasable line within one checkout
///
/// 同一次结账里重复出现的 (product, variant) 合并为一行后再校验，
/// 避免两个松散 id 的逐一比对。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub product_id: String,
    pub variant_id: String,
}

impl VariantKey {
    fn of(line: &LineItemInput) -> Self {
        Self {
            product_id: strip_table_prefix("product", &line.product_id).to_string(),
            variant_id: strip_table_prefix("variant", &line.variant_id).to_string(),
        }
    }
}

/// A validated line with the price snapshot captured at reservation time
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: String,
    pub variant_id: String,
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// `variant.price` at this instant — becomes the immutable order item snapshot
    pub unit_price: f64,
    pub quantity: i64,
}

/// Result of a successful reservation
#[derive(Debug, Clone)]
pub struct Reservation {
    pub lines: Vec<PricedLine>,
    pub total_amount: f64,
}

#[derive(Clone)]
pub struct InventoryReconciler {
    db: Surreal<Db>,
}

impl InventoryReconciler {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    /// Merge duplicate (product, variant) lines and validate quantities
    pub(crate) fn merge_lines(lines: &[LineItemInput]) -> InventoryResult<Vec<LineItemInput>> {
        if lines.is_empty() {
            return Err(InventoryError::Validation(
                "order must contain at least one item".into(),
            ));
        }

        let mut merged: Vec<LineItemInput> = Vec::new();
        let mut index: HashMap<VariantKey, usize> = HashMap::new();

        for line in lines {
            if line.quantity <= 0 {
                return Err(InventoryError::Validation(format!(
                    "quantity must be positive, got {}",
                    line.quantity
                )));
            }
            if line.quantity > money::MAX_QUANTITY {
                return Err(InventoryError::Validation(format!(
                    "quantity exceeds maximum allowed ({})",
                    money::MAX_QUANTITY
                )));
            }

            let key = VariantKey::of(line);
            match index.get(&key) {
                Some(&i) => merged[i].quantity += line.quantity,
                None => {
                    index.insert(key.clone(), merged.len());
                    merged.push(LineItemInput {
                        product_id: key.product_id,
                        variant_id: key.variant_id,
                        quantity: line.quantity,
                    });
                }
            }
        }
        Ok(merged)
    }

    /// Reserve stock for a checkout
    ///
    /// 两阶段：先对所有行做纯校验（存在性、归属、库存充足），任何一行
    /// 失败立即返回且无副作用；全部通过后在一个事务里条件扣减并重算
    /// `total_stock`。校验与提交之间若被并发结账抢先，条件更新落空，
    /// 事务回滚并返回 `InsufficientStock`。
    pub async fn reserve(&self, lines: &[LineItemInput]) -> InventoryResult<Reservation> {
        let merged = Self::merge_lines(lines)?;
        let repo = ProductRepository::new(self.db.clone());

        // Phase 1: validate everything, capture price snapshots
        let mut priced: Vec<PricedLine> = Vec::with_capacity(merged.len());
        for line in &merged {
            let product = repo
                .find_by_id(&line.product_id)
                .await?
                .ok_or_else(|| {
                    InventoryError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            let variant = self.find_owned_variant(&repo, line, &product.name).await?;

            if variant.stock < line.quantity {
                return Err(InventoryError::InsufficientStock(format!(
                    "Insufficient stock for {} (SKU {})",
                    product.name, variant.sku
                )));
            }

            priced.push(PricedLine {
                product_id: line.product_id.clone(),
                variant_id: line.variant_id.clone(),
                sku: variant.sku,
                color: variant.color,
                size: variant.size,
                unit_price: variant.price,
                quantity: line.quantity,
            });
        }

        // Phase 2: one transaction, all-or-nothing
        let (sql, binds) = Self::decrement_statements(&merged);
        let result = self.db.query(sql).bind(binds).await;
        match result.and_then(|r| r.check()) {
            Ok(_) => {}
            Err(e) => {
                let msg = e.to_string();
                if msg.contains(INSUFFICIENT_STOCK_MARKER) {
                    // Lost the race against a concurrent checkout
                    return Err(InventoryError::InsufficientStock(
                        "Insufficient stock (concurrent checkout)".into(),
                    ));
                }
                return Err(InventoryError::Database(msg));
            }
        }

        let total = priced
            .iter()
            .map(|l| money::line_total(l.unit_price, l.quantity))
            .sum();

        tracing::debug!(lines = priced.len(), total = %total, "Stock reserved");

        Ok(Reservation {
            lines: priced,
            total_amount: money::to_f64(total),
        })
    }

    /// Restore previously reserved stock (order cancellation)
    ///
    /// 逆操作：同一事务内逐行加回并重算 `total_stock`。调用方负责
    /// 不对同一订单触发两次 —— 由订单状态的条件流转保证。
    /// 已被删除的变体/商品行自然跳过（条件更新无目标即无操作）。
    pub async fn restore(&self, lines: &[LineItemInput]) -> InventoryResult<()> {
        let merged = Self::merge_lines(lines)?;
        let (sql, binds) = Self::increment_statements(&merged);
        self.db
            .query(sql)
            .bind(binds)
            .await
            .map_err(|e| InventoryError::Database(e.to_string()))?
            .check()
            .map_err(|e| InventoryError::Database(e.to_string()))?;
        tracing::debug!(lines = merged.len(), "Stock restored");
        Ok(())
    }

    /// Admin stock addition
    pub async fn add_stock(
        &self,
        product_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> InventoryResult<Variant> {
        if quantity <= 0 {
            return Err(InventoryError::Validation(
                "quantity must be positive".into(),
            ));
        }
        self.adjust(product_id, variant_id, quantity).await
    }

    /// Admin stock reduction; fails without applying when stock would go negative
    pub async fn reduce_stock(
        &self,
        product_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> InventoryResult<Variant> {
        if quantity <= 0 {
            return Err(InventoryError::Validation(
                "quantity must be positive".into(),
            ));
        }
        self.adjust(product_id, variant_id, -quantity).await
    }

    async fn adjust(
        &self,
        product_id: &str,
        variant_id: &str,
        delta: i64,
    ) -> InventoryResult<Variant> {
        let repo = ProductRepository::new(self.db.clone());
        let product = repo.find_by_id(product_id).await?.ok_or_else(|| {
            InventoryError::NotFound(format!("Product {} not found", product_id))
        })?;
        let line = LineItemInput {
            product_id: strip_table_prefix("product", product_id).to_string(),
            variant_id: strip_table_prefix("variant", variant_id).to_string(),
            quantity: delta.abs(),
        };
        let variant = self.find_owned_variant(&repo, &line, &product.name).await?;

        if delta < 0 && variant.stock < -delta {
            return Err(InventoryError::InsufficientStock(format!(
                "Insufficient stock to reduce for {} (SKU {})",
                product.name, variant.sku
            )));
        }

        let lines = [line];
        let (sql, binds) = if delta < 0 {
            Self::decrement_statements(&lines)
        } else {
            Self::increment_statements(&lines)
        };
        match self.db.query(sql).bind(binds).await.and_then(|r| r.check()) {
            Ok(_) => {}
            Err(e) => {
                let msg = e.to_string();
                if msg.contains(INSUFFICIENT_STOCK_MARKER) {
                    return Err(InventoryError::InsufficientStock(format!(
                        "Insufficient stock to reduce for {} (SKU {})",
                        product.name, variant.sku
                    )));
                }
                return Err(InventoryError::Database(msg));
            }
        }

        let updated = repo
            .find_variant(&lines[0].variant_id)
            .await?
            .ok_or_else(|| {
                InventoryError::NotFound(format!("Variant {} not found", variant_id))
            })?;
        Ok(updated)
    }

    /// Fetch a variant and verify it belongs to the expected product
    async fn find_owned_variant(
        &self,
        repo: &ProductRepository,
        line: &LineItemInput,
        product_name: &str,
    ) -> InventoryResult<Variant> {
        let variant = repo.find_variant(&line.variant_id).await?.ok_or_else(|| {
            InventoryError::NotFound(format!("Variant {} not found", line.variant_id))
        })?;
        let owner = strip_table_prefix("product", &line.product_id);
        if variant.product.id.to_raw() != owner {
            return Err(InventoryError::NotFound(format!(
                "Variant {} does not belong to {}",
                line.variant_id, product_name
            )));
        }
        Ok(variant)
    }

    /// Conditional decrement transaction: per-line compare-and-decrement,
    /// THROW on any shortfall, per-product `total_stock` recompute.
    fn decrement_statements(lines: &[LineItemInput]) -> (String, Map<String, Value>) {
        let (body, binds) = Self::decrement_body(lines);
        (format!("BEGIN TRANSACTION;\n{body}COMMIT TRANSACTION;\n"), binds)
    }

    /// Increment transaction (restore / admin add), same recompute rule
    fn increment_statements(lines: &[LineItemInput]) -> (String, Map<String, Value>) {
        let (body, binds) = Self::increment_body(lines);
        (format!("BEGIN TRANSACTION;\n{body}COMMIT TRANSACTION;\n"), binds)
    }

    fn decrement_body(lines: &[LineItemInput]) -> (String, Map<String, Value>) {
        let mut sql = String::new();
        let mut binds = Map::new();

        for (i, line) in lines.iter().enumerate() {
            sql.push_str(&format!(
                "LET $r{i} = (UPDATE type::thing('variant', $v{i}) \
                 SET stock -= $q{i} WHERE stock >= $q{i} RETURN AFTER);\n\
                 IF count($r{i}) < 1 {{ THROW '{INSUFFICIENT_STOCK_MARKER}' }};\n"
            ));
            binds.insert(format!("v{i}"), json!(line.variant_id));
            binds.insert(format!("q{i}"), json!(line.quantity));
        }

        Self::push_total_stock_recompute(&mut sql, &mut binds, lines);
        (sql, binds)
    }

    /// Statement body for restoring stock; the order ledger embeds this into
    /// its cancellation transaction so the status flip and the restore commit
    /// or roll back together.
    pub(crate) fn increment_body(lines: &[LineItemInput]) -> (String, Map<String, Value>) {
        let mut sql = String::new();
        let mut binds = Map::new();

        for (i, line) in lines.iter().enumerate() {
            sql.push_str(&format!(
                "UPDATE type::thing('variant', $v{i}) SET stock += $q{i};\n"
            ));
            binds.insert(format!("v{i}"), json!(line.variant_id));
            binds.insert(format!("q{i}"), json!(line.quantity));
        }

        Self::push_total_stock_recompute(&mut sql, &mut binds, lines);
        (sql, binds)
    }

    fn push_total_stock_recompute(
        sql: &mut String,
        binds: &mut Map<String, Value>,
        lines: &[LineItemInput],
    ) {
        let mut seen: Vec<&str> = Vec::new();
        for line in lines {
            if !seen.contains(&line.product_id.as_str()) {
                seen.push(&line.product_id);
            }
        }
        for (j, product_id) in seen.iter().enumerate() {
            sql.push_str(&format!(
                "UPDATE type::thing('product', $p{j}) SET \
                 total_stock = math::sum((SELECT VALUE stock FROM variant \
                 WHERE product = type::thing('product', $p{j}))), \
                 updated_at = $ts;\n"
            ));
            binds.insert(format!("p{j}"), json!(product_id));
        }
        binds.insert("ts".to_string(), json!(time::now_millis()));
    }
}
