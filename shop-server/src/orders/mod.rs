//! Order Ledger
//!
//! 订单记录的唯一所有者：创建、状态机流转、取消。
//!
//! - 行项目价格在 [`OrderLedger::create`] 时落成快照，`total_amount`
//!   一次算定，此后永不重算。
//! - 状态流转是条件更新（按当前状态写入），并发流转只有一个成功。
//! - 取消与库存回补在同一事务内提交：回补失败则状态不变，
//!   条件翻转落空则说明已被并发取消/推进，不会二次回补。

#[cfg(test)]
mod tests;

use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

use crate::auth::CurrentUser;
use crate::db::models::{
    Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Shipping,
};
use crate::db::repository::{
    OrderRepository, ProductRepository, RepoError, make_thing, strip_table_prefix,
};
use crate::inventory::{InventoryError, InventoryReconciler, LineItemInput, PricedLine};
use crate::utils::{AppError, money, time};

/// 取消事务内条件翻转落空时抛出的标记
const TRANSITION_MISSED_MARKER: &str = "transition_missed";

/// Order ledger errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<RepoError> for OrderError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => OrderError::NotFound(msg),
            RepoError::Validation(msg) => OrderError::Validation(msg),
            RepoError::Duplicate(msg) => OrderError::Conflict(msg),
            RepoError::Database(msg) => OrderError::Database(msg),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(msg) => AppError::NotFound(msg),
            OrderError::InvalidTransition(msg) => AppError::InvalidTransition(msg),
            OrderError::Forbidden(msg) => AppError::Forbidden(msg),
            OrderError::Validation(msg) => AppError::Validation(msg),
            OrderError::Conflict(msg) => AppError::Conflict(msg),
            OrderError::Inventory(e) => e.into(),
            OrderError::Database(msg) => AppError::Database(msg),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

#[derive(Clone)]
pub struct OrderLedger {
    db: Surreal<Db>,
}

impl OrderLedger {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    /// Create an order from reserved, priced lines
    ///
    /// 保留阶段应已拦截缺失的商品/变体；提交前仍复核一遍引用完整性。
    pub async fn create(
        &self,
        user_id: &str,
        lines: &[PricedLine],
        shipping: Shipping,
        payment_method: PaymentMethod,
        order_notes: Option<String>,
    ) -> OrderResult<Order> {
        if lines.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".into(),
            ));
        }

        // Referential integrity re-check before commit
        let product_repo = ProductRepository::new(self.db.clone());
        for line in lines {
            if product_repo.find_by_id(&line.product_id).await?.is_none() {
                return Err(OrderError::Validation(format!(
                    "Product {} no longer exists",
                    line.product_id
                )));
            }
            if product_repo.find_variant(&line.variant_id).await?.is_none() {
                return Err(OrderError::Validation(format!(
                    "Variant {} no longer exists",
                    line.variant_id
                )));
            }
        }

        let items: Vec<OrderItem> = lines
            .iter()
            .map(|l| OrderItem {
                product: make_thing("product", &l.product_id),
                variant_id: strip_table_prefix("variant", &l.variant_id).to_string(),
                sku: l.sku.clone(),
                color: l.color.clone(),
                size: l.size.clone(),
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();

        // Computed once from the reserved unit prices; never recomputed
        let total = lines
            .iter()
            .map(|l| money::line_total(l.unit_price, l.quantity))
            .sum();

        let now = time::now_millis();
        let order = Order {
            id: None,
            user: user_id.to_string(),
            items,
            total_amount: money::to_f64(total),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping,
            payment_method,
            order_notes,
            created_at: now,
            updated_at: now,
        };

        let repo = OrderRepository::new(self.db.clone());
        let created = repo.create(order).await?;
        tracing::info!(
            order_id = %created.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            total = created.total_amount,
            "Order placed"
        );
        Ok(created)
    }

    /// Find order by id
    pub async fn find_by_id(&self, id: &str) -> OrderResult<Order> {
        OrderRepository::new(self.db.clone())
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {} not found", id)))
    }

    /// Order visible to the actor: admins see everything, users their own
    pub async fn find_for_actor(&self, id: &str, actor: &CurrentUser) -> OrderResult<Order> {
        let order = self.find_by_id(id).await?;
        if !actor.is_admin() && !actor.owns(&order.user) {
            return Err(OrderError::Forbidden(
                "Not authorized to view this order".into(),
            ));
        }
        Ok(order)
    }

    /// Orders visible to the actor: own orders, or everything for admins
    pub async fn list_for_actor(&self, actor: &CurrentUser) -> OrderResult<Vec<Order>> {
        let repo = OrderRepository::new(self.db.clone());
        let orders = if actor.is_admin() {
            repo.find_all().await?
        } else {
            repo.find_by_user(&actor.user_id).await?
        };
        Ok(orders)
    }

    /// Hard delete (admin maintenance; does not restore stock)
    pub async fn delete(&self, id: &str, actor: &CurrentUser) -> OrderResult<()> {
        if !actor.is_admin() {
            return Err(OrderError::Forbidden(
                "Only administrators can delete orders".into(),
            ));
        }
        OrderRepository::new(self.db.clone()).delete(id).await?;
        Ok(())
    }

    /// Apply a status transition (admin operation)
    ///
    /// `Cancelled` 目标交给 [`cancel`](Self::cancel)，因为它要连带回补库存。
    pub async fn transition(
        &self,
        id: &str,
        next: OrderStatus,
        actor: &CurrentUser,
    ) -> OrderResult<Order> {
        if next == OrderStatus::Cancelled {
            return self.cancel(id, actor).await;
        }

        let order = self.find_by_id(id).await?;
        if !order.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition(format!(
                "Cannot move order from {} to {}",
                order.status.as_str(),
                next.as_str()
            )));
        }

        let repo = OrderRepository::new(self.db.clone());
        match repo.transition_status(id, order.status, next).await? {
            Some(updated) => {
                tracing::info!(order_id = %id, status = next.as_str(), "Order status updated");
                Ok(updated)
            }
            // The conditional update missed: someone else moved the order first
            None => Err(OrderError::Conflict(
                "Order status changed concurrently".into(),
            )),
        }
    }

    /// Cancel an order and restore its stock in one transaction
    ///
    /// Policy: user cancel requires ownership and `Pending` exactly;
    /// admin cancel also covers `Processing`. Never possible from
    /// `Delivered`.
    pub async fn cancel(&self, id: &str, actor: &CurrentUser) -> OrderResult<Order> {
        let order = self.find_by_id(id).await?;

        if !actor.is_admin() && !actor.owns(&order.user) {
            return Err(OrderError::Forbidden(
                "Not authorized to cancel this order".into(),
            ));
        }

        let allowed: &[OrderStatus] = if actor.is_admin() {
            &[OrderStatus::Pending, OrderStatus::Processing]
        } else {
            &[OrderStatus::Pending]
        };

        if !allowed.contains(&order.status) {
            let msg = match order.status {
                OrderStatus::Delivered => "Delivered orders cannot be cancelled".to_string(),
                OrderStatus::Cancelled => "Order is already cancelled".to_string(),
                _ if !actor.is_admin() => "Only pending orders can be cancelled".to_string(),
                other => format!("Cannot cancel order in status {}", other.as_str()),
            };
            return Err(OrderError::InvalidTransition(msg));
        }

        // One transaction: conditional flip to Cancelled guards against a
        // duplicate cancel racing us, then the stock restore. Either both
        // commit or neither does.
        let lines: Vec<LineItemInput> = order
            .items
            .iter()
            .map(|item| LineItemInput {
                product_id: item.product.id.to_raw(),
                variant_id: item.variant_id.clone(),
                quantity: item.quantity,
            })
            .collect();
        let merged = InventoryReconciler::merge_lines(&lines)?;
        let (restore_body, mut binds) = InventoryReconciler::increment_body(&merged);

        let allowed_strs: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
        binds.insert(
            "oid".to_string(),
            json!(strip_table_prefix("orders", id)),
        );
        binds.insert("allowed".to_string(), json!(allowed_strs));
        binds.insert("cancelled".to_string(), json!(OrderStatus::Cancelled.as_str()));
        binds.insert("now".to_string(), json!(time::now_millis()));

        let sql = format!(
            "BEGIN TRANSACTION;\n\
             LET $o = (UPDATE type::thing('orders', $oid) \
             SET status = $cancelled, updated_at = $now \
             WHERE status IN $allowed RETURN AFTER);\n\
             IF count($o) < 1 {{ THROW '{TRANSITION_MISSED_MARKER}' }};\n\
             {restore_body}\
             COMMIT TRANSACTION;\n"
        );

        match self.db.query(sql).bind(binds).await.and_then(|r| r.check()) {
            Ok(_) => {}
            Err(e) => {
                let msg = e.to_string();
                if msg.contains(TRANSITION_MISSED_MARKER) {
                    return Err(OrderError::Conflict(
                        "Order status changed concurrently".into(),
                    ));
                }
                return Err(OrderError::Database(msg));
            }
        }

        tracing::info!(order_id = %id, "Order cancelled, stock restored");
        self.find_by_id(id).await
    }
}
