//! Order Repository
//!
//! 订单行的持久化。状态机校验在 orders ledger 里，这里只提供
//! 条件更新原语（乐观并发控制的落点）。

use super::{BaseRepository, RepoError, RepoResult, make_thing, strip_table_prefix};
use crate::db::models::{Order, OrderStatus};
use crate::utils::time;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

// 复数表名，避开 ORDER BY 关键字
const ORDER_TABLE: &str = "orders";

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Persist a new order
    pub async fn create(&self, order: Order) -> RepoResult<Order> {
        let created: Option<Order> = self.base.db().create(ORDER_TABLE).content(order).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create order".to_string()))
    }

    /// Find order by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Order>> {
        let pure_id = strip_table_prefix(ORDER_TABLE, id);
        let order: Option<Order> = self.base.db().select((ORDER_TABLE, pure_id)).await?;
        Ok(order)
    }

    /// All orders, newest first (admin)
    pub async fn find_all(&self) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query("SELECT * FROM orders ORDER BY created_at DESC")
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// Orders belonging to a user, newest first
    pub async fn find_by_user(&self, user_id: &str) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query("SELECT * FROM orders WHERE user = $user ORDER BY created_at DESC")
            .bind(("user", user_id.to_string()))
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// Conditional status flip: applies only while the order is still in
    /// `expected`. Returns `None` when the condition missed (raced or
    /// already moved on) — the caller decides whether that is a conflict.
    pub async fn transition_status(
        &self,
        id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        let thing = make_thing(ORDER_TABLE, id);
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $thing SET status = $next, updated_at = $now \
                 WHERE status = $expected RETURN AFTER",
            )
            .bind(("thing", thing))
            .bind(("next", next))
            .bind(("expected", expected))
            .bind(("now", time::now_millis()))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders.into_iter().next())
    }

    /// Hard delete (explicit admin action)
    pub async fn delete(&self, id: &str) -> RepoResult<()> {
        let pure_id = strip_table_prefix(ORDER_TABLE, id);
        let result: Option<Order> = self.base.db().delete((ORDER_TABLE, pure_id)).await?;
        if result.is_none() {
            return Err(RepoError::NotFound(format!("Order {} not found", id)));
        }
        Ok(())
    }
}
