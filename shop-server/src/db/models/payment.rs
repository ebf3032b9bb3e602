//! Payment Model
//!
//! 一个订单可以有多次支付尝试（失败后重试），但最多一次到达 `completed`。
//! 确认的幂等靠 `transaction_id` 上的条件更新，货到付款没有 reference。

use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use super::order::PaymentMethod;

pub type PaymentId = Thing;

/// Payment attempt lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
}

/// Payment model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Option<PaymentId>,
    /// Record link to the order being paid
    pub order: Thing,
    /// Paying user id
    pub user: String,
    pub method: PaymentMethod,
    pub status: PaymentState,
    /// Gateway reference; present for hosted gateway payments only
    pub transaction_id: Option<String>,
    /// Snapshot of the order total at initiation time
    pub amount: f64,
    /// Set when the gateway-confirmed amount disagreed with the order total
    #[serde(default)]
    pub amount_mismatch: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
