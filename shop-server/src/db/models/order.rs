//! Order Model
//!
//! 订单一经创建，行项目快照与 `total_amount` 即固定；
//! 后续仅允许通过状态流转操作修改。

use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

pub type OrderId = Thing;

/// Order progress state machine
///
/// ```text
/// Pending ──> Processing ──> Shipped ──> Delivered
///    │             │
///    └──────┬──────┘
///           v
///       Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Legal transitions; `Delivered` and `Cancelled` are terminal
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Order payment progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// Supported payment methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Paystack,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Paystack => "paystack",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }
}

/// Line item snapshot
///
/// sku/color/size/unit_price 为下单瞬间的变体快照，此后变体价格变动
/// 不影响已有订单 —— 这是 `total_amount` 可信的前提。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Record link to the product
    pub product: Thing,
    /// Plain variant id (the variant row may be deleted later; the snapshot survives)
    pub variant_id: String,
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Price per unit at reservation time (immutable)
    pub unit_price: f64,
    pub quantity: i64,
}

/// Shipping info snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipping {
    pub country: String,
    pub city: String,
    pub region: String,
    pub phone: String,
}

/// Order model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<OrderId>,
    /// Owning user id
    pub user: String,
    pub items: Vec<OrderItem>,
    /// Computed once at creation from reserved unit prices; never recomputed
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping: Shipping,
    pub payment_method: PaymentMethod,
    pub order_notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
