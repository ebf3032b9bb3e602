//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`products`] - 商品目录与库存调整
//! - [`orders`] - 结账与订单生命周期
//! - [`payments`] - 支付发起、webhook、手动校验
//! - [`statistics`] - 销售统计

pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod statistics;

use axum::Router;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppError, AppResult};

/// Assemble all resource routers
pub fn create_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(products::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(statistics::router())
}
