//! Order API Handlers
//!
//! 结账是两步：先占库存，再落订单。订单落库失败时回补已占的库存，
//! 不给用户留下「扣了库存没有订单」的状态。

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Order, OrderStatus, PaymentMethod, Shipping};
use crate::inventory::{InventoryReconciler, LineItemInput};
use crate::orders::OrderLedger;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingRequest {
    #[validate(length(min = 1, message = "country is required"))]
    pub country: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "region is required"))]
    pub region: String,
    #[validate(length(min = 3, message = "phone is required"))]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<LineItemInput>,
    #[validate(nested)]
    pub shipping: ShippingRequest,
    pub payment_method: PaymentMethod,
    pub order_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

/// POST /api/orders - 结账下单
pub async fn checkout(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<Order>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let inventory = InventoryReconciler::new(state.db.clone());
    let reservation = inventory.reserve(&payload.items).await?;

    let shipping = Shipping {
        country: payload.shipping.country,
        city: payload.shipping.city,
        region: payload.shipping.region,
        phone: payload.shipping.phone,
    };

    let ledger = OrderLedger::new(state.db.clone());
    match ledger
        .create(
            &user.user_id,
            &reservation.lines,
            shipping,
            payload.payment_method,
            payload.order_notes,
        )
        .await
    {
        Ok(order) => Ok(Json(order)),
        Err(err) => {
            // 占了库存但订单没落下去：补偿回去再报错
            if let Err(restore_err) = inventory.restore(&payload.items).await {
                tracing::error!(
                    error = %restore_err,
                    "failed to restore stock after order creation failure"
                );
            }
            Err(err.into())
        }
    }
}

/// GET /api/orders - 自己的订单；管理员看全部
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Order>>> {
    let orders = OrderLedger::new(state.db.clone())
        .list_for_actor(&user)
        .await?;
    Ok(Json(orders))
}

/// GET /api/orders/:id - 单个订单（所有者或管理员）
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = OrderLedger::new(state.db.clone())
        .find_for_actor(&id, &user)
        .await?;
    Ok(Json(order))
}

/// PUT /api/orders/:id/status - 状态流转（管理员）
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> AppResult<Json<Order>> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }
    let order = OrderLedger::new(state.db.clone())
        .transition(&id, payload.status, &user)
        .await?;
    Ok(Json(order))
}

/// PUT /api/orders/:id/cancel - 取消订单（所有者限 Pending；管理员含 Processing）
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = OrderLedger::new(state.db.clone()).cancel(&id, &user).await?;
    Ok(Json(order))
}

/// DELETE /api/orders/:id - 硬删除（管理员；不回补库存）
pub async fn delete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    OrderLedger::new(state.db.clone()).delete(&id, &user).await?;
    Ok(Json(serde_json::json!({ "message": "Order deleted" })))
}
