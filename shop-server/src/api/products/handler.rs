//! Product API Handlers
//!
//! 读接口公开；写接口与库存调整要求管理员。

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Product, ProductCreate, ProductFull, ProductUpdate, Variant};
use crate::db::repository::ProductRepository;
use crate::inventory::InventoryReconciler;
use crate::utils::{AppError, AppResult};

fn require_admin(user: &CurrentUser) -> AppResult<()> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/products - 所有在售商品
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.db.clone()).find_all().await?;
    Ok(Json(products))
}

/// GET /api/products/featured - 推荐位商品
pub async fn featured(State(state): State<ServerState>) -> AppResult<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.db.clone())
        .find_featured()
        .await?;
    Ok(Json(products))
}

/// GET /api/products/:id - 单个商品（含变体）
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProductFull>> {
    let product = ProductRepository::new(state.db.clone())
        .find_full(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))?;
    Ok(Json(product))
}

/// POST /api/products - 创建商品（管理员）
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<ProductCreate>,
) -> AppResult<Json<Product>> {
    require_admin(&user)?;
    let product = ProductRepository::new(state.db.clone())
        .create(payload)
        .await?;
    Ok(Json(product))
}

/// PUT /api/products/:id - 更新商品（管理员）；variants 为整组替换
pub async fn update(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    require_admin(&user)?;
    let product = ProductRepository::new(state.db.clone())
        .update(&id, payload)
        .await?;
    Ok(Json(product))
}

/// DELETE /api/products/:id - 删除商品及其变体（管理员）
pub async fn delete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    require_admin(&user)?;
    ProductRepository::new(state.db.clone()).delete(&id).await?;
    Ok(Json(serde_json::json!({ "message": "Product deleted" })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockAdjustRequest {
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
}

/// POST /api/products/:id/variants/:variant_id/add-stock （管理员）
pub async fn add_stock(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((id, variant_id)): Path<(String, String)>,
    Json(payload): Json<StockAdjustRequest>,
) -> AppResult<Json<Variant>> {
    require_admin(&user)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let variant = InventoryReconciler::new(state.db.clone())
        .add_stock(&id, &variant_id, payload.quantity)
        .await?;
    Ok(Json(variant))
}

/// POST /api/products/:id/variants/:variant_id/reduce-stock （管理员）
pub async fn reduce_stock(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((id, variant_id)): Path<(String, String)>,
    Json(payload): Json<StockAdjustRequest>,
) -> AppResult<Json<Variant>> {
    require_admin(&user)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let variant = InventoryReconciler::new(state.db.clone())
        .reduce_stock(&id, &variant_id, payload.quantity)
        .await?;
    Ok(Json(variant))
}
