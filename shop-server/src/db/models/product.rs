//! Product and Variant Models

use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

pub type ProductId = Thing;
pub type VariantId = Thing;

/// Product model
///
/// `total_stock` 是派生值：永远等于其所有 variant 库存之和，
/// 在每次库存变更的同一事务内重算，绝不单独写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<ProductId>,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Derived: sum of variant stocks, recomputed on every stock mutation
    #[serde(default)]
    pub total_stock: i64,
    #[serde(default)]
    pub featured: bool,
    pub main_image: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

/// Purchasable variant of a product (own table, record link to its product)
///
/// Stock mutates only through the inventory reconciler
/// (reserve / restore / admin adjust).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Option<VariantId>,
    /// Record link to the owning product
    pub product: Thing,
    /// Unique SKU
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub stock: i64,
    pub price: f64,
}

/// Variant payload within product create/update requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantInput {
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub stock: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Option<Vec<String>>,
    pub variants: Vec<VariantInput>,
    pub featured: Option<bool>,
    pub main_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Full variant set replacement; stocks and prices are normalized,
    /// `total_stock` is recomputed
    pub variants: Option<Vec<VariantInput>>,
    pub featured: Option<bool>,
    pub main_image: Option<String>,
    pub is_active: Option<bool>,
}

/// Product with its variants attached (API shape)
#[derive(Debug, Clone, Serialize)]
pub struct ProductFull {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}
