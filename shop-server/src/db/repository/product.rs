//! Product Repository
//!
//! 商品与变体的 CRUD。变体独立成表（record link 指向所属商品），
//! 库存的扣减/回补不在这里 —— 那是 inventory reconciler 的职责。

use super::{BaseRepository, RepoError, RepoResult, make_thing, strip_table_prefix};
use crate::db::models::{Product, ProductCreate, ProductFull, ProductUpdate, Variant, VariantInput};
use crate::utils::{money, time};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const PRODUCT_TABLE: &str = "product";
const VARIANT_TABLE: &str = "variant";

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find all active products
    pub async fn find_all(&self) -> RepoResult<Vec<Product>> {
        let products: Vec<Product> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE is_active = true ORDER BY created_at DESC")
            .await?
            .take(0)?;
        Ok(products)
    }

    /// Find featured active products
    pub async fn find_featured(&self) -> RepoResult<Vec<Product>> {
        let products: Vec<Product> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE is_active = true AND featured = true ORDER BY created_at DESC")
            .await?
            .take(0)?;
        Ok(products)
    }

    /// Find product by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Product>> {
        let pure_id = strip_table_prefix(PRODUCT_TABLE, id);
        let product: Option<Product> = self
            .base
            .db()
            .select((PRODUCT_TABLE, pure_id))
            .await?;
        Ok(product)
    }

    /// Find product with its variants attached
    pub async fn find_full(&self, id: &str) -> RepoResult<Option<ProductFull>> {
        let Some(product) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let variants = self.find_variants(id).await?;
        Ok(Some(ProductFull { product, variants }))
    }

    /// Variants of a product, stable order by SKU
    pub async fn find_variants(&self, product_id: &str) -> RepoResult<Vec<Variant>> {
        let pure_id = strip_table_prefix(PRODUCT_TABLE, product_id).to_string();
        let variants: Vec<Variant> = self
            .base
            .db()
            .query("SELECT * FROM variant WHERE product = type::thing('product', $pid) ORDER BY sku")
            .bind(("pid", pure_id))
            .await?
            .take(0)?;
        Ok(variants)
    }

    /// Find a single variant by id
    pub async fn find_variant(&self, variant_id: &str) -> RepoResult<Option<Variant>> {
        let pure_id = strip_table_prefix(VARIANT_TABLE, variant_id);
        let variant: Option<Variant> = self
            .base
            .db()
            .select((VARIANT_TABLE, pure_id))
            .await?;
        Ok(variant)
    }

    /// Validate a variant payload set: non-empty, distinct SKUs, sane numbers
    fn validate_variants(variants: &[VariantInput]) -> RepoResult<()> {
        if variants.is_empty() {
            return Err(RepoError::Validation("variants cannot be empty".into()));
        }
        let mut skus: Vec<&str> = variants.iter().map(|v| v.sku.as_str()).collect();
        skus.sort_unstable();
        skus.dedup();
        if skus.len() != variants.len() {
            return Err(RepoError::Validation("duplicate SKU in variants".into()));
        }
        for v in variants {
            if v.sku.trim().is_empty() {
                return Err(RepoError::Validation("SKU cannot be empty".into()));
            }
            if v.stock < 0 {
                return Err(RepoError::Validation(format!(
                    "stock must be non-negative for SKU {}",
                    v.sku
                )));
            }
            if !v.price.is_finite() || v.price < 0.0 || v.price > money::MAX_PRICE {
                return Err(RepoError::Validation(format!(
                    "invalid price for SKU {}",
                    v.sku
                )));
            }
        }
        Ok(())
    }

    /// Create a product together with its variants
    ///
    /// `total_stock` 由 variants 求和得出。变体 SKU 撞上唯一索引时，
    /// 回滚已创建的记录后返回 Duplicate。
    pub async fn create(&self, data: ProductCreate) -> RepoResult<Product> {
        Self::validate_variants(&data.variants)?;

        let now = time::now_millis();
        let total_stock: i64 = data.variants.iter().map(|v| v.stock).sum();

        let product = Product {
            id: None,
            name: data.name,
            description: data.description,
            category: data.category,
            tags: data.tags.unwrap_or_default(),
            total_stock,
            featured: data.featured.unwrap_or(false),
            main_image: data.main_image,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let created: Option<Product> = self
            .base
            .db()
            .create(PRODUCT_TABLE)
            .content(product)
            .await?;
        let created =
            created.ok_or_else(|| RepoError::Database("Failed to create product".to_string()))?;

        let product_id = created
            .id
            .clone()
            .ok_or_else(|| RepoError::Database("Created product has no id".to_string()))?;

        for input in data.variants {
            let variant = Variant {
                id: None,
                product: product_id.clone(),
                sku: input.sku,
                color: input.color,
                size: input.size,
                stock: input.stock,
                price: money::to_f64(money::to_decimal(input.price)),
            };
            let result: Result<Option<Variant>, surrealdb::Error> =
                self.base.db().create(VARIANT_TABLE).content(variant).await;
            if let Err(e) = result {
                // Roll the partial create back before surfacing the error
                let _ = self.delete(&product_id.to_string()).await;
                return Err(e.into());
            }
        }

        Ok(created)
    }

    /// Update a product; a `variants` payload replaces the whole variant set
    pub async fn update(&self, id: &str, data: ProductUpdate) -> RepoResult<Product> {
        if let Some(ref variants) = data.variants {
            Self::validate_variants(variants)?;
        }

        let pure_id = strip_table_prefix(PRODUCT_TABLE, id).to_string();
        let thing = make_thing(PRODUCT_TABLE, &pure_id);

        // Build dynamic SET clauses with proper type bindings
        let mut set_parts: Vec<&str> = vec!["updated_at = $updated_at"];
        if data.name.is_some() { set_parts.push("name = $name"); }
        if data.description.is_some() { set_parts.push("description = $description"); }
        if data.category.is_some() { set_parts.push("category = $category"); }
        if data.tags.is_some() { set_parts.push("tags = $tags"); }
        if data.featured.is_some() { set_parts.push("featured = $featured"); }
        if data.main_image.is_some() { set_parts.push("main_image = $main_image"); }
        if data.is_active.is_some() { set_parts.push("is_active = $is_active"); }

        let query_str = format!("UPDATE $thing SET {} RETURN AFTER", set_parts.join(", "));

        let mut query = self
            .base
            .db()
            .query(&query_str)
            .bind(("thing", thing.clone()))
            .bind(("updated_at", time::now_millis()));

        if let Some(v) = data.name { query = query.bind(("name", v)); }
        if let Some(v) = data.description { query = query.bind(("description", v)); }
        if let Some(v) = data.category { query = query.bind(("category", v)); }
        if let Some(v) = data.tags { query = query.bind(("tags", v)); }
        if let Some(v) = data.featured { query = query.bind(("featured", v)); }
        if let Some(v) = data.main_image { query = query.bind(("main_image", v)); }
        if let Some(v) = data.is_active { query = query.bind(("is_active", v)); }

        let mut result = query.await?;
        let products: Vec<Product> = result.take(0)?;
        let mut product = products
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Product {} not found", id)))?;

        // Variant set replacement: delete and recreate, then recompute total_stock
        if let Some(variants) = data.variants {
            self.base
                .db()
                .query("DELETE variant WHERE product = type::thing('product', $pid)")
                .bind(("pid", pure_id.clone()))
                .await?
                .check()?;

            let total_stock: i64 = variants.iter().map(|v| v.stock).sum();
            for input in variants {
                let variant = Variant {
                    id: None,
                    product: thing.clone(),
                    sku: input.sku,
                    color: input.color,
                    size: input.size,
                    stock: input.stock,
                    price: money::to_f64(money::to_decimal(input.price)),
                };
                let _: Option<Variant> =
                    self.base.db().create(VARIANT_TABLE).content(variant).await?;
            }

            let mut result = self
                .base
                .db()
                .query("UPDATE $thing SET total_stock = $total, updated_at = $now RETURN AFTER")
                .bind(("thing", thing))
                .bind(("total", total_stock))
                .bind(("now", time::now_millis()))
                .await?;
            let updated: Vec<Product> = result.take(0)?;
            if let Some(p) = updated.into_iter().next() {
                product = p;
            }
        }

        Ok(product)
    }

    /// Hard delete a product and its variants
    pub async fn delete(&self, id: &str) -> RepoResult<()> {
        let pure_id = strip_table_prefix(PRODUCT_TABLE, id).to_string();

        self.base
            .db()
            .query("DELETE variant WHERE product = type::thing('product', $pid)")
            .bind(("pid", pure_id.clone()))
            .await?
            .check()?;

        let result: Option<Product> = self.base.db().delete((PRODUCT_TABLE, pure_id)).await?;
        if result.is_none() {
            return Err(RepoError::NotFound(format!("Product {} not found", id)));
        }
        Ok(())
    }
}
