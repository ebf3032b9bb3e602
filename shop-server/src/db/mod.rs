//! Database Module
//!
//! 嵌入式 SurrealDB 连接与表结构定义。

pub mod models;
pub mod repository;

use std::path::Path;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

use crate::utils::AppError;

const NAMESPACE: &str = "shop";
const DATABASE: &str = "shop";

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open the on-disk database (RocksDB backend) and apply schema definitions
    pub async fn new(db_path: &Path) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {e}")))?;
        Self::init(db).await
    }

    /// In-memory database (tests and local experiments)
    pub async fn memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {e}")))?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::Database(format!("Failed to select namespace: {e}")))?;

        // Table and index definitions. Tables stay schemaless; the unique SKU
        // index backs the catalog invariant, the rest are lookup indexes.
        // 订单表用复数 `orders`：`order` 会撞上 ORDER BY 关键字。
        db.query(
            r#"
            DEFINE TABLE IF NOT EXISTS product SCHEMALESS;
            DEFINE TABLE IF NOT EXISTS variant SCHEMALESS;
            DEFINE TABLE IF NOT EXISTS orders SCHEMALESS;
            DEFINE TABLE IF NOT EXISTS payment SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS variant_sku_unique ON TABLE variant COLUMNS sku UNIQUE;
            DEFINE INDEX IF NOT EXISTS variant_product ON TABLE variant COLUMNS product;
            DEFINE INDEX IF NOT EXISTS order_user ON TABLE orders COLUMNS user;
            DEFINE INDEX IF NOT EXISTS payment_txn ON TABLE payment COLUMNS transaction_id;
            DEFINE INDEX IF NOT EXISTS payment_user ON TABLE payment COLUMNS user;
            "#,
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to define schema: {e}")))?
        .check()
        .map_err(|e| AppError::Database(format!("Failed to define schema: {e}")))?;

        tracing::info!("Database connection established (embedded SurrealDB)");

        Ok(Self { db })
    }
}
