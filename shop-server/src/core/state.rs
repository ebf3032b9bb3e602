use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::core::Config;
use crate::db::DbService;
use crate::payments::gateway::{PaymentGateway, PaystackGateway};
use crate::services::{LogNotifier, Notifier};
use crate::utils::AppResult;

/// 服务器状态 - 持有所有共享组件的引用
///
/// 所有 handler 通过 `State<ServerState>` 取用；`Arc` 浅拷贝，
/// Clone 成本极低。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | db | 嵌入式数据库 (SurrealDB) |
/// | gateway | 支付网关客户端 (trait object，测试注入替身) |
/// | notifier | 通知出口 (trait object) |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: Surreal<Db>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

impl ServerState {
    /// 手动构造（测试注入网关/通知替身时使用）
    pub fn new(
        config: Config,
        db: Surreal<Db>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            db,
            gateway,
            notifier,
        }
    }

    /// 初始化生产状态：打开磁盘数据库、构造真实网关
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            crate::utils::AppError::Internal(format!(
                "Failed to create work dir {}: {e}",
                config.work_dir
            ))
        })?;
        let db_service = DbService::new(&config.db_path()).await?;
        let gateway = Arc::new(PaystackGateway::new(
            config.paystack_secret_key.clone(),
            config.paystack_base_url.clone(),
        ));
        Ok(Self::new(
            config.clone(),
            db_service.db,
            gateway,
            Arc::new(LogNotifier),
        ))
    }
}
