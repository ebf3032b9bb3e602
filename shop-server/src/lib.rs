//! Shop Server - 电商后端核心
//!
//! # 架构概述
//!
//! - **商品目录** (`db` + `api/products`): 商品/变体 CRUD，`total_stock` 派生
//! - **库存** (`inventory`): 原子占用/回补/调整，条件扣减落在存储层
//! - **订单** (`orders`): 价格快照、状态机流转、取消回补
//! - **支付** (`payments`): Paystack 网关、webhook 验签、幂等确认
//! - **统计** (`stats`): 只读销售报表
//!
//! # 模块结构
//!
//! ```text
//! shop-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # 请求身份提取
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 数据库层（模型 + 仓储）
//! ├── inventory/     # 库存对账
//! ├── orders/        # 订单账本
//! ├── payments/      # 支付对账
//! ├── stats/         # 统计聚合
//! ├── services/      # 通知出口
//! └── utils/         # 错误、日志、金额、时间
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod services;
pub mod stats;
pub mod utils;

// Re-export 公共类型
pub use auth::CurrentUser;
pub use core::{Config, Server, ServerState};
pub use db::DbService;
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 环境准备：dotenv + 日志
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    init_logger_with_file(
        std::env::var("LOG_LEVEL").ok().as_deref(),
        log_dir.to_str(),
    );
    Ok(())
}
