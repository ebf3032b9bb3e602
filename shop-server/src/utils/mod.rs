//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] / [`AppResult`] - 应用错误类型与请求边界映射
//! - [`logger`] - 日志初始化
//! - [`money`] - 金额计算 (Decimal)
//! - [`time`] - 时间戳工具

pub mod error;
pub mod logger;
pub mod money;
pub mod time;

pub use error::{AppError, AppResult};
