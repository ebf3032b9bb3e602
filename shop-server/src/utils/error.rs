//! 统一错误处理
//!
//! 应用级错误枚举 [`AppError`] 与 HTTP 响应映射。
//! 各领域模块（inventory/orders/payments）的错误通过 `From` 汇聚到这里，
//! 由 axum 的 [`IntoResponse`] 在请求边界转成结构化 JSON。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Application-level error type
///
/// 错误分类与 HTTP 状态码：
///
/// | 变体 | 状态码 |
/// |------|--------|
/// | NotFound | 404 |
/// | InsufficientStock | 409 |
/// | InvalidTransition | 422 |
/// | Forbidden | 403 |
/// | Validation | 400 |
/// | SignatureInvalid | 401 |
/// | Gateway | 502 |
/// | Conflict | 409 |
/// | Database / Internal | 500 |
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// 请求边界的错误响应结构
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::InsufficientStock(msg) => {
                (StatusCode::CONFLICT, "insufficient_stock", msg.clone())
            }
            AppError::InvalidTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_transition",
                msg.clone(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            AppError::SignatureInvalid => (
                StatusCode::UNAUTHORIZED,
                "signature_invalid",
                self.to_string(),
            ),
            AppError::Gateway(msg) => {
                tracing::error!(target: "gateway", error = %msg, "Payment gateway error");
                (StatusCode::BAD_GATEWAY, "gateway_error", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Database(msg) => {
                // 记录内部错误但不暴露详细信息
                tracing::error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type AppResult<T> = Result<T, AppError>;
