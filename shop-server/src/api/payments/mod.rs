//! Payment API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", payment_routes())
}

fn payment_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/initiate", post(handler::initiate))
        // 网关回调：无身份头，签名即认证
        .route("/webhook", post(handler::webhook))
        .route("/verify/{reference}", get(handler::verify))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/settle", post(handler::settle))
}
