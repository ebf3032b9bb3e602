//! Payment API Handlers
//!
//! webhook 处理原始 body（签名针对字节流计算，先验签后解析）。

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Payment, PaymentMethod};
use crate::payments::webhook::SIGNATURE_HEADER;
use crate::payments::{ConfirmOutcome, PaymentReconciler};
use crate::utils::AppResult;

fn reconciler(state: &ServerState) -> PaymentReconciler {
    PaymentReconciler::new(
        state.db.clone(),
        state.gateway.clone(),
        state.notifier.clone(),
    )
}

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub order_id: String,
    pub method: PaymentMethod,
}

#[derive(Serialize)]
pub struct InitiateResponse {
    pub payment: Payment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
}

/// POST /api/payments/initiate - 为订单发起支付
pub async fn initiate(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<InitiateRequest>,
) -> AppResult<Json<InitiateResponse>> {
    let outcome = reconciler(&state)
        .initiate(&user, &payload.order_id, payload.method)
        .await?;
    Ok(Json(InitiateResponse {
        payment: outcome.payment,
        authorization_url: outcome.authorization_url,
    }))
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub message: &'static str,
}

fn confirm_message(outcome: &ConfirmOutcome) -> &'static str {
    match outcome {
        ConfirmOutcome::Applied(_) => "Payment confirmed",
        ConfirmOutcome::AlreadySettled => "Payment already settled",
        ConfirmOutcome::MarkedFailed => "Payment marked failed",
        ConfirmOutcome::Ignored => "Event ignored",
    }
}

/// POST /api/payments/webhook - Paystack 回调
pub async fn webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ConfirmResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());
    let outcome = reconciler(&state)
        .handle_webhook(&state.config.paystack_secret_key, &body, signature)
        .await?;
    Ok(Json(ConfirmResponse {
        message: confirm_message(&outcome),
    }))
}

/// GET /api/payments/verify/:reference - 手动对账（回调丢失时的兜底）
pub async fn verify(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Path(reference): Path<String>,
) -> AppResult<Json<ConfirmResponse>> {
    let outcome = reconciler(&state).verify_and_confirm(&reference).await?;
    Ok(Json(ConfirmResponse {
        message: confirm_message(&outcome),
    }))
}

/// GET /api/payments - 自己的支付记录；管理员看全部
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = reconciler(&state).list_for_actor(&user).await?;
    Ok(Json(payments))
}

/// GET /api/payments/:id - 单笔支付（所有者或管理员）
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Payment>> {
    let payment = reconciler(&state).find_for_actor(&user, &id).await?;
    Ok(Json(payment))
}

/// POST /api/payments/:id/settle - 货到付款人工结算（管理员）
pub async fn settle(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Payment>> {
    let payment = reconciler(&state).settle_cod(&user, &id).await?;
    Ok(Json(payment))
}
