//! Payment Reconciliation
//!
//! 支付域的协调层：发起支付、对账 webhook/手动校验的确认结果、
//! 货到付款的人工结算。所有确认路径都汇到 [`PaymentReconciler::confirm`]，
//! 幂等由仓储层的 pending 条件更新保证。
//!
//! Webhook 不信任 payload 自带的结果：签名通过后还要拿 reference
//! 去网关重新核实一次，再决定怎么落库。

pub mod gateway;
pub mod webhook;


use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

use crate::auth::CurrentUser;
use crate::db::models::{Payment, PaymentMethod, PaymentState, PaymentStatus};
use crate::db::repository::{OrderRepository, PaymentRepository, RepoError};
use crate::services::Notifier;
use crate::utils::error::AppError;
use crate::utils::{money, time};

use gateway::{ChargeStatus, GatewayCharge, GatewayError, PaymentGateway};

/// Payment domain errors
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<RepoError> for PaymentError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => PaymentError::NotFound(msg),
            RepoError::Validation(msg) => PaymentError::Validation(msg),
            RepoError::Duplicate(msg) => PaymentError::Conflict(msg),
            RepoError::Database(msg) => PaymentError::Database(msg),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotFound(msg) => AppError::NotFound(msg),
            PaymentError::Validation(msg) => AppError::Validation(msg),
            PaymentError::Forbidden(msg) => AppError::Forbidden(msg),
            PaymentError::Conflict(msg) => AppError::Conflict(msg),
            PaymentError::SignatureInvalid => AppError::SignatureInvalid,
            PaymentError::Gateway(err) => AppError::Gateway(err.to_string()),
            PaymentError::Database(msg) => AppError::Database(msg),
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Result of initiating a payment
#[derive(Debug)]
pub struct InitiateOutcome {
    pub payment: Payment,
    /// Hosted checkout URL; absent for cash-on-delivery
    pub authorization_url: Option<String>,
}

/// What a confirmation attempt actually did
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// This call won the pending->completed flip and marked the order paid
    Applied(Payment),
    /// Payment was already settled; nothing changed
    AlreadySettled,
    /// Gateway reported failure; payment flipped to failed, order untouched
    MarkedFailed,
    /// Event type we do not act on
    Ignored,
}

/// Coordinates the payment lifecycle against gateway, orders and notifications
pub struct PaymentReconciler {
    payments: PaymentRepository,
    orders: OrderRepository,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl PaymentReconciler {
    pub fn new(
        db: Surreal<Db>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            payments: PaymentRepository::new(db.clone()),
            orders: OrderRepository::new(db),
            gateway,
            notifier,
        }
    }

    /// Start a payment for an order the actor owns
    ///
    /// Paystack 路径先去网关拿 reference，再落 pending 支付行；
    /// 网关报错时不留任何本地痕迹。
    pub async fn initiate(
        &self,
        actor: &CurrentUser,
        order_id: &str,
        method: PaymentMethod,
    ) -> PaymentResult<InitiateOutcome> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Order {} not found", order_id)))?;

        if !actor.is_admin() && !actor.owns(&order.user) {
            return Err(PaymentError::Forbidden(
                "Not authorized to pay for this order".to_string(),
            ));
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(PaymentError::Conflict("Order is already paid".to_string()));
        }

        let order_thing = order
            .id
            .clone()
            .ok_or_else(|| PaymentError::Database("order row missing id".to_string()))?;
        let now = time::now_millis();

        let (transaction_id, authorization_url) = match method {
            PaymentMethod::CashOnDelivery => (None, None),
            PaymentMethod::Paystack => {
                let email = actor.email.as_deref().ok_or_else(|| {
                    PaymentError::Validation(
                        "An email address is required for gateway payments".to_string(),
                    )
                })?;
                let amount_minor = money::to_minor_units(order.total_amount);
                let init = self
                    .gateway
                    .initialize(email, amount_minor, &order_thing.id.to_raw())
                    .await?;
                (Some(init.reference), Some(init.authorization_url))
            }
        };

        let payment = self
            .payments
            .create(Payment {
                id: None,
                order: order_thing,
                user: order.user.clone(),
                method,
                status: PaymentState::Pending,
                transaction_id,
                amount: order.total_amount,
                amount_mismatch: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        Ok(InitiateOutcome {
            payment,
            authorization_url,
        })
    }

    /// Apply a gateway-verified charge result
    ///
    /// 成功分支只有赢得条件更新的那次调用会推进订单并发通知；
    /// 重复投递拿到 `AlreadySettled`，整体表现为无操作。
    pub async fn confirm(&self, charge: &GatewayCharge) -> PaymentResult<ConfirmOutcome> {
        match charge.status {
            ChargeStatus::Failed => self.confirm_failed(&charge.reference).await,
            ChargeStatus::Success => self.confirm_success(charge).await,
        }
    }

    async fn confirm_failed(&self, reference: &str) -> PaymentResult<ConfirmOutcome> {
        if self.payments.fail_if_pending(reference).await?.is_some() {
            tracing::info!(target: "payments", reference, "payment marked failed");
            return Ok(ConfirmOutcome::MarkedFailed);
        }
        match self.payments.find_by_transaction(reference).await? {
            None => Err(PaymentError::NotFound(format!(
                "No payment with reference {}",
                reference
            ))),
            Some(payment) => {
                // 对已结算的支付收到失败事件只告警，不回滚
                tracing::warn!(
                    target: "payments",
                    reference,
                    status = ?payment.status,
                    "failure event for a settled payment ignored"
                );
                Ok(ConfirmOutcome::AlreadySettled)
            }
        }
    }

    async fn confirm_success(&self, charge: &GatewayCharge) -> PaymentResult<ConfirmOutcome> {
        // 支付翻转和订单打款标记是同一个事务，见 settle_if_pending
        let Some(payment) = self.payments.settle_if_pending(&charge.reference).await? else {
            return match self.payments.find_by_transaction(&charge.reference).await? {
                None => Err(PaymentError::NotFound(format!(
                    "No payment with reference {}",
                    charge.reference
                ))),
                Some(p) if p.status == PaymentState::Completed => {
                    Ok(ConfirmOutcome::AlreadySettled)
                }
                Some(_) => Err(PaymentError::Conflict(
                    "Payment already marked failed".to_string(),
                )),
            };
        };

        let confirmed_amount = money::from_minor_units(charge.amount_minor);
        if !money::amounts_equal(confirmed_amount, payment.amount) {
            tracing::warn!(
                target: "payments",
                reference = %charge.reference,
                expected = payment.amount,
                confirmed = confirmed_amount,
                "gateway amount disagrees with order total"
            );
            self.payments
                .flag_amount_mismatch(&payment_key(&payment)?)
                .await?;
        }

        // 通知失败不能影响已落库的结果
        if let Err(err) = self
            .notifier
            .notify(
                &payment.user,
                "Payment received",
                &format!("Your payment of {:.2} has been confirmed", payment.amount),
            )
            .await
        {
            tracing::warn!(target: "payments", error = %err, "notification failed");
        }

        Ok(ConfirmOutcome::Applied(payment))
    }

    /// Re-verify a reference with the gateway, then apply the result.
    /// Used by the manual verify endpoint and as the webhook's source of truth.
    pub async fn verify_and_confirm(&self, reference: &str) -> PaymentResult<ConfirmOutcome> {
        let charge = self.gateway.verify(reference).await?;
        self.confirm(&charge).await
    }

    /// Full webhook pipeline: signature check, event filter, re-verify, apply
    pub async fn handle_webhook(
        &self,
        secret: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> PaymentResult<ConfirmOutcome> {
        let Some(signature) = signature else {
            return Err(PaymentError::SignatureInvalid);
        };
        if !webhook::verify_signature(secret, body, signature) {
            return Err(PaymentError::SignatureInvalid);
        }

        let event = webhook::parse_event(body)
            .ok_or_else(|| PaymentError::Validation("Malformed webhook payload".to_string()))?;
        if event.event != "charge.success" {
            tracing::debug!(target: "payments", event = %event.event, "webhook event ignored");
            return Ok(ConfirmOutcome::Ignored);
        }

        self.verify_and_confirm(&event.data.reference).await
    }

    /// Manual settlement of a cash-on-delivery payment on delivery
    pub async fn settle_cod(&self, actor: &CurrentUser, payment_id: &str) -> PaymentResult<Payment> {
        if !actor.is_admin() {
            return Err(PaymentError::Forbidden(
                "Only administrators can settle payments".to_string(),
            ));
        }
        let existing = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Payment {} not found", payment_id)))?;
        if existing.method != PaymentMethod::CashOnDelivery {
            return Err(PaymentError::Conflict(
                "Only cash-on-delivery payments can be settled manually".to_string(),
            ));
        }
        let Some(payment) = self.payments.settle_cod_if_pending(payment_id).await? else {
            return Err(PaymentError::Conflict("Payment is not pending".to_string()));
        };
        Ok(payment)
    }

    /// Payments visible to the actor: own payments, or everything for admins
    pub async fn list_for_actor(&self, actor: &CurrentUser) -> PaymentResult<Vec<Payment>> {
        let payments = if actor.is_admin() {
            self.payments.find_all().await?
        } else {
            self.payments.find_by_user(&actor.user_id).await?
        };
        Ok(payments)
    }

    pub async fn find_for_actor(
        &self,
        actor: &CurrentUser,
        payment_id: &str,
    ) -> PaymentResult<Payment> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Payment {} not found", payment_id)))?;
        if !actor.is_admin() && !actor.owns(&payment.user) {
            return Err(PaymentError::Forbidden(
                "Not authorized to view this payment".to_string(),
            ));
        }
        Ok(payment)
    }
}

fn payment_key(payment: &Payment) -> PaymentResult<String> {
    payment
        .id
        .as_ref()
        .map(|thing| thing.id.to_raw())
        .ok_or_else(|| PaymentError::Database("payment row missing id".to_string()))
}
