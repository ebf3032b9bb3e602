//! Payment Gateway Client
//!
//! Paystack 托管收银台的最小客户端，隐藏在 [`PaymentGateway`] trait 后面，
//! 测试用 mock 实现替换。金额一律走最小货币单位 (kobo)。

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway response invalid: {0}")]
    InvalidResponse(String),

    #[error("Gateway declined: {0}")]
    Declined(String),
}

/// Result of a hosted-checkout initialization
#[derive(Debug, Clone)]
pub struct GatewayInit {
    /// Gateway transaction reference
    pub reference: String,
    /// Hosted checkout page for the customer
    pub authorization_url: String,
}

/// Charge outcome as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Success,
    Failed,
}

/// A verified charge
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub reference: String,
    pub status: ChargeStatus,
    /// Amount in minor currency units (authoritative on the gateway side)
    pub amount_minor: i64,
}

/// External payment gateway collaborator
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a hosted checkout; returns the gateway reference and redirect URL
    async fn initialize(
        &self,
        email: &str,
        amount_minor: i64,
        order_id: &str,
    ) -> Result<GatewayInit, GatewayError>;

    /// Re-verify a transaction server-side by its reference
    async fn verify(&self, reference: &str) -> Result<GatewayCharge, GatewayError>;
}

// =============================================================================
// Paystack implementation
// =============================================================================

pub const PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

pub struct PaystackGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    reference: String,
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
}

impl PaystackGateway {
    pub fn new(secret_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url: base_url.unwrap_or_else(|| PAYSTACK_BASE_URL.to_string()),
        }
    }

    fn unwrap_envelope<T>(envelope: PaystackEnvelope<T>) -> Result<T, GatewayError> {
        if !envelope.status {
            return Err(GatewayError::Declined(
                envelope.message.unwrap_or_else(|| "request rejected".into()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data field".into()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(
        &self,
        email: &str,
        amount_minor: i64,
        order_id: &str,
    ) -> Result<GatewayInit, GatewayError> {
        let envelope: PaystackEnvelope<InitData> = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&serde_json::json!({
                "email": email,
                "amount": amount_minor,
                "metadata": { "orderId": order_id },
            }))
            .send()
            .await?
            .json()
            .await?;

        let data = Self::unwrap_envelope(envelope)?;
        Ok(GatewayInit {
            reference: data.reference,
            authorization_url: data.authorization_url,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayCharge, GatewayError> {
        let envelope: PaystackEnvelope<VerifyData> = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .json()
            .await?;

        let data = Self::unwrap_envelope(envelope)?;
        let status = if data.status == "success" {
            ChargeStatus::Success
        } else {
            ChargeStatus::Failed
        };
        Ok(GatewayCharge {
            reference: reference.to_string(),
            status,
            amount_minor: data.amount,
        })
    }
}
