//! Webhook Verification
//!
//! Paystack 回调先验 HMAC-SHA512 签名再解析，签名针对原始 body 计算，
//! 不通过就什么都不改。

use ring::hmac;
use serde::Deserialize;

/// Header carrying the hex-encoded HMAC-SHA512 digest of the raw body
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Webhook event as delivered by the gateway
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub reference: String,
}

/// Constant-time check of the signature header against the raw request body
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA512, secret.as_bytes());
    match hex::decode(signature_hex.trim()) {
        Ok(expected) => hmac::verify(&key, body, &expected).is_ok(),
        Err(_) => false,
    }
}

/// Compute the hex signature for a payload; used by tests and local tooling
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA512, secret.as_bytes());
    hex::encode(hmac::sign(&key, body).as_ref())
}

pub fn parse_event(body: &[u8]) -> Option<WebhookEvent> {
    serde_json::from_slice(body).ok()
}
