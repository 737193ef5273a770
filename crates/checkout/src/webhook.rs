//! Gateway webhook signatures and payloads.

use common::Reference;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the hex HMAC-SHA512 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Signs a raw payload the way the gateway does.
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a hex signature against the raw payload in constant time.
pub fn verify_signature(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Event types the reconciler acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookKind {
    ChargeSuccess,
    ChargeFailed,
    Other(String),
}

impl WebhookKind {
    fn from_event(event: &str) -> Self {
        match event {
            "charge.success" => WebhookKind::ChargeSuccess,
            "charge.failed" => WebhookKind::ChargeFailed,
            other => WebhookKind::Other(other.to_string()),
        }
    }
}

/// The transaction a webhook event is about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookData {
    pub reference: Reference,
    /// Amount in minor units, as reported by the gateway.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

impl WebhookEvent {
    pub fn kind(&self) -> WebhookKind {
        WebhookKind::from_event(&self.event)
    }
}
