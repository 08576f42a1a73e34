//! Webhook authentication.
//!
//! The gateway signs each notification with HMAC-SHA256 over `timestamp || raw_body`, keyed with the merchant's client
//! secret, and sends the base64 encoding of the digest in the `x-webhook-signature` header. The timestamp travels in
//! `x-webhook-timestamp`.
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| error!("🔐️ Could not initialise HMAC: {e}"))
        .ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(body);
    Some(mac)
}

/// Computes the base64 signature the gateway would send for this payload.
pub fn webhook_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    mac_for(secret, timestamp, body).map(|mac| base64::encode(mac.finalize().into_bytes())).unwrap_or_default()
}

/// Checks a received signature. The comparison runs in constant time over the decoded digest.
pub fn verify_webhook_signature(secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        warn!("🔐️ No webhook secret is configured. Rejecting the signature.");
        return false;
    }
    let received = match base64::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("🔐️ Webhook signature is not valid base64. {e}");
            return false;
        },
    };
    match mac_for(secret, timestamp, body) {
        Some(mac) => mac.verify_slice(&received).is_ok(),
        None => false,
    }
}
