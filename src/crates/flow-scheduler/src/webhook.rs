//! Inbound webhook verification.
//!
//! The signature is `hex(HMAC-SHA256(shared_secret, raw_request_body))`,
//! verified in constant time. A failed check must be answered with 401 by
//! the caller; the workflow is never invoked.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use flow_core::{FlowError, Result};

type HmacSha256 = Hmac<Sha256>;

/// A verified-before-running inbound request. Route handling lives in the
/// surrounding application; this is the contract it must satisfy.
#[derive(Debug, Clone, Copy)]
pub struct WebhookRequest<'a> {
    /// Raw request body, exactly as received. The signature covers these
    /// bytes, not a re-serialization.
    pub body: &'a [u8],

    /// Hex-encoded signature header value.
    pub signature: &'a str,

    /// Optional timestamp field for freshness checking.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Compute the expected signature for a body. Exposed for clients and tests.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature over the raw body. Comparison is constant-time via
/// `Mac::verify_slice`.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> Result<()> {
    let signature = hex::decode(signature_hex.trim())
        .map_err(|_| FlowError::Signature("signature is not valid hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| FlowError::Signature("signature mismatch".to_string()))
}

/// Reject timestamps outside the freshness window (replay reduction).
pub fn verify_freshness(now: DateTime<Utc>, timestamp: DateTime<Utc>, window: Duration) -> Result<()> {
    let skew = now.signed_duration_since(timestamp);
    if skew > window || skew < -window {
        return Err(FlowError::Signature(format!(
            "timestamp outside freshness window ({}s skew)",
            skew.num_seconds()
        )));
    }
    Ok(())
}
