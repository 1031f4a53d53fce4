//! Canonical parameter strings and HMAC-SHA256 signatures shared by the gateway clients.
use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::gateways::VerificationError;

type HmacSha256 = Hmac<Sha256>;

/// The parameter that carries the signature itself.
pub const SIGN_KEY: &str = "sign";
/// Alipay's signature-algorithm parameter. It is not part of the signed content.
pub const SIGN_TYPE_KEY: &str = "sign_type";

/// Builds the string that gets signed: every parameter with a non-empty value, except the signature fields, sorted by
/// key and joined as `k1=v1&k2=v2`.
pub fn canonical_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, v)| !v.is_empty() && k.as_str() != SIGN_KEY && k.as_str() != SIGN_TYPE_KEY)
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns the base64-encoded HMAC-SHA256 of `message` under `key`.
pub fn calculate_hmac(key: &[u8], message: &str) -> String {
    let mut mac = new_mac(key);
    mac.update(message.as_bytes());
    base64::encode(mac.finalize().into_bytes())
}

/// Checks a base64-encoded signature against `message` in constant time.
pub fn verify_hmac(key: &[u8], message: &str, signature: &str) -> Result<(), VerificationError> {
    let sig = base64::decode(signature.trim()).map_err(|_| VerificationError::MalformedSignature)?;
    let mut mac = new_mac(key);
    mac.update(message.as_bytes());
    mac.verify_slice(&sig).map_err(|_| VerificationError::InvalidSignature)
}

/// SHA-256 digest of a secret, used to derive a second key from the same merchant secret.
pub fn derive_key(secret: &str) -> Vec<u8> {
    Sha256::digest(secret.as_bytes()).to_vec()
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never fails
    match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any size"),
    }
}
