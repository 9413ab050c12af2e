//! Keyed-hash helpers shared by the gateway adapters.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `data` under `secret`, hex encoded.
pub fn hmac_sha256_hex(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a hex HMAC-SHA256 signature in constant time. Signatures that are
/// not valid hex simply fail.
pub fn verify_hmac_sha256_hex(secret: &str, data: &str, signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Salted checksum in the `sha256(message + salt)###index` form.
pub fn salted_checksum(message: &str, salt_key: &str, salt_index: &str) -> String {
    format!("{}###{}", sha256_hex(&format!("{message}{salt_key}")), salt_index)
}
