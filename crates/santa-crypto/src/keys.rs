use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;

pub type Key = [u8; KEY_LEN];

/// Generate a random 256-bit key for AES-256-GCM.
pub fn generate_key() -> Key {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encode a key to base64 for storing in the environment.
pub fn key_to_base64(key: &Key) -> String {
    BASE64.encode(key)
}

/// Decode a base64 key. Surrounding whitespace is ignored.
pub fn key_from_base64(encoded: &str) -> Result<Key, CryptoError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, len)))
}
