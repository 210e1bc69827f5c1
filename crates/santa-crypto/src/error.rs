use thiserror::Error;

use crate::envelope::CipherVersion;

/// Failures while producing an envelope. These indicate misconfiguration,
/// not bad data.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("No key configured for cipher version {0}")]
    MissingKey(CipherVersion),

    #[error("Plaintext must be a non-negative integer, got {0}")]
    NegativePlaintext(i64),
}

/// Failures while opening an envelope. Always recoverable: callers treat the
/// receiver as unknown and carry on with the next row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Bad base64, truncated body, or authentication tag mismatch.
    #[error("cipher is corrupt or was sealed with a different key")]
    Corrupt,

    /// Decrypted fine but the plaintext is not a non-negative integer.
    #[error("decrypted value is not a valid user id")]
    Malformed,

    #[error("no key configured for cipher version {0}")]
    UnknownVersion(CipherVersion),
}
