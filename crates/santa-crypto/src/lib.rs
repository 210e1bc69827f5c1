/// Santa Crypto Library
///
/// Encryption at rest for draw results. Receiver ids are sealed with
/// AES-256-GCM and wrapped in a version-tagged envelope (`v<n>:<base64>`)
/// so keys can be rotated and old rows re-encrypted in place.

pub mod encrypt;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod receiver;

pub use envelope::{CipherCodec, CipherVersion, Keyring, extract_version};
pub use error::{CryptoError, DecodeError};
pub use receiver::{ReceiverError, ReceiverRef};
