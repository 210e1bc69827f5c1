use thiserror::Error;

use santa_types::UserId;

use crate::envelope::CipherCodec;
use crate::error::DecodeError;

/// Where an assignment row keeps its receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverRef {
    Cipher(String),
    /// Rows written before encryption at rest carry the plain id only.
    LegacyPlain(UserId),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiverError {
    #[error("assignment has no receiver")]
    Missing,

    #[error("receiver cipher unreadable: {0}")]
    Unreadable(#[from] DecodeError),
}

impl ReceiverRef {
    /// Build from the two storage columns. A cipher always takes precedence
    /// over the legacy plaintext column.
    pub fn from_columns(cipher: Option<String>, legacy: Option<UserId>) -> Self {
        match (cipher, legacy) {
            (Some(c), _) if !c.is_empty() => Self::Cipher(c),
            (_, Some(id)) => Self::LegacyPlain(id),
            _ => Self::Missing,
        }
    }

    pub fn resolve(&self, codec: &CipherCodec) -> Result<UserId, ReceiverError> {
        match self {
            Self::Cipher(envelope) => Ok(codec.decode(envelope)?),
            Self::LegacyPlain(id) => Ok(*id),
            Self::Missing => Err(ReceiverError::Missing),
        }
    }
}
