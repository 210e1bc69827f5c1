use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use santa_types::UserId;

use crate::encrypt::{NONCE_LEN, TAG_LEN, decrypt_message, encrypt_message};
use crate::error::{CryptoError, DecodeError};
use crate::keys::Key;

/// Version tag carried by an envelope.
///
/// Envelopes without a recognizable `v<digits>:` prefix predate versioning
/// and are `Legacy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CipherVersion {
    Legacy,
    Numbered(u32),
}

impl fmt::Display for CipherVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Numbered(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for CipherVersion {
    type Err = String;

    /// Accepts `legacy`, `3` or `v3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("legacy") {
            return Ok(Self::Legacy);
        }
        let digits = s.strip_prefix('v').unwrap_or(s);
        parse_digits(digits)
            .map(Self::Numbered)
            .ok_or_else(|| format!("invalid cipher version '{}'", s))
    }
}

impl From<CipherVersion> for String {
    fn from(v: CipherVersion) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for CipherVersion {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Split an envelope into its version tag and base64 body. Never fails:
/// anything without a well-formed prefix is a legacy body.
fn split_envelope(envelope: &str) -> (CipherVersion, &str) {
    let numbered = envelope
        .strip_prefix('v')
        .and_then(|rest| rest.split_once(':'))
        .and_then(|(digits, body)| parse_digits(digits).map(|n| (n, body)));

    match numbered {
        Some((n, body)) => (CipherVersion::Numbered(n), body),
        None => (CipherVersion::Legacy, envelope),
    }
}

/// Version tag of an envelope; `Legacy` when no `v<digits>:` prefix is present.
pub fn extract_version(envelope: &str) -> CipherVersion {
    split_envelope(envelope).0
}

/// Keys by cipher version, plus the key for unprefixed legacy envelopes.
#[derive(Clone, Default)]
pub struct Keyring {
    keys: BTreeMap<u32, Key>,
    legacy: Option<Key>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, version: u32, key: Key) -> Self {
        self.keys.insert(version, key);
        self
    }

    pub fn with_legacy_key(mut self, key: Key) -> Self {
        self.legacy = Some(key);
        self
    }

    /// Legacy envelopes were sealed with the application key, which became
    /// the `v1` key, so fall back to it when no explicit legacy key is set.
    pub fn key_for(&self, version: CipherVersion) -> Option<&Key> {
        match version {
            CipherVersion::Legacy => self.legacy.as_ref().or_else(|| self.keys.get(&1)),
            CipherVersion::Numbered(n) => self.keys.get(&n),
        }
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("versions", &self.keys.keys().collect::<Vec<_>>())
            .field("legacy", &self.legacy.is_some())
            .finish()
    }
}

/// Reversible mapping between a user id and an opaque, versioned string.
///
/// Safe to share across threads; holds only read-only key material.
#[derive(Debug, Clone)]
pub struct CipherCodec {
    keyring: Keyring,
    current: CipherVersion,
}

impl CipherCodec {
    pub fn new(keyring: Keyring, current: CipherVersion) -> Result<Self, CryptoError> {
        if keyring.key_for(current).is_none() {
            return Err(CryptoError::MissingKey(current));
        }
        Ok(Self { keyring, current })
    }

    pub fn current_version(&self) -> CipherVersion {
        self.current
    }

    /// Seal `plain` under `version`. Every call uses a fresh nonce, so two
    /// encodes of the same id never produce the same string.
    pub fn encode(&self, plain: UserId, version: CipherVersion) -> Result<String, CryptoError> {
        if plain < 0 {
            return Err(CryptoError::NegativePlaintext(plain));
        }
        let key = self
            .keyring
            .key_for(version)
            .ok_or(CryptoError::MissingKey(version))?;
        let body = seal(key, plain.to_string().as_bytes())?;

        Ok(match version {
            CipherVersion::Legacy => body,
            CipherVersion::Numbered(n) => format!("v{}:{}", n, body),
        })
    }

    pub fn encode_current(&self, plain: UserId) -> Result<String, CryptoError> {
        self.encode(plain, self.current)
    }

    pub fn decode(&self, envelope: &str) -> Result<UserId, DecodeError> {
        let (version, body) = split_envelope(envelope);
        let key = self
            .keyring
            .key_for(version)
            .ok_or(DecodeError::UnknownVersion(version))?;

        let raw = BASE64.decode(body).map_err(|_| DecodeError::Corrupt)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(DecodeError::Corrupt);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plain = decrypt_message(key, ciphertext, nonce).map_err(|_| DecodeError::Corrupt)?;

        let text = std::str::from_utf8(&plain).map_err(|_| DecodeError::Malformed)?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecodeError::Malformed);
        }
        text.parse::<UserId>().map_err(|_| DecodeError::Malformed)
    }

    pub fn is_current(&self, envelope: &str) -> bool {
        extract_version(envelope) == self.current
    }
}

/// `base64(nonce || ciphertext || tag)`
fn seal(key: &Key, plaintext: &[u8]) -> Result<String, CryptoError> {
    let (ciphertext, nonce) = encrypt_message(key, plaintext)?;
    let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(raw))
}
