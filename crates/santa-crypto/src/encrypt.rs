use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};

use crate::error::CryptoError;
use crate::keys;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Encrypt a plaintext with AES-256-GCM under a fresh random nonce.
/// Returns (ciphertext, nonce).
pub fn encrypt_message(
    key: &keys::Key,
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt a ciphertext with AES-256-GCM.
pub fn decrypt_message(
    key: &keys::Key,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::DecryptionFailed);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let message = b"1042";

        let (ciphertext, nonce) = encrypt_message(&key, message).unwrap();
        assert_ne!(&ciphertext[..], &message[..]);
        assert_eq!(ciphertext.len(), message.len() + TAG_LEN);

        let decrypted = decrypt_message(&key, &ciphertext, &nonce).unwrap();
        assert_eq!(decrypted, message);
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = generate_key();
        let key2 = generate_key();

        let (ciphertext, nonce) = encrypt_message(&key1, b"17").unwrap();
        assert!(decrypt_message(&key2, &ciphertext, &nonce).is_err());
    }

    #[test]
    fn bad_nonce_length_fails() {
        let key = generate_key();
        let (ciphertext, _) = encrypt_message(&key, b"17").unwrap();
        assert!(decrypt_message(&key, &ciphertext, &[0u8; 8]).is_err());
    }
}
