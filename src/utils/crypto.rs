// src/utils/crypto.rs

//! Reversible password cipher.
//!
//! Passwords are stored AES-256-GCM encrypted, base64 encoded as
//! `ciphertext || nonce` (12-byte nonce at the end). Login decrypts the
//! stored value and compares plaintexts, so `decrypt(encrypt(p)) == p`
//! must hold. This is NOT a one-way hash; anyone holding the key can
//! recover every password.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::AppError;

const NONCE_LEN: usize = 12;

fn cipher(secret: &str) -> Aes256Gcm {
    // Secret shorter than 32 bytes is zero-padded, longer is truncated.
    let mut key = [0u8; 32];
    let bytes = secret.as_bytes();
    let n = bytes.len().min(32);
    key[..n].copy_from_slice(&bytes[..n]);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
}

pub fn encrypt_password(secret: &str, plaintext: &str) -> Result<String, AppError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut out = cipher(secret)
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    out.extend_from_slice(nonce.as_slice());
    Ok(BASE64.encode(out))
}

pub fn decrypt_password(secret: &str, stored: &str) -> Result<String, AppError> {
    let raw = BASE64
        .decode(stored)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if raw.len() <= NONCE_LEN {
        return Err(AppError::Internal("stored password too short".to_string()));
    }
    let (ciphertext, nonce) = raw.split_at(raw.len() - NONCE_LEN);
    let plaintext = cipher(secret)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    String::from_utf8(plaintext).map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let stored = encrypt_password("key", "s3cret-pa55").unwrap();
        assert_ne!(stored, "s3cret-pa55");
        assert_eq!(decrypt_password("key", &stored).unwrap(), "s3cret-pa55");
    }

    #[test]
    fn same_password_encrypts_differently() {
        // Fresh nonce per call.
        let a = encrypt_password("key", "password123").unwrap();
        let b = encrypt_password("key", "password123").unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_password("key", &a).unwrap(), "password123");
        assert_eq!(decrypt_password("key", &b).unwrap(), "password123");
    }

    #[test]
    fn wrong_key_fails() {
        let stored = encrypt_password("key-one", "hunter2").unwrap();
        assert!(decrypt_password("key-two", &stored).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let stored = encrypt_password("key", "hunter2").unwrap();
        let mut raw = BASE64.decode(&stored).unwrap();
        raw[0] ^= 0xFF;
        assert!(decrypt_password("key", &BASE64.encode(raw)).is_err());
    }

    #[test]
    fn empty_password_still_roundtrips() {
        let stored = encrypt_password("key", "").unwrap();
        assert_eq!(decrypt_password("key", &stored).unwrap(), "");
    }
}
