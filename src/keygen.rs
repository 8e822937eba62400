//! Key generation for callback configuration.
//!
//! - Token: alphanumeric, 1..=32 chars (default 32), used for SHA1 signatures.
//! - EncodingAESKey: 43 alphanumeric chars; appending '=' base64-decodes to the
//!   32-byte AES-256 key.
//! - Nonce: alphanumeric string for encrypted reply envelopes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};

use crate::crypto::AES_KEY_ENGINE;

fn alnum(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Alphanumeric token of `len` chars; 0 or anything above 32 yields 32.
pub fn generate_token(len: usize) -> String {
    let len = if len == 0 || len > 32 { 32 } else { len };
    alnum(len)
}

/// 43-char alphanumeric EncodingAESKey.
///
/// The console only accepts [A-Za-z0-9], so base64 output containing '+' or
/// '/' is rejected and regenerated.
pub fn generate_encoding_aes_key() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        let b64 = BASE64.encode(key);
        let trimmed = b64.trim_end_matches('=');
        if trimmed.len() == 43 && trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return trimmed.to_string();
        }
    }
}

/// Exactly 43 chars that decode to 32 bytes after appending '='.
pub fn verify_encoding_aes_key(key: &str) -> bool {
    if key.len() != 43 {
        return false;
    }
    matches!(AES_KEY_ENGINE.decode(format!("{key}=")), Ok(raw) if raw.len() == 32)
}

/// Alphanumeric nonce (default 16 chars when `len` is 0).
pub fn generate_nonce(len: usize) -> String {
    alnum(if len == 0 { 16 } else { len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_alnum_and_length() {
        for &len in &[8usize, 16, 32] {
            let t = generate_token(len);
            assert_eq!(t.len(), len);
            assert!(t.chars().all(|ch| ch.is_ascii_alphanumeric()));
        }
        assert_eq!(generate_token(64).len(), 32);
        assert_eq!(generate_token(0).len(), 32);
    }

    #[test]
    fn encoding_aes_key_generation_and_verify() {
        let key = generate_encoding_aes_key();
        assert_eq!(key.len(), 43);
        assert!(key.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert!(verify_encoding_aes_key(&key));
    }

    #[test]
    fn verify_rejects_wrong_length_and_charset() {
        assert!(!verify_encoding_aes_key("short"));
        assert!(!verify_encoding_aes_key(&"!".repeat(43)));
        assert!(verify_encoding_aes_key(
            "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG"
        ));
    }

    #[test]
    fn nonce_defaults_to_sixteen() {
        assert_eq!(generate_nonce(0).len(), 16);
        assert_eq!(generate_nonce(8).len(), 8);
    }
}
