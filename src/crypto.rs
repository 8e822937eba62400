//! Callback signature verification and message encryption.
//!
//! - Signature: SHA1 over the lexicographically sorted parts, lowercase hex
//! - Cipher: AES-256-CBC, key = base64(EncodingAESKey + "="), iv = key[..16]
//! - Plaintext layout: 16B random | 4B big-endian msg_len | msg | appid
//! - Padding: PKCS#7 to a 32-byte block (so pad values run 1..=32)

use aes::Aes256;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD as BASE64};
use base64::Engine;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::keygen::generate_nonce;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const PAD_BLOCK: usize = 32;

// Keys issued by the console do not always have zeroed trailing bits.
pub(crate) const AES_KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("invalid aes key length")]
    InvalidKey,
    #[error("cipher error")]
    Cipher,
    #[error("utf8 decode error: {0}")]
    Utf8(String),
    #[error("bad message format")]
    BadFormat,
    #[error("appid mismatch (expected {expected}, got {actual})")]
    AppIdMismatch { expected: String, actual: String },
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("<Encrypt> element not found")]
    MissingEncrypt,
}

/// SHA1 hex digest of the sorted, concatenated parts.
pub fn sha1_signature(parts: &[&str]) -> String {
    let mut v = parts.to_vec();
    v.sort_unstable();
    let mut hasher = Sha1::new();
    for p in v {
        hasher.update(p.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Verify the plain URL signature (`signature` query parameter).
pub fn verify_url_signature(token: &str, timestamp: &str, nonce: &str, signature: &str) -> bool {
    sha1_signature(&[token, timestamp, nonce]).eq_ignore_ascii_case(signature)
}

/// Verify the message signature (`msg_signature`, includes the encrypted payload).
pub fn verify_msg_signature(
    token: &str,
    timestamp: &str,
    nonce: &str,
    encrypt: &str,
    signature: &str,
) -> bool {
    sha1_signature(&[token, timestamp, nonce, encrypt]).eq_ignore_ascii_case(signature)
}

/// Server URL verification (plain mode): echo `echostr` back when the signature matches.
pub fn check_signature_echo(
    token: &str,
    timestamp: &str,
    nonce: &str,
    signature: &str,
    echostr: &str,
) -> Result<String, CryptoError> {
    if verify_url_signature(token, timestamp, nonce, signature) {
        Ok(echostr.to_string())
    } else {
        Err(CryptoError::SignatureMismatch)
    }
}

/// Extract the Encrypt field from a callback body (CDATA or plain text).
pub fn extract_encrypt(xml: &str) -> Option<String> {
    let start = xml.find("<Encrypt>")? + "<Encrypt>".len();
    let end = xml[start..].find("</Encrypt>")? + start;
    let inner = xml[start..end].trim();
    let inner = inner
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(inner);
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Message encryptor bound to one token / EncodingAESKey / appid.
#[derive(Clone)]
pub struct MessageCrypt {
    token: String,
    key: [u8; 32],
    appid: String,
}

impl std::fmt::Debug for MessageCrypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCrypt")
            .field("appid", &self.appid)
            .finish_non_exhaustive()
    }
}

impl MessageCrypt {
    pub fn new(token: &str, encoding_aes_key: &str, appid: &str) -> Result<Self, CryptoError> {
        Ok(Self {
            token: token.to_string(),
            key: decode_aes_key(encoding_aes_key)?,
            appid: appid.to_string(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Encrypt `plain` and return base64 ciphertext.
    pub fn encrypt(&self, plain: &str) -> Result<String, CryptoError> {
        let mut random = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut random);
        self.encrypt_with_random(&random, plain)
    }

    fn encrypt_with_random(&self, random: &[u8; 16], plain: &str) -> Result<String, CryptoError> {
        let msg = plain.as_bytes();
        let mut buf = Vec::with_capacity(16 + 4 + msg.len() + self.appid.len() + PAD_BLOCK);
        buf.extend_from_slice(random);
        buf.extend_from_slice(&(msg.len() as u32).to_be_bytes());
        buf.extend_from_slice(msg);
        buf.extend_from_slice(self.appid.as_bytes());

        let pad = PAD_BLOCK - (buf.len() % PAD_BLOCK);
        buf.resize(buf.len() + pad, pad as u8);

        let len = buf.len();
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| CryptoError::InvalidKey)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| CryptoError::Cipher)?;
        Ok(BASE64.encode(cipher))
    }

    /// Decrypt base64 ciphertext and check the trailing appid.
    pub fn decrypt(&self, cipher_b64: &str) -> Result<String, CryptoError> {
        let mut buf = BASE64
            .decode(normalize_b64(cipher_b64).as_bytes())
            .map_err(|e| CryptoError::Base64(e.to_string()))?;

        let plain = Aes256CbcDec::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| CryptoError::InvalidKey)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CryptoError::Cipher)?;

        let pad = *plain.last().ok_or(CryptoError::BadFormat)? as usize;
        if !(1..=PAD_BLOCK).contains(&pad) || pad > plain.len() {
            return Err(CryptoError::BadFormat);
        }
        let content = &plain[..plain.len() - pad];
        if content.len() < 20 {
            return Err(CryptoError::BadFormat);
        }

        let msg_len = u32::from_be_bytes([content[16], content[17], content[18], content[19]]) as usize;
        let body = &content[20..];
        if body.len() < msg_len {
            return Err(CryptoError::BadFormat);
        }
        let (msg, appid) = body.split_at(msg_len);

        let appid = std::str::from_utf8(appid).map_err(|e| CryptoError::Utf8(e.to_string()))?;
        if appid != self.appid {
            return Err(CryptoError::AppIdMismatch {
                expected: self.appid.clone(),
                actual: appid.to_string(),
            });
        }
        String::from_utf8(msg.to_vec()).map_err(|e| CryptoError::Utf8(e.to_string()))
    }

    /// Verify `msg_signature` over the body's `<Encrypt>` and decrypt it to the inner XML.
    pub fn decrypt_xml(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        body_xml: &str,
    ) -> Result<String, CryptoError> {
        let encrypt = extract_encrypt(body_xml).ok_or(CryptoError::MissingEncrypt)?;
        if !verify_msg_signature(&self.token, timestamp, nonce, &encrypt, msg_signature) {
            return Err(CryptoError::SignatureMismatch);
        }
        self.decrypt(&encrypt)
    }

    /// Encrypt a reply XML into the signed envelope WeChat expects.
    pub fn encrypt_to_xml(
        &self,
        reply_xml: &str,
        timestamp: &str,
        nonce: Option<&str>,
    ) -> Result<String, CryptoError> {
        let encrypt = self.encrypt(reply_xml)?;
        let nonce = nonce.map(str::to_string).unwrap_or_else(|| generate_nonce(16));
        let signature = sha1_signature(&[&self.token, timestamp, &nonce, &encrypt]);
        Ok(format!(
            "<xml><Encrypt><![CDATA[{encrypt}]]></Encrypt><MsgSignature><![CDATA[{signature}]]></MsgSignature><TimeStamp>{timestamp}</TimeStamp><Nonce><![CDATA[{nonce}]]></Nonce></xml>"
        ))
    }
}

/// Decode the 43-char EncodingAESKey into the 32-byte AES key.
fn decode_aes_key(encoding_aes_key: &str) -> Result<[u8; 32], CryptoError> {
    let mut key_b64 = encoding_aes_key.trim().to_string();
    if !key_b64.ends_with('=') {
        key_b64.push('=');
    }
    let key = AES_KEY_ENGINE
        .decode(key_b64.as_bytes())
        .map_err(|e| CryptoError::Base64(e.to_string()))?;
    key.as_slice().try_into().map_err(|_| CryptoError::InvalidKey)
}

// URL-safe alphabet and missing padding show up when bodies pass through proxies.
fn normalize_b64(s: &str) -> String {
    let mut t = s.trim().replace('-', "+").replace('_', "/");
    match t.len() % 4 {
        2 => t.push_str("=="),
        3 => t.push('='),
        _ => {}
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
    const APPID: &str = "wxb11529c136998cb6";

    fn crypt() -> MessageCrypt {
        MessageCrypt::new("pamtest", KEY, APPID).expect("crypt")
    }

    #[test]
    fn signature_is_order_independent_sha1() {
        let a = sha1_signature(&["b", "a", "c"]);
        let b = sha1_signature(&["c", "b", "a"]);
        assert_eq!(a, b);
        assert_eq!(a, "a9993e364706816aba3e25717850c26c9cd0d89d"); // sha1("abc")
        assert!(verify_url_signature("b", "a", "c", &a.to_uppercase()));
    }

    #[test]
    fn echo_requires_matching_signature() {
        let sig = sha1_signature(&["tok", "1409304348", "xxxxxx"]);
        assert_eq!(
            check_signature_echo("tok", "1409304348", "xxxxxx", &sig, "hello").expect("echo"),
            "hello"
        );
        assert!(matches!(
            check_signature_echo("tok", "1409304348", "xxxxxx", "bad", "hello"),
            Err(CryptoError::SignatureMismatch)
        ));
    }

    #[test]
    fn encrypt_then_decrypt_restores_message() {
        let c = crypt();
        let xml = "<xml><ToUserName><![CDATA[toUser]]></ToUserName><Content><![CDATA[你好]]></Content></xml>";
        let enc = c.encrypt(xml).expect("encrypt");
        assert_eq!(c.decrypt(&enc).expect("decrypt"), xml);
    }

    /// Encrypt `buf` as-is, leaving the caller in charge of the padding bytes.
    fn encrypt_raw(c: &MessageCrypt, mut buf: Vec<u8>) -> String {
        let len = buf.len();
        let cipher = Aes256CbcEnc::new_from_slices(&c.key, &c.key[..16])
            .expect("key")
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .expect("encrypt")
            .to_vec();
        BASE64.encode(cipher)
    }

    #[test]
    fn out_of_range_pad_byte_is_rejected() {
        let c = crypt();
        for last in [0x00u8, 0x21] {
            let mut buf = vec![7u8; 16];
            buf.extend_from_slice(&2u32.to_be_bytes());
            buf.extend_from_slice(b"hi");
            buf.extend_from_slice(APPID.as_bytes());
            buf.resize(64, b'x');
            buf[63] = last;
            assert!(
                matches!(c.decrypt(&encrypt_raw(&c, buf)), Err(CryptoError::BadFormat)),
                "pad byte {last:#04x}"
            );
        }
    }

    #[test]
    fn pad_of_full_block_is_handled() {
        // 16 + 4 + 12 = 32 -> a whole extra block of padding (value 32)
        let c = MessageCrypt::new("t", KEY, "").expect("crypt");
        let enc = c.encrypt_with_random(&[7u8; 16], "exactly12byt").expect("encrypt");
        assert_eq!(BASE64.decode(enc.as_bytes()).expect("b64").len(), 64);
        assert_eq!(c.decrypt(&enc).expect("decrypt"), "exactly12byt");
    }

    #[test]
    fn decrypt_rejects_other_appid() {
        let other = MessageCrypt::new("pamtest", KEY, "wxother").expect("crypt");
        let enc = other.encrypt("hi").expect("encrypt");
        assert!(matches!(
            crypt().decrypt(&enc),
            Err(CryptoError::AppIdMismatch { .. })
        ));
    }

    #[test]
    fn envelope_roundtrip_checks_signature() {
        let c = crypt();
        let env = c
            .encrypt_to_xml("<xml><A>1</A></xml>", "1409304348", Some("xxxxxx"))
            .expect("envelope");
        let sig = extract_between(&env, "<MsgSignature><![CDATA[", "]]></MsgSignature>");
        assert_eq!(
            c.decrypt_xml(&sig, "1409304348", "xxxxxx", &env).expect("decrypt"),
            "<xml><A>1</A></xml>"
        );
        assert!(matches!(
            c.decrypt_xml("deadbeef", "1409304348", "xxxxxx", &env),
            Err(CryptoError::SignatureMismatch)
        ));
    }

    #[test]
    fn extract_encrypt_handles_plain_and_cdata() {
        assert_eq!(
            extract_encrypt("<xml><Encrypt><![CDATA[abc]]></Encrypt></xml>").as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_encrypt("<xml><Encrypt>abc</Encrypt></xml>").as_deref(),
            Some("abc")
        );
        assert_eq!(extract_encrypt("<xml></xml>"), None);
    }

    #[test]
    fn rejects_short_key() {
        assert!(MessageCrypt::new("t", "abc", APPID).is_err());
    }

    fn extract_between(s: &str, a: &str, b: &str) -> String {
        let start = s.find(a).expect("start") + a.len();
        let end = s[start..].find(b).expect("end") + start;
        s[start..end].to_string()
    }
}
