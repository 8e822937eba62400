//! Unified error type for the client, crypto and XML layers.

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::retry::BUSY_ERRCODE;

/// WeChat API error body: `{"errcode": ..., "errmsg": "..."}`
#[derive(Clone, Debug, Deserialize)]
pub struct WxError {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("weixin error {code}: {message}")]
    Wx { code: i64, message: String },

    #[error("weixin service still busy after {attempts} attempts (errcode {code}: {message})")]
    RetryExhausted {
        attempts: u32,
        code: i64,
        message: String,
    },

    #[error("unexpected response (status {status}): {error}; body: {body}")]
    UnexpectedResponse {
        status: u16,
        error: String,
        body: String,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Upstream errcode carried by this error, if any.
    pub fn errcode(&self) -> Option<i64> {
        match self {
            Error::Wx { code, .. } | Error::RetryExhausted { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for a single "system busy" answer (not for an exhausted retry).
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Wx { code, .. } if *code == BUSY_ERRCODE)
    }

    pub(crate) fn xml<E: std::fmt::Display>(e: E) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<WxError> for Error {
    fn from(e: WxError) -> Self {
        Error::Wx {
            code: e.errcode,
            message: e.errmsg,
        }
    }
}

/// Mask an identifier for logs: `wx1234567890ab` -> `wx***ab`.
pub fn mask_id(id: &str) -> String {
    if id.chars().count() <= 4 {
        format!("{}***", id)
    } else {
        let head: String = id.chars().take(2).collect();
        let tail: String = id
            .chars()
            .rev()
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}***{}", head, tail)
    }
}

/// Redact `access_token` in JSON bodies and cap the length for error reports.
pub(crate) fn redact_body(bytes: &[u8]) -> String {
    let mut body = String::from_utf8_lossy(bytes).to_string();
    if let Ok(mut v) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(obj) = v.as_object_mut() {
            if obj.contains_key("access_token") {
                obj.insert(
                    "access_token".to_string(),
                    serde_json::Value::String("[redacted]".into()),
                );
            }
        }
        if let Ok(s) = serde_json::to_string(&v) {
            body = s;
        }
    }
    if body.len() > 2048 {
        let mut cut = 2048;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
