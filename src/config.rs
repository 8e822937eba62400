//! Client configuration.
//!
//! Environment variables read by [`WxOpenConfig::from_env`]:
//! - `WXOPEN_APPID`, `WXOPEN_SECRET` (required)
//! - `WXOPEN_TOKEN`: callback signature token
//! - `WXOPEN_AES_KEY`: 43-char EncodingAESKey
//! - `WXOPEN_API_BASE`: defaults to `https://api.weixin.qq.com`
//! - `WXOPEN_MAX_RETRY_TIMES`, `WXOPEN_RETRY_SLEEP_MS`: busy retry budget
//! - `WXOPEN_HTTP_TIMEOUT_SECS`
//!
//! Binaries usually call `dotenvy::dotenv()` first so a local `.env` works.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::mask_id;
use crate::retry::{DEFAULT_MAX_RETRY_TIMES, DEFAULT_RETRY_SLEEP_MILLIS, RetryPolicy};
use crate::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct WxOpenConfig {
    pub appid: String,
    pub secret: String,
    /// Token configured for callback signature verification
    pub token: Option<String>,
    /// 43-char EncodingAESKey for encrypted callbacks
    pub encoding_aes_key: Option<String>,
    pub api_base: String,
    pub max_retry_times: u32,
    pub retry_sleep_millis: u64,
    pub http_timeout_secs: u64,
}

impl WxOpenConfig {
    pub fn new(appid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            appid: appid.into(),
            secret: secret.into(),
            token: None,
            encoding_aes_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            retry_sleep_millis: DEFAULT_RETRY_SLEEP_MILLIS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_encoding_aes_key(mut self, key: impl Into<String>) -> Self {
        self.encoding_aes_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_max_retry_times(mut self, n: u32) -> Self {
        self.max_retry_times = n;
        self
    }

    pub fn with_retry_sleep_millis(mut self, ms: u64) -> Self {
        self.retry_sleep_millis = ms;
        self
    }

    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retry_times,
            Duration::from_millis(self.retry_sleep_millis),
        )
    }

    pub fn from_env() -> Result<Self> {
        let appid = required("WXOPEN_APPID")?;
        let secret = required("WXOPEN_SECRET")?;
        let mut cfg = Self::new(appid, secret);

        cfg.token = optional("WXOPEN_TOKEN");
        cfg.encoding_aes_key = optional("WXOPEN_AES_KEY");
        if let Some(base) = optional("WXOPEN_API_BASE") {
            cfg.api_base = base;
        }
        if let Some(n) = parsed("WXOPEN_MAX_RETRY_TIMES")? {
            cfg.max_retry_times = n;
        }
        if let Some(ms) = parsed("WXOPEN_RETRY_SLEEP_MS")? {
            cfg.retry_sleep_millis = ms;
        }
        if let Some(secs) = parsed("WXOPEN_HTTP_TIMEOUT_SECS")? {
            cfg.http_timeout_secs = secs;
        }
        Ok(cfg)
    }
}

// Secrets never reach logs.
impl fmt::Debug for WxOpenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WxOpenConfig")
            .field("appid", &mask_id(&self.appid))
            .field("secret", &"[redacted]")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field(
                "encoding_aes_key",
                &self.encoding_aes_key.as_ref().map(|_| "[redacted]"),
            )
            .field("api_base", &self.api_base)
            .field("max_retry_times", &self.max_retry_times)
            .field("retry_sleep_millis", &self.retry_sleep_millis)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| Error::Config(format!("missing environment variable {name}")))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match optional(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_setters() {
        let cfg = WxOpenConfig::new("wx1234567890ab", "s3cret")
            .with_token("tok")
            .with_max_retry_times(3)
            .with_retry_sleep_millis(500);
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(
            cfg.retry_policy(),
            RetryPolicy::new(3, Duration::from_millis(500))
        );
        assert_eq!(cfg.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
    }

    #[test]
    fn debug_hides_secrets() {
        let cfg = WxOpenConfig::new("wx1234567890ab", "s3cret").with_encoding_aes_key("KEYKEY");
        let s = format!("{cfg:?}");
        assert!(s.contains("wx***ab"));
        assert!(!s.contains("s3cret"));
        assert!(!s.contains("KEYKEY"));
    }
}
