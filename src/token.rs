//! Access token fetching and in-process caching.
//!
//! Endpoint:
//! GET {api_base}/cgi-bin/token?grant_type=client_credential&appid=APPID&secret=APPSECRET
//!
//! The cache keeps one token per client. A token is treated as expired
//! `REFRESH_MARGIN_SECS` before upstream says so. Refresh is single-flight:
//! the cache mutex is held across the upstream call, so concurrent callers
//! wait for one fetch instead of each hitting the rate-limited endpoint.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::client::WxOpenClient;
use crate::error::mask_id;
use crate::retry::execute_with_retry;
use crate::Result;

/// Seconds subtracted from `expires_in` before a cached token is considered stale.
pub const REFRESH_MARGIN_SECS: u64 = 200;

/// Successful access_token response
#[derive(Clone, Debug, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Lifetime in seconds (7200 upstream)
    pub expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// In-process token cache for one credential pair.
#[derive(Debug, Default)]
pub struct TokenCache {
    inner: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token if present and not within the refresh margin.
    pub async fn current(&self) -> Option<String> {
        let guard = self.inner.lock().await;
        guard
            .as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.value.clone())
    }

    pub async fn invalidate(&self) {
        let mut guard = self.inner.lock().await;
        if guard.take().is_some() {
            debug!("cached access_token invalidated");
        }
    }

    /// Return the cached token, or run `fetch` while holding the lock and store its result.
    pub async fn get_or_refresh<F, Fut>(&self, force: bool, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<AccessToken>>,
    {
        let mut guard = self.inner.lock().await;
        if !force {
            if let Some(t) = guard.as_ref().filter(|t| Instant::now() < t.expires_at) {
                return Ok(t.value.clone());
            }
        }

        let fresh = fetch().await?;
        let ttl = fresh.expires_in.saturating_sub(REFRESH_MARGIN_SECS);
        *guard = Some(CachedToken {
            value: fresh.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        debug!(ttl_secs = ttl, "access_token cached");
        Ok(fresh.access_token)
    }
}

impl WxOpenClient {
    /// Cached access_token, fetched from upstream when missing or stale.
    pub async fn access_token(&self) -> Result<String> {
        self.token_cache()
            .get_or_refresh(false, || self.fetch_access_token())
            .await
    }

    /// Fetch a new access_token regardless of the cache.
    pub async fn refresh_access_token(&self) -> Result<String> {
        self.token_cache()
            .get_or_refresh(true, || self.fetch_access_token())
            .await
    }

    /// Drop the cached access_token; the next call fetches a new one.
    pub async fn expire_access_token(&self) {
        self.token_cache().invalidate().await
    }

    /// Call the token endpoint (with busy retry). Does not touch the cache.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_access_token(&self) -> Result<AccessToken> {
        let cfg = self.config();
        if cfg.appid.starts_with("ww") {
            tracing::warn!(
                "appid starts with 'ww' (looks like a WeCom corpid); Official Account APIs need the 'wx' AppID"
            );
        }
        debug!(
            appid = %mask_id(&cfg.appid),
            "requesting access_token (no secrets logged)"
        );

        let query: &[(&str, &str)] = &[
            ("grant_type", "client_credential"),
            ("appid", cfg.appid.as_str()),
            ("secret", cfg.secret.as_str()),
        ];
        let policy = self.retry_policy();
        execute_with_retry(&policy, "cgi-bin/token", move || {
            self.send_get::<AccessToken>("/cgi-bin/token", query, None)
        })
        .await
    }
}
