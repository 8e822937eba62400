//! Official Account / Open Platform HTTP client.
//!
//! `WxOpenClient` owns the `reqwest::Client`, the configuration and the
//! access_token cache. API modules (`menu`, `kefu`, `template`, ...) add
//! methods on it through `get`/`post`, which:
//! - attach a cached access_token,
//! - decode the `{errcode, errmsg}` envelope into [`Error::Wx`],
//! - drop the cached token when upstream says it is invalid or expired,
//! - retry busy answers (errcode -1) per the configured [`RetryPolicy`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::WxOpenConfig;
use crate::error::{WxError, redact_body};
use crate::errcode;
use crate::retry::{BUSY_ERRCODE, RetryPolicy, execute_with_retry};
use crate::token::TokenCache;
use crate::{Error, Result};

/// Body of calls that only report success: `{"errcode":0,"errmsg":"ok"}`
#[derive(Clone, Debug, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

#[derive(Clone, Debug)]
pub struct WxOpenClient {
    http: reqwest::Client,
    config: Arc<WxOpenConfig>,
    token: Arc<TokenCache>,
}

impl WxOpenClient {
    pub fn new(config: WxOpenConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self::with_http(config, http))
    }

    /// Use a custom `reqwest::Client`
    pub fn with_http(config: WxOpenConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config: Arc::new(config),
            token: Arc::new(TokenCache::new()),
        }
    }

    pub fn config(&self) -> &WxOpenConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn token_cache(&self) -> &TokenCache {
        &self.token
    }

    /// Run a custom call under the client's busy retry policy.
    pub async fn execute<T, F, Fut>(&self, op: &str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        execute_with_retry(&self.retry_policy(), op, f).await
    }

    /// Authenticated GET returning a decoded JSON body.
    #[instrument(level = "debug", skip(self, query))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.execute(path, move || async move {
            let token = self.access_token().await?;
            let res = self.send_get(path, query, Some(&token)).await;
            self.after_call(res).await
        })
        .await
    }

    /// Authenticated POST with a JSON body.
    #[instrument(level = "debug", skip(self, body))]
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.execute(path, move || async move {
            let token = self.access_token().await?;
            let res = self.send_post_json(path, &[], body, Some(&token)).await;
            self.after_call(res).await
        })
        .await
    }

    /// Authenticated POST with extra query parameters.
    pub async fn post_with_query<B, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.execute(path, move || async move {
            let token = self.access_token().await?;
            let res = self.send_post_json(path, query, body, Some(&token)).await;
            self.after_call(res).await
        })
        .await
    }

    /// WeChat callback server IPs (GET /cgi-bin/getcallbackip).
    pub async fn callback_ip(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct IpList {
            #[serde(default)]
            ip_list: Vec<String>,
        }
        let list: IpList = self.get("/cgi-bin/getcallbackip", &[]).await?;
        Ok(list.ip_list)
    }

    /// Build `{api_base}{path}?access_token=..&query..`
    pub(crate) fn url(
        &self,
        path: &str,
        query: &[(&str, &str)],
        access_token: Option<&str>,
    ) -> Result<Url> {
        let raw = format!("{}{}", self.config.api_base.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        {
            let mut qp = url.query_pairs_mut();
            if let Some(t) = access_token {
                qp.append_pair("access_token", t);
            }
            for (k, v) in query {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Single GET attempt, no retry.
    pub(crate) async fn send_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        access_token: Option<&str>,
    ) -> Result<T> {
        let url = self.url(path, query, access_token)?;
        debug!(path, "GET");
        let resp = self.http.get(url).send().await?;
        self.decode(path, resp).await
    }

    /// Single JSON POST attempt, no retry.
    pub(crate) async fn send_post_json<B, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
        access_token: Option<&str>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, query, access_token)?;
        debug!(path, "POST");
        // Non-ASCII stays raw UTF-8; WeChat does not decode \uXXXX escapes in message text.
        let payload = serde_json::to_vec(body)?;
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(payload)
            .send()
            .await?;
        self.decode(path, resp).await
    }

    pub(crate) async fn decode<T: DeserializeOwned>(
        &self,
        path: &str,
        resp: reqwest::Response,
    ) -> Result<T> {
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        decode_body(path, status, &bytes)
    }

    /// Drop the cached token when upstream reports it invalid/expired.
    pub(crate) async fn after_call<T>(&self, res: Result<T>) -> Result<T> {
        if let Err(Error::Wx { code, .. }) = &res {
            if errcode::should_refresh_token(*code) {
                self.expire_access_token().await;
            }
        }
        res
    }
}

/// Decode a JSON body, mapping non-zero errcode to [`Error::Wx`].
pub(crate) fn decode_body<T: DeserializeOwned>(op: &str, status: u16, bytes: &[u8]) -> Result<T> {
    if let Ok(err) = serde_json::from_slice::<WxError>(bytes) {
        if err.errcode != 0 {
            if err.errcode == BUSY_ERRCODE {
                debug!(op, "weixin busy");
            } else {
                warn!(op, "{}", errcode::explain(err.errcode, &err.errmsg));
            }
            return Err(err.into());
        }
    }
    serde_json::from_slice::<T>(bytes).map_err(|de_err| Error::UnexpectedResponse {
        status,
        error: de_err.to_string(),
        body: redact_body(bytes),
    })
}
