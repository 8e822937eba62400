#![doc = r#"
wxopen-rs

WeChat Official Account / Open Platform API client.

Every API call goes through `WxOpenClient`, which attaches a cached
access_token and retries "system busy" answers (errcode -1) a bounded number
of times with a fixed sleep before giving up with `Error::RetryExhausted`.

Modules:
- config / client / token / retry: configuration, HTTP plumbing, token cache, busy retry
- crypto / keygen: callback signatures, AES message encryption, key generation
- message / router / session: callback XML in, passive XML replies out, rule-based dispatch, per-user sessions
- kefu / template / menu / semantic / media: JSON APIs
- errcode: errcode hints; digest / regex_util: MD5 and regex helpers

Quick usage:

```ignore
use wxopen_rs::{KefuMessage, WxOpenClient, WxOpenConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // WXOPEN_APPID, WXOPEN_SECRET, optional WXOPEN_MAX_RETRY_TIMES / WXOPEN_RETRY_SLEEP_MS
    let client = WxOpenClient::new(WxOpenConfig::from_env()?)?;

    let msg = KefuMessage::text().to_user("OPENID").content("hello").build();
    client.kefu_send(&msg).await?;
    Ok(())
}
```
"#]

pub mod client;
pub mod config;
pub mod crypto;
pub mod digest;
pub mod errcode;
pub mod error;
pub mod kefu;
pub mod keygen;
pub mod media;
pub mod menu;
pub mod message;
pub mod regex_util;
pub mod retry;
pub mod router;
pub mod semantic;
pub mod session;
pub mod template;
pub mod token;

pub use client::{Ack, WxOpenClient};
pub use config::WxOpenConfig;
pub use crypto::{CryptoError, MessageCrypt};
pub use error::{Error, Result, WxError};
pub use kefu::KefuMessage;
pub use media::MediaType;
pub use menu::{Menu, MenuButton, MenuRule};
pub use message::{AuthorizeMessage, InMessage, MsgType, OutMessage};
pub use retry::{RetryPolicy, execute_with_retry};
pub use router::{Context, LogHandler, MessageHandler, MessageInterceptor, MessageRouter};
pub use semantic::SemanticQuery;
pub use session::{Session, SessionManager};
pub use template::{TemplateIndustry, TemplateMessage};
pub use token::AccessToken;
