//! Send a customer-service (kefu) message.
//!
//! ```bash
//! WXOPEN_APPID=wx... WXOPEN_SECRET=... \
//! cargo run --example send_kefu -- OPENID "你好" [kf_account]
//! ```
//!
//! The user must have interacted with the account within the last 48 hours,
//! otherwise WeChat answers 45015.

use std::env;

use dotenvy::dotenv;
use tracing::{error, info};
use wxopen_rs::{KefuMessage, WxOpenClient, WxOpenConfig, errcode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = env::args().skip(1);
    let touser = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: send_kefu OPENID TEXT [KF_ACCOUNT]"))?;
    let text = args.next().unwrap_or_else(|| "Hello from wxopen-rs".to_string());
    let kf_account = args.next();

    let client = WxOpenClient::new(WxOpenConfig::from_env()?)?;

    let mut builder = KefuMessage::text().to_user(&touser).content(text);
    if let Some(account) = kf_account {
        builder = builder.kf_account(account);
    }
    let msg = builder.build();
    info!(payload = %msg.to_json()?, "sending");

    match client.kefu_send(&msg).await {
        Ok(()) => info!("kefu message sent"),
        Err(e) => {
            if let Some(code) = e.errcode() {
                error!("{}", errcode::explain(code, &e.to_string()));
            }
            return Err(e.into());
        }
    }
    Ok(())
}
