//! Send a template message.
//!
//! ```bash
//! WXOPEN_APPID=wx... WXOPEN_SECRET=... \
//! cargo run --example template_send -- OPENID TEMPLATE_ID
//! ```

use std::env;

use dotenvy::dotenv;
use wxopen_rs::{TemplateMessage, WxOpenClient, WxOpenConfig};

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
    let (Some(touser), Some(template_id)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: template_send OPENID TEMPLATE_ID");
    };

    let client = WxOpenClient::new(WxOpenConfig::from_env()?)?;

    let industry = client.template_get_industry().await?;
    println!(
        "industry: {:?} / {:?}",
        industry.primary_industry.second_class, industry.second_industry.second_class
    );

    let msg = TemplateMessage::new(touser, template_id)
        .url("https://weixin.qq.com/")
        .data_with_color("first", "恭喜你购买成功！", "#173177")
        .data("keyword1", "巧克力")
        .data("keyword2", "39.8元")
        .data("remark", "欢迎再次购买！");
    let msgid = client.template_send(&msg).await?;
    println!("template message sent, msgid={msgid}");

    for t in client.template_list().await? {
        println!("- {} {}", t.template_id, t.title);
    }
    Ok(())
}
