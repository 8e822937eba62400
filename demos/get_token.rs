use dotenvy::dotenv;
use wxopen_rs::{WxOpenClient, WxOpenConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 运行方式：
    //   cargo run --example get_token
    //
    // 环境变量：
    // - WXOPEN_APPID, WXOPEN_SECRET（必填）
    // - WXOPEN_MAX_RETRY_TIMES, WXOPEN_RETRY_SLEEP_MS（可选，系统繁忙重试）

    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wxopen_rs=debug".into()),
        )
        .init();

    let cfg = WxOpenConfig::from_env()?;
    if cfg.appid.starts_with("ww") {
        eprintln!("提示：appid 以 ww 开头通常是企业微信 corpid，公众号接口需要 wx 开头的 AppID");
    }
    let client = WxOpenClient::new(cfg)?;

    let token = client.fetch_access_token().await?;
    println!(
        "[OK] access_token 获取成功：{}\n有效期：{} 秒",
        token.access_token, token.expires_in
    );

    // 缓存命中：第二次调用不再请求上游
    let cached = client.access_token().await?;
    println!("缓存 access_token：{}", cached);

    match client.callback_ip().await {
        Ok(ips) => println!("微信服务器 IP（{} 个）：{:?}", ips.len(), ips),
        Err(e) => eprintln!("[ERR] getcallbackip 失败: {e}"),
    }

    Ok(())
}
