//! Create a default menu, print the current menus, optionally add a
//! conditional menu for one tag.
//!
//! ```bash
//! WXOPEN_APPID=wx... WXOPEN_SECRET=... cargo run --example menu_create
//! WXOPEN_MENU_TAG_ID=100 cargo run --example menu_create
//! ```

use dotenvy::dotenv;
use tracing::info;
use wxopen_rs::{Menu, MenuButton, MenuRule, WxOpenClient, WxOpenConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let client = WxOpenClient::new(WxOpenConfig::from_env()?)?;

    let menu = Menu::new(vec![
        MenuButton::click("今日歌曲", "V1001_TODAY_MUSIC"),
        MenuButton::parent(
            "菜单",
            vec![
                MenuButton::view("搜索", "https://www.soso.com/"),
                MenuButton::click("赞一下我们", "V1001_GOOD"),
            ],
        ),
    ]);
    info!(json = %menu.to_json()?, "creating menu");
    client.menu_create(&menu).await?;

    if let Ok(tag_id) = std::env::var("WXOPEN_MENU_TAG_ID") {
        let conditional = Menu::new(vec![MenuButton::click("会员专区", "VIP")]).with_rule(MenuRule {
            tag_id: Some(tag_id),
            ..Default::default()
        });
        if let Some(id) = client.menu_create(&conditional).await? {
            println!("conditional menu id: {id}");
        }
    }

    match client.menu_get().await? {
        Some(info) => {
            println!("default menu: {} buttons", info.menu.button.len());
            for m in &info.conditional_menus {
                println!(
                    "conditional menu {:?}: {} buttons",
                    m.menu_id(),
                    m.button.len()
                );
            }
        }
        None => println!("no menu configured"),
    }
    Ok(())
}
