/*!
Example: upload a temporary media file and download it back

Run:
  WXOPEN_APPID=wx... \
  WXOPEN_SECRET=... \
  WXOPEN_FILE_PATH=/path/to/file.jpg \
  WXOPEN_MEDIA_TYPE=image|voice|video|thumb \
  [optional] WXOPEN_CONTENT_TYPE=image/jpeg \
  cargo run --example media_upload

Temporary media_id values are valid for 3 days.
*/

use std::env;
use std::path::Path;

use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use wxopen_rs::digest::md5_hex;
use wxopen_rs::{MediaType, WxOpenClient, WxOpenConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wxopen_rs=debug".into()),
        )
        .init();

    let file_path = env::var("WXOPEN_FILE_PATH").context("set WXOPEN_FILE_PATH")?;
    let media_type = match env::var("WXOPEN_MEDIA_TYPE")
        .unwrap_or_else(|_| "image".into())
        .as_str()
    {
        "image" => MediaType::Image,
        "voice" => MediaType::Voice,
        "video" => MediaType::Video,
        "thumb" => MediaType::Thumb,
        other => bail!("unsupported WXOPEN_MEDIA_TYPE: {other}"),
    };
    let content_type = env::var("WXOPEN_CONTENT_TYPE").ok();

    let data = std::fs::read(&file_path).with_context(|| format!("failed to read {file_path}"))?;
    let filename = Path::new(&file_path)
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("cannot derive filename from {file_path}"))?;
    let local_md5 = md5_hex(&data);

    let client = WxOpenClient::new(WxOpenConfig::from_env()?)?;
    let up = client
        .media_upload(media_type, &filename, content_type.as_deref(), data)
        .await
        .context("media_upload failed")?;
    println!(
        "Uploaded: type={} media_id={} created_at={}",
        up.kind,
        up.id(),
        up.created_at
    );

    let got = client.media_get(up.id()).await.context("media_get failed")?;
    if let Some(url) = &got.video_url {
        println!("Video download url: {url}");
    } else {
        println!(
            "Downloaded {} bytes ({:?}), md5 match: {}",
            got.bytes.len(),
            got.content_type,
            md5_hex(&got.bytes) == local_md5
        );
    }
    Ok(())
}
