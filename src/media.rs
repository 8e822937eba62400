//! Temporary media (material) API
//!
//! - Upload:   POST {api_base}/cgi-bin/media/upload?access_token=ACCESS_TOKEN&type=TYPE
//!             form-data field name: "media"; include filename=..., filelength=..., Content-Type
//! - Download: GET  {api_base}/cgi-bin/media/get?access_token=ACCESS_TOKEN&media_id=MEDIA_ID
//!
//! Notes
//! - media_id is valid for 3 days
//! - Limits: image 10MB (bmp/png/jpeg/jpg/gif), voice 2MB (<=60s, amr/mp3),
//!   video 10MB (mp4), thumb 64KB (jpg)
//! - Errors come back as JSON { errcode, errmsg }; success on download is the raw file,
//!   except video which answers with JSON { video_url }.
//!
//! Example:
//! ```ignore
//! let data = std::fs::read("demo.png")?;
//! let up = client.media_upload(MediaType::Image, "demo.png", None, data).await?;
//! let got = client.media_get(&up.media_id).await?;
//! ```

use bytes::Bytes;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::client::{WxOpenClient, decode_body};
use crate::digest::md5_hex;
use crate::keygen::generate_nonce;
use crate::Result;

/// Media type for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Voice,
    Video,
    Thumb,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Voice => "voice",
            MediaType::Video => "video",
            MediaType::Thumb => "thumb",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaUploadResult {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Absent for thumb uploads, which return `thumb_media_id`
    #[serde(default)]
    pub media_id: String,
    #[serde(default)]
    pub thumb_media_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl MediaUploadResult {
    /// media_id, or thumb_media_id for thumbs
    pub fn id(&self) -> &str {
        match &self.thumb_media_id {
            Some(t) if self.media_id.is_empty() => t,
            _ => &self.media_id,
        }
    }
}

/// A successful `media/get` response
#[derive(Debug, Clone)]
pub struct MediaContent {
    pub status: u16,
    pub content_type: Option<String>,
    /// Suggested filename, if any
    pub content_disposition: Option<String>,
    /// Download link returned for video media instead of the bytes
    pub video_url: Option<String>,
    pub bytes: Bytes,
}

impl WxOpenClient {
    /// Upload a temporary media with a hand-built multipart/form-data body.
    ///
    /// `content_type` defaults to a guess from the filename extension.
    #[instrument(level = "debug", skip(self, data))]
    pub async fn media_upload(
        &self,
        media_type: MediaType,
        filename: &str,
        content_type: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Result<MediaUploadResult> {
        let data: Bytes = data.into();
        let mime = content_type.unwrap_or_else(|| guess_mime_from_filename(filename));
        let boundary = format!("----wxopen-rs-{}", generate_nonce(24));
        let body = build_multipart_body(&boundary, filename, mime, &data);
        let content_type_header = format!("multipart/form-data; boundary={}", boundary);
        debug!(
            len = data.len(),
            md5 = %md5_hex(&data),
            kind = media_type.as_str(),
            "media_upload"
        );

        let path = "/cgi-bin/media/upload";
        let query: &[(&str, &str)] = &[("type", media_type.as_str())];
        let (body, content_type_header) = (&body, content_type_header.as_str());
        self.execute(path, move || async move {
            let token = self.access_token().await?;
            let url = self.url(path, query, Some(&token))?;
            // Bytes clone is a refcount bump
            let res = self
                .upload_once(path, url, content_type_header, body.clone())
                .await;
            self.after_call(res).await
        })
        .await
    }

    /// Download a temporary media. JSON error bodies map to [`crate::Error::Wx`].
    #[instrument(level = "debug", skip(self))]
    pub async fn media_get(&self, media_id: &str) -> Result<MediaContent> {
        let path = "/cgi-bin/media/get";
        let query: &[(&str, &str)] = &[("media_id", media_id)];
        self.execute(path, move || async move {
            let token = self.access_token().await?;
            let url = self.url(path, query, Some(&token))?;
            let res = self.download_once(path, url).await;
            self.after_call(res).await
        })
        .await
    }

    async fn upload_once(
        &self,
        path: &str,
        url: reqwest::Url,
        content_type_header: &str,
        body: Bytes,
    ) -> Result<MediaUploadResult> {
        let resp = self
            .http()
            .post(url)
            .header(CONTENT_TYPE, content_type_header)
            .body(body)
            .send()
            .await?;
        self.decode(path, resp).await
    }

    async fn download_once(&self, path: &str, url: reqwest::Url) -> Result<MediaContent> {
        let resp = self.http().get(url).send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await?;
        into_media_content(path, status, &headers, bytes)
    }
}

fn into_media_content(
    op: &str,
    status: u16,
    headers: &HeaderMap,
    bytes: Bytes,
) -> Result<MediaContent> {
    let content_type = header_string(headers, CONTENT_TYPE.as_str());
    let is_json = content_type
        .as_deref()
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("application/json") || ct.starts_with("text/plain")
        })
        .unwrap_or(false)
        || starts_like_json(&bytes);

    if is_json {
        #[derive(Deserialize)]
        struct VideoUrl {
            video_url: String,
        }
        // errcode != 0 becomes Error::Wx here
        let v = decode_body::<VideoUrl>(op, status, &bytes)?;
        return Ok(MediaContent {
            status,
            content_type,
            content_disposition: None,
            video_url: Some(v.video_url),
            bytes,
        });
    }

    Ok(MediaContent {
        status,
        content_type,
        content_disposition: header_string(headers, CONTENT_DISPOSITION.as_str()),
        video_url: None,
        bytes,
    })
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn starts_like_json(b: &[u8]) -> bool {
    let t = b.iter().position(|c| !c.is_ascii_whitespace());
    matches!(t.map(|i| b[i]), Some(b'{'))
}

/// multipart/form-data body:
/// --boundary\r\n
/// Content-Disposition: form-data; name="media"; filename="..."; filelength=LEN\r\n
/// Content-Type: MIME\r\n
/// \r\n
/// <bytes>\r\n
/// --boundary--\r\n
fn build_multipart_body(boundary: &str, filename: &str, mime: &str, data: &[u8]) -> Bytes {
    let mut buf =
        Vec::with_capacity(boundary.len() + filename.len() + mime.len() + data.len() + 256);
    push_str(&mut buf, "--");
    push_str(&mut buf, boundary);
    push_str(&mut buf, "\r\n");
    push_str(
        &mut buf,
        &format!(
            "Content-Disposition: form-data; name=\"media\"; filename=\"{}\"; filelength={}\r\n",
            filename.replace('"', "_"),
            data.len()
        ),
    );
    push_str(&mut buf, &format!("Content-Type: {}\r\n\r\n", mime));
    buf.extend_from_slice(data);
    push_str(&mut buf, "\r\n--");
    push_str(&mut buf, boundary);
    push_str(&mut buf, "--\r\n");
    Bytes::from(buf)
}

fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
}

fn guess_mime_from_filename(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "amr" => "audio/amr",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
