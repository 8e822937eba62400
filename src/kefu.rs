//! Customer service (kefu) messages
//!
//! Endpoint: POST {api_base}/cgi-bin/message/custom/send?access_token=ACCESS_TOKEN
//!
//! Notes:
//! - Only allowed within 48 hours after the user last interacted with the account.
//! - `customservice.kf_account` sends as a specific agent.
//!
//! Usage:
//!   let msg = KefuMessage::text().to_user(openid).content("hello").build();
//!   client.kefu_send(&msg).await?;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::client::{Ack, WxOpenClient};
use crate::error::mask_id;
use crate::Result;

/// Request body for message/custom/send
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KefuMessage {
    /// Recipient openid
    pub touser: String,
    /// Payload tagged by "msgtype"
    #[serde(flatten)]
    pub payload: KefuPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customservice: Option<CustomService>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CustomService {
    pub kf_account: String,
}

/// Supported payloads, tagged by "msgtype".
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum KefuPayload {
    Text { text: TextContent },
    Image { image: MediaContent },
    Voice { voice: MediaContent },
    Video { video: VideoContent },
    Music { music: MusicContent },
    News { news: NewsContent },
    /// Article already stored as permanent material
    Mpnews { mpnews: MediaContent },
    Wxcard { wxcard: WxCardContent },
}

impl KefuPayload {
    pub fn msg_type(&self) -> &'static str {
        match self {
            KefuPayload::Text { .. } => "text",
            KefuPayload::Image { .. } => "image",
            KefuPayload::Voice { .. } => "voice",
            KefuPayload::Video { .. } => "video",
            KefuPayload::Music { .. } => "music",
            KefuPayload::News { .. } => "news",
            KefuPayload::Mpnews { .. } => "mpnews",
            KefuPayload::Wxcard { .. } => "wxcard",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MediaContent {
    pub media_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoContent {
    pub media_id: String,
    pub thumb_media_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MusicContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "musicurl")]
    pub music_url: String,
    #[serde(rename = "hqmusicurl")]
    pub hq_music_url: String,
    pub thumb_media_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsContent {
    pub articles: Vec<KefuArticle>,
}

/// One article of a news message (max 8 upstream)
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct KefuArticle {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "picurl", skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WxCardContent {
    pub card_id: String,
}

macro_rules! kefu_header {
    () => {
        pub fn to_user(mut self, openid: impl Into<String>) -> Self {
            self.touser = openid.into();
            self
        }

        /// Send as this agent (`customservice.kf_account`).
        pub fn kf_account(mut self, account: impl Into<String>) -> Self {
            self.kf_account = Some(account.into());
            self
        }
    };
}

fn assemble(touser: String, kf_account: Option<String>, payload: KefuPayload) -> KefuMessage {
    KefuMessage {
        touser,
        payload,
        customservice: kf_account.map(|kf_account| CustomService { kf_account }),
    }
}

impl KefuMessage {
    pub fn text() -> TextBuilder {
        TextBuilder::default()
    }

    pub fn image() -> MediaBuilder {
        MediaBuilder::new(MediaKind::Image)
    }

    pub fn voice() -> MediaBuilder {
        MediaBuilder::new(MediaKind::Voice)
    }

    pub fn mpnews() -> MediaBuilder {
        MediaBuilder::new(MediaKind::Mpnews)
    }

    pub fn video() -> VideoBuilder {
        VideoBuilder::default()
    }

    pub fn music() -> MusicBuilder {
        MusicBuilder::default()
    }

    pub fn news() -> NewsBuilder {
        NewsBuilder::default()
    }

    pub fn wxcard() -> WxCardBuilder {
        WxCardBuilder::default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextBuilder {
    touser: String,
    kf_account: Option<String>,
    content: String,
}

impl TextBuilder {
    kefu_header!();

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn build(self) -> KefuMessage {
        assemble(
            self.touser,
            self.kf_account,
            KefuPayload::Text {
                text: TextContent {
                    content: self.content,
                },
            },
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum MediaKind {
    Image,
    Voice,
    Mpnews,
}

/// Builder for payloads that only carry a media_id (image, voice, mpnews).
#[derive(Debug, Clone)]
pub struct MediaBuilder {
    kind: MediaKind,
    touser: String,
    kf_account: Option<String>,
    media_id: String,
}

impl MediaBuilder {
    fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            touser: String::new(),
            kf_account: None,
            media_id: String::new(),
        }
    }

    kefu_header!();

    pub fn media_id(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = media_id.into();
        self
    }

    pub fn build(self) -> KefuMessage {
        let media = MediaContent {
            media_id: self.media_id,
        };
        let payload = match self.kind {
            MediaKind::Image => KefuPayload::Image { image: media },
            MediaKind::Voice => KefuPayload::Voice { voice: media },
            MediaKind::Mpnews => KefuPayload::Mpnews { mpnews: media },
        };
        assemble(self.touser, self.kf_account, payload)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VideoBuilder {
    touser: String,
    kf_account: Option<String>,
    media_id: String,
    thumb_media_id: String,
    title: Option<String>,
    description: Option<String>,
}

impl VideoBuilder {
    kefu_header!();

    pub fn media_id(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = media_id.into();
        self
    }

    pub fn thumb_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.thumb_media_id = media_id.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(self) -> KefuMessage {
        assemble(
            self.touser,
            self.kf_account,
            KefuPayload::Video {
                video: VideoContent {
                    media_id: self.media_id,
                    thumb_media_id: self.thumb_media_id,
                    title: self.title,
                    description: self.description,
                },
            },
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MusicBuilder {
    touser: String,
    kf_account: Option<String>,
    title: Option<String>,
    description: Option<String>,
    music_url: String,
    hq_music_url: String,
    thumb_media_id: String,
}

impl MusicBuilder {
    kefu_header!();

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn music_url(mut self, url: impl Into<String>) -> Self {
        self.music_url = url.into();
        self
    }

    pub fn hq_music_url(mut self, url: impl Into<String>) -> Self {
        self.hq_music_url = url.into();
        self
    }

    pub fn thumb_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.thumb_media_id = media_id.into();
        self
    }

    pub fn build(self) -> KefuMessage {
        assemble(
            self.touser,
            self.kf_account,
            KefuPayload::Music {
                music: MusicContent {
                    title: self.title,
                    description: self.description,
                    music_url: self.music_url,
                    hq_music_url: self.hq_music_url,
                    thumb_media_id: self.thumb_media_id,
                },
            },
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewsBuilder {
    touser: String,
    kf_account: Option<String>,
    articles: Vec<KefuArticle>,
}

impl NewsBuilder {
    kefu_header!();

    pub fn add_article(mut self, article: KefuArticle) -> Self {
        self.articles.push(article);
        self
    }

    pub fn build(self) -> KefuMessage {
        assemble(
            self.touser,
            self.kf_account,
            KefuPayload::News {
                news: NewsContent {
                    articles: self.articles,
                },
            },
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct WxCardBuilder {
    touser: String,
    kf_account: Option<String>,
    card_id: String,
}

impl WxCardBuilder {
    kefu_header!();

    pub fn card_id(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = card_id.into();
        self
    }

    pub fn build(self) -> KefuMessage {
        assemble(
            self.touser,
            self.kf_account,
            KefuPayload::Wxcard {
                wxcard: WxCardContent {
                    card_id: self.card_id,
                },
            },
        )
    }
}

impl WxOpenClient {
    /// Push a customer service message to a user.
    #[instrument(level = "debug", skip(self, msg))]
    pub async fn kefu_send(&self, msg: &KefuMessage) -> Result<()> {
        debug!(
            touser = %mask_id(&msg.touser),
            msgtype = msg.payload.msg_type(),
            "kefu send"
        );
        let _: Ack = self.post("/cgi-bin/message/custom/send", msg).await?;
        Ok(())
    }
}
