use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::MessageCrypt;
use crate::Result;

/// Passive reply written back in the callback's HTTP response.
#[derive(Clone, Debug, PartialEq)]
pub struct OutMessage {
    pub to_user_name: String,
    pub from_user_name: String,
    pub create_time: i64,
    pub body: OutBody,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutBody {
    Text {
        content: String,
    },
    Image {
        media_id: String,
    },
    Voice {
        media_id: String,
    },
    Video {
        media_id: String,
        title: Option<String>,
        description: Option<String>,
    },
    Music {
        title: Option<String>,
        description: Option<String>,
        music_url: Option<String>,
        hq_music_url: Option<String>,
        thumb_media_id: String,
    },
    News {
        articles: Vec<NewsArticle>,
    },
    /// Hand the conversation to a customer service agent
    TransferCustomerService {
        kf_account: Option<String>,
    },
}

impl OutBody {
    pub fn msg_type(&self) -> &'static str {
        match self {
            OutBody::Text { .. } => "text",
            OutBody::Image { .. } => "image",
            OutBody::Voice { .. } => "voice",
            OutBody::Video { .. } => "video",
            OutBody::Music { .. } => "music",
            OutBody::News { .. } => "news",
            OutBody::TransferCustomerService { .. } => "transfer_customer_service",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewsArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pic_url: Option<String>,
    pub url: Option<String>,
}

impl NewsArticle {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        pic_url: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            pic_url: Some(pic_url.into()),
            url: Some(url.into()),
        }
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl OutMessage {
    pub fn text() -> TextBuilder {
        TextBuilder::default()
    }

    pub fn image() -> ImageBuilder {
        ImageBuilder::default()
    }

    pub fn voice() -> VoiceBuilder {
        VoiceBuilder::default()
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

    pub fn transfer_customer_service() -> TransferBuilder {
        TransferBuilder::default()
    }

    pub fn with_create_time(mut self, create_time: i64) -> Self {
        self.create_time = create_time;
        self
    }

    pub fn msg_type(&self) -> &'static str {
        self.body.msg_type()
    }

    /// Serialize to the reply XML. Strings are CDATA, `CreateTime` and
    /// `ArticleCount` are plain text, `None` fields are left out.
    pub fn to_xml(&self) -> String {
        let mut x = XmlOut::new();
        x.start("xml");
        x.cdata("ToUserName", &self.to_user_name);
        x.cdata("FromUserName", &self.from_user_name);
        x.text("CreateTime", &self.create_time.to_string());
        x.cdata("MsgType", self.msg_type());

        match &self.body {
            OutBody::Text { content } => x.cdata("Content", content),
            OutBody::Image { media_id } => {
                x.start("Image");
                x.cdata("MediaId", media_id);
                x.end("Image");
            }
            OutBody::Voice { media_id } => {
                x.start("Voice");
                x.cdata("MediaId", media_id);
                x.end("Voice");
            }
            OutBody::Video {
                media_id,
                title,
                description,
            } => {
                x.start("Video");
                x.cdata("MediaId", media_id);
                x.opt_cdata("Title", title.as_deref());
                x.opt_cdata("Description", description.as_deref());
                x.end("Video");
            }
            OutBody::Music {
                title,
                description,
                music_url,
                hq_music_url,
                thumb_media_id,
            } => {
                x.start("Music");
                x.opt_cdata("Title", title.as_deref());
                x.opt_cdata("Description", description.as_deref());
                x.opt_cdata("MusicUrl", music_url.as_deref());
                x.opt_cdata("HQMusicUrl", hq_music_url.as_deref());
                x.cdata("ThumbMediaId", thumb_media_id);
                x.end("Music");
            }
            OutBody::News { articles } => {
                x.text("ArticleCount", &articles.len().to_string());
                x.start("Articles");
                for a in articles {
                    x.start("item");
                    x.opt_cdata("Title", a.title.as_deref());
                    x.opt_cdata("Description", a.description.as_deref());
                    x.opt_cdata("PicUrl", a.pic_url.as_deref());
                    x.opt_cdata("Url", a.url.as_deref());
                    x.end("item");
                }
                x.end("Articles");
            }
            OutBody::TransferCustomerService { kf_account } => {
                if let Some(account) = kf_account {
                    x.start("TransInfo");
                    x.cdata("KfAccount", account);
                    x.end("TransInfo");
                }
            }
        }

        x.end("xml");
        x.finish()
    }

    /// Reply XML wrapped in the encrypted, signed envelope.
    pub fn to_encrypted_xml(&self, crypt: &MessageCrypt, timestamp: &str) -> Result<String> {
        let plain = self.to_xml();
        Ok(crypt.encrypt_to_xml(&plain, timestamp, None)?)
    }
}

/// Reply XML writer. Element names are fixed by the caller; only values are escaped.
struct XmlOut {
    buf: String,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            buf: String::with_capacity(256),
        }
    }

    fn start(&mut self, name: &str) {
        let _ = write!(self.buf, "<{name}>");
    }

    fn end(&mut self, name: &str) {
        let _ = write!(self.buf, "</{name}>");
    }

    fn text(&mut self, name: &str, value: &str) {
        self.start(name);
        escape_into(&mut self.buf, value);
        self.end(name);
    }

    fn cdata(&mut self, name: &str, value: &str) {
        // a CDATA section cannot contain its own terminator
        if value.contains("]]>") {
            return self.text(name, value);
        }
        self.start(name);
        let _ = write!(self.buf, "<![CDATA[{value}]]>");
        self.end(name);
    }

    fn opt_cdata(&mut self, name: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.cdata(name, v);
        }
    }

    fn finish(self) -> String {
        self.buf
    }
}

fn escape_into(buf: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            c => buf.push(c),
        }
    }
}

macro_rules! reply_header {
    () => {
        pub fn to_user(mut self, to_user: impl Into<String>) -> Self {
            self.head.to_user = to_user.into();
            self
        }

        pub fn from_user(mut self, from_user: impl Into<String>) -> Self {
            self.head.from_user = from_user.into();
            self
        }

        /// Fixed `CreateTime` instead of the current time.
        pub fn with_create_time(mut self, create_time: i64) -> Self {
            self.head.create_time = Some(create_time);
            self
        }
    };
}

#[derive(Clone, Debug, Default)]
struct Head {
    to_user: String,
    from_user: String,
    create_time: Option<i64>,
}

impl Head {
    fn build(self, body: OutBody) -> OutMessage {
        OutMessage {
            to_user_name: self.to_user,
            from_user_name: self.from_user,
            create_time: self.create_time.unwrap_or_else(now_secs),
            body,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TextBuilder {
    head: Head,
    content: String,
}

impl TextBuilder {
    reply_header!();

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn build(self) -> OutMessage {
        self.head.build(OutBody::Text {
            content: self.content,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImageBuilder {
    head: Head,
    media_id: String,
}

impl ImageBuilder {
    reply_header!();

    pub fn media_id(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = media_id.into();
        self
    }

    pub fn build(self) -> OutMessage {
        self.head.build(OutBody::Image {
            media_id: self.media_id,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct VoiceBuilder {
    head: Head,
    media_id: String,
}

impl VoiceBuilder {
    reply_header!();

    pub fn media_id(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = media_id.into();
        self
    }

    pub fn build(self) -> OutMessage {
        self.head.build(OutBody::Voice {
            media_id: self.media_id,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct VideoBuilder {
    head: Head,
    media_id: String,
    title: Option<String>,
    description: Option<String>,
}

impl VideoBuilder {
    reply_header!();

    pub fn media_id(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = media_id.into();
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

    pub fn build(self) -> OutMessage {
        self.head.build(OutBody::Video {
            media_id: self.media_id,
            title: self.title,
            description: self.description,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct MusicBuilder {
    head: Head,
    title: Option<String>,
    description: Option<String>,
    music_url: Option<String>,
    hq_music_url: Option<String>,
    thumb_media_id: String,
}

impl MusicBuilder {
    reply_header!();

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn music_url(mut self, url: impl Into<String>) -> Self {
        self.music_url = Some(url.into());
        self
    }

    pub fn hq_music_url(mut self, url: impl Into<String>) -> Self {
        self.hq_music_url = Some(url.into());
        self
    }

    pub fn thumb_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.thumb_media_id = media_id.into();
        self
    }

    pub fn build(self) -> OutMessage {
        self.head.build(OutBody::Music {
            title: self.title,
            description: self.description,
            music_url: self.music_url,
            hq_music_url: self.hq_music_url,
            thumb_media_id: self.thumb_media_id,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewsBuilder {
    head: Head,
    articles: Vec<NewsArticle>,
}

impl NewsBuilder {
    reply_header!();

    pub fn add_article(mut self, article: NewsArticle) -> Self {
        self.articles.push(article);
        self
    }

    pub fn articles(mut self, articles: Vec<NewsArticle>) -> Self {
        self.articles = articles;
        self
    }

    pub fn build(self) -> OutMessage {
        self.head.build(OutBody::News {
            articles: self.articles,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransferBuilder {
    head: Head,
    kf_account: Option<String>,
}

impl TransferBuilder {
    reply_header!();

    /// Route to this agent instead of letting WeChat pick one.
    pub fn kf_account(mut self, account: impl Into<String>) -> Self {
        self.kf_account = Some(account.into());
        self
    }

    pub fn build(self) -> OutMessage {
        self.head.build(OutBody::TransferCustomerService {
            kf_account: self.kf_account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn article() -> NewsArticle {
        NewsArticle::new("title", "description", "picUrl", "url")
    }

    const NEWS_XML: &str = "<xml>
        <ToUserName><![CDATA[toUser]]></ToUserName>
        <FromUserName><![CDATA[fromUser]]></FromUserName>
        <CreateTime>1122</CreateTime>
        <MsgType><![CDATA[news]]></MsgType>
        <ArticleCount>2</ArticleCount>
        <Articles>
            <item>
                <Title><![CDATA[title]]></Title>
                <Description><![CDATA[description]]></Description>
                <PicUrl><![CDATA[picUrl]]></PicUrl>
                <Url><![CDATA[url]]></Url>
            </item>
            <item>
                <Title><![CDATA[title]]></Title>
                <Description><![CDATA[description]]></Description>
                <PicUrl><![CDATA[picUrl]]></PicUrl>
                <Url><![CDATA[url]]></Url>
            </item>
        </Articles>
        </xml>";

    #[test]
    fn news_with_two_articles() {
        let m = OutMessage {
            to_user_name: "toUser".into(),
            from_user_name: "fromUser".into(),
            create_time: 1122,
            body: OutBody::News {
                articles: vec![article(), article()],
            },
        };
        assert_eq!(squash(&m.to_xml()), squash(NEWS_XML));
    }

    #[test]
    fn news_builder_matches_struct() {
        let m = OutMessage::news()
            .from_user("fromUser")
            .to_user("toUser")
            .add_article(article())
            .add_article(article())
            .with_create_time(1122)
            .build();
        assert_eq!(squash(&m.to_xml()), squash(NEWS_XML));
    }

    #[test]
    fn video_reply() {
        let expected = "<xml>
            <ToUserName><![CDATA[toUser]]></ToUserName>
            <FromUserName><![CDATA[fromUser]]></FromUserName>
            <CreateTime>1122</CreateTime>
            <MsgType><![CDATA[video]]></MsgType>
            <Video>
                <MediaId><![CDATA[media_id]]></MediaId>
                <Title><![CDATA[title]]></Title>
                <Description><![CDATA[ddfff]]></Description>
            </Video>
            </xml>";
        let m = OutMessage::video()
            .media_id("media_id")
            .from_user("fromUser")
            .to_user("toUser")
            .title("title")
            .description("ddfff")
            .build()
            .with_create_time(1122);
        assert_eq!(squash(&m.to_xml()), squash(expected));
    }

    #[test]
    fn transfer_with_and_without_account() {
        let m = OutMessage::transfer_customer_service()
            .from_user("fromuser")
            .to_user("touser")
            .with_create_time(1399197672)
            .build();
        let expected = "<xml>
            <ToUserName><![CDATA[touser]]></ToUserName>
            <FromUserName><![CDATA[fromuser]]></FromUserName>
            <CreateTime>1399197672</CreateTime>
            <MsgType><![CDATA[transfer_customer_service]]></MsgType>
            </xml>";
        assert_eq!(squash(&m.to_xml()), squash(expected));

        let m = OutMessage::transfer_customer_service()
            .kf_account("test1@test")
            .from_user("fromuser")
            .to_user("touser")
            .with_create_time(1399197672)
            .build();
        let expected = "<xml>
            <ToUserName><![CDATA[touser]]></ToUserName>
            <FromUserName><![CDATA[fromuser]]></FromUserName>
            <CreateTime>1399197672</CreateTime>
            <MsgType><![CDATA[transfer_customer_service]]></MsgType>
            <TransInfo><KfAccount><![CDATA[test1@test]]></KfAccount></TransInfo>
            </xml>";
        assert_eq!(squash(&m.to_xml()), squash(expected));
    }

    #[test]
    fn music_skips_missing_fields() {
        let xml = OutMessage::music()
            .to_user("u")
            .from_user("f")
            .title("song")
            .thumb_media_id("thumb")
            .with_create_time(1)
            .build()
            .to_xml();
        assert!(xml.contains("<Music><Title><![CDATA[song]]></Title><ThumbMediaId><![CDATA[thumb]]></ThumbMediaId></Music>"));
        assert!(!xml.contains("HQMusicUrl"));
    }

    #[test]
    fn cdata_terminator_falls_back_to_escaped_text() {
        let xml = OutMessage::text()
            .to_user("u")
            .from_user("f")
            .content("a]]>b & <c>")
            .with_create_time(1)
            .build()
            .to_xml();
        assert!(xml.contains("<Content>a]]&gt;b &amp; &lt;c&gt;</Content>"));
    }

    #[test]
    fn build_stamps_current_time() {
        let m = OutMessage::image().to_user("u").from_user("f").media_id("m").build();
        assert!(m.create_time > 1_600_000_000);
        assert_eq!(m.msg_type(), "image");
    }

    #[test]
    fn text_reply_parses_back() {
        let xml = OutMessage::text()
            .to_user("u")
            .from_user("f")
            .content("你好")
            .with_create_time(7)
            .build()
            .to_xml();
        let parsed = crate::message::InMessage::from_xml(&xml).expect("parse");
        assert_eq!(parsed.content.as_deref(), Some("你好"));
        assert_eq!(parsed.create_time, 7);
    }
}
