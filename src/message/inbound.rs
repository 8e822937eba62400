use serde::Deserialize;
use tracing::debug;

use crate::crypto::MessageCrypt;
use crate::error::mask_id;
use crate::{Error, Result};

/// `MsgType` of an inbound message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MsgType {
    Text,
    Image,
    Voice,
    Video,
    ShortVideo,
    Location,
    Link,
    Event,
    Other(String),
}

impl MsgType {
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => MsgType::Text,
            "image" => MsgType::Image,
            "voice" => MsgType::Voice,
            "video" => MsgType::Video,
            "shortvideo" => MsgType::ShortVideo,
            "location" => MsgType::Location,
            "link" => MsgType::Link,
            "event" => MsgType::Event,
            other => MsgType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MsgType::Text => "text",
            MsgType::Image => "image",
            MsgType::Voice => "voice",
            MsgType::Video => "video",
            MsgType::ShortVideo => "shortvideo",
            MsgType::Location => "location",
            MsgType::Link => "link",
            MsgType::Event => "event",
            MsgType::Other(s) => s,
        }
    }
}

/// Message or event pushed to the callback URL.
///
/// Only the four header fields are always present; everything else depends
/// on `MsgType` / `Event`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", rename = "xml")]
pub struct InMessage {
    pub to_user_name: String,
    pub from_user_name: String,
    pub create_time: i64,
    pub msg_type: String,

    /// Text body. The XML reader trims leading and trailing whitespace of
    /// every text node, CDATA included, so `"  hi  "` arrives as `"hi"`.
    pub content: Option<String>,
    /// `MsgID` on template send reports
    #[serde(alias = "MsgID")]
    pub msg_id: Option<u64>,
    pub pic_url: Option<String>,
    pub media_id: Option<String>,
    pub format: Option<String>,
    pub recognition: Option<String>,
    pub thumb_media_id: Option<String>,

    #[serde(rename = "Location_X")]
    pub location_x: Option<f64>,
    #[serde(rename = "Location_Y")]
    pub location_y: Option<f64>,
    pub scale: Option<f64>,
    pub label: Option<String>,

    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,

    pub event: Option<String>,
    pub event_key: Option<String>,
    pub ticket: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub precision: Option<f64>,
    pub menu_id: Option<String>,
    pub status: Option<String>,

    /// Present (alone with ToUserName) in encrypted bodies
    pub encrypt: Option<String>,

    pub scan_code_info: Option<ScanCodeInfo>,
    pub send_location_info: Option<SendLocationInfo>,
    pub send_pics_info: Option<SendPicsInfo>,
}

/// scancode_push / scancode_waitmsg
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanCodeInfo {
    pub scan_type: Option<String>,
    pub scan_result: Option<String>,
}

/// location_select
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendLocationInfo {
    #[serde(rename = "Location_X")]
    pub location_x: Option<f64>,
    #[serde(rename = "Location_Y")]
    pub location_y: Option<f64>,
    pub scale: Option<f64>,
    pub label: Option<String>,
    pub poiname: Option<String>,
}

/// pic_sysphoto / pic_photo_or_album / pic_weixin
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendPicsInfo {
    pub count: Option<u32>,
    pub pic_list: Option<PicList>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PicList {
    #[serde(rename = "item", default)]
    pub items: Vec<PicItem>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PicItem {
    pub pic_md5_sum: Option<String>,
}

impl InMessage {
    /// Parse a plain-text callback body.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let msg: InMessage = serde_xml_rs::from_str(xml).map_err(Error::xml)?;
        debug!(
            from = %mask_id(&msg.from_user_name),
            msg_type = %msg.msg_type,
            "inbound message parsed"
        );
        Ok(msg)
    }

    /// Verify `msg_signature`, decrypt the `<Encrypt>` payload and parse it.
    pub fn from_encrypted_xml(
        xml: &str,
        crypt: &MessageCrypt,
        timestamp: &str,
        nonce: &str,
        msg_signature: &str,
    ) -> Result<Self> {
        let plain = crypt.decrypt_xml(msg_signature, timestamp, nonce, xml)?;
        Self::from_xml(&plain)
    }

    pub fn msg_type_kind(&self) -> MsgType {
        MsgType::parse(&self.msg_type)
    }

    /// Event name (`subscribe`, `CLICK`, ...) when this is an event push.
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// Key for duplicate detection: the MsgId, or sender plus CreateTime for events.
    pub fn dedup_key(&self) -> String {
        match self.msg_id {
            Some(id) => id.to_string(),
            None => format!("{}-{}", self.from_user_name, self.create_time),
        }
    }
}

/// Open Platform push to the component callback (ticket, authorized, unauthorized...)
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", rename = "xml")]
pub struct AuthorizeMessage {
    pub app_id: String,
    pub create_time: i64,
    pub info_type: String,
    pub component_verify_ticket: Option<String>,
    pub authorizer_appid: Option<String>,
    pub authorization_code: Option<String>,
    pub authorization_code_expired_time: Option<i64>,
    pub pre_auth_code: Option<String>,
}

impl AuthorizeMessage {
    pub fn from_xml(xml: &str) -> Result<Self> {
        serde_xml_rs::from_str(xml).map_err(Error::xml)
    }

    /// Decrypt (component token/key) and parse.
    pub fn from_encrypted_xml(
        xml: &str,
        crypt: &MessageCrypt,
        timestamp: &str,
        nonce: &str,
        msg_signature: &str,
    ) -> Result<Self> {
        let plain = crypt.decrypt_xml(msg_signature, timestamp, nonce, xml)?;
        Self::from_xml(&plain)
    }
}
