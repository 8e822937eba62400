//! Callback XML messages.
//!
//! - [`InMessage`]: what WeChat POSTs to the callback URL (plain or encrypted).
//! - [`AuthorizeMessage`]: Open Platform authorization pushes.
//! - [`OutMessage`]: passive reply written back in the HTTP response.

mod inbound;
mod outbound;

pub use inbound::{
    AuthorizeMessage, InMessage, MsgType, PicItem, PicList, ScanCodeInfo, SendLocationInfo,
    SendPicsInfo,
};
pub use outbound::{
    ImageBuilder, MusicBuilder, NewsArticle, NewsBuilder, OutBody, OutMessage, TextBuilder,
    TransferBuilder, VideoBuilder, VoiceBuilder,
};
