//! Template messages and industry settings
//!
//! Endpoints (all under {api_base}, access_token in query):
//! - POST /cgi-bin/template/api_set_industry
//! - GET  /cgi-bin/template/get_industry
//! - POST /cgi-bin/template/api_add_template
//! - GET  /cgi-bin/template/get_all_private_template
//! - POST /cgi-bin/template/del_private_template
//! - POST /cgi-bin/message/template/send

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::client::{Ack, WxOpenClient};
use crate::error::mask_id;
use crate::{Error, Result};

/// Industry pair configured for template messages.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateIndustry {
    #[serde(default)]
    pub primary_industry: Industry,
    /// get_industry answers with `secondary_industry`
    #[serde(default, alias = "secondary_industry")]
    pub second_industry: Industry,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Industry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_class: Option<String>,
}

impl Industry {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }
}

impl TemplateIndustry {
    pub fn new(primary: Industry, second: Industry) -> Self {
        Self {
            primary_industry: primary,
            second_industry: second,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Request body for message/template/send
#[derive(Clone, Debug, Default, Serialize)]
pub struct TemplateMessage {
    pub touser: String,
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miniprogram: Option<MiniProgram>,
    /// Keeps insertion order on the wire
    #[serde(serialize_with = "serialize_data")]
    pub data: Vec<TemplateData>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MiniProgram {
    pub appid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagepath: Option<String>,
}

/// One `{{name.DATA}}` slot
#[derive(Clone, Debug)]
pub struct TemplateData {
    pub name: String,
    pub value: String,
    pub color: Option<String>,
}

#[derive(Serialize)]
struct DataValue<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
}

fn serialize_data<S: Serializer>(data: &[TemplateData], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_map(data.iter().map(|d| {
        (
            d.name.as_str(),
            DataValue {
                value: &d.value,
                color: d.color.as_deref(),
            },
        )
    }))
}

impl TemplateMessage {
    pub fn new(touser: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            touser: touser.into(),
            template_id: template_id.into(),
            ..Default::default()
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn miniprogram(mut self, appid: impl Into<String>, pagepath: Option<String>) -> Self {
        self.miniprogram = Some(MiniProgram {
            appid: appid.into(),
            pagepath,
        });
        self
    }

    pub fn data(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push(TemplateData {
            name: name.into(),
            value: value.into(),
            color: None,
        });
        self
    }

    pub fn data_with_color(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        self.data.push(TemplateData {
            name: name.into(),
            value: value.into(),
            color: Some(color.into()),
        });
        self
    }
}

/// Entry of get_all_private_template
#[derive(Clone, Debug, Deserialize)]
pub struct PrivateTemplate {
    pub template_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub primary_industry: String,
    #[serde(default)]
    pub deputy_industry: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub example: String,
}

impl WxOpenClient {
    /// Set the two industries; both need an `id`.
    #[instrument(level = "debug", skip(self, industry))]
    pub async fn template_set_industry(&self, industry: &TemplateIndustry) -> Result<()> {
        let (Some(id1), Some(id2)) = (
            industry.primary_industry.id.as_deref(),
            industry.second_industry.id.as_deref(),
        ) else {
            return Err(Error::Config(
                "template industry ids are required for api_set_industry".into(),
            ));
        };
        let body = serde_json::json!({ "industry_id1": id1, "industry_id2": id2 });
        let _: Ack = self.post("/cgi-bin/template/api_set_industry", &body).await?;
        Ok(())
    }

    pub async fn template_get_industry(&self) -> Result<TemplateIndustry> {
        self.get("/cgi-bin/template/get_industry", &[]).await
    }

    /// Send a template message, returning upstream's msgid.
    #[instrument(level = "debug", skip(self, msg))]
    pub async fn template_send(&self, msg: &TemplateMessage) -> Result<i64> {
        #[derive(Deserialize)]
        struct Sent {
            msgid: i64,
        }
        debug!(touser = %mask_id(&msg.touser), template_id = %msg.template_id, "template send");
        let sent: Sent = self.post("/cgi-bin/message/template/send", msg).await?;
        Ok(sent.msgid)
    }

    /// Add a template from the library by its short id, returning the template_id.
    pub async fn template_add(&self, short_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Added {
            template_id: String,
        }
        let body = serde_json::json!({ "template_id_short": short_id });
        let added: Added = self.post("/cgi-bin/template/api_add_template", &body).await?;
        Ok(added.template_id)
    }

    pub async fn template_list(&self) -> Result<Vec<PrivateTemplate>> {
        #[derive(Deserialize)]
        struct List {
            #[serde(default)]
            template_list: Vec<PrivateTemplate>,
        }
        let list: List = self.get("/cgi-bin/template/get_all_private_template", &[]).await?;
        Ok(list.template_list)
    }

    pub async fn template_delete(&self, template_id: &str) -> Result<()> {
        let body = serde_json::json!({ "template_id": template_id });
        let _: Ack = self.post("/cgi-bin/template/del_private_template", &body).await?;
        Ok(())
    }
}
