//! Semantic understanding (`/semantic/semproxy/search`).

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::WxOpenClient;
use crate::Result;

/// Request body. `appid` falls back to the client's appid when unset.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SemanticQuery {
    pub query: String,
    /// Comma separated service categories, e.g. "flight,hotel"
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
    /// User id (openid) the context belongs to
    pub uid: String,
}

impl SemanticQuery {
    pub fn new(
        query: impl Into<String>,
        category: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            category: category.into(),
            uid: uid.into(),
            ..Default::default()
        }
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SemanticQueryResult {
    #[serde(default)]
    pub query: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Category specific slots (`details`, `intent`)
    #[serde(default)]
    pub semantic: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl WxOpenClient {
    #[instrument(level = "debug", skip(self, query))]
    pub async fn semantic_query(&self, query: &SemanticQuery) -> Result<SemanticQueryResult> {
        let mut body = query.clone();
        if body.appid.is_none() {
            body.appid = Some(self.config().appid.clone());
        }
        self.post("/semantic/semproxy/search", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_serializes_only_set_fields() {
        let q = SemanticQuery::new("查一下明天从北京到上海的南航机票", "flight,hotel", "OPENID")
            .city("北京");
        let v = serde_json::to_value(&q).expect("json");
        assert_eq!(v["category"], "flight,hotel");
        assert_eq!(v["city"], "北京");
        assert!(v.get("latitude").is_none());
        assert!(v.get("appid").is_none());
    }

    #[test]
    fn parses_result() {
        let body = r#"{"errcode":0,"query":"查一下明天从北京到上海的南航机票","type":"flight",
            "semantic":{"details":{"airline":"中国南方航空公司"},"intent":"SEARCH"}}"#;
        let r: SemanticQueryResult = serde_json::from_str(body).expect("parse");
        assert_eq!(r.kind, "flight");
        assert_eq!(r.semantic["intent"], "SEARCH");
        assert!(r.answer.is_none());
    }
}
