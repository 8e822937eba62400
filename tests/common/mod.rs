#![allow(dead_code)]

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxopen_rs::{WxOpenClient, WxOpenConfig};

pub const APPID: &str = "wxtestappid0001";
pub const SECRET: &str = "test-secret";
pub const TOKEN: &str = "ACCESS_TOKEN_1";

pub fn client(server: &MockServer, max_retry_times: u32, sleep_ms: u64) -> WxOpenClient {
    let cfg = WxOpenConfig::new(APPID, SECRET)
        .with_api_base(server.uri())
        .with_max_retry_times(max_retry_times)
        .with_retry_sleep_millis(sleep_ms);
    WxOpenClient::new(cfg).expect("client")
}

pub fn ok_json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

pub fn busy() -> ResponseTemplate {
    ok_json(json!({"errcode": -1, "errmsg": "system error"}))
}

pub fn ack() -> ResponseTemplate {
    ok_json(json!({"errcode": 0, "errmsg": "ok"}))
}

/// Token endpoint answering `token`, expected exactly `times` times.
pub async fn mount_token(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .and(query_param("grant_type", "client_credential"))
        .and(query_param("appid", APPID))
        .and(query_param("secret", SECRET))
        .respond_with(ok_json(json!({"access_token": token, "expires_in": 7200})))
        .expect(times)
        .mount(server)
        .await;
}
