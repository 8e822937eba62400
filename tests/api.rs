mod common;

use serde_json::json;
use wiremock::matchers::{
    body_json, body_partial_json, body_string_contains, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxopen_rs::menu::{Menu, MenuButton, MenuRule};
use wxopen_rs::template::{Industry, TemplateIndustry, TemplateMessage};
use wxopen_rs::{Error, KefuMessage, MediaType, SemanticQuery};

use common::{APPID, TOKEN, ack, client, mount_token, ok_json};

#[tokio::test]
async fn token_is_cached_across_calls() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/getcallbackip"))
        .and(query_param("access_token", TOKEN))
        .respond_with(ok_json(json!({"ip_list": ["1.1.1.1"]})))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, 0, 1);
    for _ in 0..3 {
        assert_eq!(client.callback_ip().await.expect("ips"), vec!["1.1.1.1"]);
    }
}

#[tokio::test]
async fn expired_token_is_dropped_and_refetched() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 2).await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/getcallbackip"))
        .respond_with(ok_json(json!({"errcode": 42001, "errmsg": "access_token expired"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/getcallbackip"))
        .respond_with(ok_json(json!({"ip_list": ["2.2.2.2"]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 3, 1);
    let err = client.callback_ip().await.expect_err("expired");
    assert!(matches!(err, Error::Wx { code: 42001, .. }), "{err:?}");
    assert_eq!(client.callback_ip().await.expect("ips"), vec!["2.2.2.2"]);
}

#[tokio::test]
async fn token_error_surfaces_as_wx_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .respond_with(ok_json(json!({"errcode": 40125, "errmsg": "invalid appsecret"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3, 1).access_token().await.expect_err("bad secret");
    assert_eq!(err.errcode(), Some(40125));
}

#[tokio::test]
async fn kefu_send_posts_tagged_payload() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/custom/send"))
        .and(query_param("access_token", TOKEN))
        .and(body_json(json!({
            "touser": "OPENID",
            "msgtype": "text",
            "text": {"content": "你好"},
            "customservice": {"kf_account": "test1@kftest"}
        })))
        .respond_with(ack())
        .expect(1)
        .mount(&server)
        .await;

    let msg = KefuMessage::text()
        .to_user("OPENID")
        .content("你好")
        .kf_account("test1@kftest")
        .build();
    client(&server, 0, 1).kefu_send(&msg).await.expect("sent");
}

#[tokio::test]
async fn template_send_returns_msgid() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/template/send"))
        .and(body_partial_json(json!({
            "touser": "OPENID",
            "template_id": "TPL",
            "data": {"first": {"value": "hi", "color": "#173177"}}
        })))
        .respond_with(ok_json(json!({"errcode": 0, "errmsg": "ok", "msgid": 200228332})))
        .expect(1)
        .mount(&server)
        .await;

    let msg = TemplateMessage::new("OPENID", "TPL").data_with_color("first", "hi", "#173177");
    let msgid = client(&server, 0, 1).template_send(&msg).await.expect("sent");
    assert_eq!(msgid, 200228332);
}

#[tokio::test]
async fn template_industry_set_and_get() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/template/api_set_industry"))
        .and(body_json(json!({"industry_id1": "1", "industry_id2": "4"})))
        .respond_with(ack())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/template/get_industry"))
        .respond_with(ok_json(json!({
            "primary_industry": {"first_class": "运输与仓储", "second_class": "快递"},
            "secondary_industry": {"first_class": "IT科技", "second_class": "互联网|电子商务"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0, 1);
    client
        .template_set_industry(&TemplateIndustry::new(
            Industry::with_id("1"),
            Industry::with_id("4"),
        ))
        .await
        .expect("set");
    let got = client.template_get_industry().await.expect("get");
    assert_eq!(got.second_industry.first_class.as_deref(), Some("IT科技"));

    let err = client
        .template_set_industry(&TemplateIndustry::default())
        .await
        .expect_err("ids required");
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn template_add_list_delete() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/template/api_add_template"))
        .and(body_json(json!({"template_id_short": "TM00015"})))
        .respond_with(ok_json(json!({"errcode": 0, "errmsg": "ok", "template_id": "Doclyl5uP7Aciu-qZ7mJNPtWkbkYnWBWVja26EGbNyk"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/template/get_all_private_template"))
        .respond_with(ok_json(json!({"template_list": [{
            "template_id": "iPk5sOIt5X_flOVKn5GrTFpncEYTojx6ddbt8WYoV5s",
            "title": "领取奖金提醒",
            "primary_industry": "IT科技",
            "deputy_industry": "互联网|电子商务",
            "content": "{ {result.DATA} }",
            "example": ""
        }]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/template/del_private_template"))
        .and(body_json(json!({"template_id": "iPk5sOIt5X_flOVKn5GrTFpncEYTojx6ddbt8WYoV5s"})))
        .respond_with(ack())
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0, 1);
    let id = client.template_add("TM00015").await.expect("add");
    assert_eq!(id, "Doclyl5uP7Aciu-qZ7mJNPtWkbkYnWBWVja26EGbNyk");
    let list = client.template_list().await.expect("list");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].title, "领取奖金提醒");
    client.template_delete(&list[0].template_id).await.expect("delete");
}

#[tokio::test]
async fn menu_create_picks_endpoint_by_matchrule() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/menu/create"))
        .and(body_json(json!({"button": [{"type": "click", "name": "今日歌曲", "key": "V1001"}]})))
        .respond_with(ack())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/menu/addconditional"))
        .and(body_partial_json(json!({"matchrule": {"sex": "1"}})))
        .respond_with(ok_json(json!({"menuid": "208379533"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0, 1);
    let menu = Menu::new(vec![MenuButton::click("今日歌曲", "V1001")]);
    assert_eq!(client.menu_create(&menu).await.expect("create"), None);

    let conditional = menu.with_rule(MenuRule {
        sex: Some("1".into()),
        ..Default::default()
    });
    assert_eq!(
        client.menu_create(&conditional).await.expect("conditional").as_deref(),
        Some("208379533")
    );
}

#[tokio::test]
async fn menu_get_missing_is_none_and_delete_calls() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/menu/get"))
        .respond_with(ok_json(json!({"errcode": 46003, "errmsg": "menu no exist"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/menu/delete"))
        .respond_with(ack())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/menu/delconditional"))
        .and(body_json(json!({"menuid": "208379533"})))
        .respond_with(ack())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/menu/trymatch"))
        .and(body_json(json!({"user_id": "weixin"})))
        .respond_with(ok_json(json!({"button": [{"type": "view", "name": "tx", "url": "http://www.qq.com/", "sub_button": []}]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0, 1);
    assert!(client.menu_get().await.expect("get").is_none());
    client.menu_delete().await.expect("delete");
    client
        .menu_delete_conditional("208379533")
        .await
        .expect("delete conditional");
    let menu = client.menu_try_match("weixin").await.expect("trymatch");
    assert_eq!(menu.button[0].url.as_deref(), Some("http://www.qq.com/"));
}

#[tokio::test]
async fn semantic_query_defaults_appid() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("POST"))
        .and(path("/semantic/semproxy/search"))
        .and(body_partial_json(json!({
            "query": "查一下明天从北京到上海的南航机票",
            "category": "flight,hotel",
            "appid": APPID,
            "uid": "OPENID"
        })))
        .respond_with(ok_json(json!({
            "errcode": 0,
            "query": "查一下明天从北京到上海的南航机票",
            "type": "flight",
            "semantic": {"details": {}, "intent": "SEARCH"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let q = SemanticQuery::new("查一下明天从北京到上海的南航机票", "flight,hotel", "OPENID");
    let res = client(&server, 0, 1).semantic_query(&q).await.expect("query");
    assert_eq!(res.kind, "flight");
}

#[tokio::test]
async fn media_upload_sends_multipart_and_retries_busy() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/media/upload"))
        .respond_with(common::busy())
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/media/upload"))
        .and(query_param("type", "image"))
        .and(header_regex("content-type", "^multipart/form-data; boundary=.+"))
        .and(body_string_contains("name=\"media\"; filename=\"demo.png\"; filelength=4"))
        .and(body_string_contains("Content-Type: image/png"))
        .respond_with(ok_json(json!({"type": "image", "media_id": "MEDIA_ID", "created_at": 1500000000})))
        .expect(1)
        .mount(&server)
        .await;

    let up = client(&server, 2, 1)
        .media_upload(MediaType::Image, "demo.png", None, b"DATA".to_vec())
        .await
        .expect("upload");
    assert_eq!(up.media_id, "MEDIA_ID");
    assert_eq!(up.created_at, 1500000000);
}

#[tokio::test]
async fn media_get_binary_and_error() {
    let server = MockServer::start().await;
    mount_token(&server, TOKEN, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/media/get"))
        .and(query_param("media_id", "GOOD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .insert_header("content-disposition", "attachment; filename=\"a.jpg\"")
                .set_body_bytes(vec![0xff, 0xd8, 0xff, 0xe0]),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/media/get"))
        .and(query_param("media_id", "BAD"))
        .respond_with(ok_json(json!({"errcode": 40007, "errmsg": "invalid media_id"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0, 1);
    let got = client.media_get("GOOD").await.expect("media");
    assert_eq!(got.bytes.as_ref(), &[0xff, 0xd8, 0xff, 0xe0]);
    assert_eq!(got.content_type.as_deref(), Some("image/jpeg"));

    let err = client.media_get("BAD").await.expect_err("bad id");
    assert!(matches!(err, Error::Wx { code: 40007, .. }), "{err:?}");
}
