//! Example: Official Account callback server
//!
//! - GET  /wx      server URL verification (echo `echostr` when the signature matches)
//! - POST /wx      inbound messages, plain or AES mode, dispatched by `MessageRouter`
//! - GET  /health  health check
//!
//! Running this example:
//! ```bash
//! WXOPEN_APPID=wx... WXOPEN_SECRET=... \
//! WXOPEN_TOKEN=your_token WXOPEN_AES_KEY=your_43_char_aes_key \
//! cargo run --example callback_server
//! ```
//!
//! Listens on http://127.0.0.1:3000 (override with BIND_ADDR).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use wxopen_rs::crypto::{check_signature_echo, verify_url_signature};
use wxopen_rs::router::{Context, LogHandler, MessageHandler};
use wxopen_rs::session::SessionManager;
use wxopen_rs::{InMessage, MessageCrypt, MessageRouter, OutMessage, WxOpenClient, WxOpenConfig};

/// Query parameters WeChat appends to the callback URL
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    signature: String,
    timestamp: String,
    nonce: String,
    #[serde(default)]
    echostr: Option<String>,
    #[serde(default)]
    encrypt_type: Option<String>,
    #[serde(default)]
    msg_signature: Option<String>,
}

#[derive(Clone)]
struct AppState {
    token: Arc<str>,
    crypt: Option<Arc<MessageCrypt>>,
    router: Arc<MessageRouter>,
}

/// Replies to the subscribe event with a welcome text.
struct Welcome;

#[async_trait::async_trait]
impl MessageHandler for Welcome {
    async fn handle(
        &self,
        msg: &InMessage,
        _ctx: &mut Context,
        _client: &WxOpenClient,
        _sessions: &SessionManager,
    ) -> wxopen_rs::Result<Option<OutMessage>> {
        Ok(Some(
            OutMessage::text()
                .to_user(&msg.from_user_name)
                .from_user(&msg.to_user_name)
                .content("欢迎关注！回复任意文字试试。")
                .build(),
        ))
    }
}

/// Echoes text messages back.
struct Echo;

#[async_trait::async_trait]
impl MessageHandler for Echo {
    async fn handle(
        &self,
        msg: &InMessage,
        _ctx: &mut Context,
        _client: &WxOpenClient,
        _sessions: &SessionManager,
    ) -> wxopen_rs::Result<Option<OutMessage>> {
        let content = msg.content.clone().unwrap_or_default();
        Ok(Some(
            OutMessage::text()
                .to_user(&msg.from_user_name)
                .from_user(&msg.to_user_name)
                .content(format!("你说：{content}"))
                .build(),
        ))
    }
}

async fn verify(
    State(state): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<String, StatusCode> {
    let echostr = q.echostr.ok_or(StatusCode::BAD_REQUEST)?;
    check_signature_echo(&state.token, &q.timestamp, &q.nonce, &q.signature, &echostr).map_err(
        |e| {
            warn!("url verification failed: {e}");
            StatusCode::UNAUTHORIZED
        },
    )
}

async fn receive(
    State(state): State<AppState>,
    Query(q): Query<CallbackQuery>,
    body: String,
) -> Result<String, StatusCode> {
    if !verify_url_signature(&state.token, &q.timestamp, &q.nonce, &q.signature) {
        warn!("signature mismatch");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let aes = q.encrypt_type.as_deref() == Some("aes");
    let msg = if aes {
        let crypt = state.crypt.as_deref().ok_or_else(|| {
            error!("encrypted push but WXOPEN_AES_KEY is not set");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        let msg_signature = q.msg_signature.as_deref().ok_or(StatusCode::BAD_REQUEST)?;
        InMessage::from_encrypted_xml(&body, crypt, &q.timestamp, &q.nonce, msg_signature)
    } else {
        InMessage::from_xml(&body)
    }
    .map_err(|e| {
        error!("failed to read message: {e}");
        StatusCode::BAD_REQUEST
    })?;

    let Some(reply) = state.router.route(&msg).await else {
        // WeChat stops retrying once it sees "success"
        return Ok("success".to_string());
    };

    let xml = match (aes, state.crypt.as_deref()) {
        (true, Some(crypt)) => reply.to_encrypted_xml(crypt, &q.timestamp),
        _ => Ok(reply.to_xml()),
    };
    xml.map_err(|e| {
        error!("failed to build reply: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wxopen_rs=debug".into()),
        )
        .init();

    let cfg = WxOpenConfig::from_env()?;
    let token = cfg
        .token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("set WXOPEN_TOKEN"))?;
    let crypt = match &cfg.encoding_aes_key {
        Some(key) => Some(Arc::new(MessageCrypt::new(&token, key, &cfg.appid)?)),
        None => None,
    };
    let client = WxOpenClient::new(cfg)?;

    let mut router = MessageRouter::new(client);
    router
        .rule()
        .run_async(true)
        .handler(LogHandler)
        .next()
        .rule()
        .msg_type("event")
        .event("subscribe")
        .handler(Welcome)
        .end()
        .rule()
        .msg_type("text")
        .handler(Echo)
        .end();
    info!(rules = router.rule_count(), "router ready");

    let state = AppState {
        token: Arc::from(token),
        crypt,
        router: Arc::new(router),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/wx", get(verify).post(receive))
        .with_state(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
