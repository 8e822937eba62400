//! Inbound message dispatch.
//!
//! Rules are checked in insertion order. A rule added with `end()` stops the
//! scan once it matches; `next()` lets later rules match too. Matching rules
//! then run their interceptors and handlers; async rules are spawned on tokio
//! and never contribute to the reply.
//!
//! Every handler and interceptor also sees the router's [`SessionManager`],
//! which keeps per-user state across messages.
//!
//! Usage
//! ```ignore
//! let mut router = MessageRouter::new(client.clone());
//! router
//!     .rule().msg_type("event").event("subscribe").handler(Welcome).end()
//!     .rule().run_async(true).handler(LogHandler).next()
//!     .rule().rcontent("help|帮助")?.handler(Help).end();
//! let reply = router.route(&msg).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use regex::Regex;
use tracing::{debug, error, info};

use crate::client::WxOpenClient;
use crate::error::mask_id;
use crate::message::{InMessage, OutMessage};
use crate::session::SessionManager;
use crate::Result;

/// Duplicate window for the same `dedup_key` (WeChat retries unanswered pushes 3 times in 15s)
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(15);

// Above this many entries, expired keys are swept on insert
const DEDUP_SWEEP_THRESHOLD: usize = 1024;

/// Shared between the interceptors and handlers of one rule invocation
pub type Context = HashMap<String, serde_json::Value>;

/// Handles a matched message, optionally producing a passive reply.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        msg: &InMessage,
        ctx: &mut Context,
        client: &WxOpenClient,
        sessions: &SessionManager,
    ) -> Result<Option<OutMessage>>;
}

/// Runs before the handlers of a rule; returning `false` skips them.
#[async_trait::async_trait]
pub trait MessageInterceptor: Send + Sync + 'static {
    async fn intercept(
        &self,
        msg: &InMessage,
        ctx: &mut Context,
        client: &WxOpenClient,
        sessions: &SessionManager,
    ) -> Result<bool>;
}

/// Logs the message and replies with nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

#[async_trait::async_trait]
impl MessageHandler for LogHandler {
    async fn handle(
        &self,
        msg: &InMessage,
        _ctx: &mut Context,
        _client: &WxOpenClient,
        _sessions: &SessionManager,
    ) -> Result<Option<OutMessage>> {
        info!(
            from = %mask_id(&msg.from_user_name),
            msg_type = %msg.msg_type,
            event = ?msg.event,
            content = ?msg.content,
            "received message"
        );
        Ok(None)
    }
}

type Matcher = Arc<dyn Fn(&InMessage) -> bool + Send + Sync>;

#[derive(Clone, Default)]
struct Rule {
    is_async: bool,
    msg_type: Option<String>,
    event: Option<String>,
    event_key: Option<String>,
    content: Option<String>,
    rcontent: Option<Regex>,
    from_user: Option<String>,
    matcher: Option<Matcher>,
    interceptors: Vec<Arc<dyn MessageInterceptor>>,
    handlers: Vec<Arc<dyn MessageHandler>>,
    re_enter: bool,
}

impl Rule {
    fn test(&self, msg: &InMessage) -> bool {
        let content = msg.content.as_deref().map(str::trim);
        self.msg_type.as_deref().is_none_or(|t| t == msg.msg_type)
            && self
                .event
                .as_deref()
                .is_none_or(|e| msg.event.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(e)))
            && self
                .event_key
                .as_deref()
                .is_none_or(|k| msg.event_key.as_deref() == Some(k))
            && self.content.as_deref().is_none_or(|c| content == Some(c))
            && self
                .rcontent
                .as_ref()
                .is_none_or(|re| content.is_some_and(|c| re.is_match(c)))
            && self
                .from_user
                .as_deref()
                .is_none_or(|u| u == msg.from_user_name)
            && self.matcher.as_ref().is_none_or(|m| m(msg))
    }

    /// Run interceptors then handlers; the last non-empty reply wins.
    async fn service(
        &self,
        msg: &InMessage,
        client: &WxOpenClient,
        sessions: &SessionManager,
    ) -> Option<OutMessage> {
        let mut ctx = Context::new();
        for interceptor in &self.interceptors {
            match interceptor.intercept(msg, &mut ctx, client, sessions).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(msg_type = %msg.msg_type, "intercepted");
                    return None;
                }
                Err(e) => {
                    error!(error = %e, "message interceptor failed");
                    return None;
                }
            }
        }

        let mut reply = None;
        for handler in &self.handlers {
            match handler.handle(msg, &mut ctx, client, sessions).await {
                Ok(Some(out)) => reply = Some(out),
                Ok(None) => {}
                Err(e) => error!(error = %e, "message handler failed"),
            }
        }
        reply
    }
}

/// Builder returned by [`MessageRouter::rule`]; finish with `end()` or `next()`.
pub struct RuleBuilder<'r> {
    router: &'r mut MessageRouter,
    rule: Rule,
}

impl<'r> RuleBuilder<'r> {
    /// Run in a spawned task; the rule's reply is discarded.
    pub fn run_async(mut self, run_async: bool) -> Self {
        self.rule.is_async = run_async;
        self
    }

    pub fn msg_type(mut self, msg_type: impl Into<String>) -> Self {
        self.rule.msg_type = Some(msg_type.into());
        self
    }

    /// Event name, compared case-insensitively.
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.rule.event = Some(event.into());
        self
    }

    pub fn event_key(mut self, event_key: impl Into<String>) -> Self {
        self.rule.event_key = Some(event_key.into());
        self
    }

    /// Exact match on the trimmed content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.rule.content = Some(content.into());
        self
    }

    /// Whole-content regex match on the trimmed content.
    pub fn rcontent(mut self, pattern: &str) -> std::result::Result<Self, regex::Error> {
        self.rule.rcontent = Some(Regex::new(&format!("^(?:{pattern})$"))?);
        Ok(self)
    }

    pub fn from_user(mut self, from_user: impl Into<String>) -> Self {
        self.rule.from_user = Some(from_user.into());
        self
    }

    pub fn matcher<F>(mut self, f: F) -> Self
    where
        F: Fn(&InMessage) -> bool + Send + Sync + 'static,
    {
        self.rule.matcher = Some(Arc::new(f));
        self
    }

    pub fn interceptor<I: MessageInterceptor>(mut self, interceptor: I) -> Self {
        self.rule.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn handler<H: MessageHandler>(mut self, handler: H) -> Self {
        self.rule.handlers.push(Arc::new(handler));
        self
    }

    /// Add the rule; matching stops here.
    pub fn end(self) -> &'r mut MessageRouter {
        self.router.rules.push(self.rule);
        self.router
    }

    /// Add the rule; later rules may match as well.
    pub fn next(mut self) -> &'r mut MessageRouter {
        self.rule.re_enter = true;
        self.end()
    }
}

pub struct MessageRouter {
    client: WxOpenClient,
    rules: Vec<Rule>,
    sessions: Arc<SessionManager>,
    seen: Arc<DashMap<String, Instant>>,
    dedup_window: Duration,
}

impl MessageRouter {
    pub fn new(client: WxOpenClient) -> Self {
        Self {
            client,
            rules: Vec::new(),
            sessions: Arc::new(SessionManager::new()),
            seen: Arc::new(DashMap::new()),
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Share a session store, e.g. between routers of several accounts.
    pub fn with_session_manager(mut self, sessions: Arc<SessionManager>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn rule(&mut self) -> RuleBuilder<'_> {
        RuleBuilder {
            router: self,
            rule: Rule::default(),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Dispatch one message. Duplicates within the dedup window and messages
    /// no rule matches yield `None`.
    pub async fn route(&self, msg: &InMessage) -> Option<OutMessage> {
        if self.is_duplicate(msg) {
            debug!(key = %msg.dedup_key(), "duplicate message skipped");
            return None;
        }

        let mut matched = Vec::new();
        for rule in &self.rules {
            if rule.test(msg) {
                matched.push(rule);
                if !rule.re_enter {
                    break;
                }
            }
        }
        if matched.is_empty() {
            return None;
        }

        let mut reply = None;
        for rule in matched {
            if rule.is_async {
                let rule = rule.clone();
                let msg = msg.clone();
                let client = self.client.clone();
                let sessions = self.sessions.clone();
                tokio::spawn(async move {
                    rule.service(&msg, &client, &sessions).await;
                });
            } else if let Some(out) = rule.service(msg, &self.client, &self.sessions).await {
                reply = Some(out);
            }
        }
        reply
    }

    fn is_duplicate(&self, msg: &InMessage) -> bool {
        let now = Instant::now();
        let window = self.dedup_window;
        if self.seen.len() > DEDUP_SWEEP_THRESHOLD {
            self.seen.retain(|_, seen_at| now.duration_since(*seen_at) < window);
        }
        match self.seen.entry(msg.dedup_key()) {
            Entry::Occupied(mut e) => {
                if now.duration_since(*e.get()) < window {
                    true
                } else {
                    e.insert(now);
                    false
                }
            }
            Entry::Vacant(v) => {
                v.insert(now);
                false
            }
        }
    }
}
