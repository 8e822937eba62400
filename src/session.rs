//! Per-user sessions that outlive a single routed message.
//!
//! Handlers receive the router's [`SessionManager`] and key sessions by the
//! sender's openid (`from_user_name`). A session idle for longer than the
//! manager's timeout is treated as absent and replaced on next use.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

/// Idle time after which a session is dropped (30 minutes)
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

// Above this many sessions, idle ones are swept on write
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Clone, Debug)]
pub struct Session {
    attributes: HashMap<String, Value>,
    created_at: Instant,
    last_access: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            attributes: HashMap::new(),
            created_at: now,
            last_access: now,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_access) >= timeout
    }
}

/// In-process session store shared by every rule of a router.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    idle_timeout: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Run `f` on the session for `id`, creating it (or replacing an idle
    /// one) first. Counts as an access.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let now = Instant::now();
        if self.sessions.len() > SWEEP_THRESHOLD {
            self.sweep();
        }
        let mut session = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(now));
        if session.is_idle(now, self.idle_timeout) {
            debug!("idle session replaced");
            *session = Session::new(now);
        }
        session.last_access = now;
        f(&mut *session)
    }

    /// Attribute of a live session; never creates one.
    pub fn get_attribute(&self, id: &str, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut session = self.sessions.get_mut(id)?;
        if session.is_idle(now, self.idle_timeout) {
            return None;
        }
        session.last_access = now;
        session.get(key).cloned()
    }

    pub fn set_attribute(&self, id: &str, key: impl Into<String>, value: Value) {
        self.with_session(id, |s| s.set(key, value));
    }

    pub fn remove_attribute(&self, id: &str, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut session = self.sessions.get_mut(id)?;
        if session.is_idle(now, self.idle_timeout) {
            return None;
        }
        session.remove(key)
    }

    /// True when a session for `id` exists and is not idle.
    pub fn contains(&self, id: &str) -> bool {
        let now = Instant::now();
        self.sessions
            .get(id)
            .is_some_and(|s| !s.is_idle(now, self.idle_timeout))
    }

    /// Drop the session for `id`. Returns whether one existed.
    pub fn invalidate(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Remove idle sessions; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| !s.is_idle(now, self.idle_timeout));
        let dropped = before.saturating_sub(self.sessions.len());
        if dropped > 0 {
            debug!(dropped, "idle sessions swept");
        }
        dropped
    }

    /// Stored sessions, idle ones included until swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
