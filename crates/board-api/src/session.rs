//! Per-client key-value sessions.
//!
//! A [`Session`] is a plain value: handlers load it, hand `&Session` / `&mut Session` to
//! the rate limiters and the CSRF guard, then write it back. Nothing here is global, so
//! the limiters can be unit tested against a bare `Session::new(..)`.
//!
//! Two requests from the same client racing on the same session both write back their
//! own copy; the last one wins.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Stored sessions above this count trigger a sweep of expired entries on save.
const SWEEP_THRESHOLD: usize = 1024;

/// Default hard cap on stored sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    created_at: i64,
    values: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(now: i64) -> Self {
        Self {
            created_at: now,
            values: HashMap::new(),
        }
    }

    /// Seconds since the session (or its last rotation) started.
    pub fn age(&self, now: i64) -> i64 {
        now - self.created_at
    }

    /// Restarts the age clock, keeping the stored values.
    pub fn renew(&mut self, now: i64) {
        self.created_at = now;
    }

    /// Typed read. A value that no longer deserializes as `T` reads as missing.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        serde_json::from_value(value.clone())
            .map_err(|e| warn!("Session value '{}' has unexpected shape: {}", key, e))
            .ok()
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.values.insert(key.to_string(), v);
            }
            Err(e) => warn!("Failed to store session value '{}': {}", key, e),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// True until something is written into the session.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where sessions live between requests.
pub trait SessionStore: Send + Sync {
    /// Returns the session if it exists and has not been idle past its lifetime.
    fn load(&self, id: &str, now: i64) -> Option<Session>;

    fn save(&self, id: &str, session: Session, now: i64);

    fn remove(&self, id: &str);

    /// Number of stored sessions, expired ones included until swept.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct StoredSession {
    session: Session,
    last_seen: i64,
}

/// In-process session store.
///
/// Sessions idle for longer than `lifetime_secs` are dropped. The store never holds more
/// than `max_sessions` entries; past that the least recently seen one is evicted.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
    lifetime_secs: i64,
    max_sessions: usize,
}

impl MemorySessionStore {
    pub fn new(lifetime_secs: i64) -> Self {
        Self::with_capacity(lifetime_secs, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(lifetime_secs: i64, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            lifetime_secs,
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredSession>> {
        // A panic while holding the lock cannot leave a half-written entry behind.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &str, now: i64) -> Option<Session> {
        let mut sessions = self.lock();
        let expired = now - sessions.get(id)?.last_seen > self.lifetime_secs;
        if expired {
            sessions.remove(id);
            debug!("Session expired");
            return None;
        }
        sessions.get(id).map(|s| s.session.clone())
    }

    fn save(&self, id: &str, session: Session, now: i64) {
        let mut sessions = self.lock();
        sessions.insert(
            id.to_string(),
            StoredSession {
                session,
                last_seen: now,
            },
        );

        if sessions.len() > SWEEP_THRESHOLD.min(self.max_sessions) {
            let lifetime = self.lifetime_secs;
            let before = sessions.len();
            sessions.retain(|_, s| now - s.last_seen <= lifetime);
            debug!("Swept {} expired sessions", before - sessions.len());
        }

        while sessions.len() > self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(key, _)| key.as_str() != id)
                .min_by_key(|(_, s)| s.last_seen)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    sessions.remove(&key);
                    debug!("Session store full, evicted least recently seen entry");
                }
                None => break,
            }
        }
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
