use std::sync::Arc;
use std::time::Duration;

use board_db::Database;

use crate::csrf::CsrfGuard;
use crate::rate_limit::{FixedWindowLimiter, SlidingWindowLimiter};
use crate::session::{DEFAULT_MAX_SESSIONS, MemorySessionStore, SessionStore};
use crate::validator::ContentValidator;

pub type AppState = Arc<AppStateInner>;

/// Tunables for the abuse protections. Defaults match the stock deployment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Failed submissions allowed before the client is blocked.
    pub max_attempts: u32,
    pub block_duration: Duration,
    pub api_max_requests: usize,
    pub api_window: Duration,
    /// Idle time after which a session is forgotten.
    pub session_lifetime: Duration,
    /// Hard cap on stored sessions, visitor and per-client limiter entries together.
    pub max_sessions: usize,
    /// Age after which a session gets a new id and a new CSRF token.
    pub session_rotation: Duration,
    pub csrf_lifetime: Duration,
    pub extra_patterns: Vec<String>,
    pub secure_cookie: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            block_duration: Duration::from_secs(300),
            api_max_requests: 30,
            api_window: Duration::from_secs(60),
            session_lifetime: Duration::from_secs(3600),
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_rotation: Duration::from_secs(1800),
            csrf_lifetime: Duration::from_secs(7200),
            extra_patterns: Vec::new(),
            secure_cookie: false,
        }
    }
}

pub struct AppStateInner {
    pub db: Database,
    pub sessions: Arc<dyn SessionStore>,
    pub validator: ContentValidator,
    pub submit_limiter: FixedWindowLimiter,
    pub api_limiter: SlidingWindowLimiter,
    pub csrf: CsrfGuard,
    pub session_rotation_secs: i64,
    pub secure_cookie: bool,
}

impl AppStateInner {
    /// Wires the protections around `db` with an in-memory session store.
    pub fn new(db: Database, settings: &Settings) -> Result<Self, regex::Error> {
        let sessions = Arc::new(MemorySessionStore::with_capacity(
            settings.session_lifetime.as_secs() as i64,
            settings.max_sessions,
        ));
        Self::with_sessions(db, sessions, settings)
    }

    pub fn with_sessions(
        db: Database,
        sessions: Arc<dyn SessionStore>,
        settings: &Settings,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            db,
            sessions,
            validator: ContentValidator::with_extra_patterns(&settings.extra_patterns)?,
            submit_limiter: FixedWindowLimiter::new(settings.max_attempts, settings.block_duration),
            api_limiter: SlidingWindowLimiter::new(settings.api_max_requests, settings.api_window),
            csrf: CsrfGuard::new(settings.csrf_lifetime.as_secs() as i64),
            session_rotation_secs: settings.session_rotation.as_secs() as i64,
            secure_cookie: settings.secure_cookie,
        })
    }
}
