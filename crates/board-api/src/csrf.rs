use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};
use tracing::debug;

use crate::session::Session;

const TOKEN_KEY: &str = "csrf_token";
const PREVIOUS_TOKEN_KEY: &str = "csrf_token_previous";

/// How long a token replaced by rotation keeps validating. Matches the page's refresh
/// interval, so an open form always has a usable token.
pub const ROTATION_GRACE_SECS: i64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    value: String,
    issued_at: i64,
}

/// Issues and checks the per-session CSRF token.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    lifetime_secs: i64,
}

impl CsrfGuard {
    pub fn new(lifetime_secs: i64) -> Self {
        Self { lifetime_secs }
    }

    /// Current token for the session, minting a fresh one if there is none or it expired.
    pub fn issue(&self, session: &mut Session) -> String {
        self.issue_at(session, crate::unix_now())
    }

    pub fn issue_at(&self, session: &mut Session, now: i64) -> String {
        match self.current(session, now) {
            Some(token) => token.value,
            None => self.rotate_at(session, now),
        }
    }

    /// Replaces the session's token unconditionally.
    ///
    /// A still-live previous token keeps validating for [`ROTATION_GRACE_SECS`].
    pub fn rotate_at(&self, session: &mut Session, now: i64) -> String {
        match self.current(session, now) {
            Some(old) => session.insert(
                PREVIOUS_TOKEN_KEY,
                &StoredToken {
                    value: old.value,
                    issued_at: now,
                },
            ),
            None => session.remove(PREVIOUS_TOKEN_KEY),
        }

        let value = generate_token();
        session.insert(
            TOKEN_KEY,
            &StoredToken {
                value: value.clone(),
                issued_at: now,
            },
        );
        debug!("CSRF token rotated");
        value
    }

    pub fn validate(&self, session: &Session, candidate: &str) -> bool {
        self.validate_at(session, candidate, crate::unix_now())
    }

    /// Constant-time comparison against the live token. No token, an expired token,
    /// or an empty candidate never validates.
    pub fn validate_at(&self, session: &Session, candidate: &str, now: i64) -> bool {
        match self.current(session, now) {
            Some(token) if !candidate.is_empty() => {
                let previous = session
                    .get::<StoredToken>(PREVIOUS_TOKEN_KEY)
                    .filter(|t| now - t.issued_at <= ROTATION_GRACE_SECS);
                let matches_current = token.value.as_bytes().ct_eq(candidate.as_bytes());
                let matches_previous = previous
                    .map(|t| t.value.as_bytes().ct_eq(candidate.as_bytes()))
                    .unwrap_or_else(|| Choice::from(0));
                bool::from(matches_current | matches_previous)
            }
            _ => false,
        }
    }

    fn current(&self, session: &Session, now: i64) -> Option<StoredToken> {
        session
            .get::<StoredToken>(TOKEN_KEY)
            .filter(|t| now - t.issued_at <= self.lifetime_secs)
    }
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}
