use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use uuid::Uuid;

use crate::client::{client_id, resolve_client_ip};
use crate::session::Session;
use crate::state::{AppState, AppStateInner};

pub const SESSION_COOKIE: &str = "board_session";

/// Who is asking, plus their session.
///
/// Extracting this loads (or starts) the cookie session and rotates it when it is old
/// enough. Rate-limit state lives in `limits`, a separate entry keyed by the client id, so
/// it follows the client whether or not it keeps the cookie.
///
/// Handlers mutate both freely and must call [`finish`](Self::finish) to persist them and
/// get the cookie jar for the response. A new session nothing was written to is dropped.
pub struct ClientContext {
    pub ip: IpAddr,
    pub client_id: String,
    pub session: Session,
    pub limits: Session,
    session_id: String,
    persisted: bool,
    jar: CookieJar,
    issue_cookie: bool,
}

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = resolve_client_ip(&parts.headers, peer);
        let jar = CookieJar::from_headers(&parts.headers);

        Ok(Self::open(state, ip, jar, crate::unix_now()))
    }
}

impl ClientContext {
    fn open(state: &AppStateInner, ip: IpAddr, jar: CookieJar, now: i64) -> Self {
        let existing = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|id| is_session_id(id))
            .and_then(|id| state.sessions.load(&id, now).map(|s| (id, s)));

        let persisted = existing.is_some();
        let (mut session_id, mut session, mut issue_cookie) = match existing {
            Some((id, session)) => (id, session, false),
            None => (new_session_id(), Session::new(now), true),
        };

        if session.age(now) > state.session_rotation_secs {
            state.sessions.remove(&session_id);
            session_id = new_session_id();
            session.renew(now);
            state.csrf.rotate_at(&mut session, now);
            issue_cookie = true;
            debug!("Session rotated");
        }

        let client_id = client_id(&ip);
        let limits = state
            .sessions
            .load(&limits_key(&client_id), now)
            .unwrap_or_else(|| Session::new(now));

        Self {
            ip,
            client_id,
            session,
            limits,
            session_id,
            persisted,
            jar,
            issue_cookie,
        }
    }

    /// Persists what was written and returns the jar to attach to the response.
    pub fn finish(self, state: &AppStateInner) -> CookieJar {
        let now = crate::unix_now();

        if !self.limits.is_empty() {
            state
                .sessions
                .save(&limits_key(&self.client_id), self.limits, now);
        }

        if !self.persisted && self.session.is_empty() {
            return self.jar;
        }
        state.sessions.save(&self.session_id, self.session, now);

        if !self.issue_cookie {
            return self.jar;
        }

        let cookie = Cookie::build((SESSION_COOKIE, self.session_id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(state.secure_cookie);
        self.jar.add(cookie)
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Session ids are 32 lowercase hex digits; anything else in the cookie is ignored.
fn is_session_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn limits_key(client_id: &str) -> String {
    format!("client:{client_id}")
}
