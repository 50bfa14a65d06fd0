pub mod board;
pub mod client;
pub mod context;
pub mod csrf;
pub mod error;
pub mod health;
pub mod middleware;
pub mod poll;
pub mod rate_limit;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;
pub mod validator;

pub use routes::router;
pub use state::{AppState, AppStateInner, Settings};

/// Wall clock in unix seconds. Time-dependent logic takes `now` explicitly and uses this
/// only at the edges.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
