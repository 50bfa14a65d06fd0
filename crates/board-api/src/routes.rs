use axum::{
    Router, middleware,
    routing::{any, get},
};

use crate::state::AppState;
use crate::{board, health, middleware::security_headers, poll};

/// All board routes with the security-header layer applied.
///
/// The `/api.php` path is kept for clients written against the old deployment.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(board::show_board).post(board::submit_message))
        .route("/api.php", any(poll::poll_messages))
        .route("/api", any(poll::poll_messages))
        .route("/health", get(health::health))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}
