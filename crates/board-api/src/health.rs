use axum::{
    extract::{RawQuery, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::middleware::no_cache_headers;
use crate::state::AppState;

/// `GET /health`: always `200 OK` so load balancers keep routing here.
///
/// Any `details` query parameter appends a diagnostic block. Problems found while
/// collecting it are reported in the block, never through the status code.
pub async fn health(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let mut body = String::from("OK\n");

    if wants_details(query.as_deref()) {
        body.push_str(&details(&state).await);
    }

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        no_cache_headers(),
        body,
    )
        .into_response()
}

fn wants_details(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .any(|pair| pair.split('=').next() == Some("details"))
    })
}

async fn details(state: &AppState) -> String {
    let db = state.clone();
    let ping = tokio::task::spawn_blocking(move || db.db.ping()).await;
    let database = match ping {
        Ok(Ok(())) => "OK".to_string(),
        Ok(Err(e)) => {
            warn!("Health check database ping failed: {}", e);
            "WARNING (unreachable)".to_string()
        }
        Err(e) => {
            warn!("Health check join error: {}", e);
            "WARNING (check failed)".to_string()
        }
    };

    let info = state.db.info();
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".into());

    format!(
        "\nservice: {} {}\n\
         database: {database}\n\
         driver: {} {} ({} pagination)\n\
         sessions: {} active\n\
         timestamp: {}\n\
         server: {host}\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        info.driver,
        info.version,
        info.dialect,
        state.sessions.len(),
        chrono::Utc::now().to_rfc3339(),
    )
}
