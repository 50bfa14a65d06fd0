use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use tracing::debug;

use board_types::api::{PollQuery, PollResponse};
use board_types::pagination::{PageRequest, PageSize, Pagination, parse_param};

use crate::context::ClientContext;
use crate::error::ApiError;
use crate::middleware::no_cache_headers;
use crate::state::AppState;

const GET_MESSAGES_ACTION: &str = "get_messages";

/// `GET /api.php` and `GET /api`: JSON feed for the polling script.
pub async fn poll_messages(
    State(state): State<AppState>,
    mut ctx: ClientContext,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<PollQuery>,
) -> Response {
    // Refused before the limiter runs: nothing to persist.
    if let Err(e) = check_request(&method, &headers, &query) {
        return (no_cache_headers(), e).into_response();
    }

    let result = handle_poll(&state, &mut ctx, &query).await;
    let jar = ctx.finish(&state);
    (no_cache_headers(), jar, result).into_response()
}

fn check_request(method: &Method, headers: &HeaderMap, query: &PollQuery) -> Result<(), ApiError> {
    if !is_ajax(headers) {
        return Err(ApiError::BadRequest("Invalid request"));
    }
    if method != Method::GET {
        return Err(ApiError::MethodNotAllowed);
    }
    if query.action.as_deref() != Some(GET_MESSAGES_ACTION) {
        return Err(ApiError::BadRequest("Invalid action"));
    }
    Ok(())
}

async fn handle_poll(
    state: &AppState,
    ctx: &mut ClientContext,
    query: &PollQuery,
) -> Result<Json<PollResponse>, ApiError> {
    state
        .api_limiter
        .check_and_record(&mut ctx.limits, &ctx.client_id)
        .map_err(|retry_after| ApiError::RateLimited { retry_after })?;

    let since_id = parse_param(query.since_id.as_deref())
        .map_err(|_| ApiError::BadRequest("Invalid since_id"))?
        .unwrap_or(0);
    let page = parse_param(query.page.as_deref())
        .map_err(|_| ApiError::BadRequest("Invalid page"))?
        .unwrap_or(1);
    let per_page = parse_param(query.per_page.as_deref())
        .map_err(|_| ApiError::BadRequest("Invalid per_page"))?
        .unwrap_or(i64::from(PageSize::DEFAULT.get()));

    let db = state.clone();
    let response = if since_id > 0 {
        let messages = tokio::task::spawn_blocking(move || db.db.list_since(since_id))
            .await
            .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {e}")))??;
        debug!(client = %ctx.client_id, since_id, count = messages.len(), "Poll");
        PollResponse {
            success: true,
            count: messages.len(),
            messages,
            timestamp: crate::unix_now(),
            pagination: None,
        }
    } else {
        let request = PageRequest::new(page, per_page);
        let page = tokio::task::spawn_blocking(move || db.db.list_page(request))
            .await
            .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {e}")))??;
        PollResponse {
            success: true,
            count: page.messages.len(),
            pagination: Some(Pagination::new(request, page.total_count)),
            messages: page.messages,
            timestamp: crate::unix_now(),
        }
    };

    Ok(Json(response))
}

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}
