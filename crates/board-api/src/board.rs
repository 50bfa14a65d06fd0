use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{error, info, warn};

use board_types::api::{BoardQuery, SubmitForm};
use board_types::models::Message;
use board_types::pagination::{PageRequest, PageSize, Pagination, parse_param};

use crate::context::ClientContext;
use crate::error::BoardError;
use crate::render::{self, BoardView};
use crate::state::{AppState, AppStateInner};

const ADD_MESSAGE_ACTION: &str = "add_message";

/// What the last submission left behind for the page to show.
#[derive(Default)]
struct Notice {
    success: bool,
    errors: Vec<String>,
    draft: String,
}

/// `GET /`
pub async fn show_board(
    State(state): State<AppState>,
    mut ctx: ClientContext,
    Query(query): Query<BoardQuery>,
) -> Response {
    if query.refresh_csrf.is_some() {
        let token = state.csrf.issue(&mut ctx.session);
        let jar = ctx.finish(&state);
        return (jar, Html(render::csrf_input(&token))).into_response();
    }

    let notice = Notice {
        success: query.success.as_deref() == Some("1"),
        ..Notice::default()
    };
    let page = render_board(&state, &mut ctx, lenient_page_request(&query), notice).await;
    (ctx.finish(&state), page).into_response()
}

/// `POST /`
pub async fn submit_message(
    State(state): State<AppState>,
    mut ctx: ClientContext,
    Query(query): Query<BoardQuery>,
    Form(form): Form<SubmitForm>,
) -> Response {
    let request = lenient_page_request(&query);

    if form.action != ADD_MESSAGE_ACTION {
        let page = render_board(&state, &mut ctx, request, Notice::default()).await;
        return (ctx.finish(&state), page).into_response();
    }

    match add_message(&state, &mut ctx, &form).await {
        Ok(_) => {
            let location = format!("/?success=1&per_page={}", request.size().get());
            (ctx.finish(&state), Redirect::to(&location)).into_response()
        }
        Err(err) => {
            let notice = Notice {
                success: false,
                errors: err.user_messages(),
                draft: form.content,
            };
            let page = render_board(&state, &mut ctx, request, notice).await;
            (err.status(), ctx.finish(&state), page).into_response()
        }
    }
}

/// Runs one submission through the limiter, CSRF check, validator and store.
///
/// Every refusal after the limiter gate counts as a failed attempt.
async fn add_message(
    state: &AppState,
    ctx: &mut ClientContext,
    form: &SubmitForm,
) -> Result<Message, BoardError> {
    let limiter = &state.submit_limiter;

    if !limiter.allow(&ctx.limits, &ctx.client_id) {
        let retry_after = limiter.time_remaining(&ctx.limits, &ctx.client_id);
        info!(client = %ctx.client_id, retry_after, "Blocked submission");
        return Err(BoardError::RateLimited { retry_after });
    }

    if !state.csrf.validate(&ctx.session, &form.csrf_token) {
        limiter.record_attempt(&mut ctx.limits, &ctx.client_id);
        warn!(target: "security", client = %ctx.client_id, "CSRF token mismatch");
        return Err(BoardError::Csrf);
    }

    let content = match state.validator.validate(&form.content, &ctx.client_id) {
        Ok(content) => content,
        Err(e) => {
            limiter.record_attempt(&mut ctx.limits, &ctx.client_id);
            return Err(e.into());
        }
    };

    let db = state.clone();
    let inserted = tokio::task::spawn_blocking(move || db.db.insert(&content))
        .await
        .map_err(|e| BoardError::Internal(format!("spawn_blocking join error: {e}")))
        .and_then(|res| res.map_err(BoardError::from));

    match inserted {
        Ok(message) => {
            info!(client = %ctx.client_id, id = message.id, "Message posted");
            Ok(message)
        }
        Err(e) => {
            limiter.record_attempt(&mut ctx.limits, &ctx.client_id);
            error!(client = %ctx.client_id, "Failed to store message: {}", e);
            Err(e)
        }
    }
}

/// Board page query parsing never fails: junk falls back to page 1 and the default size.
fn lenient_page_request(query: &BoardQuery) -> PageRequest {
    let page = parse_param(query.page.as_deref()).ok().flatten().unwrap_or(1);
    let per_page = parse_param(query.per_page.as_deref())
        .ok()
        .flatten()
        .unwrap_or(i64::from(PageSize::DEFAULT.get()));
    PageRequest::new(page, per_page)
}

async fn render_board(
    state: &AppState,
    ctx: &mut ClientContext,
    request: PageRequest,
    notice: Notice,
) -> Html<String> {
    let db = state.clone();
    let page = tokio::task::spawn_blocking(move || db.db.list_page(request))
        .await
        .map_err(|e| BoardError::Internal(format!("spawn_blocking join error: {e}")))
        .and_then(|res| res.map_err(BoardError::from));

    let (messages, total, load_error) = match page {
        Ok(page) => (page.messages, page.total_count, None),
        Err(e) => {
            error!("Failed to load messages: {}", e);
            (Vec::new(), 0, Some("Unable to load messages. Please try again later."))
        }
    };

    let pagination = Pagination::new(request, total);
    let csrf_token = state.csrf.issue(&mut ctx.session);
    let blocked_minutes = blocked_minutes(state, ctx);

    Html(render::board_page(&BoardView {
        messages: &messages,
        pagination: &pagination,
        csrf_token: &csrf_token,
        success: notice.success,
        load_error,
        form_errors: &notice.errors,
        draft: &notice.draft,
        blocked_minutes,
        max_len: state.validator.max_len(),
    }))
}

fn blocked_minutes(state: &AppStateInner, ctx: &ClientContext) -> Option<u64> {
    if state.submit_limiter.allow(&ctx.limits, &ctx.client_id) {
        return None;
    }
    let secs = state.submit_limiter.time_remaining(&ctx.limits, &ctx.client_id);
    Some(secs.div_ceil(60).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, per_page: Option<&str>) -> BoardQuery {
        BoardQuery {
            page: page.map(str::to_string),
            per_page: per_page.map(str::to_string),
            ..BoardQuery::default()
        }
    }

    #[test]
    fn test_lenient_page_request() {
        assert_eq!(lenient_page_request(&query(None, None)), PageRequest::default());
        assert_eq!(
            lenient_page_request(&query(Some("3"), Some("50"))),
            PageRequest::new(3, 50)
        );
        assert_eq!(
            lenient_page_request(&query(Some("abc"), Some("7"))),
            PageRequest::new(1, 20)
        );
        assert_eq!(
            lenient_page_request(&query(Some("-4"), Some("200"))),
            PageRequest::new(1, 200)
        );
    }
}
