//! Server-side HTML for the board page.
//!
//! Message content arrives from the store already escaped and is embedded verbatim.
//! Everything else that originates from the request goes through [`escape_html`].

use board_types::models::Message;
use board_types::pagination::{ALLOWED_PAGE_SIZES, Pagination};

use crate::validator::escape_html;

/// Page numbers shown on each side of the current page.
const PAGE_WINDOW: i64 = 2;

/// Above this many pages the window gets first/last anchors and ellipses.
const COMPACT_PAGINATION_THRESHOLD: i64 = 10;

/// Above this many pages a jump-to-page box is shown.
const PAGE_JUMP_THRESHOLD: i64 = 5;

pub struct BoardView<'a> {
    pub messages: &'a [Message],
    pub pagination: &'a Pagination,
    pub csrf_token: &'a str,
    pub success: bool,
    pub load_error: Option<&'a str>,
    pub form_errors: &'a [String],
    /// Text to put back into the textarea after a failed submission.
    pub draft: &'a str,
    /// Minutes left on a submission block, if the client is blocked.
    pub blocked_minutes: Option<u64>,
    pub max_len: usize,
}

pub fn board_page(view: &BoardView<'_>) -> String {
    let mut html = String::with_capacity(8 * 1024);
    html.push_str(HEAD);
    html.push_str("<div class=\"container\">\n<h1>Message Board</h1>\n");

    if view.success {
        html.push_str("<div class=\"alert success\"><p>Message posted.</p></div>\n");
    }
    if let Some(err) = view.load_error {
        html.push_str(&format!(
            "<div class=\"alert error\"><p>{}</p></div>\n",
            escape_html(err)
        ));
    }
    if !view.form_errors.is_empty() {
        html.push_str("<div class=\"alert error\">\n");
        for err in view.form_errors {
            html.push_str(&format!("<p>{}</p>\n", escape_html(err)));
        }
        html.push_str("</div>\n");
    }

    match view.blocked_minutes {
        Some(minutes) => html.push_str(&format!(
            "<div class=\"alert warning\"><p>Too many attempts. Posting is disabled.</p>\
             <p>Time remaining: {minutes} minute(s)</p></div>\n"
        )),
        None => html.push_str(&post_form(view)),
    }

    html.push_str(&per_page_selector(view.pagination));
    html.push_str(&summary(view.messages.len(), view.pagination));
    html.push_str(&message_list(view.messages, view.pagination.current_page));
    html.push_str(&pagination_controls(view.pagination));

    html.push_str("</div>\n");
    html.push_str(SCRIPT);
    html.push_str("</body>\n</html>\n");
    html
}

/// The hidden form field alone, served to refresh a stale token without a reload.
pub fn csrf_input(token: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"csrf_token\" value=\"{}\">",
        escape_html(token)
    )
}

fn post_form(view: &BoardView<'_>) -> String {
    format!(
        "<form method=\"POST\" action=\"/?per_page={per_page}\" class=\"message-form\">\n\
         <input type=\"hidden\" name=\"action\" value=\"add_message\">\n\
         <span id=\"csrf-slot\">{csrf}</span>\n\
         <textarea id=\"content\" name=\"content\" maxlength=\"{max}\" required \
         placeholder=\"Write your message...\">{draft}</textarea>\n\
         <div class=\"form-footer\"><span id=\"char-count\">0</span> / {max}\
         <button type=\"submit\" class=\"submit-btn\">Post</button></div>\n\
         </form>\n",
        per_page = view.pagination.per_page,
        csrf = csrf_input(view.csrf_token),
        max = view.max_len,
        draft = escape_html(view.draft),
    )
}

fn per_page_selector(p: &Pagination) -> String {
    let mut html = String::from(
        "<form method=\"GET\" action=\"/\" class=\"per-page\">\n\
         <label for=\"per_page\">Messages per page</label>\n\
         <select id=\"per_page\" name=\"per_page\" onchange=\"this.form.submit()\">\n",
    );
    for size in ALLOWED_PAGE_SIZES {
        let selected = if size == p.per_page { " selected" } else { "" };
        html.push_str(&format!("<option value=\"{size}\"{selected}>{size}</option>\n"));
    }
    html.push_str("</select>\n</form>\n");
    html
}

fn summary(shown: usize, p: &Pagination) -> String {
    format!(
        "<p class=\"summary\">Showing {shown} of {} message(s) | Page {} of {}</p>\n",
        p.total_messages,
        p.current_page,
        p.total_pages.max(1)
    )
}

fn message_list(messages: &[Message], current_page: u32) -> String {
    if messages.is_empty() {
        return format!(
            "<div id=\"messages\" data-page=\"{current_page}\">\
             <p class=\"empty\">No messages yet.</p></div>\n"
        );
    }

    let mut html = format!("<div id=\"messages\" data-page=\"{current_page}\">\n<ul>\n");
    for m in messages {
        html.push_str(&message_item(m));
    }
    html.push_str("</ul>\n</div>\n");
    html
}

fn message_item(m: &Message) -> String {
    format!(
        "<li class=\"message-item\" data-message-id=\"{id}\">\
         <p>{content}</p>\
         <small>#{id} | {when}</small></li>\n",
        id = m.id,
        content = nl2br(&m.content),
        when = m.created_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn nl2br(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "<br>\n")
}

/// Inclusive range of page numbers to draw around the current page.
fn page_window(p: &Pagination) -> (i64, i64) {
    let current = i64::from(p.current_page);
    let start = (current - PAGE_WINDOW).max(1);
    let end = (current + PAGE_WINDOW).min(p.total_pages);
    (start, end)
}

fn page_link(page: i64, per_page: u32, label: &str, class: &str) -> String {
    format!("<a href=\"/?page={page}&amp;per_page={per_page}\" class=\"pagination-btn{class}\">{label}</a>\n")
}

fn pagination_controls(p: &Pagination) -> String {
    if p.total_pages <= 1 {
        return String::new();
    }

    let per_page = p.per_page;
    let current = i64::from(p.current_page);
    let mut html = String::from("<nav class=\"pagination\">\n");

    if p.has_previous() {
        html.push_str(&page_link(1, per_page, "&laquo; First", " first"));
        html.push_str(&page_link(current - 1, per_page, "&lsaquo; Previous", " prev"));
    }

    let (start, end) = page_window(p);
    let compact = p.total_pages > COMPACT_PAGINATION_THRESHOLD;

    if compact && start > 1 {
        html.push_str(&page_link(1, per_page, "1", ""));
        if start > 2 {
            html.push_str("<span class=\"pagination-ellipsis\">&hellip;</span>\n");
        }
    }

    for page in start..=end {
        if page == current {
            html.push_str(&format!("<span class=\"pagination-btn current\">{page}</span>\n"));
        } else {
            html.push_str(&page_link(page, per_page, &page.to_string(), ""));
        }
    }

    if compact && end < p.total_pages {
        if end < p.total_pages - 1 {
            html.push_str("<span class=\"pagination-ellipsis\">&hellip;</span>\n");
        }
        html.push_str(&page_link(p.total_pages, per_page, &p.total_pages.to_string(), ""));
    }

    if p.has_next() {
        html.push_str(&page_link(current + 1, per_page, "Next &rsaquo;", " next"));
        html.push_str(&page_link(p.total_pages, per_page, "Last &raquo;", " last"));
    }

    if p.total_pages > PAGE_JUMP_THRESHOLD {
        html.push_str(&format!(
            "<form method=\"GET\" action=\"/\" class=\"page-jump\">\
             <input type=\"hidden\" name=\"per_page\" value=\"{per_page}\">\
             <input type=\"number\" name=\"page\" min=\"1\" max=\"{total}\" placeholder=\"{current}\">\
             <button type=\"submit\">Go</button></form>\n",
            total = p.total_pages,
        ));
    }

    html.push_str("</nav>\n");
    html
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Message Board</title>
<style>
body { font-family: system-ui, sans-serif; background: #f4f5f7; margin: 0; }
.container { max-width: 760px; margin: 2rem auto; padding: 0 1rem; }
.alert { padding: .5rem 1rem; border-radius: 6px; margin-bottom: 1rem; }
.alert.success { background: #d4edda; }
.alert.error { background: #f8d7da; }
.alert.warning { background: #fff3cd; }
.message-form textarea { width: 100%; min-height: 6rem; box-sizing: border-box; }
.form-footer { display: flex; justify-content: space-between; margin: .5rem 0 1.5rem; }
#messages ul { list-style: none; padding: 0; }
.message-item { background: #fff; border-radius: 6px; padding: .75rem 1rem; margin-bottom: .5rem; }
.message-item.new { border-left: 4px solid #28a745; }
.message-item small { color: #6c757d; }
.pagination { display: flex; flex-wrap: wrap; gap: .25rem; align-items: center; }
.pagination-btn { padding: .25rem .6rem; border: 1px solid #ccc; border-radius: 4px; text-decoration: none; }
.pagination-btn.current { background: #007bff; color: #fff; }
</style>
</head>
<body>
"#;

const SCRIPT: &str = r#"<script>
(function () {
  var UPDATE_FREQUENCY = 3000;
  var CSRF_REFRESH = 10 * 60 * 1000;
  var textarea = document.getElementById('content');
  var counter = document.getElementById('char-count');
  if (textarea && counter) {
    var update = function () { counter.textContent = textarea.value.length; };
    textarea.addEventListener('input', update);
    update();
  }

  setInterval(function () {
    fetch('/?refresh_csrf=1', { credentials: 'same-origin' })
      .then(function (r) { return r.ok ? r.text() : null; })
      .then(function (html) {
        var slot = document.getElementById('csrf-slot');
        if (html && slot) { slot.innerHTML = html; }
      })
      .catch(function () {});
  }, CSRF_REFRESH);

  var container = document.getElementById('messages');
  if (!container || container.getAttribute('data-page') !== '1') { return; }

  var lastMessageId = 0;
  container.querySelectorAll('[data-message-id]').forEach(function (el) {
    lastMessageId = Math.max(lastMessageId, parseInt(el.getAttribute('data-message-id'), 10));
  });

  var delay = UPDATE_FREQUENCY;
  function poll() {
    fetch('/api.php?action=get_messages&since_id=' + lastMessageId, {
      credentials: 'same-origin',
      headers: { 'X-Requested-With': 'XMLHttpRequest' }
    }).then(function (r) {
      if (r.status === 429) { delay = UPDATE_FREQUENCY * 2; return null; }
      delay = UPDATE_FREQUENCY;
      return r.ok ? r.json() : null;
    }).then(function (data) {
      if (!data || !data.success || !data.messages.length) { return; }
      var list = container.querySelector('ul');
      if (!list) { container.innerHTML = '<ul></ul>'; list = container.querySelector('ul'); }
      data.messages.slice().reverse().forEach(function (m) {
        if (container.querySelector('[data-message-id="' + m.id + '"]')) { return; }
        var li = document.createElement('li');
        li.className = 'message-item new';
        li.setAttribute('data-message-id', m.id);
        li.innerHTML = '<p>' + m.content.replace(/\n/g, '<br>') + '</p><small>#' + m.id + '</small>';
        list.insertBefore(li, list.firstChild);
        lastMessageId = Math.max(lastMessageId, m.id);
      });
    }).catch(function () {}).then(function () { setTimeout(poll, delay); });
  }
  setTimeout(poll, delay);
})();
</script>
"#;

#[cfg(test)]
mod tests {
    use board_types::pagination::PageRequest;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn message(id: i64, content: &str) -> Message {
        Message {
            id,
            content: content.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    fn view<'a>(messages: &'a [Message], pagination: &'a Pagination) -> BoardView<'a> {
        BoardView {
            messages,
            pagination,
            csrf_token: "tok",
            success: false,
            load_error: None,
            form_errors: &[],
            draft: "",
            blocked_minutes: None,
            max_len: 1000,
        }
    }

    #[test]
    fn test_stored_content_is_not_escaped_again() {
        let msgs = [message(1, "Tom &amp; Jerry\nline two")];
        let p = Pagination::new(PageRequest::default(), 1);
        let html = board_page(&view(&msgs, &p));
        assert!(html.contains("Tom &amp; Jerry<br>\nline two"));
        assert!(!html.contains("&amp;amp;"));
        assert!(html.contains("data-message-id=\"1\""));
    }

    #[test]
    fn test_draft_and_errors_are_escaped() {
        let p = Pagination::new(PageRequest::default(), 0);
        let errors = vec!["<bad>".to_string()];
        let mut v = view(&[], &p);
        v.form_errors = &errors[..];
        v.draft = "<script>";
        let html = board_page(&v);
        assert!(html.contains("&lt;bad&gt;"));
        assert!(html.contains(">&lt;script&gt;</textarea>"));
        assert!(!html.contains("<bad>"));
    }

    #[test]
    fn test_blocked_client_sees_no_form() {
        let p = Pagination::new(PageRequest::default(), 0);
        let mut v = view(&[], &p);
        v.blocked_minutes = Some(4);
        let html = board_page(&v);
        assert!(html.contains("Time remaining: 4 minute(s)"));
        assert!(!html.contains("name=\"csrf_token\""));
    }

    #[test]
    fn test_csrf_input() {
        assert_eq!(
            csrf_input("abc123"),
            "<input type=\"hidden\" name=\"csrf_token\" value=\"abc123\">"
        );
    }

    #[test]
    fn test_single_page_has_no_controls() {
        let p = Pagination::new(PageRequest::new(1, 20), 20);
        assert_eq!(pagination_controls(&p), "");
    }

    #[test]
    fn test_page_window_clamps_to_bounds() {
        assert_eq!(page_window(&Pagination::new(PageRequest::new(1, 20), 200)), (1, 3));
        assert_eq!(page_window(&Pagination::new(PageRequest::new(6, 20), 200)), (4, 8));
        assert_eq!(page_window(&Pagination::new(PageRequest::new(10, 20), 200)), (8, 10));
    }

    #[test]
    fn test_compact_controls_for_many_pages() {
        // 15 pages, on page 7.
        let p = Pagination::new(PageRequest::new(7, 20), 300);
        let html = pagination_controls(&p);
        assert!(html.contains("class=\"pagination-btn current\">7<"));
        assert!(html.contains("/?page=1&amp;per_page=20"));
        assert!(html.contains("/?page=15&amp;per_page=20"));
        assert_eq!(html.matches("&hellip;").count(), 2);
        assert!(html.contains("class=\"page-jump\""));
    }

    #[test]
    fn test_per_page_option_selected() {
        let p = Pagination::new(PageRequest::new(1, 100), 0);
        let html = per_page_selector(&p);
        assert!(html.contains("<option value=\"100\" selected>100</option>"));
        assert!(html.contains("<option value=\"20\">20</option>"));
    }
}
