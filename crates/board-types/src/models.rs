use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A posted message.
///
/// `content` is stored already HTML-escaped, so it can be embedded in a page as-is.
/// Messages are never updated or deleted once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
