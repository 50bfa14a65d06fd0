use serde::{Deserialize, Serialize};

use crate::models::Message;
use crate::pagination::Pagination;

// -- Board page --

/// Query string of `GET /`. Values are kept as text and parsed leniently by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub success: Option<String>,
    pub refresh_csrf: Option<String>,
}

/// Body of `POST /`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub csrf_token: String,
}

// -- Poll API --

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    pub action: Option<String>,
    pub since_id: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub success: bool,
    pub messages: Vec<Message>,
    pub count: usize,
    /// Unix seconds at which the response was produced.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
