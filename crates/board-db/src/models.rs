//! Database row types — these map directly to SQLite rows.
//! Distinct from board-types models to keep the DB layer independent.

use board_types::models::Message;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

pub struct MessageRow {
    pub id: i64,
    pub content: String,
    pub created_at: String,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        let created_at = parse_timestamp(&self.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on message {}", self.created_at, self.id);
            DateTime::default()
        });

        Message {
            id: self.id,
            content: self.content,
            created_at,
        }
    }
}

/// One page of the board plus the totals needed to draw pagination controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub messages: Vec<Message>,
    pub total_count: i64,
    pub total_pages: i64,
}

/// Summary of the underlying engine, shown by the health check.
#[derive(Debug, Clone)]
pub struct DatabaseInfo {
    pub driver: &'static str,
    pub version: &'static str,
    pub dialect: crate::dialect::PaginationDialect,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_timestamp_parses_as_utc() {
        let msg = MessageRow {
            id: 7,
            content: "hi".into(),
            created_at: "2024-03-01 12:30:45".into(),
        }
        .into_message();
        assert_eq!(msg.created_at.to_rfc3339(), "2024-03-01T12:30:45+00:00");
    }

    #[test]
    fn test_corrupt_timestamp_falls_back_to_epoch() {
        let msg = MessageRow {
            id: 8,
            content: "hi".into(),
            created_at: "yesterday".into(),
        }
        .into_message();
        assert_eq!(msg.created_at, DateTime::<Utc>::default());
    }
}
