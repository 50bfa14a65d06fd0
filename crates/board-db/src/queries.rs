use board_types::models::Message;
use board_types::pagination::{PageRequest, total_pages};
use rusqlite::{Connection, Row};

use crate::error::Result;
use crate::models::{DatabaseInfo, MessageRow, Page};
use crate::{DRIVER, Database};

impl Database {
    /// Inserts one message. The id and timestamp come from the engine.
    pub fn insert(&self, content: &str) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let row = conn.query_row(
                "INSERT INTO messages (content) VALUES (?1) RETURNING id, content, created_at",
                [content],
                map_message_row,
            )?;
            Ok(row.into_message())
        })
    }

    /// Messages with an id greater than `min_id`, newest first. `0` returns everything.
    pub fn list_since(&self, min_id: i64) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_since(conn, min_id))
    }

    /// One page of the board, newest first, with totals.
    ///
    /// The count and the page are two separate reads, so an insert landing between them
    /// may show up in one but not the other.
    pub fn list_page(&self, request: PageRequest) -> Result<Page> {
        let dialect = self.dialect();
        self.with_conn(|conn| {
            let total_count = query_count(conn)?;

            let mut stmt = conn.prepare_cached(dialect.page_query())?;
            let messages = stmt
                .query_map(dialect.bind(&request), map_message_row)?
                .map(|row| row.map(MessageRow::into_message))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(Page {
                messages,
                total_count,
                total_pages: total_pages(total_count, request.size()),
            })
        })
    }

    pub fn count(&self) -> Result<i64> {
        self.with_conn(query_count)
    }

    /// Round trip through the messages table, for the health check.
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT EXISTS (SELECT 1 FROM messages)", [], |row| {
                row.get::<_, i64>(0)
            })?;
            Ok(())
        })
    }

    pub fn info(&self) -> DatabaseInfo {
        DatabaseInfo {
            driver: DRIVER,
            version: rusqlite::version(),
            dialect: self.dialect(),
        }
    }
}

fn query_since(conn: &Connection, min_id: i64) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, content, created_at FROM messages
         WHERE id > ?1
         ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt
        .query_map([min_id], map_message_row)?
        .map(|row| row.map(MessageRow::into_message))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_count(conn: &Connection) -> Result<i64> {
    let total = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
    Ok(total)
}

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: row.get(2)?,
    })
}
