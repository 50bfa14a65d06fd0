use thiserror::Error;

use crate::dialect::PaginationDialect;

/// Anything that went wrong talking to the database.
///
/// The message is meant for server logs only; handlers never forward it to clients.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection lock poisoned: {0}")]
    Poisoned(String),

    #[error("pagination dialect '{dialect}' is not supported by the {driver} driver")]
    UnsupportedDialect {
        dialect: PaginationDialect,
        driver: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
