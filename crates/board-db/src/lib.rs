pub mod dialect;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

pub use dialect::PaginationDialect;
pub use error::{Result, StoreError};
pub use models::{DatabaseInfo, Page};

const READER_POOL_SIZE: usize = 4;

/// Driver name of the engine behind [`Database`].
pub const DRIVER: &str = "sqlite";

/// Message database with a reader/writer split.
///
/// Inserts go through the single writer; page and poll reads round-robin over a small
/// pool of read-only connections so they never queue behind a write.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
    dialect: PaginationDialect,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub fn open(path: &Path, dialect: PaginationDialect) -> Result<Self> {
        if !dialect.is_supported_by(DRIVER) {
            return Err(StoreError::UnsupportedDialect { dialect, driver: DRIVER });
        }

        let writer = Connection::open(path)?;
        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "synchronous", "NORMAL")?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers, {} pagination)",
            path.display(),
            READER_POOL_SIZE,
            dialect
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
            dialect,
        })
    }

    pub fn dialect(&self) -> PaginationDialect {
        self.dialect
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&conn)
    }
}
