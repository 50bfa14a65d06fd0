use std::fmt;
use std::str::FromStr;

use board_types::pagination::PageRequest;

/// SQL syntax used to fetch one page of messages.
///
/// Both variants return the same rows in the same order; only the clause shape and the
/// order of the two integer parameters differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationDialect {
    /// `LIMIT n OFFSET m` (SQLite, MySQL/MariaDB, PostgreSQL).
    #[default]
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY` (SQL Server).
    ///
    /// The bundled SQLite engine cannot execute this form, so [`Database::open`] refuses it.
    /// Only the SQL text and bind order are defined here.
    ///
    /// [`Database::open`]: crate::Database::open
    OffsetFetch,
}

impl PaginationDialect {
    /// Picks the dialect for a driver name such as `sqlite` or `sqlsrv`.
    pub fn detect(driver: &str) -> Self {
        match driver.to_ascii_lowercase().as_str() {
            "sqlsrv" | "mssql" => Self::OffsetFetch,
            _ => Self::LimitOffset,
        }
    }

    /// Whether `driver` can execute this dialect.
    pub fn is_supported_by(self, driver: &str) -> bool {
        Self::detect(driver) == self
    }

    pub fn page_query(self) -> &'static str {
        match self {
            Self::LimitOffset => {
                "SELECT id, content, created_at FROM messages
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1 OFFSET ?2"
            }
            Self::OffsetFetch => {
                "SELECT id, content, created_at FROM messages
                 ORDER BY created_at DESC, id DESC
                 OFFSET ?1 ROWS FETCH NEXT ?2 ROWS ONLY"
            }
        }
    }

    /// Positional parameters for [`page_query`](Self::page_query), as integers.
    pub fn bind(self, request: &PageRequest) -> [i64; 2] {
        match self {
            Self::LimitOffset => [request.limit(), request.offset()],
            Self::OffsetFetch => [request.offset(), request.limit()],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LimitOffset => "limit-offset",
            Self::OffsetFetch => "offset-fetch",
        }
    }
}

impl fmt::Display for PaginationDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaginationDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "limit-offset" | "limit" => Ok(Self::LimitOffset),
            "offset-fetch" | "fetch" => Ok(Self::OffsetFetch),
            other => Err(format!("unknown pagination dialect '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(PaginationDialect::detect("sqlsrv"), PaginationDialect::OffsetFetch);
        assert_eq!(PaginationDialect::detect("MSSQL"), PaginationDialect::OffsetFetch);
        assert_eq!(PaginationDialect::detect("sqlite"), PaginationDialect::LimitOffset);
        assert_eq!(PaginationDialect::detect("mysql"), PaginationDialect::LimitOffset);
    }

    #[test]
    fn test_sqlite_runs_only_limit_offset() {
        assert!(PaginationDialect::LimitOffset.is_supported_by(crate::DRIVER));
        assert!(!PaginationDialect::OffsetFetch.is_supported_by(crate::DRIVER));
        assert!(PaginationDialect::OffsetFetch.is_supported_by("sqlsrv"));
    }

    #[test]
    fn test_bind_order_matches_placeholders() {
        let req = PageRequest::new(3, 50);
        assert_eq!(PaginationDialect::LimitOffset.bind(&req), [50, 100]);
        assert_eq!(PaginationDialect::OffsetFetch.bind(&req), [100, 50]);

        assert!(PaginationDialect::LimitOffset.page_query().contains("LIMIT ?1 OFFSET ?2"));
        assert!(
            PaginationDialect::OffsetFetch
                .page_query()
                .contains("OFFSET ?1 ROWS FETCH NEXT ?2 ROWS ONLY")
        );
    }

    #[test]
    fn test_same_ordering_clause() {
        let order = "ORDER BY created_at DESC, id DESC";
        assert!(PaginationDialect::LimitOffset.page_query().contains(order));
        assert!(PaginationDialect::OffsetFetch.page_query().contains(order));
    }

    #[test]
    fn test_parse_round_trip() {
        for d in [PaginationDialect::LimitOffset, PaginationDialect::OffsetFetch] {
            assert_eq!(d.to_string().parse::<PaginationDialect>(), Ok(d));
        }
        assert!("rownum".parse::<PaginationDialect>().is_err());
    }
}
