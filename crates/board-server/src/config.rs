use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};

use board_api::Settings;
use board_db::PaginationDialect;

/// Separator for `BOARD_EXTRA_PATTERNS`. Regexes routinely contain `,` and `;`.
const PATTERN_SEPARATOR: &str = ";;";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dialect: PaginationDialect,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Settings::default();

        let dialect = parse_dialect(std::env::var("BOARD_SQL_DIALECT").ok().as_deref())?;

        let extra_patterns = std::env::var("BOARD_EXTRA_PATTERNS")
            .map(|raw| split_patterns(&raw))
            .unwrap_or_default();

        let settings = Settings {
            max_attempts: env_or("BOARD_MAX_ATTEMPTS", defaults.max_attempts)?,
            block_duration: secs_or("BOARD_BLOCK_SECONDS", defaults.block_duration)?,
            api_max_requests: env_or("BOARD_API_MAX_REQUESTS", defaults.api_max_requests)?,
            api_window: secs_or("BOARD_API_WINDOW_SECONDS", defaults.api_window)?,
            session_lifetime: secs_or("BOARD_SESSION_LIFETIME", defaults.session_lifetime)?,
            session_rotation: defaults.session_rotation,
            max_sessions: env_or("BOARD_MAX_SESSIONS", defaults.max_sessions)?,
            csrf_lifetime: secs_or("BOARD_CSRF_LIFETIME", defaults.csrf_lifetime)?,
            extra_patterns,
            secure_cookie: env_or("BOARD_SECURE_COOKIE", defaults.secure_cookie)?,
        };

        Ok(Self {
            host: std::env::var("BOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("BOARD_PORT", 8080)?,
            db_path: std::env::var("BOARD_DB_PATH")
                .unwrap_or_else(|_| "board.db".into())
                .into(),
            dialect,
            settings,
        })
    }
}

/// Parses `name` if set, else returns `default`. A set but malformed value is an error.
fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// The configured dialect, or the driver's own when unset. A dialect the driver cannot
/// execute is refused here rather than at database open.
fn parse_dialect(raw: Option<&str>) -> anyhow::Result<PaginationDialect> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(PaginationDialect::detect(board_db::DRIVER));
    };

    let dialect = raw
        .parse::<PaginationDialect>()
        .map_err(|e| anyhow!("BOARD_SQL_DIALECT: {e}"))?;
    if !dialect.is_supported_by(board_db::DRIVER) {
        bail!(
            "BOARD_SQL_DIALECT={dialect} is not supported by the {} driver; use {}",
            board_db::DRIVER,
            PaginationDialect::detect(board_db::DRIVER)
        );
    }
    Ok(dialect)
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(PATTERN_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn secs_or(name: &str, default: Duration) -> anyhow::Result<Duration> {
    env_or(name, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_patterns() {
        assert_eq!(
            split_patterns(r"(?i)\bspam\b;; ;;a{2,3};b"),
            vec![r"(?i)\bspam\b".to_string(), "a{2,3};b".to_string()]
        );
        assert!(split_patterns("").is_empty());
    }

    #[test]
    fn test_dialect_defaults_to_driver() {
        assert_eq!(parse_dialect(None).unwrap(), PaginationDialect::LimitOffset);
        assert_eq!(parse_dialect(Some(" ")).unwrap(), PaginationDialect::LimitOffset);
        assert_eq!(
            parse_dialect(Some("limit-offset")).unwrap(),
            PaginationDialect::LimitOffset
        );
    }

    #[test]
    fn test_unexecutable_dialect_refused() {
        let err = parse_dialect(Some("offset-fetch")).unwrap_err().to_string();
        assert!(err.contains("not supported by the sqlite driver"), "{err}");
        assert!(parse_dialect(Some("rownum")).is_err());
    }

    #[test]
    fn test_unset_variable_uses_default() {
        let port: u16 = env_or("BOARD_TEST_SURELY_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
        assert_eq!(
            secs_or("BOARD_TEST_SURELY_UNSET_SECS", Duration::from_secs(60)).unwrap(),
            Duration::from_secs(60)
        );
    }
}
