use regex::RegexSet;
use thiserror::Error;
use tracing::warn;

pub const MAX_CONTENT_LENGTH: usize = 1000;
pub const MIN_CONTENT_LENGTH: usize = 1;

/// Characters of the offending text included in a security log entry.
const LOG_SAMPLE_CHARS: usize = 100;

/// Content that is refused outright. Keyword lists match whole words, case-insensitively.
pub const DEFAULT_SUSPICIOUS_PATTERNS: &[&str] = &[
    r"(?i)\b(script|javascript|vbscript|onload|onerror|onclick|onmouseover|onfocus)\b",
    r"(?i)\b(select|insert|update|delete|drop|create|alter|exec|union|declare|cast)\b",
    r"<[^>]*>",
    r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]",
    r"(?i)\b(eval|exec|system|shell_exec|passthru|file_get_contents)\b",
    r#"(?i)['"]\s*(or|and)\s*['"]"#,
    r"(?i)\bunion\s+select\b",
    r"(?i)\bdrop\s+table\b",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationReason {
    #[error("The message cannot be empty.")]
    Empty,

    #[error("The message cannot exceed {max} characters.")]
    TooLong { max: usize },

    #[error("The message must contain at least {min} character(s).")]
    TooShort { min: usize },

    #[error("The message contains characters or words that are not allowed.")]
    DisallowedContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message rejected: {}", .reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "))]
pub struct ValidationError {
    pub reasons: Vec<ValidationReason>,
}

impl ValidationError {
    pub fn messages(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }
}

/// Normalizes and filters message text before it reaches the store.
pub struct ContentValidator {
    patterns: RegexSet,
    min_len: usize,
    max_len: usize,
}

impl ContentValidator {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
            min_len: MIN_CONTENT_LENGTH,
            max_len: MAX_CONTENT_LENGTH,
        })
    }

    /// The default pattern list plus `extra`.
    pub fn with_extra_patterns(extra: &[String]) -> Result<Self, regex::Error> {
        let patterns = DEFAULT_SUSPICIOUS_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().cloned());
        Self::new(patterns)
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Trims, checks length and patterns on the raw text, then HTML-escapes it once.
    ///
    /// Lengths are counted in characters of the trimmed, unescaped text. A pattern hit is
    /// logged as a security event tagged with `client_id`.
    pub fn validate(&self, raw: &str, client_id: &str) -> Result<String, ValidationError> {
        let text = raw.trim();
        let mut reasons = Vec::new();

        let len = text.chars().count();
        if text.is_empty() {
            reasons.push(ValidationReason::Empty);
        } else if len > self.max_len {
            reasons.push(ValidationReason::TooLong { max: self.max_len });
        } else if len < self.min_len {
            reasons.push(ValidationReason::TooShort { min: self.min_len });
        }

        if let Some(idx) = self.patterns.matches(text).iter().next() {
            let sample: String = text.chars().take(LOG_SAMPLE_CHARS).collect();
            warn!(
                target: "security",
                client = %client_id,
                pattern = %self.patterns.patterns()[idx],
                sample = ?sample,
                "Suspicious pattern detected"
            );
            reasons.push(ValidationReason::DisallowedContent);
        }

        if reasons.is_empty() {
            Ok(escape_html(text))
        } else {
            Err(ValidationError { reasons })
        }
    }
}

/// Escapes `& < > " '` for safe embedding in HTML text and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
