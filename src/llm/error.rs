//! LLM error types with retry classification.
//!
//! Transient failures (rate limits, 5xx, network) may be retried by the
//! transport; everything else is handed straight back to the caller.

use std::time::Duration;

/// Error from LLM API calls.
#[derive(Debug, Clone)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    pub message: String,
    /// Delay requested by the provider via `Retry-After`
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
            retry_after: None,
        }
    }

    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(LlmErrorKind::RateLimited, Some(429), message)
        }
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ServerError, Some(status_code), message)
    }

    pub fn client_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ClientError, Some(status_code), message)
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }

    /// Build the error for a non-success HTTP status.
    pub fn from_status(status_code: u16, body: String, retry_after: Option<Duration>) -> Self {
        match classify_http_status(status_code) {
            LlmErrorKind::RateLimited => Self::rate_limited(body, retry_after),
            LlmErrorKind::ClientError => Self::client_error(status_code, body),
            _ => Self::server_error(status_code, body),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Delay before retry attempt `attempt` (0-based).
    ///
    /// Honors `retry_after` when the provider sent one; otherwise exponential
    /// backoff from a per-kind base, capped at 60 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_secs: u64 = match self.kind {
            LlmErrorKind::RateLimited => 5,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        };
        let delay_secs = base_secs.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(delay_secs.min(60))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429 - transient, retry with backoff
    RateLimited,
    /// 5xx - transient
    ServerError,
    /// Other 4xx (auth, bad request) - permanent
    ClientError,
    /// Connection failure or timeout - transient
    NetworkError,
    /// Response body could not be understood - permanent
    ParseError,
}

impl LlmErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Transport-level retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Upper bound on time spent across all attempts
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_retry_duration: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}
