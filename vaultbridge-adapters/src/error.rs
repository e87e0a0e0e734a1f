//! The unified adapter error taxonomy.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AdapterError {
    pub code: AdapterErrorCode,
    pub message: String,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorCode {
    RateLimited,
    AuthFailed,
    InvalidTarget,
    NetworkError,
    Timeout,
    CircuitOpen,
    ValidationError,
    PlatformError,
}

impl AdapterError {
    pub fn new(code: AdapterErrorCode, message: impl Into<String>) -> Self {
        let retryable = matches!(
            code,
            AdapterErrorCode::RateLimited | AdapterErrorCode::NetworkError | AdapterErrorCode::Timeout | AdapterErrorCode::CircuitOpen
        );
        Self { code, message: message.into(), retryable, retry_after: None }
    }

    pub fn with_retry_after(mut self, d: Duration) -> Self {
        self.retry_after = Some(d);
        self
    }

    /// `permanent = ¬retryable`.
    pub fn permanent(&self) -> bool {
        !self.retryable
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Duration) -> Self {
        Self::new(AdapterErrorCode::RateLimited, message).with_retry_after(retry_after)
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::AuthFailed, message)
    }

    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::InvalidTarget, message)
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::Timeout, message)
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::CircuitOpen, message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::ValidationError, message)
    }

    pub fn platform_error(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorCode::PlatformError, message)
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for AdapterError {}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdapterError::timeout(e.to_string())
        } else if e.is_connect() {
            AdapterError::network_error(e.to_string())
        } else {
            AdapterError::platform_error(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_is_the_negation_of_retryable() {
        let e = AdapterError::auth_failed("bad token");
        assert!(!e.retryable);
        assert!(e.permanent());

        let e = AdapterError::rate_limited("slow down", Duration::from_secs(1));
        assert!(e.retryable);
        assert!(!e.permanent());
    }
}
