//! Container-family error taxonomy: `CTX-*` codes.

use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum ContainerError {
    /// Operation requires a scope the client was not constructed with.
    ScopeViolation(&'static str),
    /// Client has no engine connection (never successfully pinged / closed).
    NotInitialized,
    StartFailed(String),
    ExecFailed(String),
    ImageMissing(String),
    ImageInvalid(String),
    NotFound(String),
    Conflict(String),
    Auth(String),
    Network(String),
    Timeout,
    Cancelled,
    Generic(String),
}

impl ContainerError {
    /// Retryable-error classifier: cancellation/deadline,
    /// connection refused/reset/broken pipe, daemon busy/already-in-use.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Cancelled => true,
            Self::Network(_) => true,
            Self::Conflict(msg) => msg.contains("already in use") || msg.contains("busy"),
            Self::Generic(msg) => {
                let m = msg.to_lowercase();
                m.contains("connection refused")
                    || m.contains("connection reset")
                    || m.contains("broken pipe")
                    || m.contains("temporary failure")
            }
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_millis(100))
        } else {
            None
        }
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScopeViolation(op) => write!(f, "CTX-SCOPE: operation {op} requires a scope this client lacks"),
            Self::NotInitialized => write!(f, "CTX-NOINIT: client not initialized"),
            Self::StartFailed(msg) => write!(f, "CTX-START: {msg}"),
            Self::ExecFailed(msg) => write!(f, "CTX-EXEC: {msg}"),
            Self::ImageMissing(image) => write!(f, "CTX-IMG-MISSING: {image}"),
            Self::ImageInvalid(image) => write!(f, "CTX-IMG-INVALID: {image}"),
            Self::NotFound(id) => write!(f, "CTX-NOTFOUND: {id}"),
            Self::Conflict(msg) => write!(f, "CTX-CONFLICT: {msg}"),
            Self::Auth(msg) => write!(f, "CTX-AUTH: {msg}"),
            Self::Network(msg) => write!(f, "CTX-NET: {msg}"),
            Self::Timeout => write!(f, "CTX-TIMEOUT: operation exceeded its deadline"),
            Self::Cancelled => write!(f, "CTX-CANCELLED: operation cancelled"),
            Self::Generic(msg) => write!(f, "CTX-ERR: {msg}"),
        }
    }
}

impl std::error::Error for ContainerError {}

impl From<bollard::errors::Error> for ContainerError {
    fn from(e: bollard::errors::Error) -> Self {
        use bollard::errors::Error as E;
        match &e {
            E::DockerResponseServerError { status_code: 404, message } => Self::NotFound(message.clone()),
            E::DockerResponseServerError { status_code: 409, message } => Self::Conflict(message.clone()),
            E::DockerResponseServerError { status_code: 401, message } | E::DockerResponseServerError { status_code: 403, message } => {
                Self::Auth(message.clone())
            }
            E::DockerResponseServerError { message, .. } => Self::Generic(message.clone()),
            E::IOError { .. } | E::HyperResponseError { .. } => Self::Network(e.to_string()),
            other => Self::Generic(other.to_string()),
        }
    }
}
