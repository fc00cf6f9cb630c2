use std::fmt;
use std::time::Duration;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum BlobVisionError {
    /// Rejected configuration value; raised before any network call.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Payload source could not be opened.
    #[error("source unavailable: {source_name}: {reason}")]
    SourceUnavailable {
        /// Blob reference or local path that failed to open.
        source_name: String,
        /// Underlying cause.
        reason: String,
    },
    /// A chunk read failed after the source was opened.
    #[error("read error: {0}")]
    Read(String),
    /// Network or request execution error from `reqwest`, after retries.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// JSON report could not be serialized or written.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Caller stopped waiting for the outcome.
    #[error("timed out after {0:?} waiting for completion")]
    Timeout(Duration),
    /// Completion gate was dropped without delivering an outcome.
    #[error("call ended without delivering an outcome")]
    Interrupted,
}

/// Coarse classification of [`BlobVisionError`], stable across variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfig,
    SourceUnavailable,
    ReadError,
    NetworkFailure,
    ServiceError,
    SerializationError,
    Timeout,
    Interrupted,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfig => "InvalidConfig",
            Self::SourceUnavailable => "SourceUnavailable",
            Self::ReadError => "ReadError",
            Self::NetworkFailure => "NetworkFailure",
            Self::ServiceError => "ServiceError",
            Self::SerializationError => "SerializationError",
            Self::Timeout => "Timeout",
            Self::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BlobVisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::Read(_) => ErrorKind::ReadError,
            Self::Transport(_) => ErrorKind::NetworkFailure,
            Self::Http { .. } | Self::Decode(_) => ErrorKind::ServiceError,
            Self::Serialization(_) => ErrorKind::SerializationError,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// HTTP status code reported by the service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn source_unavailable(source: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::SourceUnavailable {
            source_name: source.to_string(),
            reason: reason.to_string(),
        }
    }
}
