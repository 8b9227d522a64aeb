//! Exchange error types

use thiserror::Error;

/// Result type for connector and transport operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Subscription to {target} failed: {reason}")]
    Subscription { target: String, reason: String },

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Network timeout")]
    Timeout,

    #[error("Stream closed by peer")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport is unusable; the connector backs off and reconnects
    Recoverable,
    /// Only the current payload or request is lost; the stream continues
    Skip,
}

impl ExchangeError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) | Self::Subscription { .. } => ErrorKind::Skip,
            Self::Connection(_)
            | Self::WebSocket(_)
            | Self::InvalidUrl(_)
            | Self::Timeout
            | Self::Closed => ErrorKind::Recoverable,
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self.kind(), ErrorKind::Recoverable)
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for ExchangeError {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<url::ParseError> for ExchangeError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err.to_string())
        }
    }
}
