use thiserror::Error;

/// Session and token store error types
#[derive(Error, Debug)]
pub enum FlAuthError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized: {}", message.as_deref().unwrap_or("token rejected"))]
    Unauthorized { message: Option<String> },

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: reqwest::StatusCode,
        message: Option<String>,
        body_snippet: String,
    },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] Box<FlAuthError>),

    #[error("Refresh response did not contain an access token")]
    MissingAccessToken,

    #[error("User cancelled the passphrase prompt")]
    UserCancelled,

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store is locked by another process")]
    LockTimeout,

    #[error("Token store is corrupted or was encrypted with a different key")]
    CorruptedStore,

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Coarse classification of failures as seen by callers of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expired, missing or rejected credentials
    Unauthorized,
    /// Transport-level failure
    Network,
    /// Unexpected non-2xx or malformed response
    Server,
    /// Secure store, crypto or filesystem failure
    Storage,
}

impl FlAuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } | Self::RefreshFailed(_) => ErrorKind::Unauthorized,
            Self::Network(_) => ErrorKind::Network,
            Self::Http { .. }
            | Self::MissingAccessToken
            | Self::Serde(_)
            | Self::UrlParse(_)
            | Self::InvalidHeader(_) => ErrorKind::Server,
            Self::UserCancelled
            | Self::Io(_)
            | Self::LockTimeout
            | Self::CorruptedStore
            | Self::Crypto(_)
            | Self::Keyring(_)
            | Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Human-readable `message` field returned by the backend, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } | Self::Http { message, .. } => message.as_deref(),
            Self::RefreshFailed(inner) => inner.server_message(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(reqwest::StatusCode::UNAUTHORIZED),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlAuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_failure_is_unauthorized() {
        let err = FlAuthError::RefreshFailed(Box::new(FlAuthError::MissingAccessToken));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_server_message_passes_through_refresh_failure() {
        let err = FlAuthError::RefreshFailed(Box::new(FlAuthError::Unauthorized {
            message: Some("Token expired".to_string()),
        }));
        assert_eq!(err.server_message(), Some("Token expired"));
    }

    #[test]
    fn test_http_error_is_server_kind() {
        let err = FlAuthError::Http {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
            body_snippet: "boom".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    }
}
