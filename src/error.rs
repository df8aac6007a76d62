//! Error types shared across the crate.
//!
//! Two layers live here:
//!
//! - [`Error`] is the crate-wide error returned by API calls, persistence and
//!   configuration. [`crate::Res`] is the matching result alias.
//! - [`PlaybackError`] and [`ErrorKind`] describe failures of the playback
//!   session controller. These are never returned across the controller's
//!   async boundary; they are captured into the playback state instead.

use reqwest::StatusCode;
use serde::Serialize;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Spotify API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl Error {
    /// Classifies this error for the playback controller.
    ///
    /// Status codes follow the command boundary contract: `401` means the
    /// bearer token was rejected, `404` means the target device is gone and
    /// everything else is a transport problem.
    pub fn playback_kind(&self) -> ErrorKind {
        match self {
            Error::Playback(e) => e.kind,
            Error::Auth(_) => ErrorKind::AuthExpired,
            Error::Api { status, .. } => ErrorKind::from_status(*status),
            Error::Http(e) => e
                .status()
                .map(|s| ErrorKind::from_status(s.as_u16()))
                .unwrap_or(ErrorKind::TransportFailure),
            _ => ErrorKind::TransportFailure,
        }
    }

    /// Whether retrying the same request could succeed without user action.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_connect() || e.is_timeout() || e.status().is_some_and(|s| s.is_server_error())
            }
            Error::Api { status, .. } => {
                StatusCode::from_u16(*status).is_ok_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

impl From<Error> for PlaybackError {
    fn from(err: Error) -> Self {
        match err {
            Error::Playback(e) => e,
            other => PlaybackError::new(other.playback_kind(), other.to_string()),
        }
    }
}

/// Failure categories of the playback session controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No registered device yet. Retry later, not fatal.
    #[error("no playback device available")]
    DeviceUnavailable,

    /// The bearer token was rejected. Fatal for the session; the
    /// authentication provider owns recovery.
    #[error("authentication expired")]
    AuthExpired,

    /// Network or HTTP failure on a command. May be retried by the user.
    #[error("playback command failed")]
    TransportFailure,

    /// The remote session could not be stood up at all. Terminal until the
    /// session is reconstructed.
    #[error("player failed to initialize")]
    InitializationFailure,
}

impl ErrorKind {
    fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::AuthExpired,
            404 => ErrorKind::DeviceUnavailable,
            _ => ErrorKind::TransportFailure,
        }
    }
}

/// A classified playback failure with a human readable message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PlaybackError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PlaybackError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn device_unavailable() -> Self {
        Self::new(ErrorKind::DeviceUnavailable, "no device has registered yet")
    }

    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthExpired, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportFailure, message)
    }

    pub fn initialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InitializationFailure, message)
    }
}
