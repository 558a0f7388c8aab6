//! Error types for Drive operations.
//!
//! Errors carry a category so callers can decide whether an entry should be
//! skipped, the run aborted, or the user sent back through authorization.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for Drive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of Drive errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or API transport failure.
    Network,
    /// Missing, expired or rejected credentials.
    Auth,
    /// Object or folder does not exist.
    NotFound,
    /// Unexpected response shape or file format.
    Format,
    /// Local permission problem.
    Permission,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether re-running the authorization flow may fix this error.
    #[must_use]
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Self::Auth)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network or API error",
            Self::Auth => "Authorization problem",
            Self::NotFound => "Remote object not found",
            Self::Format => "Unexpected response",
            Self::Permission => "Permission denied",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::Auth => "Run `drivesweep auth login` to authorize again",
            Self::NotFound => "Verify the folder id and that the account can see it",
            Self::Format => "The API answered with data this client does not understand",
            Self::Permission => "Check file permissions for the token and destination",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during Drive operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// No usable credential and the authorization flow could not produce one.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// The client secrets file is missing or malformed.
    #[error("invalid client secrets at {path}: {message}")]
    ClientSecrets {
        /// Secrets file path.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// HTTP status code, when the error came from an HTTP response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpError { status, .. } => *status,
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::HttpError { status, .. } => match status {
                Some(401) => ErrorCategory::Auth,
                Some(403) => ErrorCategory::Permission,
                Some(404) => ErrorCategory::NotFound,
                _ => ErrorCategory::Network,
            },
            Error::Auth(_) => ErrorCategory::Auth,
            Error::ClientSecrets { .. } => ErrorCategory::Auth,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Io { source, .. } => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    ErrorCategory::Permission
                } else {
                    ErrorCategory::Other
                }
            }
            Error::Other(_) => ErrorCategory::Other,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
