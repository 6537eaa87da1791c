//! Error types for DropVault.
//!
//! - [`BackendError`] - Record-store call failures (create/fetch/update/delete)
//! - [`QueueError`] - Upload queue misuse and unreadable source files
//! - [`ConfigError`] - Missing or malformed environment settings
//! - [`ServerError`] - HTTP surface errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::EntryId;

// =============================================================================
// Backend Errors
// =============================================================================

/// Errors from the hosted record store.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure (connection refused, timeout, TLS...).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// The call went through but the backend reported it as unsuccessful.
    #[error("Failed to {operation} record in '{table}'")]
    Unsuccessful { operation: &'static str, table: String },

    /// Requested record does not exist.
    #[error("Record {0} not found")]
    NotFound(u64),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::InvalidResponse(err.to_string())
    }
}

// =============================================================================
// Queue Errors
// =============================================================================

/// Errors from the upload queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No entry with this id is queued.
    #[error("No queued entry with id {0}")]
    UnknownEntry(EntryId),

    /// A source file could not be inspected.
    #[error("Cannot read '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The path exists but is not a regular file.
    #[error("'{0}' is not a regular file")]
    NotAFile(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading [`crate::config::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Queue operation failed.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Listener could not be bound or the server stopped.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for record-store operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let backend_err = BackendError::NotFound(42);
        let server_err: ServerError = backend_err.into();
        assert!(server_err.to_string().contains("42"));

        let queue_err = QueueError::NotAFile("/tmp".into());
        let server_err: ServerError = queue_err.into();
        assert!(server_err.to_string().contains("/tmp"));
    }

    #[test]
    fn test_api_error_format() {
        let err = BackendError::Api {
            status: 503,
            message: "maintenance".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("maintenance"));
    }
}
