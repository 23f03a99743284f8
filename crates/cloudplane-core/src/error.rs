//! Error types for cloudplane providers
//!
//! Every resource handler, vendor client and the poll loop report failures
//! through [`Error`]. Vendor failures carry the resource type and operation
//! they happened in so the caller can report them without extra context.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cloudplane providers
#[derive(Error, Debug)]
pub enum Error {
    /// A vendor session or client could not be constructed
    #[error("Client initialization failed: {0}")]
    ClientInit(String),

    /// Missing required fields or a forbidden field combination
    #[error("Validation error: {0}")]
    Validation(String),

    /// A vendor API call failed
    #[error("{resource} {operation} failed{}: {message}", fmt_status(.status))]
    Api {
        /// Resource type the call was made for (e.g. "ibm_pi_network")
        resource: String,
        /// Lifecycle operation or vendor call name
        operation: String,
        /// HTTP status returned by the vendor, if any
        status: Option<u16>,
        /// Underlying vendor message
        message: String,
    },

    /// The remote entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The poll loop ran out of time while the entity was still pending
    #[error("Timeout after {waited:?} waiting for {target:?} (last state: {last_state})")]
    Timeout {
        /// How long the loop waited
        waited: Duration,
        /// States the loop was waiting for
        target: Vec<String>,
        /// Last state observed, empty if no refresh completed
        last_state: String,
    },

    /// The refresh returned a state in neither the pending nor target set
    #[error("Unexpected state '{state}', wanted target {target:?}")]
    UnexpectedState {
        /// The state that was returned
        state: String,
        /// States the loop was waiting for
        target: Vec<String>,
    },

    /// The refresh function itself failed
    #[error("Refresh failed: {0}")]
    Refresh(#[source] Box<Error>),

    /// A composite identity string was malformed
    #[error("Invalid ID '{id}': expected {expected}")]
    IdentityParse {
        /// The identity that failed to parse
        id: String,
        /// Human readable description of the expected format
        expected: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP errors (no response received)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a client initialization error
    pub fn client_init(msg: impl Into<String>) -> Self {
        Self::ClientInit(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a vendor API error
    pub fn api(
        resource: impl Into<String>,
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            resource: resource.into(),
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status from a vendor endpoint to an error
    ///
    /// 404 becomes [`Error::NotFound`] so handlers can treat absence
    /// specially; everything else becomes [`Error::Api`].
    pub fn from_status(service: &str, operation: &str, status: u16, body: &str) -> Self {
        match status {
            404 => Self::not_found(format!("{service} {operation}: {body}")),
            401 | 403 => Self::api(
                service,
                operation,
                Some(status),
                "Authentication failed: invalid API key or insufficient permissions",
            ),
            409 => Self::api(
                service,
                operation,
                Some(status),
                format!("Conflict: entity is being modified by another request: {body}"),
            ),
            429 => Self::api(
                service,
                operation,
                Some(status),
                "Rate limit exceeded, retry later",
            ),
            500..=599 => Self::api(
                service,
                operation,
                Some(status),
                format!("Server error (transient): {body}"),
            ),
            _ => Self::api(service, operation, Some(status), body),
        }
    }

    /// Whether this error means the remote entity is absent
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == Some(404),
            Self::Refresh(inner) => inner.is_not_found(),
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::NotFound(_) => Some(404),
            Self::Refresh(inner) => inner.status(),
            _ => None,
        }
    }

    /// Whether the service rejected the request itself (400 or 422)
    ///
    /// Repeating a rejected request cannot succeed; anything else may.
    pub fn is_rejected(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Api { status, .. } => matches!(status, Some(400) | Some(422)),
            Self::Refresh(inner) => inner.is_rejected(),
            _ => false,
        }
    }

    /// Attach resource type and operation context to a vendor failure
    ///
    /// Not-found, validation, identity and poll errors keep their variant so
    /// callers can still match on them.
    pub fn with_operation(self, resource: &str, operation: &str) -> Self {
        match self {
            Self::Api { status, message, operation: call, .. } => Self::Api {
                resource: resource.to_string(),
                operation: format!("{operation} ({call})"),
                status,
                message,
            },
            Self::Http(message) | Self::Other(message) => Self::Api {
                resource: resource.to_string(),
                operation: operation.to_string(),
                status: None,
                message,
            },
            other => other,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
