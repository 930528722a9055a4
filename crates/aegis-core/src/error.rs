//! Error types for the aegis core library.

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the aegis core library.
#[derive(Error, Debug)]
pub enum Error {
    /// A request was rejected before any state was touched
    #[error("Validation error: {0}")]
    Validation(String),

    /// An id-based lookup found nothing
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Stored backup data cannot be trusted
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// An execution ran to completion but ended in the failed state
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Execution was aborted by a cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cluster resource error
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// State store error
    #[error("State store error: {0}")]
    State(String),

    /// Archive encoding or decoding error
    #[error("Archive error: {0}")]
    Archive(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a not-found error for the given entity kind
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error reports a failed id lookup
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::Storage(StorageError::NotFound(_))
                | Error::Resource(ResourceError::NotFound { .. })
        )
    }

    /// Whether this error is a pre-mutation validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Storage backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Errors raised by a cluster resource client
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The named resource does not exist
    #[error("{kind}/{name} not found in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// The cluster does not serve the requested resource type
    #[error("Unknown resource type: {0}")]
    UnknownKind(String),

    /// API call failed
    #[error("API error: {0}")]
    Api(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::State(err.to_string())
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        Error::Resource(ResourceError::Api(err.to_string()))
    }
}
