//! Metadata error types.

use thiserror::Error;

/// A result type using `MetadataError`.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Errors that can occur while reading instance metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The metadata service could not be reached.
    #[error("metadata request for {resource} failed: {message}")]
    Request {
        /// The resource path being read.
        resource: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The metadata service answered with a non-success status.
    #[error("metadata service returned {status} for {resource}")]
    Status {
        /// The resource path being read.
        resource: String,
        /// HTTP status code of the response.
        status: u16,
    },

    /// The resource is not available on this node.
    #[error("metadata resource not available: {0}")]
    Unavailable(String),
}

impl MetadataError {
    /// Returns `true` if reading the resource again might succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Request { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unavailable(_) => false,
        }
    }
}
