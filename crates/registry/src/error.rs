//! Registry error types

use thiserror::Error;

/// Errors surfaced by registry backends
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend has no document under this key
    #[error("schema not found: {0}")]
    NotFound(String),

    /// Transport-level failure (I/O, HTTP, timeout)
    #[error("fetch failed: {0}")]
    Transport(String),

    /// I/O error from the filesystem backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the schema cache
///
/// The annotator maps each variant to an envelope verdict; none of these
/// propagate past annotation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No such key in the backend
    #[error("schema not found: {key}")]
    NotFound {
        /// The opaque schema key
        key: String,
    },

    /// Backend unreachable or timed out; a transient failure
    #[error("schema unavailable: {key}: {cause}")]
    FetchFailed {
        /// The opaque schema key
        key: String,
        /// Transport-level cause
        cause: String,
    },

    /// Schema document exists but does not compile
    #[error("schema invalid: {key}: {cause}")]
    CompileFailed {
        /// The opaque schema key
        key: String,
        /// Parse or compilation error
        cause: String,
    },
}

impl RegistryError {
    /// Lift a backend error into a cache error for a given key
    pub(crate) fn from_backend(key: &str, err: BackendError) -> Self {
        match err {
            BackendError::NotFound(_) => Self::NotFound { key: key.into() },
            BackendError::Transport(cause) => Self::FetchFailed {
                key: key.into(),
                cause,
            },
            BackendError::Io(e) => Self::FetchFailed {
                key: key.into(),
                cause: e.to_string(),
            },
        }
    }
}
