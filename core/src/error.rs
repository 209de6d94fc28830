//! Error types shared across SILTA crates

use thiserror::Error;

/// Error returned by a [`ModuleFetcher`](crate::ModuleFetcher)
///
/// The fetch subsystem is pluggable; these categories are what the cache
/// adapter needs to turn a failure into NACK reason text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No fetcher handles the URI scheme
    ///
    /// Examples: `oci://` when only `file://` is wired up.
    #[error("unsupported module uri scheme: {0}")]
    UnsupportedScheme(String),

    /// The module does not exist at the referenced location
    #[error("module not found: {0}")]
    NotFound(String),

    /// Downloaded content did not match the expected digest
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest declared in the extension config
        expected: String,
        /// Digest of the fetched artifact
        actual: String,
    },

    /// The fetch did not complete in time
    #[error("fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Local IO failure while storing or reading the artifact
    #[error("io error: {0}")]
    Io(String),

    /// Any other fetcher-specific failure
    #[error("fetch failed: {0}")]
    Other(String),
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound(err.to_string())
        } else {
            FetchError::Io(err.to_string())
        }
    }
}

/// Error unpacking a protobuf `Any`
#[derive(Error, Debug)]
pub enum UnpackError {
    /// The `Any` carries a different message type
    #[error("unexpected type url: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Type URL the caller asked for
        expected: &'static str,
        /// Type URL found in the payload
        actual: String,
    },

    /// Payload bytes are not a valid encoding of the message
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}
