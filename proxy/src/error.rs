//! Error types for SILTA

use std::time::Duration;
use thiserror::Error;

// Re-export the fetcher error from silta-core
pub use silta_core::FetchError;

/// Result type alias for SILTA operations
pub type Result<T> = std::result::Result<T, SiltaError>;

/// Which half of a proxied session an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the data plane
    Downstream,
    /// Toward the control plane
    Upstream,
}

impl Direction {
    /// Label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Downstream => "downstream",
            Direction::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for SILTA
#[derive(Error, Debug)]
#[allow(clippy::result_large_err)]
pub enum SiltaError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// gRPC transport error (dialing, serving)
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// gRPC status error
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    /// Control plane stream failed
    #[error("upstream stream error: {0}")]
    Upstream(tonic::Status),

    /// Data plane stream failed
    #[error("downstream stream error: {0}")]
    Downstream(tonic::Status),

    /// Peer went away while we were sending to it
    #[error("{0} peer closed")]
    PeerClosed(Direction),

    /// Send queue stayed full past the deadline
    #[error("{direction} send queue full for {waited:?}")]
    Backpressure { direction: Direction, waited: Duration },

    /// First request of a session carried no node identity
    #[error("first request on stream must carry a node")]
    MissingNode,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Shutdown requested
    #[error("shutdown requested")]
    Shutdown,
}

impl SiltaError {
    /// Short reason label used for session termination metrics
    pub fn reason(&self) -> &'static str {
        match self {
            SiltaError::Config(_) => "config",
            SiltaError::Transport(_) => "transport",
            SiltaError::Grpc(_) => "grpc",
            SiltaError::Upstream(_) => "upstream_error",
            SiltaError::Downstream(_) => "downstream_error",
            SiltaError::PeerClosed(Direction::Upstream) => "upstream_closed",
            SiltaError::PeerClosed(Direction::Downstream) => "downstream_closed",
            SiltaError::Backpressure { .. } => "backpressure",
            SiltaError::MissingNode => "missing_node",
            SiltaError::Io(_) => "io",
            SiltaError::Metrics(_) => "metrics",
            SiltaError::Shutdown => "shutdown",
        }
    }
}

impl SiltaError {
    /// gRPC status reported to the data plane when a session ends with this error
    ///
    /// Returns `None` when the downstream peer is the one that went away.
    pub fn downstream_status(&self) -> Option<tonic::Status> {
        match self {
            SiltaError::Downstream(_) | SiltaError::PeerClosed(Direction::Downstream) => None,
            other => Some(other.to_status()),
        }
    }

    /// Map to a gRPC status without consuming the error
    pub fn to_status(&self) -> tonic::Status {
        match self {
            SiltaError::Config(msg) => tonic::Status::invalid_argument(msg.clone()),
            SiltaError::Transport(e) => tonic::Status::unavailable(e.to_string()),
            SiltaError::Grpc(status) | SiltaError::Downstream(status) => status.clone(),
            SiltaError::Upstream(status) => {
                tonic::Status::unavailable(format!("upstream terminated: {}", status.message()))
            }
            SiltaError::PeerClosed(direction) => {
                tonic::Status::unavailable(format!("{direction} peer closed"))
            }
            SiltaError::Backpressure { direction, waited } => tonic::Status::resource_exhausted(
                format!("{direction} send queue full for {waited:?}"),
            ),
            SiltaError::MissingNode => {
                tonic::Status::invalid_argument("first request on stream must carry a node")
            }
            SiltaError::Io(e) => tonic::Status::internal(e.to_string()),
            SiltaError::Metrics(msg) => tonic::Status::internal(format!("metrics: {msg}")),
            SiltaError::Shutdown => tonic::Status::unavailable("shutting down"),
        }
    }
}

impl From<SiltaError> for tonic::Status {
    fn from(err: SiltaError) -> Self {
        match err {
            SiltaError::Grpc(status) | SiltaError::Downstream(status) => status,
            other => other.to_status(),
        }
    }
}
