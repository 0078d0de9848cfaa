//! Error types for the transfer engine
//!
//! Planning-phase errors (`InvalidPath`, `Query`, `PathConflict`) abort the
//! whole operation before any transfer starts. Per-unit errors (`Transport`,
//! `Integrity`, `Io`) are captured into that unit's outcome and never abort
//! sibling units.

use serde::Serialize;

use crate::checksum::ChecksumAlgorithm;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input path specification
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Search backend failure after exhausting the retry budget
    #[error("query failed: {0}")]
    Query(String),

    /// Result set too large for a single query and the backend offers no
    /// pagination; the planner partitions on child folders when it sees this
    #[error("query result limit exceeded: {0}")]
    QueryLimit(String),

    /// Two source objects resolve to the same destination path
    #[error("destination conflict: {0}")]
    PathConflict(String),

    /// Network-level failure, classified retriable (timeout, reset, 5xx)
    /// or terminal (4xx) by the transport
    #[error("transport error: {message}")]
    Transport { message: String, retriable: bool },

    /// Checksum mismatch detected after the byte copy completed
    #[error("integrity check failed for {path}: {algorithm} expected {expected}, got {actual}")]
    Integrity {
        path: String,
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },

    /// Local file system failure (permissions, disk space, missing path)
    #[error("local i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Source object or endpoint does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials rejected by the server
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Configuration file or value problem
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// A retriable transport failure (connection reset, timeout, 5xx)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retriable: true,
        }
    }

    /// A terminal transport failure (4xx-class, will not heal on retry)
    pub fn transport_terminal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retriable: false,
        }
    }

    /// Whether a failed operation may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retriable, .. } => *retriable,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Stable category tag, carried into serialized transfer outcomes
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::Query(_) | Self::QueryLimit(_) => ErrorKind::Query,
            Self::PathConflict(_) => ErrorKind::PathConflict,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Io(_) => ErrorKind::LocalIo,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Serializable error category for itemized reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPath,
    Query,
    PathConflict,
    Transport,
    Integrity,
    LocalIo,
    NotFound,
    Auth,
    Config,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_retriable_classification() {
        assert!(Error::transport("connection reset by peer").is_retryable());
        assert!(!Error::transport_terminal("403 Forbidden").is_retryable());
    }

    #[test]
    fn test_io_retriable_kinds() {
        let timed_out = Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "t"));
        assert!(timed_out.is_retryable());

        let denied = Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "d",
        ));
        assert!(!denied.is_retryable());
    }

    #[test]
    fn test_planning_errors_not_retryable() {
        assert!(!Error::InvalidPath("".into()).is_retryable());
        assert!(!Error::Query("bad".into()).is_retryable());
        assert!(!Error::PathConflict("dup".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_integrity_never_retryable() {
        let err = Error::Integrity {
            path: "repo/a.bin".into(),
            algorithm: ChecksumAlgorithm::Sha256,
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PathConflict).unwrap();
        assert_eq!(json, "\"path_conflict\"");
    }
}
