//! Error types for the GoTable client
//!
//! Three families of failure are kept apart:
//! - local validation errors, detected before any byte is written
//! - server-reported errors, carried verbatim in a reply's error code
//! - protocol errors, after which the connection is unusable

use thiserror::Error;

use crate::protocol::ErrorCode;

/// Result type alias using TableError
pub type Result<T> = std::result::Result<T, TableError>;

/// Unified error type for GoTable client operations
#[derive(Debug, Error)]
pub enum TableError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Local Validation Errors (nothing was sent)
    // -------------------------------------------------------------------------
    #[error("Invalid argument ({code}): {reason}")]
    InvalidArgument { code: ErrorCode, reason: String },

    #[error("No access privilege for database {db_id}")]
    NoPrivilege { db_id: u8 },

    #[error("Already scan/dump to end")]
    ScanEnded,

    // -------------------------------------------------------------------------
    // Server Errors
    // -------------------------------------------------------------------------
    #[error("Server replied {0}")]
    Server(ErrorCode),

    // -------------------------------------------------------------------------
    // Protocol Errors (connection must be re-established)
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Sequence mismatch: sent {expected}, received {actual}")]
    SequenceMismatch { expected: u64, actual: u64 },

    #[error("Command mismatch: sent 0x{expected:02x}, received 0x{actual:02x}")]
    CommandMismatch { expected: u8, actual: u8 },

    #[error("Connection is shut down")]
    Shutdown,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TableError {
    pub(crate) fn invalid(code: ErrorCode, reason: impl Into<String>) -> Self {
        TableError::InvalidArgument {
            code,
            reason: reason.into(),
        }
    }

    /// The wire error code this failure corresponds to, if any.
    ///
    /// Transport and protocol failures have no code: they never reached a
    /// point where the server could judge the request.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TableError::InvalidArgument { code, .. } => Some(*code),
            TableError::NoPrivilege { .. } => Some(ErrorCode::NoPrivilege),
            TableError::ScanEnded => Some(ErrorCode::ScanEnded),
            TableError::Server(code) => Some(*code),
            _ => None,
        }
    }

    /// Is this a retryable error?
    ///
    /// CAS mismatch needs a fresh CAS from a new read before the retry.
    /// The client never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TableError::Server(ErrorCode::CasMismatch) | TableError::Server(ErrorCode::TempFail)
        )
    }

    /// Whether the connection that produced this error must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TableError::Io(_)
                | TableError::Protocol(_)
                | TableError::SequenceMismatch { .. }
                | TableError::CommandMismatch { .. }
                | TableError::Shutdown
        )
    }
}

impl From<bincode::Error> for TableError {
    fn from(e: bincode::Error) -> Self {
        TableError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_codes() {
        assert!(TableError::Server(ErrorCode::CasMismatch).is_retryable());
        assert!(TableError::Server(ErrorCode::TempFail).is_retryable());
        assert!(!TableError::Server(ErrorCode::WriteToReplica).is_retryable());
        assert!(!TableError::ScanEnded.is_retryable());
    }

    #[test]
    fn test_fatal_errors_have_no_code() {
        let err = TableError::SequenceMismatch {
            expected: 3,
            actual: 4,
        };
        assert!(err.is_fatal());
        assert_eq!(err.code(), None);

        let err = TableError::NoPrivilege { db_id: 2 };
        assert!(!err.is_fatal());
        assert_eq!(err.code(), Some(ErrorCode::NoPrivilege));
        assert_eq!(err.code().map(|c| c.as_i8()), Some(-62));
    }
}
