//! Reply error codes
//!
//! Signed 8-bit codes carried in reply payloads. Zero is success, positive
//! codes are soft conditions, negative codes are failures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error code registry shared with the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Key does not exist (soft)
    NotExist,
    #[default]
    Ok,
    /// CAS not match, get a new CAS and try again
    CasMismatch,
    /// Temporary failure, retry may fix it
    TempFail,
    UnknownCmd,
    AuthFailed,
    NoPrivilege,
    /// Replicas are read only
    WriteToReplica,
    /// GET/MGET on a replica must carry a non-zero CAS
    InvalidReplicaCas,
    ReadFail,
    WriteFail,
    DecodeFail,
    InvalidDbId,
    InvalidRowKey,
    InvalidValue,
    InvalidPkgLen,
    InvalidScanNum,
    ScanEnded,
    /// Code outside the registry, kept verbatim
    Unrecognized(i8),
}

impl ErrorCode {
    pub fn from_i8(code: i8) -> Self {
        match code {
            1 => ErrorCode::NotExist,
            0 => ErrorCode::Ok,
            -50 => ErrorCode::CasMismatch,
            -51 => ErrorCode::TempFail,
            -60 => ErrorCode::UnknownCmd,
            -61 => ErrorCode::AuthFailed,
            -62 => ErrorCode::NoPrivilege,
            -63 => ErrorCode::WriteToReplica,
            -64 => ErrorCode::InvalidReplicaCas,
            -65 => ErrorCode::ReadFail,
            -66 => ErrorCode::WriteFail,
            -67 => ErrorCode::DecodeFail,
            -68 => ErrorCode::InvalidDbId,
            -69 => ErrorCode::InvalidRowKey,
            -70 => ErrorCode::InvalidValue,
            -71 => ErrorCode::InvalidPkgLen,
            -72 => ErrorCode::InvalidScanNum,
            -73 => ErrorCode::ScanEnded,
            other => ErrorCode::Unrecognized(other),
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            ErrorCode::NotExist => 1,
            ErrorCode::Ok => 0,
            ErrorCode::CasMismatch => -50,
            ErrorCode::TempFail => -51,
            ErrorCode::UnknownCmd => -60,
            ErrorCode::AuthFailed => -61,
            ErrorCode::NoPrivilege => -62,
            ErrorCode::WriteToReplica => -63,
            ErrorCode::InvalidReplicaCas => -64,
            ErrorCode::ReadFail => -65,
            ErrorCode::WriteFail => -66,
            ErrorCode::DecodeFail => -67,
            ErrorCode::InvalidDbId => -68,
            ErrorCode::InvalidRowKey => -69,
            ErrorCode::InvalidValue => -70,
            ErrorCode::InvalidPkgLen => -71,
            ErrorCode::InvalidScanNum => -72,
            ErrorCode::ScanEnded => -73,
            ErrorCode::Unrecognized(code) => code,
        }
    }

    /// True for success and soft conditions (code >= 0)
    pub fn is_ok(self) -> bool {
        self.as_i8() >= 0
    }

    /// True for failures (code < 0)
    pub fn is_err(self) -> bool {
        self.as_i8() < 0
    }

    /// CAS mismatch and temporary failure may succeed when retried
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::CasMismatch | ErrorCode::TempFail)
    }
}

impl From<i8> for ErrorCode {
    fn from(code: i8) -> Self {
        ErrorCode::from_i8(code)
    }
}

impl From<ErrorCode> for i8 {
    fn from(code: ErrorCode) -> Self {
        code.as_i8()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::NotExist => "key not exist",
            ErrorCode::Ok => "ok",
            ErrorCode::CasMismatch => "cas not match",
            ErrorCode::TempFail => "temporary failure",
            ErrorCode::UnknownCmd => "unknown cmd",
            ErrorCode::AuthFailed => "authorize failed",
            ErrorCode::NoPrivilege => "no access privilege",
            ErrorCode::WriteToReplica => "can not write slaver directly",
            ErrorCode::InvalidReplicaCas => "invalid cas on slaver",
            ErrorCode::ReadFail => "read failed",
            ErrorCode::WriteFail => "write failed",
            ErrorCode::DecodeFail => "decode request pkg failed",
            ErrorCode::InvalidDbId => "invalid db id",
            ErrorCode::InvalidRowKey => "invalid row key length",
            ErrorCode::InvalidValue => "invalid value length",
            ErrorCode::InvalidPkgLen => "invalid pkg length",
            ErrorCode::InvalidScanNum => "scan number out of range",
            ErrorCode::ScanEnded => "already scan/dump to end",
            ErrorCode::Unrecognized(_) => "unrecognized error code",
        };
        write!(f, "{} ({})", text, self.as_i8())
    }
}
