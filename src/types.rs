//! Caller-owned argument and reply types
//!
//! Batch arguments travel as slices of these structs; batch replies come
//! back in the same order, one per argument, each with its own error code.

use serde::{Deserialize, Serialize};

use crate::protocol::{flag, ColSpace, ErrorCode, KeyValue};

/// Which column index of a row an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnIndex {
    /// Plain column index, ordered by column key
    Plain,
    /// Score index ("Z" operations)
    Score,
}

impl ColumnIndex {
    pub(crate) fn pkg_flag(self) -> u8 {
        match self {
            ColumnIndex::Plain => 0,
            ColumnIndex::Score => flag::ZOP,
        }
    }
}

/// Value, score and CAS of a stored cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellValue {
    pub value: Vec<u8>,
    pub score: i64,
    pub cas: u32,
}

impl From<KeyValue> for CellValue {
    fn from(kv: KeyValue) -> Self {
        Self {
            value: kv.value,
            score: kv.score,
            cas: kv.cas,
        }
    }
}

// =============================================================================
// Batch arguments
// =============================================================================

/// Arguments of one GET (also used by DEL)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetArgs {
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    /// Non-zero asks the server to return a CAS (GET) or to check it (DEL)
    pub cas: u32,
}

impl GetArgs {
    pub fn new(
        table_id: u8,
        row_key: impl Into<Vec<u8>>,
        col_key: impl Into<Vec<u8>>,
        cas: u32,
    ) -> Self {
        Self {
            table_id,
            row_key: row_key.into(),
            col_key: col_key.into(),
            cas,
        }
    }
}

pub type DelArgs = GetArgs;

/// Arguments of one SET
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetArgs {
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
    /// Zero writes unconditionally
    pub cas: u32,
}

impl SetArgs {
    pub fn new(
        table_id: u8,
        row_key: impl Into<Vec<u8>>,
        col_key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        score: i64,
        cas: u32,
    ) -> Self {
        Self {
            table_id,
            row_key: row_key.into(),
            col_key: col_key.into(),
            value: value.into(),
            score,
            cas,
        }
    }
}

/// Arguments of one INCR
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrArgs {
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    /// Amount added to the stored score, may be negative
    pub score: i64,
    pub cas: u32,
}

impl IncrArgs {
    pub fn new(
        table_id: u8,
        row_key: impl Into<Vec<u8>>,
        col_key: impl Into<Vec<u8>>,
        score: i64,
        cas: u32,
    ) -> Self {
        Self {
            table_id,
            row_key: row_key.into(),
            col_key: col_key.into(),
            score,
            cas,
        }
    }
}

// =============================================================================
// Batch replies
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReply {
    pub err_code: ErrorCode,
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
    pub cas: u32,
}

impl From<KeyValue> for GetReply {
    fn from(kv: KeyValue) -> Self {
        Self {
            err_code: kv.error_code(),
            table_id: kv.table_id,
            row_key: kv.row_key,
            col_key: kv.col_key,
            value: kv.value,
            score: kv.score,
            cas: kv.cas,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReply {
    pub err_code: ErrorCode,
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
}

impl From<KeyValue> for SetReply {
    fn from(kv: KeyValue) -> Self {
        Self {
            err_code: kv.error_code(),
            table_id: kv.table_id,
            row_key: kv.row_key,
            col_key: kv.col_key,
        }
    }
}

pub type DelReply = SetReply;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrReply {
    pub err_code: ErrorCode,
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
}

impl From<KeyValue> for IncrReply {
    fn from(kv: KeyValue) -> Self {
        Self {
            err_code: kv.error_code(),
            table_id: kv.table_id,
            row_key: kv.row_key,
            col_key: kv.col_key,
            value: kv.value,
            score: kv.score,
        }
    }
}

// =============================================================================
// Scan / Dump records
// =============================================================================

/// One column returned by a scan page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanKV {
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
}

impl From<KeyValue> for ScanKV {
    fn from(kv: KeyValue) -> Self {
        Self {
            col_key: kv.col_key,
            value: kv.value,
            score: kv.score,
        }
    }
}

/// One stored cell returned by a dump page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpKV {
    pub table_id: u8,
    /// Plain index or one of the score index spaces
    pub col_space: ColSpace,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
}

impl From<KeyValue> for DumpKV {
    fn from(kv: KeyValue) -> Self {
        Self {
            table_id: kv.table_id,
            col_space: kv.col_space,
            row_key: kv.row_key,
            col_key: kv.col_key,
            value: kv.value,
            score: kv.score,
        }
    }
}
