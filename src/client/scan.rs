//! Scan cursor protocol
//!
//! Pages through the columns of one row, ordered by column key or, for Z
//! scans, by score. The server keeps no per-client state: every page request
//! carries the last position seen, and the reply carries the next cursor.
//!
//! ```text
//!   scan_start ──▶ page ──▶ scan_more(cursor) ──▶ page ──▶ ... ──▶ end
//! ```

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::Client;
use crate::error::{Result, TableError};
use crate::protocol::{
    flag, validate_key, validate_scan_num, Cmd, ColSpace, KeyValue, PkgOneOp, PkgScanReq,
    PkgScanResp,
};
use crate::types::{ColumnIndex, ScanKV};

/// Settings fixed for the lifetime of a scan chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub ascending: bool,
    /// Z scans only: order by (score, colKey) instead of colKey
    pub order_by_score: bool,
    /// Page size, in [1, 65535]
    pub num: usize,
}

impl ScanOptions {
    pub fn asc(num: usize) -> Self {
        Self {
            ascending: true,
            order_by_score: false,
            num,
        }
    }

    pub fn desc(num: usize) -> Self {
        Self {
            ascending: false,
            ..Self::asc(num)
        }
    }

    pub fn by_score(mut self) -> Self {
        self.order_by_score = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum ScanState {
    /// Next page starts after this column
    After { col_key: Vec<u8>, score: i64 },
    Ended,
}

/// Opaque continuation token of a scan chain
///
/// Carries its database id, so it can be resumed on another client (that
/// client's own privilege check still applies). Persist it with
/// [`ScanCursor::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    db_id: u8,
    table_id: u8,
    row_key: Vec<u8>,
    index: ColumnIndex,
    options: ScanOptions,
    state: ScanState,
}

impl ScanCursor {
    pub fn is_ended(&self) -> bool {
        self.state == ScanState::Ended
    }

    pub fn db_id(&self) -> u8 {
        self.db_id
    }

    pub fn table_id(&self) -> u8 {
        self.table_id
    }

    pub fn row_key(&self) -> &[u8] {
        &self.row_key
    }

    pub fn index(&self) -> ColumnIndex {
        self.index
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    /// Last column seen, `None` once the chain has ended
    pub fn position(&self) -> Option<(&[u8], i64)> {
        match &self.state {
            ScanState::After { col_key, score } => Some((col_key, *score)),
            ScanState::Ended => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// One page of a scan
#[derive(Debug, Clone)]
pub struct ScanReply {
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub kvs: Vec<ScanKV>,
    /// No further pages exist
    pub end: bool,
    pub cursor: ScanCursor,
}

/// Where a page request starts
#[derive(Clone, Copy)]
enum ScanFrom<'a> {
    Boundary,
    After { col_key: &'a [u8], score: i64 },
}

impl<S: Read + Write> Client<S> {
    /// Scan a row's columns from its first (or last, descending) column
    pub fn scan_start(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        options: ScanOptions,
    ) -> Result<ScanReply> {
        let db_id = self.session.db_id();
        self.do_scan(ColumnIndex::Plain, db_id, table_id, row_key, ScanFrom::Boundary, options)
    }

    /// Scan a row's columns starting after `col_key`
    pub fn scan(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        options: ScanOptions,
    ) -> Result<ScanReply> {
        let db_id = self.session.db_id();
        let from = ScanFrom::After { col_key, score: 0 };
        self.do_scan(ColumnIndex::Plain, db_id, table_id, row_key, from, options)
    }

    pub fn zscan_start(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        options: ScanOptions,
    ) -> Result<ScanReply> {
        let db_id = self.session.db_id();
        self.do_scan(ColumnIndex::Score, db_id, table_id, row_key, ScanFrom::Boundary, options)
    }

    /// Z scan starting after `(score, col_key)`
    pub fn zscan(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        score: i64,
        options: ScanOptions,
    ) -> Result<ScanReply> {
        let db_id = self.session.db_id();
        let from = ScanFrom::After { col_key, score };
        self.do_scan(ColumnIndex::Score, db_id, table_id, row_key, from, options)
    }

    /// Fetch the page after `cursor`; fails locally once the chain has ended
    pub fn scan_more(&mut self, cursor: &ScanCursor) -> Result<ScanReply> {
        match &cursor.state {
            ScanState::Ended => Err(TableError::ScanEnded),
            ScanState::After { col_key, score } => {
                let from = ScanFrom::After {
                    col_key,
                    score: *score,
                };
                self.do_scan(
                    cursor.index,
                    cursor.db_id,
                    cursor.table_id,
                    &cursor.row_key,
                    from,
                    cursor.options,
                )
            }
        }
    }

    fn do_scan(
        &mut self,
        index: ColumnIndex,
        db_id: u8,
        table_id: u8,
        row_key: &[u8],
        from: ScanFrom<'_>,
        options: ScanOptions,
    ) -> Result<ScanReply> {
        self.session.check_access(db_id)?;
        let (col_key, score) = match from {
            ScanFrom::Boundary => (&[][..], 0),
            ScanFrom::After { col_key, score } => (col_key, score),
        };
        validate_key(table_id, row_key, col_key)?;
        validate_scan_num(options.num)?;

        let options = ScanOptions {
            order_by_score: index == ColumnIndex::Score && options.order_by_score,
            ..options
        };

        let mut pkg_flag = index.pkg_flag();
        if options.ascending {
            pkg_flag |= flag::ASCENDING;
        }
        if matches!(from, ScanFrom::Boundary) {
            pkg_flag |= flag::START;
        }

        let mut kv = KeyValue::key(table_id, row_key, col_key);
        if index == ColumnIndex::Score {
            kv.col_space = if options.order_by_score {
                ColSpace::Score1
            } else {
                ColSpace::Score2
            };
            kv.score = score;
        }

        let head = self.next_head(Cmd::Scan, db_id);
        let request = PkgScanReq {
            op: PkgOneOp::new(head, pkg_flag, kv),
            num: options.num as u16,
        };
        let reply: PkgScanResp = self.round_trip(&request)?;

        let code = reply.error_code();
        if code.is_err() {
            return Err(TableError::Server(code));
        }
        if reply.kvs.len() > options.num {
            return Err(self.violation(format!(
                "scan page has {} records, asked for at most {}",
                reply.kvs.len(),
                options.num
            )));
        }

        let end = reply.pkg_flag & flag::END != 0;
        let kvs: Vec<ScanKV> = reply.kvs.into_iter().map(ScanKV::from).collect();
        let state = match kvs.last() {
            Some(last) if !end => ScanState::After {
                col_key: last.col_key.clone(),
                score: last.score,
            },
            _ => ScanState::Ended,
        };
        tracing::debug!(
            "Scan page of table {}: {} records, end={}",
            table_id,
            kvs.len(),
            end
        );

        Ok(ScanReply {
            table_id,
            row_key: row_key.to_vec(),
            end: state == ScanState::Ended,
            kvs,
            cursor: ScanCursor {
                db_id,
                table_id,
                row_key: row_key.to_vec(),
                index,
                options,
                state,
            },
        })
    }
}
