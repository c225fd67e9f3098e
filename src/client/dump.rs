//! Dump cursor protocol
//!
//! Bulk iteration over a whole database or one table, walking the server's
//! storage units in id order. Each reply says which unit the server got to
//! (`last_unit_id`) and whether it stopped on a unit boundary, which tells
//! the next request where to pick up.
//!
//! ```text
//!   NotStarted ──dump──▶ InProgress(start..=end, last) ──dump_more──▶ ... ──▶ Ended
//! ```
//!
//! Pages that come back empty but not ended (the server only walked empty
//! units) are skipped transparently.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::Client;
use crate::error::{Result, TableError};
use crate::protocol::{
    flag, unit_id, validate_key, Cmd, ColSpace, ErrorCode, KeyValue, PkgDumpReq, PkgDumpResp,
    PkgOneOp, INVALID_TABLE_ID, MAX_UNIT_ID,
};
use crate::types::DumpKV;

/// What a dump chain covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DumpScope {
    Database,
    Table(u8),
}

/// Position inside a unit to resume after
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpPivot {
    pub table_id: u8,
    pub col_space: ColSpace,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub score: i64,
}

impl From<&DumpKV> for DumpPivot {
    fn from(kv: &DumpKV) -> Self {
        Self {
            table_id: kv.table_id,
            col_space: kv.col_space,
            row_key: kv.row_key.clone(),
            col_key: kv.col_key.clone(),
            score: kv.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum DumpState {
    /// Next request starts at the beginning of this unit
    UnitStart(u16),
    /// Next request resumes after `pivot` inside `unit_id`
    After { unit_id: u16, pivot: DumpPivot },
    Ended,
}

/// Opaque continuation token of a dump chain
///
/// Scope and unit range never change along a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpCursor {
    db_id: u8,
    scope: DumpScope,
    start_unit_id: u16,
    end_unit_id: u16,
    /// Furthest unit reached so far
    last_unit_id: u16,
    state: DumpState,
}

impl DumpCursor {
    pub fn is_ended(&self) -> bool {
        self.state == DumpState::Ended
    }

    pub fn db_id(&self) -> u8 {
        self.db_id
    }

    pub fn scope(&self) -> DumpScope {
        self.scope
    }

    /// Unit range of the chain, both ends included
    pub fn unit_range(&self) -> (u16, u16) {
        (self.start_unit_id, self.end_unit_id)
    }

    pub fn last_unit_id(&self) -> u16 {
        self.last_unit_id
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// One page of a dump
#[derive(Debug, Clone)]
pub struct DumpReply {
    pub kvs: Vec<DumpKV>,
    /// The unit range is exhausted
    pub end: bool,
    pub cursor: DumpCursor,
}

impl<S: Read + Write> Client<S> {
    /// Dump every table of the selected database
    pub fn dump_db(&mut self) -> Result<DumpReply> {
        self.dump(DumpScope::Database, None, 0, MAX_UNIT_ID)
    }

    /// Dump one table of the selected database
    pub fn dump_table(&mut self, table_id: u8) -> Result<DumpReply> {
        self.dump(DumpScope::Table(table_id), None, 0, MAX_UNIT_ID)
    }

    /// Dump units `start_unit_id..=end_unit_id`
    ///
    /// With a `pivot` the dump resumes right after that record inside
    /// `start_unit_id`; without one it starts at the beginning of the unit.
    pub fn dump(
        &mut self,
        scope: DumpScope,
        pivot: Option<&DumpPivot>,
        start_unit_id: u16,
        end_unit_id: u16,
    ) -> Result<DumpReply> {
        let db_id = self.session.db_id();
        self.session.check_access(db_id)?;
        if let DumpScope::Table(table_id) = scope {
            if table_id == INVALID_TABLE_ID {
                return Err(TableError::invalid(
                    ErrorCode::InvalidDbId,
                    format!("table id {} is reserved", INVALID_TABLE_ID),
                ));
            }
        }
        if start_unit_id > end_unit_id {
            return Err(TableError::invalid(
                ErrorCode::InvalidScanNum,
                format!("unit range {}..={} is empty", start_unit_id, end_unit_id),
            ));
        }
        if let Some(pivot) = pivot {
            validate_key(pivot.table_id, &pivot.row_key, &pivot.col_key)?;
        }

        tracing::debug!(
            "Dump {:?} of database {}, units {}..={}",
            scope,
            db_id,
            start_unit_id,
            end_unit_id
        );
        let state = match pivot {
            Some(pivot) => DumpState::After {
                unit_id: start_unit_id,
                pivot: pivot.clone(),
            },
            None => DumpState::UnitStart(start_unit_id),
        };
        let cursor = DumpCursor {
            db_id,
            scope,
            start_unit_id,
            end_unit_id,
            last_unit_id: start_unit_id,
            state,
        };
        self.dump_until_data(cursor)
    }

    /// Fetch the page after `cursor`; fails locally once the chain has ended
    pub fn dump_more(&mut self, cursor: &DumpCursor) -> Result<DumpReply> {
        if cursor.is_ended() {
            return Err(TableError::ScanEnded);
        }
        self.dump_until_data(cursor.clone())
    }

    fn dump_until_data(&mut self, mut cursor: DumpCursor) -> Result<DumpReply> {
        loop {
            let reply = self.dump_page(&cursor)?;
            if reply.end || !reply.kvs.is_empty() {
                return Ok(reply);
            }
            tracing::debug!("Dump skipped empty units up to {}", reply.cursor.last_unit_id);
            cursor = reply.cursor;
        }
    }

    /// One request/reply of a dump chain
    fn dump_page(&mut self, cursor: &DumpCursor) -> Result<DumpReply> {
        self.session.check_access(cursor.db_id)?;

        let mut pkg_flag = 0;
        let scope_table = match cursor.scope {
            DumpScope::Table(table_id) => {
                pkg_flag |= flag::ONE_TABLE;
                table_id
            }
            DumpScope::Database => 0,
        };
        let (from_unit_id, kv) = match &cursor.state {
            DumpState::Ended => return Err(TableError::ScanEnded),
            DumpState::UnitStart(unit_id) => {
                pkg_flag |= flag::UNIT_START;
                let kv = KeyValue {
                    table_id: scope_table,
                    ..Default::default()
                };
                (*unit_id, kv)
            }
            DumpState::After { unit_id, pivot } => {
                let kv = KeyValue {
                    table_id: pivot.table_id,
                    col_space: pivot.col_space,
                    row_key: pivot.row_key.clone(),
                    col_key: pivot.col_key.clone(),
                    score: pivot.score,
                    ..Default::default()
                };
                (*unit_id, kv)
            }
        };

        let head = self.next_head(Cmd::Dump, cursor.db_id);
        let request = PkgDumpReq {
            op: PkgOneOp::new(head, pkg_flag, kv),
            start_unit_id: from_unit_id,
            end_unit_id: cursor.end_unit_id,
        };
        let reply: PkgDumpResp = self.round_trip(&request)?;

        let code = reply.multi.error_code();
        if code.is_err() {
            return Err(TableError::Server(code));
        }
        self.check_dump_reply(cursor, from_unit_id, &reply)?;

        let last_unit_id = reply.last_unit_id;
        let unit_start = reply.multi.pkg_flag & flag::UNIT_START != 0;
        let mut end = reply.multi.pkg_flag & flag::END != 0;
        let kvs: Vec<DumpKV> = reply.multi.kvs.into_iter().map(DumpKV::from).collect();

        let state = if end {
            DumpState::Ended
        } else if unit_start {
            // The server finished `last_unit_id`; move on to the next unit
            match last_unit_id.checked_add(1) {
                Some(next) if last_unit_id < cursor.end_unit_id => DumpState::UnitStart(next),
                _ => {
                    end = true;
                    DumpState::Ended
                }
            }
        } else {
            let pivot = match (kvs.last(), &cursor.state) {
                (Some(last), _) => DumpPivot::from(last),
                (None, DumpState::After { unit_id, pivot }) if *unit_id == last_unit_id => {
                    pivot.clone()
                }
                (None, DumpState::After { unit_id, .. }) => {
                    return Err(self.violation(format!(
                        "dump reply stopped inside unit {} without a record, pivot is in unit {}",
                        last_unit_id, unit_id
                    )))
                }
                (None, _) => {
                    return Err(self.violation(format!(
                        "dump reply stopped inside unit {} without a record to resume from",
                        last_unit_id
                    )))
                }
            };
            DumpState::After {
                unit_id: last_unit_id,
                pivot,
            }
        };
        tracing::debug!(
            "Dump page: {} records, last unit {}, end={}",
            kvs.len(),
            last_unit_id,
            end
        );

        Ok(DumpReply {
            kvs,
            end,
            cursor: DumpCursor {
                last_unit_id,
                state,
                ..cursor.clone()
            },
        })
    }

    /// Unit bookkeeping must stay inside the range this request asked for
    fn check_dump_reply(
        &mut self,
        cursor: &DumpCursor,
        from_unit_id: u16,
        reply: &PkgDumpResp,
    ) -> Result<()> {
        if reply.end_unit_id != cursor.end_unit_id {
            return Err(self.violation(format!(
                "dump reply end unit {} differs from requested {}",
                reply.end_unit_id, cursor.end_unit_id
            )));
        }
        let last = reply.last_unit_id;
        if last < from_unit_id || last > cursor.end_unit_id {
            return Err(self.violation(format!(
                "dump reply last unit {} outside {}..={}",
                last, from_unit_id, cursor.end_unit_id
            )));
        }
        for kv in &reply.multi.kvs {
            let unit = unit_id(&kv.row_key);
            if unit < from_unit_id || unit > last {
                return Err(self.violation(format!(
                    "dump record in unit {} outside {}..={}",
                    unit, from_unit_id, last
                )));
            }
            if let DumpScope::Table(table_id) = cursor.scope {
                if kv.table_id != table_id {
                    return Err(self.violation(format!(
                        "dump of table {} returned a record of table {}",
                        table_id, kv.table_id
                    )));
                }
            }
        }
        Ok(())
    }
}
