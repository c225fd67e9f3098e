//! Operation dispatcher
//!
//! Single-key and batched get/set/del/incr. Each plain/Z pair is two thin
//! wrappers over one core taking a [`ColumnIndex`].

use std::io::{Read, Write};

use super::Client;
use crate::error::{Result, TableError};
use crate::protocol::{
    validate_key, validate_value, Cmd, ErrorCode, KeyValue, PkgMultiOp, PkgOneOp,
};
use crate::types::{
    CellValue, ColumnIndex, DelArgs, DelReply, GetArgs, GetReply, IncrArgs, IncrReply, SetArgs,
    SetReply,
};

/// Argument tuple that can travel inside a batch
pub trait BatchItem {
    /// Validate the arguments and build the wire record
    fn to_key_value(&self) -> Result<KeyValue>;

    /// Key-only record, echoed back when the item is rejected locally
    fn address(&self) -> KeyValue;
}

impl BatchItem for GetArgs {
    fn to_key_value(&self) -> Result<KeyValue> {
        validate_key(self.table_id, &self.row_key, &self.col_key)?;
        Ok(KeyValue {
            cas: self.cas,
            ..self.address()
        })
    }

    fn address(&self) -> KeyValue {
        KeyValue::key(self.table_id, &self.row_key, &self.col_key)
    }
}

impl BatchItem for SetArgs {
    fn to_key_value(&self) -> Result<KeyValue> {
        validate_key(self.table_id, &self.row_key, &self.col_key)?;
        validate_value(&self.value)?;
        Ok(KeyValue {
            value: self.value.clone(),
            score: self.score,
            cas: self.cas,
            ..self.address()
        })
    }

    fn address(&self) -> KeyValue {
        KeyValue::key(self.table_id, &self.row_key, &self.col_key)
    }
}

impl BatchItem for IncrArgs {
    fn to_key_value(&self) -> Result<KeyValue> {
        validate_key(self.table_id, &self.row_key, &self.col_key)?;
        Ok(KeyValue {
            score: self.score,
            cas: self.cas,
            ..self.address()
        })
    }

    fn address(&self) -> KeyValue {
        KeyValue::key(self.table_id, &self.row_key, &self.col_key)
    }
}

impl<S: Read + Write> Client<S> {
    // =========================================================================
    // Single-key operations
    // =========================================================================

    /// Read a cell; `Ok(None)` when it does not exist
    ///
    /// A non-zero `cas` asks the server to return a CAS token usable by a
    /// later conditional write (replicas require it to be non-zero).
    pub fn get(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        cas: u32,
    ) -> Result<Option<CellValue>> {
        self.get_at(ColumnIndex::Plain, table_id, row_key, col_key, cas)
    }

    pub fn zget(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        cas: u32,
    ) -> Result<Option<CellValue>> {
        self.get_at(ColumnIndex::Score, table_id, row_key, col_key, cas)
    }

    /// Write a cell; a non-zero `cas` makes the write conditional
    pub fn set(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        value: &[u8],
        score: i64,
        cas: u32,
    ) -> Result<()> {
        self.set_at(ColumnIndex::Plain, table_id, row_key, col_key, value, score, cas)
    }

    pub fn zset(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        value: &[u8],
        score: i64,
        cas: u32,
    ) -> Result<()> {
        self.set_at(ColumnIndex::Score, table_id, row_key, col_key, value, score, cas)
    }

    pub fn del(&mut self, table_id: u8, row_key: &[u8], col_key: &[u8], cas: u32) -> Result<()> {
        self.del_at(ColumnIndex::Plain, table_id, row_key, col_key, cas)
    }

    pub fn zdel(&mut self, table_id: u8, row_key: &[u8], col_key: &[u8], cas: u32) -> Result<()> {
        self.del_at(ColumnIndex::Score, table_id, row_key, col_key, cas)
    }

    /// Add `score` to the stored score server-side; returns the new cell
    pub fn incr(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        score: i64,
        cas: u32,
    ) -> Result<CellValue> {
        self.incr_at(ColumnIndex::Plain, table_id, row_key, col_key, score, cas)
    }

    pub fn zincr(
        &mut self,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        score: i64,
        cas: u32,
    ) -> Result<CellValue> {
        self.incr_at(ColumnIndex::Score, table_id, row_key, col_key, score, cas)
    }

    fn get_at(
        &mut self,
        index: ColumnIndex,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        cas: u32,
    ) -> Result<Option<CellValue>> {
        let kv = GetArgs::new(table_id, row_key, col_key, cas).to_key_value()?;
        let reply = self.do_one_op(index, Cmd::Get, kv)?;
        if reply.error_code() == ErrorCode::NotExist {
            return Ok(None);
        }
        Ok(Some(CellValue::from(reply)))
    }

    #[allow(clippy::too_many_arguments)]
    fn set_at(
        &mut self,
        index: ColumnIndex,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        value: &[u8],
        score: i64,
        cas: u32,
    ) -> Result<()> {
        let kv = SetArgs::new(table_id, row_key, col_key, value, score, cas).to_key_value()?;
        self.do_one_op(index, Cmd::Set, kv)?;
        Ok(())
    }

    fn del_at(
        &mut self,
        index: ColumnIndex,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        cas: u32,
    ) -> Result<()> {
        let kv = DelArgs::new(table_id, row_key, col_key, cas).to_key_value()?;
        self.do_one_op(index, Cmd::Del, kv)?;
        Ok(())
    }

    fn incr_at(
        &mut self,
        index: ColumnIndex,
        table_id: u8,
        row_key: &[u8],
        col_key: &[u8],
        score: i64,
        cas: u32,
    ) -> Result<CellValue> {
        let kv = IncrArgs::new(table_id, row_key, col_key, score, cas).to_key_value()?;
        let reply = self.do_one_op(index, Cmd::Incr, kv)?;
        Ok(CellValue::from(reply))
    }

    /// Send one already validated record; negative codes become errors
    fn do_one_op(&mut self, index: ColumnIndex, cmd: Cmd, kv: KeyValue) -> Result<KeyValue> {
        let db_id = self.session.db_id();
        self.session.check_access(db_id)?;

        let head = self.next_head(cmd, db_id);
        let reply: PkgOneOp = self.round_trip(&PkgOneOp::new(head, index.pkg_flag(), kv))?;

        let code = reply.kv.error_code();
        if code.is_err() {
            return Err(TableError::Server(code));
        }
        Ok(reply.kv)
    }

    // =========================================================================
    // Batched operations
    // =========================================================================

    pub fn mget(&mut self, args: &[GetArgs]) -> Result<Vec<GetReply>> {
        self.do_multi_op(ColumnIndex::Plain, Cmd::MGet, args)
    }

    pub fn zmget(&mut self, args: &[GetArgs]) -> Result<Vec<GetReply>> {
        self.do_multi_op(ColumnIndex::Score, Cmd::MGet, args)
    }

    pub fn mset(&mut self, args: &[SetArgs]) -> Result<Vec<SetReply>> {
        self.do_multi_op(ColumnIndex::Plain, Cmd::MSet, args)
    }

    pub fn zmset(&mut self, args: &[SetArgs]) -> Result<Vec<SetReply>> {
        self.do_multi_op(ColumnIndex::Score, Cmd::MSet, args)
    }

    pub fn mdel(&mut self, args: &[DelArgs]) -> Result<Vec<DelReply>> {
        self.do_multi_op(ColumnIndex::Plain, Cmd::MDel, args)
    }

    pub fn zmdel(&mut self, args: &[DelArgs]) -> Result<Vec<DelReply>> {
        self.do_multi_op(ColumnIndex::Score, Cmd::MDel, args)
    }

    pub fn mincr(&mut self, args: &[IncrArgs]) -> Result<Vec<IncrReply>> {
        self.do_multi_op(ColumnIndex::Plain, Cmd::MIncr, args)
    }

    pub fn zmincr(&mut self, args: &[IncrArgs]) -> Result<Vec<IncrReply>> {
        self.do_multi_op(ColumnIndex::Score, Cmd::MIncr, args)
    }

    /// One request, one reply, one result per argument in argument order
    ///
    /// Items failing local validation are left out of the request and get
    /// their local error code in their slot. Only a whole-packet failure
    /// (privilege, packet size, transport, server packet error) fails the call.
    fn do_multi_op<A, R>(&mut self, index: ColumnIndex, cmd: Cmd, args: &[A]) -> Result<Vec<R>>
    where
        A: BatchItem,
        R: From<KeyValue>,
    {
        let db_id = self.session.db_id();
        self.session.check_access(db_id)?;

        let mut rejected = Vec::with_capacity(args.len());
        let mut kvs = Vec::with_capacity(args.len());
        for arg in args {
            match arg.to_key_value() {
                Ok(kv) => {
                    kvs.push(kv);
                    rejected.push(None);
                }
                Err(e) => rejected.push(Some(e.code().unwrap_or(ErrorCode::DecodeFail))),
            }
        }

        let sent = kvs.len();
        let mut replies = if sent == 0 {
            Vec::new().into_iter()
        } else {
            let head = self.next_head(cmd, db_id);
            let reply: PkgMultiOp = self.round_trip(&PkgMultiOp::new(head, index.pkg_flag(), kvs))?;

            let code = reply.error_code();
            if code.is_err() {
                return Err(TableError::Server(code));
            }
            if reply.kvs.len() != sent {
                return Err(self.violation(format!(
                    "{:?} sent {} records, reply has {}",
                    cmd,
                    sent,
                    reply.kvs.len()
                )));
            }
            reply.kvs.into_iter()
        };

        let mut out = Vec::with_capacity(args.len());
        for (arg, rejected) in args.iter().zip(rejected) {
            let kv = match rejected {
                Some(code) => KeyValue {
                    err_code: code.as_i8(),
                    ..arg.address()
                },
                None => replies
                    .next()
                    .ok_or_else(|| TableError::Protocol(format!("{:?} reply ran short", cmd)))?,
            };
            out.push(R::from(kv));
        }
        Ok(out)
    }
}
