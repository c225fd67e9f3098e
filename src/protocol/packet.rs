//! Packet definitions
//!
//! Every packet is `HEAD + BODY`, the head being
//! `dwPkgLen + ddwSeq + cCmd + cDbId` (14 bytes, big-endian, length
//! counts the head itself).

use bytes::{BufMut, BytesMut};

use super::codec::{PkgReader, HEAD_SIZE, MAX_PKG_LEN};
use super::command::Cmd;
use super::{ErrorCode, KeyValue};
use crate::error::{Result, TableError};

/// Packet head shared by all commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PkgHead {
    pub seq: u64,
    pub cmd: Cmd,
    pub db_id: u8,
}

impl PkgHead {
    pub fn new(seq: u64, cmd: Cmd, db_id: u8) -> Self {
        Self { seq, cmd, db_id }
    }

    fn encode(&self, buf: &mut BytesMut, pkg_len: u32) {
        buf.put_u32(pkg_len);
        buf.put_u64(self.seq);
        buf.put_u8(self.cmd as u8);
        buf.put_u8(self.db_id);
    }

    fn decode(reader: &mut PkgReader<'_>, available: usize) -> Result<Self> {
        let pkg_len = reader.u32("packet length")? as usize;
        if pkg_len != available {
            return Err(TableError::Protocol(format!(
                "Packet length mismatch: declared {}, got {}",
                pkg_len, available
            )));
        }
        let seq = reader.u64("sequence")?;
        let cmd = Cmd::from_u8(reader.u8("command")?)?;
        let db_id = reader.u8("database id")?;
        Ok(Self { seq, cmd, db_id })
    }
}

/// Decode only the head of a complete packet
pub fn decode_head(pkg: &[u8]) -> Result<PkgHead> {
    let mut reader = PkgReader::new(pkg);
    PkgHead::decode(&mut reader, pkg.len())
}

/// A framed request or reply
pub trait Packet: Sized {
    fn head(&self) -> &PkgHead;

    fn body_length(&self) -> usize;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()>;

    fn decode_body(head: PkgHead, reader: &mut PkgReader<'_>) -> Result<Self>;

    /// Total encoded length, head included
    fn length(&self) -> usize {
        HEAD_SIZE + self.body_length()
    }

    /// Append the whole packet to `buf`
    ///
    /// Fails without writing anything when the packet would reach the 2MB limit.
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let len = self.length();
        if len >= MAX_PKG_LEN {
            return Err(TableError::invalid(
                ErrorCode::InvalidPkgLen,
                format!("packet is {} bytes (limit {})", len, MAX_PKG_LEN),
            ));
        }
        buf.reserve(len);
        self.head().encode(buf, len as u32);
        self.encode_body(buf)
    }

    /// Decode one complete packet; trailing bytes are an error
    fn decode(pkg: &[u8]) -> Result<Self> {
        let mut reader = PkgReader::new(pkg);
        let head = PkgHead::decode(&mut reader, pkg.len())?;
        let packet = Self::decode_body(head, &mut reader)?;
        reader.finish()?;
        Ok(packet)
    }
}

// =============================================================================
// One-op: Get, Set, Del, Incr, Ping, Auth
// PKG = HEAD + cPkgFlag + KeyValue
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgOneOp {
    pub head: PkgHead,
    pub pkg_flag: u8,
    pub kv: KeyValue,
}

impl PkgOneOp {
    pub fn new(head: PkgHead, pkg_flag: u8, kv: KeyValue) -> Self {
        Self { head, pkg_flag, kv }
    }
}

impl Packet for PkgOneOp {
    fn head(&self) -> &PkgHead {
        &self.head
    }

    fn body_length(&self) -> usize {
        1 + self.kv.length()
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.pkg_flag);
        self.kv.encode(buf)
    }

    fn decode_body(head: PkgHead, reader: &mut PkgReader<'_>) -> Result<Self> {
        let pkg_flag = reader.u8("package flag")?;
        let kv = KeyValue::decode(reader)?;
        Ok(Self { head, pkg_flag, kv })
    }
}

// =============================================================================
// Multi-op: MGet, MSet, MDel, MIncr, and scan replies
// PKG = HEAD + cPkgFlag + cErrCode + wNum + KeyValue[wNum]
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgMultiOp {
    pub head: PkgHead,
    pub pkg_flag: u8,
    pub err_code: i8,
    pub kvs: Vec<KeyValue>,
}

/// Scan replies share the multi-op layout
pub type PkgScanResp = PkgMultiOp;

impl PkgMultiOp {
    pub fn new(head: PkgHead, pkg_flag: u8, kvs: Vec<KeyValue>) -> Self {
        Self {
            head,
            pkg_flag,
            err_code: 0,
            kvs,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_i8(self.err_code)
    }
}

impl Packet for PkgMultiOp {
    fn head(&self) -> &PkgHead {
        &self.head
    }

    fn body_length(&self) -> usize {
        4 + self.kvs.iter().map(KeyValue::length).sum::<usize>()
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        if self.kvs.len() > u16::MAX as usize {
            return Err(TableError::invalid(
                ErrorCode::InvalidPkgLen,
                format!("{} records in one packet", self.kvs.len()),
            ));
        }
        buf.put_u8(self.pkg_flag);
        buf.put_i8(self.err_code);
        buf.put_u16(self.kvs.len() as u16);
        for kv in &self.kvs {
            kv.encode(buf)?;
        }
        Ok(())
    }

    fn decode_body(head: PkgHead, reader: &mut PkgReader<'_>) -> Result<Self> {
        let pkg_flag = reader.u8("package flag")?;
        let err_code = reader.i8("error code")?;
        let num = reader.u16("record count")? as usize;
        // Each record takes at least 5 bytes; don't trust `num` for allocation
        let mut kvs = Vec::with_capacity(num.min(reader.remaining() / 5));
        for _ in 0..num {
            kvs.push(KeyValue::decode(reader)?);
        }
        Ok(Self {
            head,
            pkg_flag,
            err_code,
            kvs,
        })
    }
}

// =============================================================================
// Scan request
// PKG = PkgOneOp + wNum
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgScanReq {
    pub op: PkgOneOp,
    pub num: u16,
}

impl Packet for PkgScanReq {
    fn head(&self) -> &PkgHead {
        &self.op.head
    }

    fn body_length(&self) -> usize {
        self.op.body_length() + 2
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        self.op.encode_body(buf)?;
        buf.put_u16(self.num);
        Ok(())
    }

    fn decode_body(head: PkgHead, reader: &mut PkgReader<'_>) -> Result<Self> {
        let op = PkgOneOp::decode_body(head, reader)?;
        let num = reader.u16("scan number")?;
        Ok(Self { op, num })
    }
}

// =============================================================================
// Dump request
// PKG = PkgOneOp + wStartUnitId + wEndUnitId
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgDumpReq {
    pub op: PkgOneOp,
    /// First unit to dump (included)
    pub start_unit_id: u16,
    /// Last unit to dump (included)
    pub end_unit_id: u16,
}

impl Packet for PkgDumpReq {
    fn head(&self) -> &PkgHead {
        &self.op.head
    }

    fn body_length(&self) -> usize {
        self.op.body_length() + 4
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        self.op.encode_body(buf)?;
        buf.put_u16(self.start_unit_id);
        buf.put_u16(self.end_unit_id);
        Ok(())
    }

    fn decode_body(head: PkgHead, reader: &mut PkgReader<'_>) -> Result<Self> {
        let op = PkgOneOp::decode_body(head, reader)?;
        let start_unit_id = reader.u16("start unit id")?;
        let end_unit_id = reader.u16("end unit id")?;
        Ok(Self {
            op,
            start_unit_id,
            end_unit_id,
        })
    }
}

// =============================================================================
// Dump reply
// PKG = PkgMultiOp + wStartUnitId + wEndUnitId + wLastUnitId
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgDumpResp {
    pub multi: PkgMultiOp,
    pub start_unit_id: u16,
    pub end_unit_id: u16,
    /// Last unit the server tried to dump
    pub last_unit_id: u16,
}

impl Packet for PkgDumpResp {
    fn head(&self) -> &PkgHead {
        &self.multi.head
    }

    fn body_length(&self) -> usize {
        self.multi.body_length() + 6
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        self.multi.encode_body(buf)?;
        buf.put_u16(self.start_unit_id);
        buf.put_u16(self.end_unit_id);
        buf.put_u16(self.last_unit_id);
        Ok(())
    }

    fn decode_body(head: PkgHead, reader: &mut PkgReader<'_>) -> Result<Self> {
        let multi = PkgMultiOp::decode_body(head, reader)?;
        let start_unit_id = reader.u16("start unit id")?;
        let end_unit_id = reader.u16("end unit id")?;
        let last_unit_id = reader.u16("last unit id")?;
        Ok(Self {
            multi,
            start_unit_id,
            end_unit_id,
            last_unit_id,
        })
    }
}
