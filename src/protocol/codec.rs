//! Protocol codec
//!
//! Size limits, the bounds-checked packet reader, argument validation and
//! the stream helpers that frame packets on a byte stream.

use std::io::{Read, Write};

use bytes::{Buf, BytesMut};

use super::packet::Packet;
use super::ErrorCode;
use crate::error::{Result, TableError};

/// Head size: 4 bytes length + 8 bytes sequence + 1 byte cmd + 1 byte db id
pub const HEAD_SIZE: usize = 14;

/// Packets must be strictly shorter than 2 MB
pub const MAX_PKG_LEN: usize = 2 * 1024 * 1024;

/// Row keys are 1 ~ 255 bytes
pub const MAX_ROW_KEY_LEN: usize = 255;

/// Column keys are 0 ~ 255 bytes
pub const MAX_COL_KEY_LEN: usize = 255;

/// Values are 0 ~ 1 MB
pub const MAX_VALUE_LEN: usize = 1024 * 1024;

/// Largest page a scan may ask for; the page size travels as a `u16`
pub const MAX_SCAN_NUM: usize = u16::MAX as usize;

/// Reserved table id
pub const INVALID_TABLE_ID: u8 = 255;

/// Database id used to authenticate as administrator
pub const ADMIN_DB_ID: u8 = 255;

// =============================================================================
// Bounds-checked reader
// =============================================================================

/// Cursor over a received packet
///
/// Every read checks the remaining length first, so a short or lying packet
/// becomes a protocol error instead of a panic.
pub struct PkgReader<'a> {
    buf: &'a [u8],
}

impl<'a> PkgReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(TableError::Protocol(format!(
                "Truncated packet reading {}: need {} bytes, have {}",
                what,
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn u8(&mut self, what: &str) -> Result<u8> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub fn i8(&mut self, what: &str) -> Result<i8> {
        self.need(1, what)?;
        Ok(self.buf.get_i8())
    }

    pub fn u16(&mut self, what: &str) -> Result<u16> {
        self.need(2, what)?;
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self, what: &str) -> Result<u32> {
        self.need(4, what)?;
        Ok(self.buf.get_u32())
    }

    pub fn u64(&mut self, what: &str) -> Result<u64> {
        self.need(8, what)?;
        Ok(self.buf.get_u64())
    }

    pub fn i64(&mut self, what: &str) -> Result<i64> {
        self.need(8, what)?;
        Ok(self.buf.get_i64())
    }

    pub fn bytes(&mut self, n: usize, what: &str) -> Result<Vec<u8>> {
        self.need(n, what)?;
        let out = self.buf[..n].to_vec();
        self.buf.advance(n);
        Ok(out)
    }

    /// Require that the whole packet was consumed
    pub fn finish(self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(TableError::Protocol(format!(
                "{} trailing bytes after packet body",
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Argument validation
// =============================================================================

/// Validate a cell address before anything is encoded
pub fn validate_key(table_id: u8, row_key: &[u8], col_key: &[u8]) -> Result<()> {
    if table_id == INVALID_TABLE_ID {
        return Err(TableError::invalid(
            ErrorCode::InvalidDbId,
            format!("table id {} is reserved", INVALID_TABLE_ID),
        ));
    }
    if row_key.is_empty() || row_key.len() > MAX_ROW_KEY_LEN {
        return Err(TableError::invalid(
            ErrorCode::InvalidRowKey,
            format!(
                "row key length {} not in [1, {}]",
                row_key.len(),
                MAX_ROW_KEY_LEN
            ),
        ));
    }
    if col_key.len() > MAX_COL_KEY_LEN {
        return Err(TableError::invalid(
            ErrorCode::InvalidRowKey,
            format!(
                "column key length {} not in [0, {}]",
                col_key.len(),
                MAX_COL_KEY_LEN
            ),
        ));
    }
    Ok(())
}

pub fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_LEN {
        return Err(TableError::invalid(
            ErrorCode::InvalidValue,
            format!(
                "value length {} not in [0, {}]",
                value.len(),
                MAX_VALUE_LEN
            ),
        ));
    }
    Ok(())
}

/// Database ids usable for data operations (everything but the admin id)
pub fn validate_db_id(db_id: u8) -> Result<()> {
    if db_id == ADMIN_DB_ID {
        return Err(TableError::invalid(
            ErrorCode::InvalidDbId,
            format!("database id {} is reserved for admin auth", ADMIN_DB_ID),
        ));
    }
    Ok(())
}

pub fn validate_scan_num(num: usize) -> Result<()> {
    if num == 0 || num > MAX_SCAN_NUM {
        return Err(TableError::invalid(
            ErrorCode::InvalidScanNum,
            format!("scan number {} not in [1, {}]", num, MAX_SCAN_NUM),
        ));
    }
    Ok(())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Encode a packet into a fresh buffer
pub fn encode_packet<P: Packet>(packet: &P) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(packet.length());
    packet.encode(&mut buf)?;
    Ok(buf.to_vec())
}

/// Read one complete packet into `buf`
///
/// Blocks until the whole packet has arrived. `buf` is cleared first and
/// holds exactly the packet bytes (head included) on success.
pub fn read_packet<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<()> {
    let mut head = [0u8; HEAD_SIZE];
    reader.read_exact(&mut head)?;

    let pkg_len = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
    if pkg_len < HEAD_SIZE || pkg_len >= MAX_PKG_LEN {
        return Err(TableError::Protocol(format!(
            "Invalid packet length: {} bytes (must be in [{}, {}))",
            pkg_len, HEAD_SIZE, MAX_PKG_LEN
        )));
    }

    buf.clear();
    buf.resize(pkg_len, 0);
    buf[..HEAD_SIZE].copy_from_slice(&head);
    if pkg_len > HEAD_SIZE {
        reader.read_exact(&mut buf[HEAD_SIZE..])?;
    }
    Ok(())
}

/// Encode `packet` into `buf` and write it to the stream
///
/// Nothing is written when encoding fails.
pub fn write_packet<W: Write, P: Packet>(
    writer: &mut W,
    packet: &P,
    buf: &mut BytesMut,
) -> Result<()> {
    buf.clear();
    packet.encode(buf)?;
    writer.write_all(&buf[..])?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_bounds() {
        let bytes = [0x01, 0x02, 0x03];
        let mut reader = PkgReader::new(&bytes);
        assert_eq!(reader.u16("a").unwrap(), 0x0102);
        assert!(matches!(reader.u16("b"), Err(TableError::Protocol(_))));
        assert_eq!(reader.u8("c").unwrap(), 0x03);
        reader.finish().unwrap();
    }

    #[test]
    fn test_reader_trailing_bytes() {
        let bytes = [0x01, 0x02];
        let mut reader = PkgReader::new(&bytes);
        reader.u8("a").unwrap();
        assert!(reader.finish().is_err());
    }

    #[test]
    fn test_validate_key_bounds() {
        assert!(validate_key(0, b"r", b"").is_ok());
        assert!(validate_key(254, &[1; 255], &[2; 255]).is_ok());

        let err = validate_key(255, b"r", b"c").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidDbId));

        let err = validate_key(1, b"", b"c").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidRowKey));

        let err = validate_key(1, &[1; 256], b"c").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidRowKey));

        let err = validate_key(1, b"r", &[1; 256]).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidRowKey));
    }

    #[test]
    fn test_validate_value_and_scan_num() {
        assert!(validate_value(&vec![0; MAX_VALUE_LEN]).is_ok());
        let err = validate_value(&vec![0; MAX_VALUE_LEN + 1]).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidValue));

        assert!(validate_scan_num(1).is_ok());
        assert!(validate_scan_num(MAX_SCAN_NUM).is_ok());
        assert!(validate_scan_num(0).is_err());
        assert!(validate_scan_num(MAX_SCAN_NUM + 1).is_err());
    }
}
