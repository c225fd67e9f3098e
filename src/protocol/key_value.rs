//! Key-value record codec
//!
//! ```text
//! ┌──────────┬─────────┬──────────┬───────────┬────────┬───────┬────────┬───────┬──────────────┬─────────┬───────┐
//! │ Ctrl (1) │ Tbl (1) │ [Err (1)]│ [Space(1)]│ RLen(1)│ Row   │ CLen(2)│ Col   │[VLen(4)+Val] │[Score 8]│[Cas 4]│
//! └──────────┴─────────┴──────────┴───────────┴────────┴───────┴────────┴───────┴──────────────┴─────────┴───────┘
//! ```
//!
//! Bracketed fields are present only when their control bit is set. On
//! encode the bit is set exactly when the field is non-zero / non-empty.

use bytes::{BufMut, BytesMut};

use super::codec::PkgReader;
use super::command::{ctrl, ColSpace};
use super::ErrorCode;
use crate::error::{Result, TableError};

/// A single addressed cell as it travels on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValue {
    pub err_code: i8,
    pub col_space: ColSpace,
    pub table_id: u8,
    pub row_key: Vec<u8>,
    pub col_key: Vec<u8>,
    pub value: Vec<u8>,
    pub score: i64,
    pub cas: u32,
}

impl KeyValue {
    /// Key-only record
    pub fn key(table_id: u8, row_key: &[u8], col_key: &[u8]) -> Self {
        Self {
            table_id,
            row_key: row_key.to_vec(),
            col_key: col_key.to_vec(),
            ..Default::default()
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_i8(self.err_code)
    }

    fn ctrl_flag(&self) -> u8 {
        let mut flag = 0;
        if self.err_code != 0 {
            flag |= ctrl::ERR_CODE;
        }
        if self.cas != 0 {
            flag |= ctrl::CAS;
        }
        if self.col_space != ColSpace::Default {
            flag |= ctrl::COL_SPACE;
        }
        if !self.value.is_empty() {
            flag |= ctrl::VALUE;
        }
        if self.score != 0 {
            flag |= ctrl::SCORE;
        }
        flag
    }

    /// Encoded length in bytes
    pub fn length(&self) -> usize {
        let flag = self.ctrl_flag();
        let mut n = 2 + 1 + self.row_key.len() + 2 + self.col_key.len();
        if flag & ctrl::ERR_CODE != 0 {
            n += 1;
        }
        if flag & ctrl::COL_SPACE != 0 {
            n += 1;
        }
        if flag & ctrl::VALUE != 0 {
            n += 4 + self.value.len();
        }
        if flag & ctrl::SCORE != 0 {
            n += 8;
        }
        if flag & ctrl::CAS != 0 {
            n += 4;
        }
        n
    }

    /// Append the record to `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        if self.row_key.len() > u8::MAX as usize {
            return Err(TableError::invalid(
                ErrorCode::InvalidRowKey,
                format!("row key is {} bytes", self.row_key.len()),
            ));
        }
        if self.col_key.len() > u16::MAX as usize {
            return Err(TableError::invalid(
                ErrorCode::InvalidRowKey,
                format!("column key is {} bytes", self.col_key.len()),
            ));
        }
        if self.value.len() > u32::MAX as usize {
            return Err(TableError::invalid(
                ErrorCode::InvalidValue,
                format!("value is {} bytes", self.value.len()),
            ));
        }

        let flag = self.ctrl_flag();
        buf.reserve(self.length());
        buf.put_u8(flag);
        buf.put_u8(self.table_id);
        if flag & ctrl::ERR_CODE != 0 {
            buf.put_i8(self.err_code);
        }
        if flag & ctrl::COL_SPACE != 0 {
            buf.put_u8(self.col_space as u8);
        }
        buf.put_u8(self.row_key.len() as u8);
        buf.put_slice(&self.row_key);
        buf.put_u16(self.col_key.len() as u16);
        buf.put_slice(&self.col_key);
        if flag & ctrl::VALUE != 0 {
            buf.put_u32(self.value.len() as u32);
            buf.put_slice(&self.value);
        }
        if flag & ctrl::SCORE != 0 {
            buf.put_i64(self.score);
        }
        if flag & ctrl::CAS != 0 {
            buf.put_u32(self.cas);
        }
        Ok(())
    }

    pub(crate) fn decode(reader: &mut PkgReader<'_>) -> Result<Self> {
        let flag = reader.u8("ctrl flag")?;
        let table_id = reader.u8("table id")?;
        let err_code = if flag & ctrl::ERR_CODE != 0 {
            reader.i8("error code")?
        } else {
            0
        };
        let col_space = if flag & ctrl::COL_SPACE != 0 {
            ColSpace::from_u8(reader.u8("column space")?)?
        } else {
            ColSpace::Default
        };
        let row_len = reader.u8("row key length")? as usize;
        let row_key = reader.bytes(row_len, "row key")?;
        let col_len = reader.u16("column key length")? as usize;
        let col_key = reader.bytes(col_len, "column key")?;
        let value = if flag & ctrl::VALUE != 0 {
            let len = reader.u32("value length")? as usize;
            reader.bytes(len, "value")?
        } else {
            Vec::new()
        };
        let score = if flag & ctrl::SCORE != 0 {
            reader.i64("score")?
        } else {
            0
        };
        let cas = if flag & ctrl::CAS != 0 {
            reader.u32("cas")?
        } else {
            0
        };

        Ok(Self {
            err_code,
            col_space,
            table_id,
            row_key,
            col_key,
            value,
            score,
            cas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Result<KeyValue> {
        let mut reader = PkgReader::new(bytes);
        let kv = KeyValue::decode(&mut reader)?;
        reader.finish()?;
        Ok(kv)
    }

    #[test]
    fn test_minimal_record_has_no_optional_fields() {
        let kv = KeyValue::key(3, b"row", b"");
        let mut buf = BytesMut::new();
        kv.encode(&mut buf).unwrap();

        assert_eq!(buf.len(), kv.length());
        assert_eq!(&buf[..], &[0, 3, 3, b'r', b'o', b'w', 0, 0]);
    }

    #[test]
    fn test_optional_fields_follow_ctrl_flag() {
        let kv = KeyValue {
            err_code: -50,
            col_space: ColSpace::Score1,
            table_id: 1,
            row_key: b"r".to_vec(),
            col_key: b"c".to_vec(),
            value: b"v".to_vec(),
            score: -7,
            cas: 9,
        };
        let mut buf = BytesMut::new();
        kv.encode(&mut buf).unwrap();

        assert_eq!(buf[0], ctrl::ERR_CODE | ctrl::CAS | ctrl::COL_SPACE | ctrl::VALUE | ctrl::SCORE);
        assert_eq!(buf.len(), kv.length());
        assert_eq!(decode_all(&buf).unwrap(), kv);
        assert_eq!(kv.error_code(), ErrorCode::CasMismatch);
    }

    #[test]
    fn test_truncated_record_rejected() {
        let kv = KeyValue {
            value: vec![7; 16],
            ..KeyValue::key(1, b"row", b"col")
        };
        let mut buf = BytesMut::new();
        kv.encode(&mut buf).unwrap();

        let err = decode_all(&buf[..buf.len() - 1]).unwrap_err();
        assert!(matches!(err, TableError::Protocol(_)));
    }

    #[test]
    fn test_unknown_col_space_rejected() {
        let bytes = [ctrl::COL_SPACE, 1, 9, 1, b'r', 0, 0];
        assert!(matches!(decode_all(&bytes), Err(TableError::Protocol(_))));
    }

    #[test]
    fn test_row_key_over_wire_limit() {
        let kv = KeyValue::key(1, &[b'x'; 256], b"");
        let mut buf = BytesMut::new();
        let err = kv.encode(&mut buf).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidRowKey));
    }
}
