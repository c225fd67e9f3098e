//! Protocol Module
//!
//! Defines the binary wire protocol spoken with the table server.
//!
//! ## Packet Format
//! ```text
//! ┌────────────┬────────────┬─────────┬──────────┬─────────────────────────┐
//! │ PkgLen (4) │  Seq (8)   │ Cmd (1) │ DbId (1) │          Body           │
//! └────────────┴────────────┴─────────┴──────────┴─────────────────────────┘
//! ```
//! All integers are big-endian. `PkgLen` counts the whole packet, head
//! included, and must stay below 2 MB.
//!
//! ### Bodies
//! - one-op (get/set/del/incr/ping/auth): `cPkgFlag + KeyValue`
//! - multi-op (mget/mset/mdel/mincr, scan reply): `cPkgFlag + cErrCode + wNum + KeyValue[wNum]`
//! - scan request: one-op body + `wNum`
//! - dump request: one-op body + `wStartUnitId + wEndUnitId`
//! - dump reply: multi-op body + `wStartUnitId + wEndUnitId + wLastUnitId`
//!
//! ### Error Codes
//! - 0: OK, 1: NOT_EXIST
//! - -50/-51: CAS mismatch / temporary failure (retryable)
//! - -60 ~ -73: permanent failures, see [`ErrorCode`]

mod codec;
mod command;
mod key_value;
mod packet;
mod status;
mod unit;

pub use codec::{
    encode_packet, read_packet, validate_db_id, validate_key, validate_scan_num, validate_value,
    write_packet, PkgReader, ADMIN_DB_ID, HEAD_SIZE, INVALID_TABLE_ID, MAX_COL_KEY_LEN,
    MAX_PKG_LEN, MAX_ROW_KEY_LEN, MAX_SCAN_NUM, MAX_VALUE_LEN,
};
pub use command::{ctrl, flag, Cmd, ColSpace};
pub use key_value::KeyValue;
pub use packet::{
    decode_head, Packet, PkgDumpReq, PkgDumpResp, PkgHead, PkgMultiOp, PkgOneOp, PkgScanReq,
    PkgScanResp,
};
pub use status::ErrorCode;
pub use unit::{unit_id, MAX_UNIT_ID, TOTAL_UNIT_NUM};
