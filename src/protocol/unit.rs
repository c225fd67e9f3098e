//! Unit partitioning
//!
//! The server spreads rows over a fixed number of units by hashing the
//! row key. Dump chains walk units in id order.

/// Number of units the keyspace is split into
pub const TOTAL_UNIT_NUM: u16 = 4096;

/// Highest unit id a dump range may name
pub const MAX_UNIT_ID: u16 = u16::MAX;

/// Unit a row key belongs to
pub fn unit_id(row_key: &[u8]) -> u16 {
    (crc32fast::hash(row_key) % TOTAL_UNIT_NUM as u32) as u16
}
