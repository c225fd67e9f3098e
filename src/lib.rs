//! # GoTable client
//!
//! Client library for the GoTable key-value table store:
//! - `(tableId, rowKey, colKey) -> (value, score)` cells, plain and score ordered ("Z")
//! - CAS (compare-and-swap) conditional writes
//! - Batched multi-key operations with per-item results
//! - Resumable scan (one row) and dump (whole table / database) cursors
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Caller                                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Client (dispatcher)                          │
//! │        get/set/del/incr, m*, scan, dump, auth, ping          │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!   ┌─────────────────┐           ┌──────────────────┐
//!   │     Session     │           │    Sequencer     │
//!   │ (db, privilege) │           │ (seq correlation)│
//!   └─────────────────┘           └────────┬─────────┘
//!                                          │
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │     Protocol     │
//!                                 │  (wire codec)    │
//!                                 └────────┬─────────┘
//!                                          │
//!                                          ▼
//!                                   Read + Write stream
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use gotable::{Client, Config};
//!
//! # fn main() -> gotable::Result<()> {
//! let config = Config::builder().addr("127.0.0.1:6688").db_id(1).build();
//! let mut client = Client::connect(&config)?;
//! client.auth(b"secret")?;
//! client.set(1, b"user:1", b"name", b"alice", 0, 0)?;
//! let cell = client.get(1, b"user:1", b"name", 0)?;
//! assert_eq!(cell.map(|c| c.value), Some(b"alice".to_vec()));
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod types;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TableError};
pub use config::{Config, ConfigBuilder};
pub use client::{
    Client, DumpCursor, DumpPivot, DumpReply, DumpScope, ScanCursor, ScanOptions, ScanReply,
};
pub use protocol::ErrorCode;
pub use types::{
    CellValue, ColumnIndex, DelArgs, DelReply, DumpKV, GetArgs, GetReply, IncrArgs, IncrReply,
    ScanKV, SetArgs, SetReply,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
