//! Command definitions
//!
//! Command codes, package flags, key-value control flags and column spaces.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};

/// Command codes
///
/// Z variants reuse the plain code and set [`flag::ZOP`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cmd {
    Ping = 0x00,
    Get = 0x01,
    MGet = 0x02,
    Scan = 0x03,
    Dump = 0x04,
    Set = 0x60,
    MSet = 0x61,
    Del = 0x62,
    MDel = 0x63,
    Incr = 0x64,
    MIncr = 0x65,
    Auth = 0xD0,
}

impl Cmd {
    pub fn from_u8(code: u8) -> Result<Self> {
        let cmd = match code {
            0x00 => Cmd::Ping,
            0x01 => Cmd::Get,
            0x02 => Cmd::MGet,
            0x03 => Cmd::Scan,
            0x04 => Cmd::Dump,
            0x60 => Cmd::Set,
            0x61 => Cmd::MSet,
            0x62 => Cmd::Del,
            0x63 => Cmd::MDel,
            0x64 => Cmd::Incr,
            0x65 => Cmd::MIncr,
            0xD0 => Cmd::Auth,
            _ => {
                return Err(TableError::Protocol(format!(
                    "Unknown command type: 0x{:02x}",
                    code
                )))
            }
        };
        Ok(cmd)
    }

    /// Commands that mutate data (rejected by replicas)
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Cmd::Set | Cmd::MSet | Cmd::Del | Cmd::MDel | Cmd::Incr | Cmd::MIncr
        )
    }
}

/// Package flags (cPkgFlag)
pub mod flag {
    /// "Z" op, targets the score index
    pub const ZOP: u8 = 0x1;
    /// Scan in ascending order, else descending
    pub const ASCENDING: u8 = 0x2;
    /// Scan from the MIN/MAX boundary of the row
    pub const START: u8 = 0x4;
    /// Scan/dump finished
    pub const END: u8 = 0x8;
    /// Dump only one table, else the whole database
    pub const ONE_TABLE: u8 = 0x10;
    /// Dump from the start of a unit, else after the pivot record
    pub const UNIT_START: u8 = 0x20;
}

/// Key-value control flags (cCtrlFlag)
pub mod ctrl {
    pub const ERR_CODE: u8 = 0x1;
    pub const CAS: u8 = 0x2;
    pub const COL_SPACE: u8 = 0x4;
    pub const VALUE: u8 = 0x8;
    pub const SCORE: u8 = 0x10;
}

/// Column space of a stored cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColSpace {
    /// Plain column index
    #[default]
    Default = 0,
    /// rowKey+score+colKey => value (ordered by score)
    Score1 = 1,
    /// rowKey+colKey => value+score
    Score2 = 2,
}

impl ColSpace {
    pub fn from_u8(space: u8) -> Result<Self> {
        match space {
            0 => Ok(ColSpace::Default),
            1 => Ok(ColSpace::Score1),
            2 => Ok(ColSpace::Score2),
            _ => Err(TableError::Protocol(format!(
                "Unknown column space: {}",
                space
            ))),
        }
    }
}
