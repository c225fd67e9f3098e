//! Sequence correlator
//!
//! Stamps each request with a strictly increasing sequence number and checks
//! that the reply read next carries the same one. The client has at most one
//! request in flight, so any other number means the stream is out of step.

use crate::error::{Result, TableError};
use crate::protocol::PkgHead;

#[derive(Debug, Default)]
pub struct Sequencer {
    last: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number; the first one handed out is 1
    pub fn next_seq(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Last sequence number handed out (0 before the first request)
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Check that `reply` answers `request`
    pub fn verify(&self, request: &PkgHead, reply: &PkgHead) -> Result<()> {
        if reply.seq != request.seq {
            return Err(TableError::SequenceMismatch {
                expected: request.seq,
                actual: reply.seq,
            });
        }
        if reply.cmd != request.cmd {
            return Err(TableError::CommandMismatch {
                expected: request.cmd as u8,
                actual: reply.cmd as u8,
            });
        }
        Ok(())
    }
}
