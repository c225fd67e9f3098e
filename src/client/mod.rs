//! Client Module
//!
//! One client owns one connection and has at most one request in flight:
//! it writes a request, then blocks reading the matching reply.
//!
//! ## Request Flow
//! ```text
//!   caller ─▶ Session check ─▶ encode (scratch buffer) ─▶ write
//!                                                          │
//!   result ◀─ error code ◀─ sequence check ◀─ decode ◀─ read
//! ```
//!
//! Timeouts are whatever the underlying stream enforces. A client must not
//! be shared between callers without external serialization.

mod dump;
mod ops;
mod scan;
mod sequence;
mod session;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bytes::BytesMut;

use crate::config::Config;
use crate::error::{Result, TableError};
use crate::protocol::{
    read_packet, write_packet, Cmd, ErrorCode, KeyValue, Packet, PkgHead, PkgOneOp,
    MAX_ROW_KEY_LEN,
};

pub use dump::{DumpCursor, DumpPivot, DumpReply, DumpScope};
pub use ops::BatchItem;
pub use scan::{ScanCursor, ScanOptions, ScanReply};
pub use sequence::Sequencer;
pub use session::{Liveness, Session};

/// Connection to a table server
pub struct Client<S = TcpStream> {
    /// Connected byte stream (exclusively owned)
    stream: S,

    /// Selected database, privileges, liveness
    session: Session,

    /// Request sequence numbers
    seq: Sequencer,

    /// Reused for encoding requests and receiving replies
    buf: BytesMut,
}

impl Client<TcpStream> {
    /// Dial `config.addr` and wrap the socket
    ///
    /// No retry: a failed connect is returned to the caller as is.
    pub fn connect(config: &Config) -> Result<Self> {
        let stream = TcpStream::connect(&config.addr)?;
        stream.set_nodelay(config.nodelay)?;
        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }
        tracing::debug!("Connected to {}", config.addr);
        Ok(Self::new(stream, config))
    }
}

impl<S: Read + Write> Client<S> {
    /// Wrap an already connected stream
    pub fn new(stream: S, config: &Config) -> Self {
        Self {
            stream,
            session: Session::new(config.db_id, config.require_auth),
            seq: Sequencer::new(),
            buf: BytesMut::with_capacity(config.scratch_capacity),
        }
    }

    /// Mark the client closed; later calls fail with `Shutdown`
    pub fn close(&mut self) {
        self.session.mark_closed();
    }

    /// Change the database used by all later operations (no round trip)
    pub fn select(&mut self, db_id: u8) {
        self.session.select(db_id);
    }

    pub fn database_id(&self) -> u8 {
        self.session.db_id()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the connection can still be used
    pub fn is_open(&self) -> bool {
        self.session.liveness() == Liveness::Open
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Authenticate against the selected database
    ///
    /// Authenticating while the admin database is selected grants every
    /// database; otherwise only the selected one.
    pub fn auth(&mut self, password: &[u8]) -> Result<()> {
        self.session.ensure_open()?;
        if password.is_empty() || password.len() > MAX_ROW_KEY_LEN {
            return Err(TableError::invalid(
                ErrorCode::AuthFailed,
                format!(
                    "password length {} not in [1, {}]",
                    password.len(),
                    MAX_ROW_KEY_LEN
                ),
            ));
        }

        let db_id = self.session.db_id();
        let kv = KeyValue {
            row_key: password.to_vec(),
            ..Default::default()
        };
        let head = self.next_head(Cmd::Auth, db_id);
        let reply: PkgOneOp = self.round_trip(&PkgOneOp::new(head, 0, kv))?;

        let code = reply.kv.error_code();
        if code.is_err() {
            tracing::debug!("Auth for database {} failed: {}", db_id, code);
            return Err(TableError::Server(code));
        }
        self.session.grant(db_id);
        Ok(())
    }

    /// Health check
    pub fn ping(&mut self) -> Result<()> {
        self.session.ensure_open()?;
        let head = self.next_head(Cmd::Ping, self.session.db_id());
        let reply: PkgOneOp = self.round_trip(&PkgOneOp::new(head, 0, KeyValue::default()))?;
        let code = reply.kv.error_code();
        if code.is_err() {
            return Err(TableError::Server(code));
        }
        Ok(())
    }

    // =========================================================================
    // Internal plumbing
    // =========================================================================

    pub(crate) fn next_head(&mut self, cmd: Cmd, db_id: u8) -> PkgHead {
        PkgHead::new(self.seq.next_seq(), cmd, db_id)
    }

    /// Send `request` and read its reply
    ///
    /// Encoding failures are local and leave the connection usable. Any
    /// transport, decode or correlation failure marks it broken.
    pub(crate) fn round_trip<Req: Packet, Resp: Packet>(&mut self, request: &Req) -> Result<Resp> {
        self.session.ensure_open()?;

        let result = self.exchange(request);
        if let Err(ref e) = result {
            if e.is_fatal() {
                tracing::warn!("Request seq={} failed: {}", request.head().seq, e);
                self.session.mark_broken();
            }
        }
        result
    }

    fn exchange<Req: Packet, Resp: Packet>(&mut self, request: &Req) -> Result<Resp> {
        let head = *request.head();
        write_packet(&mut self.stream, request, &mut self.buf)?;
        tracing::trace!(
            "Sent seq={} cmd={:?} db={} len={}",
            head.seq,
            head.cmd,
            head.db_id,
            self.buf.len()
        );

        read_packet(&mut self.stream, &mut self.buf)?;
        let reply = Resp::decode(&self.buf[..])?;
        self.seq.verify(&head, reply.head())?;
        tracing::trace!("Received seq={} len={}", head.seq, self.buf.len());
        Ok(reply)
    }

    /// Reject a reply that decoded fine but breaks the protocol contract
    pub(crate) fn violation(&mut self, message: String) -> TableError {
        tracing::warn!("Protocol violation: {}", message);
        self.session.mark_broken();
        TableError::Protocol(message)
    }
}
