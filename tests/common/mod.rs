//! In-memory table server used by the integration tests
//!
//! `MockStream` implements `Read + Write`: every complete request packet
//! written to it is answered immediately by the shared `MockServer`, and the
//! reply bytes are queued for the client's next read.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::ops::RangeInclusive;
use std::sync::Arc;

use parking_lot::Mutex;

use gotable::protocol::{
    decode_head, encode_packet, flag, unit_id, Cmd, ColSpace, KeyValue, Packet, PkgDumpReq,
    PkgDumpResp, PkgHead, PkgMultiOp, PkgOneOp, PkgScanReq, ADMIN_DB_ID, HEAD_SIZE,
};
use gotable::{Client, Config};

// =============================================================================
// Helpers
// =============================================================================

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config for servers without passwords
pub fn open_config(db_id: u8) -> Config {
    Config::builder().db_id(db_id).require_auth(false).build()
}

/// Client connected to `server`, privilege check disabled
pub fn open_client(server: &MockServer) -> Client<MockStream> {
    init_tracing();
    Client::new(server.connect(), &open_config(1))
}

// =============================================================================
// Server
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Cell {
    value: Vec<u8>,
    score: i64,
    cas: u32,
}

/// (db, table, row, col)
type CellKey = (u8, u8, Vec<u8>, Vec<u8>);

/// Dump order: (unit, table, row, col space, col)
type DumpKey = (u16, u8, Vec<u8>, u8, Vec<u8>);

struct ServerState {
    plain: BTreeMap<CellKey, Cell>,
    zset: BTreeMap<CellKey, Cell>,
    passwords: HashMap<u8, Vec<u8>>,
    replica: bool,
    next_cas: u32,
    dump_page_size: usize,
    dump_units_per_page: u32,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            plain: BTreeMap::new(),
            zset: BTreeMap::new(),
            passwords: HashMap::new(),
            replica: false,
            next_cas: 0,
            dump_page_size: 100,
            dump_units_per_page: 65536,
        }
    }
}

/// Shared store; every `connect` opens a new connection to it
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `password` for `db_id` (use `ADMIN_DB_ID` for the admin password)
    pub fn with_password(self, db_id: u8, password: &[u8]) -> Self {
        self.state.lock().passwords.insert(db_id, password.to_vec());
        self
    }

    /// Serve as a read-only replica
    pub fn replica(self) -> Self {
        self.state.lock().replica = true;
        self
    }

    /// Records per dump page and units walked per dump request
    pub fn dump_paging(self, page_size: usize, units_per_page: u32) -> Self {
        {
            let mut state = self.state.lock();
            state.dump_page_size = page_size;
            state.dump_units_per_page = units_per_page;
        }
        self
    }

    pub fn connect(&self) -> MockStream {
        MockStream {
            server: self.clone(),
            conn: Connection::default(),
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            fault: None,
            requests: 0,
        }
    }

    /// Number of cells stored in db `db_id`, both indexes
    pub fn cell_count(&self, db_id: u8) -> usize {
        let state = self.state.lock();
        state.plain.keys().filter(|k| k.0 == db_id).count()
            + state.zset.keys().filter(|k| k.0 == db_id).count()
    }
}

#[derive(Default)]
struct Connection {
    authorized: BTreeSet<u8>,
    admin: bool,
}

impl Connection {
    fn allowed(&self, state: &ServerState, db_id: u8) -> bool {
        self.admin || self.authorized.contains(&db_id) || !state.passwords.contains_key(&db_id)
    }
}

/// One-shot misbehaviour applied to the next reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reply carries the next sequence number
    WrongSeq,
    /// Reply carries another command code
    WrongCmd,
    /// Only half of the reply is delivered
    Truncate,
    /// Batch reply loses its last record
    ShortBatch,
    /// Dump reply claims a last unit past the requested end
    LastUnitPastEnd,
    /// Dump reply carries an extra record from a unit past `last_unit_id`
    RecordPastLastUnit,
    /// Dump reply carries an extra record of table `table_id + 1`
    RecordOfOtherTable,
    /// Dump reply is empty and stops mid-unit in the request's end unit
    EmptyMidUnitJump,
}

/// First generated row key whose unit falls inside `units`
pub fn row_in_units(units: RangeInclusive<u16>) -> Vec<u8> {
    (0u32..)
        .map(|i| format!("stray-{}", i).into_bytes())
        .find(|row| units.contains(&unit_id(row)))
        .expect("some row hashes into the range")
}

impl ServerState {
    fn handle(&mut self, conn: &mut Connection, pkg: &[u8], fault: Option<Fault>) -> Vec<u8> {
        let head = decode_head(pkg).expect("request head");
        let mut reply = match head.cmd {
            Cmd::Scan => {
                let req = PkgScanReq::decode(pkg).expect("scan request");
                let resp = if conn.allowed(self, head.db_id) {
                    self.scan(&req)
                } else {
                    multi_error(head, req.op.pkg_flag, -62)
                };
                encode_packet(&resp).unwrap()
            }
            Cmd::Dump => {
                let req = PkgDumpReq::decode(pkg).expect("dump request");
                let mut resp = if conn.allowed(self, head.db_id) {
                    self.dump(&req)
                } else {
                    PkgDumpResp {
                        multi: multi_error(head, req.op.pkg_flag, -62),
                        start_unit_id: req.start_unit_id,
                        end_unit_id: req.end_unit_id,
                        last_unit_id: req.start_unit_id,
                    }
                };
                match fault {
                    Some(Fault::LastUnitPastEnd) => {
                        resp.last_unit_id = req.end_unit_id.saturating_add(1);
                    }
                    Some(Fault::RecordPastLastUnit) => {
                        let row = row_in_units(resp.last_unit_id + 1..=u16::MAX);
                        resp.multi.kvs.push(KeyValue::key(req.op.kv.table_id, &row, b"c"));
                    }
                    Some(Fault::RecordOfOtherTable) => {
                        let row = row_in_units(req.start_unit_id..=resp.last_unit_id);
                        let table_id = req.op.kv.table_id + 1;
                        resp.multi.kvs.push(KeyValue::key(table_id, &row, b"c"));
                    }
                    Some(Fault::EmptyMidUnitJump) => {
                        resp.multi.kvs.clear();
                        resp.multi.pkg_flag &= flag::ONE_TABLE;
                        resp.last_unit_id = req.end_unit_id;
                    }
                    _ => {}
                }
                encode_packet(&resp).unwrap()
            }
            Cmd::MGet | Cmd::MSet | Cmd::MDel | Cmd::MIncr => {
                let req = PkgMultiOp::decode(pkg).expect("multi-op request");
                let mut resp = if conn.allowed(self, head.db_id) {
                    let zop = req.pkg_flag & flag::ZOP != 0;
                    let kvs = req
                        .kvs
                        .iter()
                        .map(|kv| self.apply(head.db_id, head.cmd, zop, kv))
                        .collect();
                    PkgMultiOp::new(head, req.pkg_flag, kvs)
                } else {
                    multi_error(head, req.pkg_flag, -62)
                };
                if fault == Some(Fault::ShortBatch) {
                    resp.kvs.pop();
                }
                encode_packet(&resp).unwrap()
            }
            _ => {
                let req = PkgOneOp::decode(pkg).expect("one-op request");
                let kv = self.one_op(conn, head, &req);
                encode_packet(&PkgOneOp::new(head, req.pkg_flag, kv)).unwrap()
            }
        };

        match fault {
            Some(Fault::WrongSeq) => {
                let seq = head.seq + 1;
                reply[4..12].copy_from_slice(&seq.to_be_bytes());
            }
            Some(Fault::WrongCmd) => {
                reply[12] = if head.cmd == Cmd::Get { Cmd::Set as u8 } else { Cmd::Get as u8 };
            }
            Some(Fault::Truncate) => reply.truncate(reply.len() / 2),
            _ => {}
        }
        reply
    }

    fn one_op(&mut self, conn: &mut Connection, head: PkgHead, req: &PkgOneOp) -> KeyValue {
        match head.cmd {
            Cmd::Ping => KeyValue::default(),
            Cmd::Auth => {
                let ok = self
                    .passwords
                    .get(&head.db_id)
                    .map_or(true, |pw| *pw == req.kv.row_key);
                if !ok {
                    return KeyValue {
                        err_code: -61,
                        ..Default::default()
                    };
                }
                if head.db_id == ADMIN_DB_ID {
                    conn.admin = true;
                } else {
                    conn.authorized.insert(head.db_id);
                }
                KeyValue::default()
            }
            _ if !conn.allowed(self, head.db_id) => KeyValue {
                err_code: -62,
                ..KeyValue::key(req.kv.table_id, &req.kv.row_key, &req.kv.col_key)
            },
            cmd => self.apply(head.db_id, cmd, req.pkg_flag & flag::ZOP != 0, &req.kv),
        }
    }

    fn apply(&mut self, db_id: u8, cmd: Cmd, zop: bool, kv: &KeyValue) -> KeyValue {
        let ServerState {
            plain,
            zset,
            replica,
            next_cas,
            ..
        } = self;
        let map = if zop { zset } else { plain };
        let key = (db_id, kv.table_id, kv.row_key.clone(), kv.col_key.clone());
        let mut reply = KeyValue::key(kv.table_id, &kv.row_key, &kv.col_key);

        if cmd.is_write() {
            if *replica {
                reply.err_code = -63;
                return reply;
            }
            if kv.cas != 0 && map.get(&key).map(|c| c.cas) != Some(kv.cas) {
                reply.err_code = -50;
                return reply;
            }
        }

        match cmd {
            Cmd::Get | Cmd::MGet => {
                if *replica && kv.cas == 0 {
                    reply.err_code = -64;
                    return reply;
                }
                match map.get(&key) {
                    Some(cell) => {
                        reply.value = cell.value.clone();
                        reply.score = cell.score;
                        if kv.cas != 0 {
                            reply.cas = cell.cas;
                        }
                    }
                    None => reply.err_code = 1,
                }
            }
            Cmd::Set | Cmd::MSet => {
                *next_cas += 1;
                map.insert(
                    key,
                    Cell {
                        value: kv.value.clone(),
                        score: kv.score,
                        cas: *next_cas,
                    },
                );
            }
            Cmd::Del | Cmd::MDel => {
                map.remove(&key);
            }
            Cmd::Incr | Cmd::MIncr => {
                *next_cas += 1;
                let cell = map.entry(key).or_default();
                cell.score += kv.score;
                cell.cas = *next_cas;
                reply.value = cell.value.clone();
                reply.score = cell.score;
            }
            _ => reply.err_code = -60,
        }
        reply
    }

    fn scan(&self, req: &PkgScanReq) -> PkgMultiOp {
        let head = req.op.head;
        let pkg_flag = req.op.pkg_flag;
        let kv = &req.op.kv;
        let zop = pkg_flag & flag::ZOP != 0;
        let ascending = pkg_flag & flag::ASCENDING != 0;
        let by_score = zop && kv.col_space == ColSpace::Score1;

        let map = if zop { &self.zset } else { &self.plain };
        let mut cols: Vec<((i64, Vec<u8>), Cell)> = map
            .iter()
            .filter(|(k, _)| k.0 == head.db_id && k.1 == kv.table_id && k.2 == kv.row_key)
            .map(|(k, c)| ((if by_score { c.score } else { 0 }, k.3.clone()), c.clone()))
            .collect();
        cols.sort_by(|a, b| a.0.cmp(&b.0));
        if !ascending {
            cols.reverse();
        }
        if pkg_flag & flag::START == 0 {
            let pivot = (if by_score { kv.score } else { 0 }, kv.col_key.clone());
            cols.retain(|(k, _)| if ascending { *k > pivot } else { *k < pivot });
        }

        let num = req.num as usize;
        let end = cols.len() <= num;
        cols.truncate(num);

        let kvs = cols
            .into_iter()
            .map(|((_, col_key), cell)| KeyValue {
                col_space: kv.col_space,
                value: cell.value,
                score: cell.score,
                ..KeyValue::key(kv.table_id, &kv.row_key, &col_key)
            })
            .collect();
        let flags = if end { pkg_flag | flag::END } else { pkg_flag };
        PkgMultiOp::new(head, flags, kvs)
    }

    fn dump(&self, req: &PkgDumpReq) -> PkgDumpResp {
        let head = req.op.head;
        let pkg_flag = req.op.pkg_flag;
        let kv = &req.op.kv;
        let one_table = pkg_flag & flag::ONE_TABLE != 0;
        let start = req.start_unit_id;
        let end = req.end_unit_id;
        let walk_end = (start as u32 + self.dump_units_per_page - 1).min(end as u32) as u16;

        let spaces = [(&self.plain, ColSpace::Default), (&self.zset, ColSpace::Score2)];
        let mut records: Vec<(DumpKey, KeyValue)> = Vec::new();
        for (map, space) in spaces {
            for (k, cell) in map.iter() {
                let unit = unit_id(&k.2);
                if k.0 != head.db_id || unit < start || unit > walk_end {
                    continue;
                }
                if one_table && k.1 != kv.table_id {
                    continue;
                }
                let order = (unit, k.1, k.2.clone(), space as u8, k.3.clone());
                let record = KeyValue {
                    col_space: space,
                    value: cell.value.clone(),
                    score: cell.score,
                    ..KeyValue::key(k.1, &k.2, &k.3)
                };
                records.push((order, record));
            }
        }
        records.sort_by(|a, b| a.0.cmp(&b.0));

        if pkg_flag & flag::UNIT_START == 0 {
            let pivot: DumpKey = (
                start,
                kv.table_id,
                kv.row_key.clone(),
                kv.col_space as u8,
                kv.col_key.clone(),
            );
            records.retain(|(order, _)| *order > pivot);
        }

        let page_size = self.dump_page_size.max(1);
        let next_unit = records.get(page_size).map(|(order, _)| order.0);
        records.truncate(page_size);

        let (flags, last_unit_id) = match (next_unit, records.last()) {
            (Some(next), Some((last, _))) if next != last.0 => (flag::UNIT_START, last.0),
            (Some(_), Some((last, _))) => (0, last.0),
            _ if walk_end >= end => (flag::END, end),
            _ => (flag::UNIT_START, walk_end),
        };

        PkgDumpResp {
            multi: PkgMultiOp::new(
                head,
                (pkg_flag & flag::ONE_TABLE) | flags,
                records.into_iter().map(|(_, kv)| kv).collect(),
            ),
            start_unit_id: start,
            end_unit_id: end,
            last_unit_id,
        }
    }
}

fn multi_error(head: PkgHead, pkg_flag: u8, err_code: i8) -> PkgMultiOp {
    PkgMultiOp {
        head,
        pkg_flag,
        err_code,
        kvs: Vec::new(),
    }
}

// =============================================================================
// Stream
// =============================================================================

/// Client side of one connection to a `MockServer`
pub struct MockStream {
    server: MockServer,
    conn: Connection,
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
    fault: Option<Fault>,
    requests: usize,
}

impl MockStream {
    /// Misbehave on the next reply
    pub fn inject(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    /// Requests answered so far
    pub fn requests(&self) -> usize {
        self.requests
    }

    fn serve(&mut self) {
        while self.inbound.len() >= HEAD_SIZE {
            let len = u32::from_be_bytes([
                self.inbound[0],
                self.inbound[1],
                self.inbound[2],
                self.inbound[3],
            ]) as usize;
            if self.inbound.len() < len {
                break;
            }
            let pkg: Vec<u8> = self.inbound.drain(..len).collect();
            let fault = self.fault.take();
            let reply = self.server.state.lock().handle(&mut self.conn, &pkg, fault);
            self.requests += 1;
            self.outbound.extend(reply);
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.outbound.len());
        for (dst, src) in buf.iter_mut().zip(self.outbound.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbound.extend_from_slice(buf);
        self.serve();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
