//! Session state
//!
//! Selected database, granted privileges and connection liveness. Consulted
//! before every request; all checks here are local and never touch the wire.

use std::collections::BTreeSet;

use crate::error::{Result, TableError};
use crate::protocol::{validate_db_id, ADMIN_DB_ID};

/// Liveness of the underlying connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Open,
    /// A protocol or transport error left the stream in an unknown state
    Broken,
    /// Closed by the caller
    Closed,
}

#[derive(Debug)]
pub struct Session {
    db_id: u8,
    require_auth: bool,
    auth_admin: bool,
    authorized: BTreeSet<u8>,
    liveness: Liveness,
}

impl Session {
    pub fn new(db_id: u8, require_auth: bool) -> Self {
        Self {
            db_id,
            require_auth,
            auth_admin: false,
            authorized: BTreeSet::new(),
            liveness: Liveness::Open,
        }
    }

    pub fn db_id(&self) -> u8 {
        self.db_id
    }

    pub fn select(&mut self, db_id: u8) {
        if db_id != self.db_id {
            tracing::debug!("Selected database {} (was {})", db_id, self.db_id);
        }
        self.db_id = db_id;
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_admin(&self) -> bool {
        self.auth_admin
    }

    pub fn is_authorized(&self, db_id: u8) -> bool {
        self.auth_admin || self.authorized.contains(&db_id)
    }

    /// Record a successful auth against `db_id`
    pub fn grant(&mut self, db_id: u8) {
        if db_id == ADMIN_DB_ID {
            tracing::debug!("Authorized as admin");
            self.auth_admin = true;
        } else {
            tracing::debug!("Authorized database {}", db_id);
            self.authorized.insert(db_id);
        }
    }

    /// Fails once the connection is broken or closed
    pub fn ensure_open(&self) -> Result<()> {
        match self.liveness {
            Liveness::Open => Ok(()),
            Liveness::Broken | Liveness::Closed => Err(TableError::Shutdown),
        }
    }

    /// Check that a data operation may run against `db_id`
    pub fn check_access(&self, db_id: u8) -> Result<()> {
        self.ensure_open()?;
        validate_db_id(db_id)?;
        if self.require_auth && !self.is_authorized(db_id) {
            return Err(TableError::NoPrivilege { db_id });
        }
        Ok(())
    }

    pub fn mark_broken(&mut self) {
        if self.liveness == Liveness::Open {
            tracing::warn!("Connection marked broken; it must be closed and re-established");
            self.liveness = Liveness::Broken;
        }
    }

    pub fn mark_closed(&mut self) {
        self.liveness = Liveness::Closed;
    }
}
