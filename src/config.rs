//! Configuration for the GoTable client
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a client connection
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Server address used by `Client::connect`
    pub addr: String,

    /// Socket read timeout (milliseconds, 0 = blocking)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = blocking)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Database selected when the client is created
    pub db_id: u8,

    /// Refuse data operations on databases this session has not authorized.
    /// Turn off for servers running without passwords.
    pub require_auth: bool,

    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Initial capacity of the encode buffer (grows on demand up to 2 MB)
    pub scratch_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6688".to_string(),
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            nodelay: true,
            db_id: 0,
            require_auth: true,
            scratch_capacity: 4096,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the initially selected database
    pub fn db_id(mut self, db_id: u8) -> Self {
        self.config.db_id = db_id;
        self
    }

    /// Enable or disable the local privilege check
    pub fn require_auth(mut self, require: bool) -> Self {
        self.config.require_auth = require;
        self
    }

    /// Set the initial encode buffer capacity (in bytes)
    pub fn scratch_capacity(mut self, bytes: usize) -> Self {
        self.config.scratch_capacity = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
