//! # Relay Configuration
//!
//! Configuration for a relay node. Every field has a default, so a TOML file
//! only needs the keys it changes:
//!
//! ```toml
//! local_chain_id = "chain-a"
//! available_port = 9000
//! peer_addr = "127.0.0.1:9011"
//! reject_on_verification_failure = true
//! ```

use crate::domain::{RelayError, DEFAULT_MAX_FRAME_BYTES, REMOTE_HEADERS_KEY_PREFIX};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Relay node configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Chain id used in local abstract headers and receipts.
    pub local_chain_id: String,

    /// Bind host. Loopback by default.
    pub listen_host: String,

    /// Externally assigned port; the listener binds `available_port + 1`.
    pub available_port: u16,

    /// Maximum concurrently served connections.
    pub max_connections: usize,

    /// Upper bound of one frame payload in bytes.
    pub max_frame_bytes: usize,

    /// Responder read deadline in seconds. `0` disables it.
    pub idle_timeout_secs: u64,

    /// Initiator response deadline in seconds.
    pub request_timeout_secs: u64,

    /// Per-frame write deadline in seconds.
    pub write_timeout_secs: u64,

    /// Answer unverifiable transfers with `REJECT` instead of silence.
    pub reject_on_verification_failure: bool,

    /// Key prefix of remote header records.
    pub remote_headers_key_prefix: String,

    /// File-backed store path; in-memory when absent.
    pub data_file: Option<PathBuf>,

    /// Peer to ping and sync with at startup.
    pub peer_addr: Option<String>,

    /// Default log filter.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            local_chain_id: "chain-local".to_string(),
            listen_host: "127.0.0.1".to_string(),
            available_port: 9000,
            max_connections: 256,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            idle_timeout_secs: 300,
            request_timeout_secs: 30,
            write_timeout_secs: 10,
            reject_on_verification_failure: false,
            remote_headers_key_prefix: REMOTE_HEADERS_KEY_PREFIX.to_string(),
            data_file: None,
            peer_addr: None,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Create a config for testing (short deadlines, small frames).
    pub fn for_testing() -> Self {
        Self {
            local_chain_id: "chain-test".to_string(),
            available_port: 0,
            max_connections: 16,
            max_frame_bytes: 64 * 1024,
            idle_timeout_secs: 5,
            request_timeout_secs: 2,
            write_timeout_secs: 2,
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Config` if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RelayError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, RelayError> {
        let config: Self = toml::from_str(content).map_err(|e| RelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.local_chain_id.is_empty() {
            return Err(RelayError::Config("local_chain_id must not be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(RelayError::Config("max_connections must be positive".to_string()));
        }
        if self.max_frame_bytes == 0 || self.max_frame_bytes > u32::MAX as usize {
            return Err(RelayError::Config(format!(
                "max_frame_bytes {} outside 1..={}",
                self.max_frame_bytes,
                u32::MAX
            )));
        }
        if self.available_port == u16::MAX {
            return Err(RelayError::Config(
                "available_port leaves no room for the listen port".to_string(),
            ));
        }
        Ok(())
    }

    /// Listen address: `listen_host:(available_port + 1)`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.available_port.saturating_add(1))
    }

    /// Responder read deadline, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Initiator response deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Per-frame write deadline.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}
