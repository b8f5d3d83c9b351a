//! Configuration surface: enumerated knobs with validated defaults, for
//! both the server and the client.

use crate::common::Metadata;
use crate::error::{Error, Result};
use std::time::Duration;

/// Server-side tunables. Defaults match the wire-format contract's table.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_port: u16,
    pub heartbeat_timeout: Duration,
    pub max_missed_heartbeats: u32,
    pub suspect_threshold: u32,
    pub health_check_interval: Duration,
    pub event_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 5000,
            heartbeat_timeout: Duration::from_secs(3),
            max_missed_heartbeats: 3,
            suspect_threshold: 2,
            health_check_interval: Duration::from_secs(1),
            event_channel_capacity: crate::events::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Reject configurations that cannot be satisfied by the state
    /// machine — in particular `MaxMissedHeartbeats >= SuspectThreshold`,
    /// without which invariants 3 and 4 from the data model could never
    /// both hold.
    pub fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            return Err(Error::Configuration("listen_port must be 1..65535".into()));
        }
        if self.suspect_threshold < 1 {
            return Err(Error::Configuration("suspect_threshold must be >= 1".into()));
        }
        if self.max_missed_heartbeats < self.suspect_threshold {
            return Err(Error::Configuration(
                "max_missed_heartbeats must be >= suspect_threshold".into(),
            ));
        }
        if self.heartbeat_timeout.is_zero() {
            return Err(Error::Configuration("heartbeat_timeout must be > 0".into()));
        }
        if self.health_check_interval.is_zero() {
            return Err(Error::Configuration(
                "health_check_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Client-side tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub node_id: String,
    pub server_address: String,
    pub server_port: u16,
    pub heartbeat_interval: Duration,
    pub metadata: Metadata,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_id: random_node_id(),
            server_address: "127.0.0.1".to_string(),
            server_port: 5000,
            heartbeat_interval: Duration::from_secs(1),
            metadata: Metadata::new(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.node_id.is_empty() {
            return Err(Error::Configuration("node_id must be non-empty".into()));
        }
        if self.server_port == 0 {
            return Err(Error::Configuration("server_port must be 1..65535".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(Error::Configuration(
                "heartbeat_interval must be > 0".into(),
            ));
        }
        if self.metadata.len() > crate::common::TYPICAL_MAX_METADATA_ENTRIES {
            return Err(Error::Configuration(format!(
                "metadata has {} entries, cap is {}",
                self.metadata.len(),
                crate::common::TYPICAL_MAX_METADATA_ENTRIES
            )));
        }
        Ok(())
    }
}

/// An 8-character random token, used as the default `NodeId` when the
/// caller doesn't supply one.
fn random_node_id() -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..8)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}
