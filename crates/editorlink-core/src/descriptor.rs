//! Discovery descriptor.
//!
//! The editor writes this file under the project root whenever it (re)binds
//! its listener. The client only ever reads it.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Location of the descriptor, relative to the project root.
pub const DESCRIPTOR_PATH: &str = ".editorlink/bridge.json";

/// Announcement of the editor's current listening endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDescriptor {
    pub port: u16,
    pub pid: u32,
    pub version: String,
    /// Unix seconds at which the editor wrote the file.
    pub timestamp: u64,
    /// Optional channel path for listeners that multiplex several endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DiscoveryDescriptor {
    /// Describe a listener on `port` owned by process `pid`, stamped now.
    pub fn new(port: u16, pid: u32, version: impl Into<String>) -> Self {
        Self {
            port,
            pid,
            version: version.into(),
            timestamp: unix_now(),
            path: None,
        }
    }

    /// Parse and validate descriptor text.
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let descriptor: Self = serde_json::from_str(text)?;
        if descriptor.port == 0 {
            return Err(DescriptorError::MissingPort);
        }
        if descriptor.version.trim().is_empty() {
            return Err(DescriptorError::MissingVersion);
        }
        Ok(descriptor)
    }

    /// Whether the descriptor was written more than `max_age` before `now`.
    pub fn is_stale_at(&self, now: u64, max_age: Duration) -> bool {
        now.saturating_sub(self.timestamp) > max_age.as_secs()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.is_stale_at(unix_now(), max_age)
    }

    /// WebSocket URL of the announced endpoint.
    pub fn url(&self) -> String {
        let path = self.path.as_deref().unwrap_or("").trim_start_matches('/');
        format!("ws://127.0.0.1:{}/{}", self.port, path)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Reasons a descriptor cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("malformed descriptor: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("descriptor has no usable port")]
    MissingPort,
    #[error("descriptor has no protocol version")]
    MissingVersion,
}
