//! Bridge configuration.
//!
//! Every field has a default matching the protocol constants, so an empty
//! `editorlink.toml` is valid. Durations are written in milliseconds.

use crate::error::ConfigError;
use editorlink_core::{
    COMMAND_TIMEOUT, COMPILE_WAIT_TIMEOUT, DESCRIPTOR_PATH, DESCRIPTOR_STALE_AFTER,
    DISCOVERY_POLL_INTERVAL, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handshake bound for a single connect attempt.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error texts the editor produces when a command names a type it has not
/// compiled. The first capture group is the type name.
pub const DEFAULT_RETRY_PATTERNS: &[&str] = &[
    r"Component type not found: ([\w.]+)",
    r"Type not found: ([\w.]+)",
    r"Could not find (?:type|component|script) '?([\w.]+)'?",
    r"Unknown component type:? '?([\w.]+)'?",
    r"The type or namespace name '([\w.]+)' could not be found",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Descriptor location relative to the project root.
    pub descriptor_path: PathBuf,
    #[serde(with = "millis")]
    pub command_timeout: Duration,
    #[serde(with = "millis")]
    pub reconnect_delay: Duration,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    #[serde(with = "millis")]
    pub handshake_timeout: Duration,
    #[serde(with = "millis")]
    pub stale_after: Duration,
    pub max_reconnect_attempts: u32,
    /// Per-stream buffer for state and event subscribers.
    pub channel_capacity: usize,
    pub retry: RetryConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            descriptor_path: PathBuf::from(DESCRIPTOR_PATH),
            command_timeout: COMMAND_TIMEOUT,
            reconnect_delay: RECONNECT_DELAY,
            poll_interval: DISCOVERY_POLL_INTERVAL,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            stale_after: DESCRIPTOR_STALE_AFTER,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            channel_capacity: 64,
            retry: RetryConfig::default(),
        }
    }
}

/// Settings for the reload-aware batch retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub patterns: Vec<String>,
    /// Extensions of files that count as "source written this session".
    pub source_extensions: Vec<String>,
    #[serde(with = "millis")]
    pub reload_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_RETRY_PATTERNS.iter().map(|p| p.to_string()).collect(),
            source_extensions: vec!["cs".to_string()],
            reload_timeout: COMPILE_WAIT_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, validating the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values that would spin or never fire.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("command_timeout", self.command_timeout),
            ("poll_interval", self.poll_interval),
            ("handshake_timeout", self.handshake_timeout),
            ("retry.reload_timeout", self.retry.reload_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Zero(name));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Zero("channel_capacity"));
        }
        crate::orchestrator::RetryPolicy::from_config(&self.retry).map(|_| ())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
