//! Client error types.

use std::path::PathBuf;

/// Failures surfaced by [`send_command`](crate::BridgeClient::send_command).
///
/// Transport and timing problems only. A command the editor rejected comes back
/// as `Ok` with `success: false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("not connected to the editor")]
    NotConnected,
    #[error("command timed out: {command}")]
    CommandTimeout { command: String },
    #[error("connection to the editor closed")]
    ConnectionClosed,
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Problems loading or validating a [`BridgeConfig`](crate::BridgeConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid retry pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("retry pattern {0:?} must capture the referenced type name")]
    PatternWithoutCapture(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
