//! Core types for EditorLink.
//!
//! This crate provides the protocol primitives shared by the IDE-side client
//! and any peer implementation: the wire envelope, command categories, and the
//! discovery descriptor the editor writes when it starts listening. Command
//! bodies stay opaque JSON; this crate only frames them.

mod category;
mod descriptor;
mod message;

pub use category::{BridgeCommand, Category, CategoryParseError};
pub use descriptor::{DESCRIPTOR_PATH, DescriptorError, DiscoveryDescriptor};
pub use message::{BridgeMessage, CommandResponse};

use std::fmt;
use std::time::Duration;

/// Protocol version this side speaks. Compared against the descriptor, never enforced.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// How long a single request may stay pending before it fails.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Interval between descriptor reads while disconnected.
pub const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Reconnect attempts made after a connection is lost.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Descriptors whose timestamp is older than this are treated as absent.
pub const DESCRIPTOR_STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on waiting for the editor to finish a reload before retrying.
pub const COMPILE_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport; discovery polling is active unless suppressed.
    Disconnected,
    /// Transport handshake in flight.
    Connecting,
    /// Normal operation.
    Connected,
    /// Transport lost, waiting before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// True for the states a lost transport passes through.
    pub fn is_down(self) -> bool {
        matches!(self, Self::Disconnected | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}
