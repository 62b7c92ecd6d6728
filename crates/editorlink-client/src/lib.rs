//! IDE-side client for EditorLink.
//!
//! The editor announces itself by writing a descriptor under the project
//! root and restarts its listener whenever it recompiles scripts. This crate
//! keeps a connection to it alive across those restarts:
//!
//! - [`DiscoveryPoller`] watches for the descriptor.
//! - [`BridgeClient`] drives the connection state machine and exposes
//!   [`send_command`](BridgeClient::send_command) on top of id correlation.
//! - [`EventDispatcher`] fans pushed events out to subscribers.
//! - [`CommandOrchestrator`] runs batches and retries commands that failed
//!   only because the editor had not compiled a freshly written type yet.
//!
//! ```no_run
//! use editorlink_client::{BridgeClient, BridgeConfig};
//! use editorlink_core::Category;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), editorlink_client::BridgeError> {
//! let client = BridgeClient::new("/path/to/project", BridgeConfig::default());
//! client.connect();
//! // ... wait for ConnectionState::Connected via subscribe_state() ...
//! let response = client
//!     .send_command(Category::GameObject, "create", json!({"name": "Player"}))
//!     .await?;
//! if !response.success {
//!     eprintln!("editor refused: {}", response.error_text());
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod correlator;
mod discovery;
mod error;
mod events;
mod orchestrator;
mod stop;

pub use config::{BridgeConfig, DEFAULT_RETRY_PATTERNS, HANDSHAKE_TIMEOUT, RetryConfig};
pub use connection::BridgeClient;
pub use correlator::{PendingHandle, RequestCorrelator};
pub use discovery::DiscoveryPoller;
pub use error::{BridgeError, ConfigError};
pub use events::{
    BridgeEvent, CONSOLE_LOG_EVENT, ConsoleLog, EventDispatcher, EventSubscription, LogLevel,
    PLAY_MODE_EVENT, PlayModeChange, PlayModeState, TypedSubscription,
};
pub use orchestrator::{CommandOrchestrator, CommandTransport, RetryPolicy, SessionFiles};

pub use editorlink_core::ConnectionState;

use std::time::Duration;

/// Wait until `client` reports [`ConnectionState::Connected`], up to `timeout`.
///
/// Returns false on timeout. Does not call [`BridgeClient::connect`].
pub async fn wait_until_connected(client: &BridgeClient, timeout: Duration) -> bool {
    let mut states = client.subscribe_state();
    if client.is_connected() {
        return true;
    }
    let connected = async {
        loop {
            match states.recv().await {
                Ok(ConnectionState::Connected) => return true,
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    if client.is_connected() {
                        return true;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return false,
            }
        }
    };
    tokio::time::timeout(timeout, connected).await.unwrap_or(false)
}
