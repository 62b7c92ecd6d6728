//! Event dispatch.
//!
//! Events pushed by the editor fan out to subscribers by name. Nothing is
//! buffered for subscribers that arrive later, and a slow subscriber loses
//! events rather than stalling the read loop.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Event name for editor console output.
pub const CONSOLE_LOG_EVENT: &str = "consoleLog";
/// Event name for play-mode transitions.
pub const PLAY_MODE_EVENT: &str = "playModeChanged";

/// An event as received from the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeEvent {
    pub name: String,
    pub data: Value,
}

pub struct EventDispatcher {
    capacity: usize,
    by_name: Mutex<HashMap<String, broadcast::Sender<BridgeEvent>>>,
    all: broadcast::Sender<BridgeEvent>,
}

impl EventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self {
            capacity,
            by_name: Mutex::new(HashMap::new()),
            all,
        }
    }

    /// Subscribe to events named `name`.
    pub fn subscribe(&self, name: &str) -> EventSubscription {
        let mut by_name = self.by_name.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = by_name
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        EventSubscription { receiver }
    }

    /// Subscribe to every event regardless of name.
    pub fn subscribe_all(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.all.subscribe(),
        }
    }

    /// Deliver an event to current subscribers. Returns how many received it.
    pub fn publish(&self, name: String, data: Value) -> usize {
        let event = BridgeEvent { name, data };
        let mut delivered = self.all.send(event.clone()).unwrap_or(0);

        let mut by_name = self.by_name.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = by_name.get(&event.name) {
            match sender.send(event) {
                Ok(count) => delivered += count,
                Err(broadcast::error::SendError(event)) => {
                    // Every subscriber for this name is gone.
                    by_name.remove(&event.name);
                }
            }
        }
        delivered
    }
}

/// Receiving end of an event subscription. Dropping it unsubscribes.
pub struct EventSubscription {
    receiver: broadcast::Receiver<BridgeEvent>,
}

impl EventSubscription {
    /// Next event, or `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event subscriber fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Decode event data as `T`, skipping events that do not fit.
    pub fn typed<T: DeserializeOwned>(self) -> TypedSubscription<T> {
        TypedSubscription {
            inner: self,
            _marker: PhantomData,
        }
    }
}

pub struct TypedSubscription<T> {
    inner: EventSubscription,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedSubscription<T> {
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let event = self.inner.recv().await?;
            match serde_json::from_value(event.data) {
                Ok(value) => return Some(value),
                Err(e) => {
                    tracing::debug!(event = %event.name, error = %e, "undecodable event data")
                }
            }
        }
    }
}

/// Severity of a console line, as the editor labels it. Names match
/// case-insensitively, so both `"warning"` and `"Warning"` decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Warning,
    Error,
    Assert,
    Exception,
    Other,
}

impl LogLevel {
    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "log" => Self::Log,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "assert" => Self::Assert,
            "exception" => Self::Exception,
            _ => Self::Other,
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Payload of a [`CONSOLE_LOG_EVENT`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLog {
    pub message: String,
    #[serde(default)]
    pub stack_trace: Option<String>,
    #[serde(default = "default_level", alias = "type", alias = "logType")]
    pub level: LogLevel,
}

fn default_level() -> LogLevel {
    LogLevel::Log
}

/// Editor play-mode states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayModeState {
    EnteredEditMode,
    ExitingEditMode,
    EnteredPlayMode,
    ExitingPlayMode,
    Paused,
    #[serde(other)]
    Other,
}

/// Payload of a [`PLAY_MODE_EVENT`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayModeChange {
    pub state: PlayModeState,
}
