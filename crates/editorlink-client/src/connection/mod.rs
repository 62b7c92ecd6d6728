//! Connection manager.
//!
//! [`BridgeClient`] owns at most one WebSocket connection to the editor. A
//! driver task, started by [`BridgeClient::connect`], runs the state machine:
//! poll for the descriptor, connect, serve, and on loss retry a bounded
//! number of times before falling back to polling.

mod driver;
mod session;

use crate::config::BridgeConfig;
use crate::correlator::RequestCorrelator;
use crate::discovery::DiscoveryPoller;
use crate::error::BridgeError;
use crate::events::{
    CONSOLE_LOG_EVENT, ConsoleLog, EventDispatcher, EventSubscription, PLAY_MODE_EVENT,
    PlayModeChange, TypedSubscription,
};
use editorlink_core::{BridgeCommand, BridgeMessage, Category, CommandResponse, ConnectionState};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// State shared between the client handle and its driver task.
pub(crate) struct Shared {
    pub(crate) config: BridgeConfig,
    pub(crate) discovery: DiscoveryPoller,
    pub(crate) correlator: RequestCorrelator,
    pub(crate) events: EventDispatcher,
    state: Mutex<ConnectionState>,
    state_tx: broadcast::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    pub(crate) fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Move to `next`, notifying subscribers. Repeating the current state is a no-op.
    pub(crate) fn set_state(&self, next: ConnectionState) {
        let mut state = lock(&self.state);
        if *state == next {
            return;
        }
        let previous = std::mem::replace(&mut *state, next);
        tracing::info!(from = %previous, to = %next, "bridge state changed");
        // Sent under the lock so subscribers observe transitions in order.
        let _ = self.state_tx.send(next);
    }

    pub(crate) fn install_outbound(&self, sender: mpsc::UnboundedSender<Message>) {
        *lock(&self.outbound) = Some(sender);
    }

    pub(crate) fn take_outbound(&self) -> Option<mpsc::UnboundedSender<Message>> {
        lock(&self.outbound).take()
    }

    fn outbound(&self) -> Option<mpsc::UnboundedSender<Message>> {
        lock(&self.outbound).clone()
    }

    /// Route one inbound text frame. Never blocks.
    pub(crate) fn dispatch_frame(&self, text: &str) {
        match BridgeMessage::from_json(text) {
            Ok(BridgeMessage::Response {
                id,
                success,
                result,
                error,
            }) => {
                let response = CommandResponse {
                    success,
                    result,
                    error,
                };
                if !self.correlator.resolve(&id, response) {
                    tracing::debug!(%id, "dropping response with no pending request");
                }
            }
            Ok(BridgeMessage::Event { event, data, .. }) => {
                self.events.publish(event, data);
            }
            Ok(BridgeMessage::Request { id, .. }) => {
                tracing::debug!(%id, "ignoring request sent by the editor");
            }
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed frame");
            }
        }
    }
}

struct DriverHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Client for one editor, identified by its project root.
///
/// Created and disposed by the host; there is no global instance.
pub struct BridgeClient {
    shared: Arc<Shared>,
    driver: Mutex<Option<DriverHandle>>,
    disposed: AtomicBool,
}

impl BridgeClient {
    pub fn new(project_root: impl AsRef<Path>, config: BridgeConfig) -> Self {
        let (state_tx, _) = broadcast::channel(config.channel_capacity);
        let shared = Shared {
            discovery: DiscoveryPoller::new(project_root, &config),
            correlator: RequestCorrelator::new(),
            events: EventDispatcher::new(config.channel_capacity),
            state: Mutex::new(ConnectionState::Disconnected),
            state_tx,
            outbound: Mutex::new(None),
            config,
        };
        Self {
            shared: Arc::new(shared),
            driver: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn discovery(&self) -> &DiscoveryPoller {
        &self.shared.discovery
    }

    /// Start discovery and automatic (re)connection.
    ///
    /// Does nothing if the driver is already running. Must be called from
    /// within a Tokio runtime.
    pub fn connect(&self) {
        if self.disposed.load(Ordering::Acquire) {
            tracing::warn!("connect called on a client that was shut down");
            return;
        }
        let mut driver = lock(&self.driver);
        if driver.as_ref().is_some_and(|d| !d.task.is_finished()) {
            return;
        }
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(driver::run(Arc::clone(&self.shared), stop_rx));
        *driver = Some(DriverHandle { stop, task });
        tracing::debug!(
            descriptor = %self.shared.discovery.descriptor_file().display(),
            "bridge driver started"
        );
    }

    /// Force the connection down and stop reconnecting until the next
    /// [`connect`](Self::connect). Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let handle = lock(&self.driver).take();
        if let Some(DriverHandle { stop, task }) = handle {
            let _ = stop.send(true);
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "bridge driver ended abnormally");
            }
        }
        // Held through cleanup. A connect during the wait owns the new session.
        let driver = lock(&self.driver);
        if driver.as_ref().is_some_and(|d| !d.task.is_finished()) {
            return;
        }
        self.shared.correlator.fail_all();
        if let Some(outbound) = self.shared.take_outbound() {
            let _ = outbound.send(Message::Close(None));
        }
        self.shared.set_state(ConnectionState::Disconnected);
        drop(driver);
    }

    /// Dispose of the client: stop polling, cancel timers, fail pending
    /// requests and close the transport. Idempotent.
    pub async fn shutdown(&self) {
        self.disposed.store(true, Ordering::Release);
        self.disconnect().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to state transitions from now on.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn subscribe_events(&self, name: &str) -> EventSubscription {
        self.shared.events.subscribe(name)
    }

    pub fn subscribe_all_events(&self) -> EventSubscription {
        self.shared.events.subscribe_all()
    }

    pub fn subscribe_console_logs(&self) -> TypedSubscription<ConsoleLog> {
        self.shared.events.subscribe(CONSOLE_LOG_EVENT).typed()
    }

    pub fn subscribe_play_mode(&self) -> TypedSubscription<PlayModeChange> {
        self.shared.events.subscribe(PLAY_MODE_EVENT).typed()
    }

    /// Send one command and wait for its response.
    ///
    /// Fails immediately with [`BridgeError::NotConnected`] unless connected;
    /// nothing is queued. A response with `success: false` is returned as `Ok`.
    pub async fn send_command(
        &self,
        category: Category,
        action: &str,
        params: Value,
    ) -> Result<CommandResponse, BridgeError> {
        if self.state() != ConnectionState::Connected {
            return Err(BridgeError::NotConnected);
        }
        let request = BridgeMessage::request(category, action, params);
        let text = request
            .to_json()
            .map_err(|e| BridgeError::Encode(e.to_string()))?;
        let pending = self
            .shared
            .correlator
            .register(request.id(), format!("{category}.{action}"));

        tracing::debug!(id = %pending.id(), %category, action, "sending command");
        // Clone dropped before the wait.
        self.shared
            .outbound()
            .ok_or(BridgeError::NotConnected)?
            .send(Message::Text(text.into()))
            .map_err(|_| BridgeError::ConnectionClosed)?;

        pending.wait(self.shared.config.command_timeout).await
    }

    /// [`send_command`](Self::send_command) for a prepared command.
    pub async fn execute(&self, command: &BridgeCommand) -> Result<CommandResponse, BridgeError> {
        self.send_command(command.category, &command.action, command.params.clone())
            .await
    }

    /// Requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.driver).take() {
            // The driver fails pending requests and closes the socket on its way out.
            let _ = handle.stop.send(true);
        }
    }
}
