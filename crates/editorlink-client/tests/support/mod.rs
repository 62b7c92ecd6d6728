//! In-process stand-in for the editor side of the bridge.
//!
//! A `FakeEditor` binds an ephemeral port, writes the descriptor under a
//! temporary project root, and answers requests through a caller-supplied
//! handler. `stop` drops the listener and every connection, which is what the
//! real editor does during a domain reload.

#![allow(dead_code)]

use anyhow::{Context, Result};
use editorlink_client::{BridgeConfig, ConnectionState};
use editorlink_core::{BridgeMessage, CommandResponse, DESCRIPTOR_PATH, DiscoveryDescriptor};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Decides the reply to a request. `None` leaves the request unanswered.
pub type Handler = Arc<dyn Fn(&str, &Value) -> Option<CommandResponse> + Send + Sync>;

pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&str, &Value) -> Option<CommandResponse> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Replies `success: true` with the request params as result.
pub fn echo() -> Handler {
    handler(|_, params| Some(CommandResponse::ok(params.clone())))
}

pub fn silent() -> Handler {
    handler(|_, _| None)
}

pub struct FakeEditor {
    port: u16,
    accepted: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    push: broadcast::Sender<BridgeMessage>,
    accept: Mutex<Option<JoinHandle<()>>>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl FakeEditor {
    /// Bind, announce via the descriptor, and start serving.
    pub async fn start(root: &Path, handler: Handler) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("bind fake editor")?;
        let port = listener.local_addr().context("local addr")?.port();
        write_descriptor(root, port)?;

        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (push, _) = broadcast::channel(32);
        let connections: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

        let accept = {
            let accepted = Arc::clone(&accepted);
            let requests = Arc::clone(&requests);
            let push = push.clone();
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let connection = tokio::spawn(serve(
                        stream,
                        handler.clone(),
                        Arc::clone(&requests),
                        push.subscribe(),
                    ));
                    connections.lock().unwrap().push(connection);
                }
            })
        };

        Ok(Self {
            port,
            accepted,
            requests,
            push,
            accept: Mutex::new(Some(accept)),
            connections,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Labels (`category.action`) of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Send a frame to every connected client.
    pub fn push(&self, message: BridgeMessage) {
        let _ = self.push.send(message);
    }

    /// Drop the listener and all connections.
    pub async fn stop(&self) {
        let accept = self.accept.lock().unwrap().take();
        if let Some(accept) = accept {
            accept.abort();
            let _ = accept.await;
        }
        let connections: Vec<_> = self.connections.lock().unwrap().drain(..).collect();
        for task in connections {
            task.abort();
            let _ = task.await;
        }
    }

    /// Wait until some request with `label` has arrived.
    pub async fn wait_for_request(&self, label: &str, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            while !self.requests().iter().any(|r| r == label) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }
}

async fn serve(
    stream: TcpStream,
    handler: Handler,
    requests: Arc<Mutex<Vec<String>>>,
    mut push: broadcast::Receiver<BridgeMessage>,
) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(Ok(Message::Text(text))) = frame else { break };
                let Ok(BridgeMessage::Request { id, category, action, params }) =
                    BridgeMessage::from_json(text.as_str())
                else {
                    continue;
                };
                let label = format!("{category}.{action}");
                requests.lock().unwrap().push(label.clone());
                if let Some(reply) = handler(&label, &params) {
                    let frame = BridgeMessage::response(id, reply).to_json().unwrap();
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
            }
            pushed = push.recv() => {
                let message = match pushed {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let frame = message.to_json().unwrap();
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

pub fn write_descriptor(root: &Path, port: u16) -> Result<()> {
    write_descriptor_with_version(root, port, editorlink_core::PROTOCOL_VERSION)
}

pub fn write_descriptor_with_version(root: &Path, port: u16, version: &str) -> Result<()> {
    let path = descriptor_path(root);
    std::fs::create_dir_all(path.parent().context("descriptor dir")?)?;
    let descriptor = DiscoveryDescriptor::new(port, std::process::id(), version);
    std::fs::write(&path, descriptor.to_json()?)?;
    Ok(())
}

/// A port nothing listens on.
pub async fn closed_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    Ok(listener.local_addr()?.port())
}

pub fn remove_descriptor(root: &Path) {
    let _ = std::fs::remove_file(descriptor_path(root));
}

fn descriptor_path(root: &Path) -> PathBuf {
    root.join(DESCRIPTOR_PATH)
}

/// Short intervals so lifecycle tests finish quickly.
pub fn fast_config() -> BridgeConfig {
    let mut config = BridgeConfig {
        command_timeout: Duration::from_millis(500),
        reconnect_delay: Duration::from_millis(100),
        poll_interval: Duration::from_millis(20),
        handshake_timeout: Duration::from_millis(500),
        max_reconnect_attempts: 3,
        ..BridgeConfig::default()
    };
    config.retry.reload_timeout = Duration::from_secs(5);
    config
}

/// Next state transition, failing the test if none arrives in time.
pub async fn next_state(states: &mut broadcast::Receiver<ConnectionState>) -> ConnectionState {
    tokio::time::timeout(Duration::from_secs(5), states.recv())
        .await
        .expect("state transition in time")
        .expect("state stream open")
}

/// Skip transitions until `wanted` is reached.
pub async fn wait_for_state(
    states: &mut broadcast::Receiver<ConnectionState>,
    wanted: ConnectionState,
) {
    while next_state(states).await != wanted {}
}
