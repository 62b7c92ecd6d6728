//! Listener, descriptor and simulated domain reloads.

use crate::scene::Scene;
use anyhow::Context;
use editorlink_client::{CONSOLE_LOG_EVENT, PLAY_MODE_EVENT};
use editorlink_core::{BridgeMessage, DESCRIPTOR_PATH, DiscoveryDescriptor, PROTOCOL_VERSION};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;

/// How long the listener stays down during a reload.
const COMPILE_PAUSE: Duration = Duration::from_secs(1);

pub struct Options {
    pub project: PathBuf,
    pub port: u16,
    pub reload_every: Option<Duration>,
}

type SharedScene = Arc<RwLock<Scene>>;

pub async fn run(options: Options) -> anyhow::Result<()> {
    let scene = Arc::new(RwLock::new(Scene::new("Main")));
    scene
        .write()
        .await
        .set_compiled(script_types(&options.project));

    let mut port = options.port;
    loop {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
        let bound = listener.local_addr()?.port();
        write_descriptor(&options.project, bound)?;
        tracing::info!("Listening on ws://127.0.0.1:{}", bound);

        let (events, _) = broadcast::channel::<BridgeMessage>(64);
        let (reload_tx, mut reload_rx) = mpsc::channel::<()>(1);
        let mut clients = JoinSet::new();
        let timer = async {
            match options.reload_every {
                Some(every) => tokio::time::sleep(every).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    let scene = scene.clone();
                    let events = events.clone();
                    let reload_tx = reload_tx.clone();
                    clients.spawn(async move {
                        let served = handle_connection(stream, addr, scene, events, reload_tx);
                        if let Err(e) = served.await {
                            tracing::warn!("Connection error: {}", e);
                        }
                    });
                }
                _ = reload_rx.recv() => break,
                _ = &mut timer => break,
                _ = tokio::signal::ctrl_c() => {
                    remove_descriptor(&options.project);
                    clients.shutdown().await;
                    return Ok(());
                }
            }
        }

        tracing::info!("Domain reload: dropping {} client(s)", clients.len());
        remove_descriptor(&options.project);
        drop(listener);
        clients.shutdown().await;
        tokio::time::sleep(COMPILE_PAUSE).await;

        let types = script_types(&options.project);
        tracing::info!("Compiled {} script type(s)", types.len());
        scene.write().await.set_compiled(types);
        port = 0;
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    scene: SharedScene,
    events: broadcast::Sender<BridgeMessage>,
    reload: mpsc::Sender<()>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();
    let mut pushed = events.subscribe();

    tracing::info!("Client connected from {}", addr);

    loop {
        tokio::select! {
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let request = BridgeMessage::from_json(text.as_str());
                let (id, category, action, params) = match request {
                    Ok(BridgeMessage::Request { id, category, action, params }) => {
                        (id, category, action, params)
                    }
                    Ok(other) => {
                        tracing::debug!("Ignoring {} from client", other.id());
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!("Unparsable frame: {}", e);
                        continue;
                    }
                };

                let reply = scene.write().await.handle(category, &action, &params);
                tracing::info!("{}.{} -> {}", category, action, reply.response.success);

                let level = if reply.response.success { "log" } else { "error" };
                let response = BridgeMessage::response(id, reply.response);
                sink.send(Message::Text(response.to_json()?.into())).await?;

                let _ = events.send(BridgeMessage::event(
                    CONSOLE_LOG_EVENT,
                    json!({"message": reply.log, "stackTrace": null, "type": level}),
                ));
                if let Some(state) = reply.play_mode {
                    let change = json!({"state": state});
                    let _ = events.send(BridgeMessage::event(PLAY_MODE_EVENT, change));
                }
                if reply.recompile {
                    let _ = reload.try_send(());
                }
            }

            event = pushed.recv() => match event {
                Ok(event) => sink.send(Message::Text(event.to_json()?.into())).await?,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Client {} disconnected", addr);
    Ok(())
}

/// File stems of every `*.cs` file under `project`.
fn script_types(project: &Path) -> HashSet<String> {
    walkdir::WalkDir::new(project)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("cs"))
        })
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .collect()
}

fn write_descriptor(project: &Path, port: u16) -> anyhow::Result<()> {
    let path = project.join(DESCRIPTOR_PATH);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let descriptor = DiscoveryDescriptor::new(port, std::process::id(), PROTOCOL_VERSION);
    std::fs::write(&path, descriptor.to_json()?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn remove_descriptor(project: &Path) {
    if let Err(e) = std::fs::remove_file(project.join(DESCRIPTOR_PATH)) {
        tracing::debug!("Descriptor not removed: {}", e);
    }
}
