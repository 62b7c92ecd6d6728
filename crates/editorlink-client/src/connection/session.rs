//! One live connection: read loop plus writer task.

use super::Shared;
use crate::stop::{StopSignal, stopped};
use editorlink_core::ConnectionState;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub(super) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long the writer gets to flush a close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub(super) enum SessionEnd {
    /// The transport went away.
    Closed,
    /// A stop was requested.
    Stopped,
}

/// Serve the connection until it closes or a stop is requested. Pending
/// requests are failed before the transport is closed.
pub(super) async fn serve(shared: &Shared, socket: Socket, stop: &mut StopSignal) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();
    shared.install_outbound(outbound);
    shared.set_state(ConnectionState::Connected);

    let writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                tracing::debug!(error = %e, "write to editor failed");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let end = loop {
        tokio::select! {
            _ = stopped(stop) => break SessionEnd::Stopped,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.dispatch_frame(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "editor closed the connection");
                    break SessionEnd::Closed;
                }
                // Ping/pong are answered by tungstenite. Binary frames are not protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "connection error");
                    break SessionEnd::Closed;
                }
                None => break SessionEnd::Closed,
            },
        }
    };

    let outbound = shared.take_outbound();
    let failed = shared.correlator.fail_all();
    if let SessionEnd::Closed = end {
        tracing::info!(failed_requests = failed, "connection to editor lost");
    }
    if let Some(outbound) = outbound {
        let _ = outbound.send(Message::Close(None));
    }

    let abort = writer.abort_handle();
    if tokio::time::timeout(CLOSE_GRACE, writer).await.is_err() {
        abort.abort();
    }
    end
}
