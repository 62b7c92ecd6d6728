//! Connection state machine.

use super::Shared;
use super::session::{self, SessionEnd, Socket};
use crate::stop::{StopSignal, sleep_or_stop, stopped};
use editorlink_core::{ConnectionState, DiscoveryDescriptor};
use std::sync::Arc;

enum Attempt {
    Connected(Socket),
    Failed,
    Stopped,
}

/// Driver task body. Returns once stopped, leaving the state `Disconnected`.
pub(super) async fn run(shared: Arc<Shared>, mut stop: StopSignal) {
    let mut delay_first = false;

    'discovery: loop {
        let Some(descriptor) = shared
            .discovery
            .wait_for_descriptor(&mut stop, delay_first)
            .await
        else {
            break;
        };
        delay_first = true;

        let mut socket = match attempt(&shared, &descriptor, &mut stop).await {
            Attempt::Connected(socket) => socket,
            Attempt::Failed => {
                shared.set_state(ConnectionState::Disconnected);
                continue;
            }
            Attempt::Stopped => break,
        };

        loop {
            if let SessionEnd::Stopped = session::serve(&shared, socket, &mut stop).await {
                break 'discovery;
            }
            match reconnect(&shared, &mut stop).await {
                Attempt::Connected(next) => socket = next,
                Attempt::Failed => {
                    shared.set_state(ConnectionState::Disconnected);
                    continue 'discovery;
                }
                Attempt::Stopped => break 'discovery,
            }
        }
    }

    shared.correlator.fail_all();
    shared.set_state(ConnectionState::Disconnected);
    tracing::debug!("bridge driver stopped");
}

/// One handshake against the announced endpoint.
async fn attempt(
    shared: &Shared,
    descriptor: &DiscoveryDescriptor,
    stop: &mut StopSignal,
) -> Attempt {
    shared.set_state(ConnectionState::Connecting);
    let url = descriptor.url();
    tracing::debug!(%url, pid = descriptor.pid, "connecting to editor");

    let handshake = tokio::time::timeout(
        shared.config.handshake_timeout,
        tokio_tungstenite::connect_async(url.as_str()),
    );
    tokio::select! {
        _ = stopped(stop) => Attempt::Stopped,
        outcome = handshake => match outcome {
            Ok(Ok((socket, _))) => {
                tracing::info!(port = descriptor.port, pid = descriptor.pid, "connected to editor");
                Attempt::Connected(socket)
            }
            Ok(Err(e)) => {
                tracing::debug!(%url, error = %e, "handshake failed");
                Attempt::Failed
            }
            Err(_) => {
                tracing::debug!(%url, "handshake timed out");
                Attempt::Failed
            }
        },
    }
}

/// Bounded retry after a lost connection. The descriptor is re-read on every
/// attempt since the editor rebinds on a new port after each reload.
async fn reconnect(shared: &Shared, stop: &mut StopSignal) -> Attempt {
    let max = shared.config.max_reconnect_attempts;
    for number in 1..=max {
        shared.set_state(ConnectionState::Reconnecting);
        if !sleep_or_stop(shared.config.reconnect_delay, stop).await {
            return Attempt::Stopped;
        }
        tracing::debug!(attempt = number, max, "reconnect attempt");

        let Some(descriptor) = shared.discovery.read_once().await else {
            continue;
        };
        match attempt(shared, &descriptor, stop).await {
            Attempt::Connected(socket) => return Attempt::Connected(socket),
            Attempt::Failed => continue,
            Attempt::Stopped => return Attempt::Stopped,
        }
    }
    tracing::info!(
        attempts = max,
        "reconnect attempts exhausted, waiting for the editor to reappear"
    );
    Attempt::Failed
}
