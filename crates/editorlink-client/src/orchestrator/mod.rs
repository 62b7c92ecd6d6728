//! Reload-aware batch execution.
//!
//! Commands often reference a component the caller has just written to disk.
//! The editor only knows the type once it has recompiled, which it signals by
//! dropping and re-opening its listener. A batch runs sequentially; failures
//! that look like "type not compiled yet" are parked, the orchestrator waits
//! for one disconnect/reconnect cycle, then retries them exactly once.

mod classify;

pub use classify::{RetryPolicy, SessionFiles};

use crate::connection::BridgeClient;
use crate::error::BridgeError;
use editorlink_core::{BridgeCommand, CommandResponse, ConnectionState};
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// What the orchestrator needs from a connection.
pub trait CommandTransport {
    fn execute(
        &self,
        command: &BridgeCommand,
    ) -> impl Future<Output = Result<CommandResponse, BridgeError>> + Send;

    fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState>;
}

impl CommandTransport for BridgeClient {
    fn execute(
        &self,
        command: &BridgeCommand,
    ) -> impl Future<Output = Result<CommandResponse, BridgeError>> + Send {
        BridgeClient::execute(self, command)
    }

    fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        BridgeClient::subscribe_state(self)
    }
}

pub struct CommandOrchestrator<'a, T> {
    transport: &'a T,
    policy: RetryPolicy,
}

impl<'a, T: CommandTransport> CommandOrchestrator<'a, T> {
    pub fn new(transport: &'a T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Run `commands` in order and return one result per command, in order.
    ///
    /// Transport errors become failure results. `written` names the source
    /// files the caller wrote this session.
    pub async fn execute_batch(
        &self,
        commands: &[BridgeCommand],
        written: &SessionFiles,
    ) -> Vec<CommandResponse> {
        let mut states = self.transport.subscribe_state();
        let mut results = Vec::with_capacity(commands.len());
        let mut parked = Vec::new();

        for (index, command) in commands.iter().enumerate() {
            let response = self.run(command).await;
            if let Some(type_name) = self.policy.pending_type(&response, written) {
                if parked.is_empty() {
                    // Only a reload that starts after the first such failure counts.
                    drain(&mut states);
                }
                tracing::info!(
                    command = %command.label(),
                    %type_name,
                    "command references a type the editor has not compiled yet"
                );
                parked.push(index);
            }
            results.push(response);
        }

        if parked.is_empty() {
            return results;
        }

        let timeout = self.policy.reload_timeout;
        if wait_for_reload(&mut states, timeout).await {
            tracing::info!(retrying = parked.len(), "editor reloaded, retrying parked commands");
        } else {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                retrying = parked.len(),
                "no editor reload observed, retrying anyway"
            );
        }

        for index in parked {
            let command = &commands[index];
            match self.transport.execute(command).await {
                Ok(response) => results[index] = response,
                Err(e) => tracing::warn!(
                    command = %command.label(),
                    error = %e,
                    "retry could not reach the editor, keeping the original failure"
                ),
            }
        }
        results
    }

    async fn run(&self, command: &BridgeCommand) -> CommandResponse {
        match self.transport.execute(command).await {
            Ok(response) => response,
            Err(e) => CommandResponse::failure(e.to_string()),
        }
    }
}

fn drain(states: &mut broadcast::Receiver<ConnectionState>) {
    loop {
        match states.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

/// Wait for a transition into a down state followed by one into `Connected`.
async fn wait_for_reload(
    states: &mut broadcast::Receiver<ConnectionState>,
    timeout: Duration,
) -> bool {
    let cycle = async {
        let mut went_down = false;
        loop {
            match states.recv().await {
                Ok(ConnectionState::Connected) if went_down => return true,
                Ok(state) if state.is_down() => went_down = true,
                Ok(_) => {}
                // Missed transitions imply the connection moved.
                Err(RecvError::Lagged(_)) => went_down = true,
                Err(RecvError::Closed) => return false,
            }
        }
    };
    tokio::time::timeout(timeout, cycle).await.unwrap_or(false)
}
