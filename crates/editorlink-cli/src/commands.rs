//! Subcommand implementations.

use crate::cli::{Cli, Command};
use anyhow::{Context, anyhow, bail};
use editorlink_client::{
    BridgeClient, BridgeConfig, CommandOrchestrator, DiscoveryPoller, RetryPolicy,
    SessionFiles, wait_until_connected,
};
use editorlink_core::{BridgeCommand, CommandResponse};
use serde_json::Value;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

pub async fn run(cli: Cli, config: BridgeConfig) -> anyhow::Result<ExitCode> {
    let connect_wait = Duration::from_millis(cli.connect_wait_ms);
    match cli.command {
        Command::Status => status(&cli.project, &config).await,
        Command::Send {
            category,
            action,
            params,
        } => {
            let params = parse_params(params.as_deref())?;
            let command = BridgeCommand::new(category, action, params);
            let client = connected_client(&cli.project, config, connect_wait).await?;
            let outcome = client.execute(&command).await;
            client.shutdown().await;
            let response = outcome.with_context(|| format!("sending {}", command.label()))?;
            print_json(&response)?;
            Ok(exit_code(std::slice::from_ref(&response)))
        }
        Command::Batch { file, wrote } => {
            let commands = read_batch(&file)?;
            let mut written = SessionFiles::from_config(&config.retry);
            for path in &wrote {
                if !written.record(path) {
                    tracing::debug!(path = %path.display(), "not a tracked source file");
                }
            }
            let policy = RetryPolicy::from_config(&config.retry)?;
            let client = connected_client(&cli.project, config, connect_wait).await?;
            let results = CommandOrchestrator::new(&client, policy)
                .execute_batch(&commands, &written)
                .await;
            client.shutdown().await;
            print_json(&results)?;
            Ok(exit_code(&results))
        }
        Command::Watch => watch(&cli.project, config).await,
    }
}

async fn status(project: &Path, config: &BridgeConfig) -> anyhow::Result<ExitCode> {
    let discovery = DiscoveryPoller::new(project, config);
    match discovery.read_once().await {
        Some(descriptor) => {
            println!("{}", descriptor.to_json()?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!(
                "editor not running (no usable descriptor at {})",
                discovery.descriptor_file().display()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn connected_client(
    project: &Path,
    config: BridgeConfig,
    wait: Duration,
) -> anyhow::Result<BridgeClient> {
    let client = BridgeClient::new(project, config);
    client.connect();
    if !wait_until_connected(&client, wait).await {
        client.shutdown().await;
        bail!(
            "no editor connected within {}ms (descriptor: {})",
            wait.as_millis(),
            client.discovery().descriptor_file().display()
        );
    }
    Ok(client)
}

async fn watch(project: &Path, config: BridgeConfig) -> anyhow::Result<ExitCode> {
    let client = BridgeClient::new(project, config);
    let mut states = client.subscribe_state();
    let mut logs = client.subscribe_console_logs();
    let mut play = client.subscribe_play_mode();
    client.connect();
    println!("watching {}", client.discovery().descriptor_file().display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            state = states.recv() => match state {
                Ok(state) => println!("[state] {state}"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            Some(log) = logs.recv() => println!("[{:?}] {}", log.level, log.message),
            Some(change) = play.recv() => println!("[play] {:?}", change.state),
        }
    }

    client.shutdown().await;
    Ok(ExitCode::SUCCESS)
}

fn parse_params(raw: Option<&str>) -> anyhow::Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let value: Value = serde_json::from_str(raw).context("params must be JSON")?;
    if !value.is_object() {
        return Err(anyhow!("params must be a JSON object, got {value}"));
    }
    Ok(value)
}

fn read_batch(path: &Path) -> anyhow::Result<Vec<BridgeCommand>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(results: &[CommandResponse]) -> ExitCode {
    if results.iter().all(|r| r.success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
