//! Stand-in editor for trying the bridge without a real one.
//!
//! Writes `.editorlink/bridge.json` under the project root, answers a small
//! set of scene commands and pushes console and play-mode events. Sending
//! `editor.recompile` (or passing `--reload-every`) simulates a domain
//! reload: every client is dropped, `*.cs` files under the project become
//! known component types, and the listener comes back on a new port.
//!
//!   cargo run -p editorlink-mock-editor -- --project /tmp/game
//!   cargo run -p editorlink-cli -- --project /tmp/game send gameObject create '{"name":"Player"}'

mod scene;
mod server;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("editorlink_mock_editor=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = server::Options {
        project: parse_arg::<PathBuf>(&args, "--project").unwrap_or_else(|| PathBuf::from(".")),
        port: parse_arg(&args, "--port").unwrap_or(0),
        reload_every: parse_arg(&args, "--reload-every").map(Duration::from_secs),
    };

    tracing::info!(project = %options.project.display(), "starting mock editor");
    server::run(options).await
}

fn parse_arg<T: FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
