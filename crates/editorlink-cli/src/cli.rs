//! Command-line arguments.

use clap::{Parser, Subcommand};
use editorlink_core::Category;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "editorlink",
    version,
    about = "Drive a running game editor over the EditorLink bridge"
)]
pub struct Cli {
    /// Project root the editor writes its descriptor under.
    #[arg(long, short = 'p', env = "EDITORLINK_PROJECT", default_value = ".")]
    pub project: PathBuf,

    /// Config file. Defaults to `<project>/editorlink.toml` when it exists.
    #[arg(long, env = "EDITORLINK_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "EDITORLINK_COMMAND_TIMEOUT_MS")]
    pub command_timeout_ms: Option<u64>,

    #[arg(long, env = "EDITORLINK_MAX_RECONNECT_ATTEMPTS")]
    pub max_reconnect_attempts: Option<u32>,

    #[arg(long, env = "EDITORLINK_RELOAD_TIMEOUT_MS")]
    pub reload_timeout_ms: Option<u64>,

    /// How long to wait for the first connection before giving up.
    #[arg(long, env = "EDITORLINK_CONNECT_WAIT_MS", default_value_t = 10_000)]
    pub connect_wait_ms: u64,

    /// Default log level for EditorLink crates; `RUST_LOG` still applies.
    #[arg(long, env = "EDITORLINK_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Report whether an editor is currently announced.
    Status,
    /// Send a single command and print the response.
    Send {
        category: Category,
        action: String,
        /// JSON object of parameters.
        params: Option<String>,
    },
    /// Run a JSON array of commands, retrying ones that need a recompile.
    Batch {
        file: PathBuf,
        /// Source file written this session (repeatable).
        #[arg(long = "wrote")]
        wrote: Vec<PathBuf>,
    },
    /// Print state changes, console output and play-mode changes until Ctrl-C.
    Watch,
}
