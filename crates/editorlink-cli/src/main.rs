mod cli;
mod commands;
mod settings;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("editorlink={}", cli.log_level).parse()?)
                .add_directive(format!("editorlink_client={}", cli.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = settings::resolve(&cli)?;
    commands::run(cli, config).await
}
