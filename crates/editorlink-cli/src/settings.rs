//! Config layering: defaults, then the TOML file, then flags and environment.

use crate::cli::Cli;
use anyhow::Context;
use editorlink_client::BridgeConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "editorlink.toml";

/// Flag values that override the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub command_timeout_ms: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
    pub reload_timeout_ms: Option<u64>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            command_timeout_ms: cli.command_timeout_ms,
            max_reconnect_attempts: cli.max_reconnect_attempts,
            reload_timeout_ms: cli.reload_timeout_ms,
        }
    }
}

pub fn resolve(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    load(&cli.project, cli.config.as_deref(), Overrides::from(cli))
}

pub fn load(
    project: &Path,
    explicit: Option<&Path>,
    overrides: Overrides,
) -> anyhow::Result<BridgeConfig> {
    let mut config = match config_path(project, explicit) {
        Some(path) => BridgeConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    if let Some(ms) = overrides.command_timeout_ms {
        config.command_timeout = Duration::from_millis(ms);
    }
    if let Some(attempts) = overrides.max_reconnect_attempts {
        config.max_reconnect_attempts = attempts;
    }
    if let Some(ms) = overrides.reload_timeout_ms {
        config.retry.reload_timeout = Duration::from_millis(ms);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn config_path(project: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let implicit = project.join(CONFIG_FILE);
    implicit.is_file().then_some(implicit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path(), None, Overrides::default()).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn project_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_reconnect_attempts = 4").unwrap();
        let config = load(dir.path(), None, Overrides::default()).unwrap();
        assert_eq!(config.max_reconnect_attempts, 4);
    }

    #[rstest]
    #[case(Overrides { max_reconnect_attempts: Some(1), ..Overrides::default() }, 1)]
    #[case(Overrides::default(), 4)]
    fn flags_beat_the_file(#[case] overrides: Overrides, #[case] expected: u32) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_reconnect_attempts = 4").unwrap();
        let config = load(dir.path(), None, overrides).unwrap();
        assert_eq!(config.max_reconnect_attempts, expected);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load(dir.path(), Some(&missing), Overrides::default()).is_err());
    }

    #[test]
    fn zero_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            command_timeout_ms: Some(0),
            ..Overrides::default()
        };
        assert!(load(dir.path(), None, overrides).is_err());
    }
}
