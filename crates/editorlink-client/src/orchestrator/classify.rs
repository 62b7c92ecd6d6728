//! Recognising failures caused by code the editor has not compiled yet.

use crate::config::RetryConfig;
use crate::error::ConfigError;
use editorlink_core::CommandResponse;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Source files written during this session, tracked by file stem.
#[derive(Debug, Clone, Default)]
pub struct SessionFiles {
    extensions: Vec<String>,
    stems: HashSet<String>,
}

impl SessionFiles {
    /// Track files with the given extensions (without the dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            stems: HashSet::new(),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.source_extensions.iter().cloned())
    }

    /// Record a written file. Returns false if its extension is not tracked.
    pub fn record(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let tracked = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return false;
        };
        if tracked {
            self.stems.insert(stem.to_string());
        }
        tracked
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.stems.contains(type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

/// Compiled retry settings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    patterns: Vec<Regex>,
    pub reload_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Result<Self, ConfigError> {
        let patterns = config
            .patterns
            .iter()
            .map(|pattern| {
                let regex = Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                if regex.captures_len() < 2 {
                    return Err(ConfigError::PatternWithoutCapture(pattern.clone()));
                }
                Ok(regex)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            patterns,
            reload_timeout: config.reload_timeout,
        })
    }

    pub fn with_reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = timeout;
        self
    }

    /// The type name behind a failure, if the failure looks like "type not
    /// compiled yet" and the type matches a file written this session.
    pub fn pending_type(&self, response: &CommandResponse, files: &SessionFiles) -> Option<String> {
        if response.success {
            return None;
        }
        let error = response.error_text();
        self.patterns
            .iter()
            .filter_map(|pattern| pattern.captures(error))
            .filter_map(|captures| captures.get(1))
            .map(|name| unqualified(name.as_str()))
            .find(|name| files.contains(name))
            .map(str::to_string)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            patterns: crate::config::DEFAULT_RETRY_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
            reload_timeout: editorlink_core::COMPILE_WAIT_TIMEOUT,
        }
    }
}

/// `Game.Player.Mover` -> `Mover`.
fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
