//! Discovery poller.
//!
//! Reads the descriptor the editor writes under the project root. Absence,
//! unreadable files and stale entries all mean "editor not running" and are
//! never reported as errors.

use crate::config::BridgeConfig;
use crate::stop::{StopSignal, is_stopped, sleep_or_stop};
use editorlink_core::{DiscoveryDescriptor, PROTOCOL_VERSION};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DiscoveryPoller {
    descriptor_file: PathBuf,
    poll_interval: Duration,
    stale_after: Duration,
}

impl DiscoveryPoller {
    pub fn new(project_root: impl AsRef<Path>, config: &BridgeConfig) -> Self {
        Self {
            descriptor_file: project_root.as_ref().join(&config.descriptor_path),
            poll_interval: config.poll_interval,
            stale_after: config.stale_after,
        }
    }

    pub fn descriptor_file(&self) -> &Path {
        &self.descriptor_file
    }

    /// One read of the descriptor. `None` whenever no usable editor is announced.
    pub async fn read_once(&self) -> Option<DiscoveryDescriptor> {
        let text = match tokio::fs::read_to_string(&self.descriptor_file).await {
            Ok(text) => text,
            Err(e) => {
                let path = self.descriptor_file.display();
                tracing::trace!(%path, error = %e, "no descriptor");
                return None;
            }
        };

        let descriptor = match DiscoveryDescriptor::parse(&text) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                let path = self.descriptor_file.display();
                tracing::debug!(%path, error = %e, "ignoring unusable descriptor");
                return None;
            }
        };

        if descriptor.is_stale(self.stale_after) {
            tracing::debug!(
                pid = descriptor.pid,
                timestamp = descriptor.timestamp,
                "ignoring stale descriptor"
            );
            return None;
        }

        if descriptor.version != PROTOCOL_VERSION {
            tracing::warn!(
                editor_version = %descriptor.version,
                client_version = PROTOCOL_VERSION,
                "editor announces a different protocol version, connecting anyway"
            );
        }

        Some(descriptor)
    }

    /// Poll until a descriptor appears or a stop is requested.
    ///
    /// With `delay_first` the first read happens one interval from now, which
    /// keeps a refused handshake from turning into a tight retry loop.
    pub(crate) async fn wait_for_descriptor(
        &self,
        stop: &mut StopSignal,
        delay_first: bool,
    ) -> Option<DiscoveryDescriptor> {
        if delay_first && !sleep_or_stop(self.poll_interval, stop).await {
            return None;
        }
        loop {
            if is_stopped(stop) {
                return None;
            }
            if let Some(descriptor) = self.read_once().await {
                tracing::debug!(port = descriptor.port, pid = descriptor.pid, "editor discovered");
                return Some(descriptor);
            }
            if !sleep_or_stop(self.poll_interval, stop).await {
                return None;
            }
        }
    }
}
