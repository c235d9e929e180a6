//! Config file hot reload

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::{interval, Duration};
use tracing::{error, info};
use upline_commission::CommissionEngine;
use upline_core::EngineConfig;

/// Detects config file changes by modification time and size
pub struct ConfigWatcher {
    path: PathBuf,
    seen: Option<(SystemTime, u64)>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf) -> Self {
        let seen = Self::stamp(&path);
        Self { path, seen }
    }

    fn stamp(path: &PathBuf) -> Option<(SystemTime, u64)> {
        let meta = std::fs::metadata(path).ok()?;
        Some((meta.modified().ok()?, meta.len()))
    }

    /// The new configuration if the file changed since the last poll.
    /// A file that changed but fails to parse or validate is an error and is
    /// not retried until it changes again.
    pub fn poll(&mut self) -> anyhow::Result<Option<EngineConfig>> {
        let stamp = Self::stamp(&self.path);
        if stamp.is_none() || stamp == self.seen {
            return Ok(None);
        }
        self.seen = stamp;
        Ok(Some(EngineConfig::load_from_file(&self.path)?))
    }
}

/// Poll the config file and push changes into the engine
pub async fn watch(engine: Arc<CommissionEngine>, path: PathBuf, poll_secs: u64) {
    let mut watcher = ConfigWatcher::new(path);
    let mut ticker = interval(Duration::from_secs(poll_secs.max(1)));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match watcher.poll() {
            Ok(Some(config)) => match engine.refresh_config(config) {
                Ok(()) => info!("[CONFIG] Reloaded {}", watcher.path.display()),
                Err(e) => error!("[CONFIG] Rejected new configuration: {}", e),
            },
            Ok(None) => {}
            Err(e) => error!("[CONFIG] Failed to reload {}: {}", watcher.path.display(), e),
        }
    }
}
