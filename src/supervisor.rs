// src/supervisor.rs
//
// Supervisor (component H): loads the log directory, owns the Seen-Cache
// and the shutdown signal, spawns one Monitor per log, and blocks until
// all Monitors return.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::batcher::Batcher;
use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::log_list::{filter_current, LogListLoader};
use crate::monitor::{Monitor, MonitorConfig};
use crate::seen_cache::SeenCache;
use crate::sink::Sink;

pub struct Supervisor {
    config: Config,
    sink: Arc<dyn Sink>,
}

impl Supervisor {
    pub fn new(config: Config, sink: Arc<dyn Sink>) -> Self {
        Self { config, sink }
    }

    /// Loads the log directory, spawns one Monitor per usable and
    /// temporally current log, and waits for them all to finish. Returns
    /// an error only for fatal startup conditions (empty log list); a
    /// clean shutdown via the stop signal returns `Ok(())`.
    pub async fn run(&self) -> Result<()> {
        let loader = LogListLoader::new(
            Fetcher::new(self.config.request_timeout()).context("failed to build HTTP client")?,
        );

        let descriptors = loader
            .load(&self.config.ct_log_list_url, self.config.include_readonly)
            .await;
        let descriptors = filter_current(descriptors, Utc::now());
        if descriptors.is_empty() {
            bail!("log directory is empty after filtering, refusing to start");
        }
        info!(count = descriptors.len(), "loaded CT log directory");

        let seen_cache = SeenCache::new(self.config.cache_maxsize, self.config.cache_ttl());
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut handles = Vec::with_capacity(descriptors.len());
        for log in descriptors {
            let monitor_fetcher =
                Fetcher::new(self.config.request_timeout()).context("failed to build HTTP client")?;
            let batcher = Batcher::new(
                self.sink.clone(),
                self.config.sink_collection.clone(),
                self.config.batch_size as usize,
            );
            let monitor = Monitor::new(
                log,
                monitor_fetcher,
                seen_cache.clone(),
                batcher,
                MonitorConfig {
                    fetch_interval: self.config.fetch_interval(),
                    batch_size: self.config.batch_size as u64,
                },
                stop_rx.clone(),
            );
            handles.push(tokio::spawn(monitor.run()));
        }

        tokio::spawn(wait_for_shutdown_signal(stop_tx));

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(%err, "a monitor task panicked");
            }
        }

        Ok(())
    }
}

/// Sets the stop signal on SIGINT/SIGTERM (unix) or Ctrl-C (all
/// platforms), mirroring the original implementation's signal handlers
/// (`src/main.py`) which the teacher's own `main.rs` never wired up.
async fn wait_for_shutdown_signal(stop_tx: watch::Sender<bool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
    let _ = stop_tx.send(true);
}

/// Bound referenced by the testable property "every worker returns within
/// `fetch_interval + request_timeout + ε`" — exposed so the binary and
/// tests can reason about an expected shutdown deadline.
pub fn shutdown_bound(fetch_interval: Duration, request_timeout: Duration) -> Duration {
    fetch_interval + request_timeout + Duration::from_secs(5)
}
