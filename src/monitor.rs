// src/monitor.rs
//
// Per-Log Monitor (component F): the state machine that tails one CT log.
// States: INIT -> ANCHORED -> (POLLING <-> FETCHING <-> EMITTING) -> STOPPED.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::batcher::Batcher;
use crate::ct::decode_leaf;
use crate::ct::types::{GetEntriesResponse, SignedTreeHead};
use crate::cert::normalizer::normalize;
use crate::fetcher::Fetcher;
use crate::log_list::LogDescriptor;
use crate::seen_cache::SeenCache;

pub struct MonitorConfig {
    pub fetch_interval: std::time::Duration,
    pub batch_size: u64,
}

pub struct Monitor {
    log: LogDescriptor,
    fetcher: Fetcher,
    seen_cache: SeenCache,
    batcher: Batcher,
    config: MonitorConfig,
    stop_rx: watch::Receiver<bool>,
}

impl Monitor {
    pub fn new(
        log: LogDescriptor,
        fetcher: Fetcher,
        seen_cache: SeenCache,
        batcher: Batcher,
        config: MonitorConfig,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            log,
            fetcher,
            seen_cache,
            batcher,
            config,
            stop_rx,
        }
    }

    fn stopping(&self) -> bool {
        *self.stop_rx.borrow()
    }

    async fn get_sth(&self) -> Option<u64> {
        let url = format!("{}ct/v1/get-sth", self.log.base_url());
        let resp = self.fetcher.fetch(&url).await?;
        let sth: SignedTreeHead = resp.json().await.ok()?;
        Some(sth.tree_size)
    }

    async fn get_entries(&self, start: u64, end: u64) -> Option<Vec<(String, String)>> {
        let url = format!(
            "{}ct/v1/get-entries?start={start}&end={end}",
            self.log.base_url()
        );
        let resp = self.fetcher.fetch(&url).await?;
        let parsed: GetEntriesResponse = resp.json().await.ok()?;
        Some(
            parsed
                .entries
                .into_iter()
                .map(|e| (e.leaf_input, e.extra_data))
                .collect(),
        )
    }

    /// Runs until the stop signal is observed or INIT fails. Consumes
    /// `self` since a Monitor never resumes once it returns — the
    /// Supervisor does not restart an abandoned log.
    pub async fn run(mut self) {
        let description = self.log.description.clone();

        // INIT
        let Some(tree_size) = self.get_sth().await else {
            warn!(log = %description, "INIT failed, abandoning this log");
            return;
        };
        let mut next_index = tree_size;
        info!(log = %description, tree_size, "anchored");

        let mut first_poll = true;
        loop {
            if self.stopping() {
                break;
            }

            if !first_poll {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.fetch_interval) => {}
                    _ = self.stop_rx.changed() => {}
                }
                if self.stopping() {
                    break;
                }
            }
            first_poll = false;

            let current_size = match self.get_sth().await {
                Some(size) => size,
                None => next_index,
            };

            if current_size < next_index {
                warn!(
                    log = %description,
                    current_size,
                    next_index,
                    "tree_size decreased, resetting progress"
                );
                next_index = current_size;
                continue;
            }
            if current_size == next_index {
                continue;
            }

            // FETCHING / EMITTING within this window.
            let mut start = next_index;
            let mut end = (current_size - 1).min(start + self.config.batch_size - 1);

            loop {
                if self.stopping() {
                    self.batcher.flush().await;
                    debug!(log = %description, "stop signal observed mid-batch, flushed and exiting");
                    return;
                }

                match self.get_entries(start, end).await {
                    None => {
                        self.batcher.flush().await;
                        debug!(log = %description, start, end, "get-entries failed, deferring to next poll");
                        break;
                    }
                    Some(entries) if entries.is_empty() => {
                        self.batcher.flush().await;
                        debug!(log = %description, start, end, "empty entries response, deferring to next poll");
                        break;
                    }
                    Some(entries) => {
                        let mut emitted = 0u64;
                        for (i, (leaf_input, extra_data)) in entries.iter().enumerate() {
                            let idx = start + i as u64;
                            let Some(decoded) = decode_leaf(leaf_input, extra_data) else {
                                continue;
                            };
                            let entry_type = decoded.entry_type;
                            if let Some(record) = normalize(
                                &decoded.leaf_der,
                                &decoded.chain_der,
                                &self.log.base_url(),
                                &description,
                                idx,
                                entry_type,
                                &self.seen_cache,
                            ) {
                                self.batcher.add(record).await;
                                emitted += 1;
                            }
                        }
                        debug!(log = %description, start, end, emitted, "batch emitted");

                        next_index = end + 1;
                        start = end + 1;
                        end = (current_size - 1).min(start + self.config.batch_size - 1);
                        if start <= end {
                            continue;
                        }
                        self.batcher.flush().await;
                        break;
                    }
                }
            }
        }

        self.batcher.flush().await;
        info!(log = %description, "monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Sink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Sink for CountingSink {
        async fn bulk_index(
            &self,
            _collection: &str,
            records: &[crate::cert::CertificateRecord],
        ) -> anyhow::Result<(usize, usize)> {
            self.count.fetch_add(records.len(), Ordering::SeqCst);
            Ok((records.len(), 0))
        }
    }

    fn log_descriptor(url: String) -> LogDescriptor {
        LogDescriptor {
            description: "Test Log".into(),
            url,
            temporal_interval: None,
        }
    }

    #[tokio::test]
    async fn empty_log_emits_nothing_and_stops_cleanly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tree_size": 0})))
            .mount(&server)
            .await;

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CountingSink { count: count.clone() });
        let (stop_tx, stop_rx) = watch::channel(false);

        let monitor = Monitor::new(
            log_descriptor(server.uri()),
            Fetcher::new(Duration::from_secs(5)).unwrap(),
            SeenCache::new(100, Duration::from_secs(60)),
            Batcher::new(sink, "certificates".into(), 256),
            MonitorConfig {
                fetch_interval: Duration::from_millis(10),
                batch_size: 256,
            },
            stop_rx,
        );

        let handle = tokio::spawn(monitor.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn init_failure_abandons_log_without_panicking() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CountingSink { count: count.clone() });
        let (_stop_tx, stop_rx) = watch::channel(false);

        let monitor = Monitor::new(
            log_descriptor(server.uri()),
            Fetcher::new(Duration::from_secs(5)).unwrap(),
            SeenCache::new(100, Duration::from_secs(60)),
            Batcher::new(sink, "certificates".into(), 256),
            MonitorConfig {
                fetch_interval: Duration::from_millis(10),
                batch_size: 256,
            },
            stop_rx,
        );

        monitor.run().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tree_growth_triggers_get_entries_with_expected_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tree_size": 3})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tree_size": 5})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-entries"))
            .and(query_param("start", "3"))
            .and(query_param("end", "4"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"entries": []})),
            )
            .mount(&server)
            .await;

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CountingSink { count: count.clone() });
        let (stop_tx, stop_rx) = watch::channel(false);

        let monitor = Monitor::new(
            log_descriptor(server.uri()),
            Fetcher::new(Duration::from_secs(5)).unwrap(),
            SeenCache::new(100, Duration::from_secs(60)),
            Batcher::new(sink, "certificates".into(), 256),
            MonitorConfig {
                fetch_interval: Duration::from_millis(10),
                batch_size: 256,
            },
            stop_rx,
        );

        let handle = tokio::spawn(monitor.run());
        tokio::time::sleep(Duration::from_millis(80)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();
        // Entries happened to be empty, but the windowed request landing
        // on start=3/end=4 is what we're asserting via the mock match.
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
