use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use crate::catalog::{loader, Catalog};
use crate::prober::Prober;
use crate::state_manager::StateHandle;

/// Drives refresh cycles: reprobe now, then reload and reprobe on every tick.
pub struct Scheduler {
    source: String,
    interval: Duration,
    client: reqwest::Client,
    prober: Prober,
    state: StateHandle,
    catalog_tx: watch::Sender<Arc<Catalog>>,
}

impl Scheduler {
    pub fn new(
        source: String,
        interval: Duration,
        client: reqwest::Client,
        prober: Prober,
        state: StateHandle,
        catalog_tx: watch::Sender<Arc<Catalog>>,
    ) -> Self {
        Self {
            source,
            interval,
            client,
            prober,
            state,
            catalog_tx,
        }
    }

    /// Refresh loop. The catalog already published on `catalog_tx` is probed
    /// immediately; cycles never overlap.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            let catalog = self.catalog_tx.borrow().clone();

            tokio::select! {
                published = self.prober.probe_all(&catalog, &self.state) => {
                    tracing::info!("Refresh cycle finished, {}/{} services published", published, catalog.len());
                }
                _ = cancel.cancelled() => break,
            }

            // next reload is one full interval after this cycle finished
            ticker.reset();

            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => break,
            }

            self.reload().await;
        }

        tracing::info!("Scheduler shutting down");
        Ok(())
    }

    /// Swap in a freshly loaded catalog; on failure the previous one stays.
    /// Returns whether a new catalog was installed.
    async fn reload(&self) -> bool {
        let catalog = match loader::load(&self.client, &self.source).await {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                tracing::error!("Failed to reload catalog, keeping previous: {:#}", e);
                return false;
            }
        };

        if catalog.hash() == self.catalog_tx.borrow().hash() {
            tracing::debug!("Catalog unchanged");
        } else {
            tracing::info!("Catalog changed: {} services, hash {}", catalog.len(), catalog.hash());
        }

        // prune first so the router never pairs the new catalog with records of dropped groups
        match self.state.prune(catalog.clone()).await {
            Ok(0) => {}
            Ok(changed) => tracing::info!("Trimmed availability for {} changed services", changed),
            Err(e) => tracing::error!("Failed to prune availability table: {}", e),
        }

        self.catalog_tx.send_replace(catalog);

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Instant;
    use axum::http::StatusCode;
    use crate::config::ProbeConfig;
    use crate::test_support::{spawn_silent, spawn_status, url};

    fn catalog_json(entries: &[(&str, String)]) -> String {
        let entries: Vec<String> = entries
            .iter()
            .map(|(t, instance)| {
                format!(
                    r#"{{"type": "{}", "test_url": "/", "fallback": "", "instances": ["{}"]}}"#,
                    t, instance
                )
            })
            .collect();
        format!("[{}]", entries.join(","))
    }

    async fn start(
        path: &Path,
        interval: Duration,
    ) -> (StateHandle, watch::Receiver<Arc<Catalog>>, CancellationToken, tokio::task::JoinHandle<Result<()>>) {
        start_with_probe(path, interval, ProbeConfig::default()).await
    }

    async fn start_with_probe(
        path: &Path,
        interval: Duration,
        probe: ProbeConfig,
    ) -> (StateHandle, watch::Receiver<Arc<Catalog>>, CancellationToken, tokio::task::JoinHandle<Result<()>>) {
        let client = reqwest::Client::new();
        let source = path.to_str().unwrap().to_string();
        let catalog = loader::load(&client, &source).await.unwrap();
        let (catalog_tx, catalog_rx) = watch::channel(Arc::new(catalog));

        let prober = Prober::new(&probe).unwrap();
        let state = StateHandle::spawn();
        let scheduler = Scheduler::new(source, interval, client, prober, state.clone(), catalog_tx);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));
        (state, catalog_rx, cancel, handle)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        let started = Instant::now();
        while !condition() {
            assert!(started.elapsed() < Duration::from_secs(5), "condition not reached");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_first_cycle_runs_immediately() {
        let ok = spawn_status(StatusCode::OK).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, catalog_json(&[("search", url(ok))])).unwrap();

        let (state, _catalog_rx, cancel, handle) = start(&path, Duration::from_secs(300)).await;

        wait_for(|| state.read("search").is_some()).await;
        assert!(state.read("search").unwrap()[0].available);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes_and_prunes() {
        let ok = spawn_status(StatusCode::OK).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, catalog_json(&[("search", url(ok))])).unwrap();

        let (state, catalog_rx, cancel, handle) = start(&path, Duration::from_millis(200)).await;
        wait_for(|| state.read("search").is_some()).await;

        std::fs::write(&path, catalog_json(&[("video", url(ok))])).unwrap();

        wait_for(|| state.read("video").is_some()).await;
        assert!(state.read("search").is_none());
        assert!(catalog_rx.borrow().get("video").is_some());
        assert!(catalog_rx.borrow().get("search").is_none());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_catalog() {
        let ok = spawn_status(StatusCode::OK).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, catalog_json(&[("search", url(ok))])).unwrap();

        let (state, catalog_rx, cancel, handle) = start(&path, Duration::from_millis(100)).await;
        wait_for(|| state.read("search").is_some()).await;
        let first_check = state.read("search").unwrap()[0].checked_at;

        std::fs::write(&path, "not a catalog").unwrap();

        // later cycles still reprobe the retained catalog
        wait_for(|| state.read("search").is_some_and(|r| r[0].checked_at > first_check)).await;
        assert!(catalog_rx.borrow().get("search").is_some());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_interval_counts_from_end_of_cycle() {
        let silent = spawn_silent().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, catalog_json(&[("slow", url(silent))])).unwrap();

        // each cycle takes about 400ms, longer than the 300ms interval
        let probe = ProbeConfig {
            timeout_ms: 400,
            max_concurrent_requests: 8,
        };
        let (state, _catalog_rx, cancel, handle) =
            start_with_probe(&path, Duration::from_millis(300), probe).await;

        wait_for(|| state.read("slow").is_some()).await;
        let first_check = state.read("slow").unwrap()[0].checked_at;
        wait_for(|| state.read("slow").is_some_and(|r| r[0].checked_at > first_check)).await;
        let second_check = state.read("slow").unwrap()[0].checked_at;

        let gap = (second_check - first_check).to_std().unwrap();
        assert!(gap >= Duration::from_millis(650), "cycles ran back to back: {:?}", gap);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_scheduler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, "[]").unwrap();

        let (_state, _catalog_rx, cancel, handle) = start(&path, Duration::from_secs(300)).await;
        cancel.cancel();

        let stopped = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(stopped.is_ok(), "scheduler did not stop on cancel");
    }
}
