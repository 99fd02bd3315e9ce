use std::sync::Arc;
use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use shared::types::{AvailabilityRecord, InstanceGroup, ServiceDefinition};
use crate::catalog::Catalog;
use crate::config::ProbeConfig;
use crate::state_manager::StateHandle;

/// Checks instance liveness and publishes the results into the state store.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
    /// Caps outstanding probe requests across all services
    permits: Arc<Semaphore>,
}

impl Prober {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("mirrorgated/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create probe HTTP client")?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
        })
    }

    /// Probe every service of the catalog, one task per service.
    ///
    /// Each task publishes its own list as soon as it finishes, so a slow
    /// service never holds back the others. Returns once every task is done,
    /// with the number of services whose results were published.
    pub async fn probe_all(&self, catalog: &Catalog, state: &StateHandle) -> usize {
        tracing::info!("Checking {} services", catalog.len());

        let mut tasks = JoinSet::new();
        for def in catalog.services() {
            let prober = self.clone();
            let state = state.clone();
            let def = def.clone();

            tasks.spawn(async move {
                let records = prober.probe_service(&def).await;
                let available = records.iter().filter(|r| r.available).count();
                tracing::info!(
                    service = %def.service_type,
                    "Available: {}/{}",
                    available,
                    records.len()
                );
                state
                    .replace(def.service_type.clone(), records)
                    .await
                    .with_context(|| format!("Failed to publish availability for {}", def.service_type))
            });
        }

        let mut published = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => published += 1,
                Ok(Err(e)) => tracing::error!("{:#}", e),
                Err(e) => tracing::error!("Probe task failed: {}", e),
            }
        }

        published
    }

    /// Evaluate every instance group of one service, in catalog order
    pub async fn probe_service(&self, def: &ServiceDefinition) -> Vec<AvailabilityRecord> {
        let mut records = Vec::with_capacity(def.instance_groups.len());

        for group in &def.instance_groups {
            let available = self.probe_group(group, &def.test_path).await;
            records.push(AvailabilityRecord {
                identifier: group.identifier(),
                available,
                checked_at: Utc::now(),
            });
        }

        records
    }

    /// A group is available only if every member answers; the first failure ends the check
    async fn probe_group(&self, group: &InstanceGroup, test_path: &str) -> bool {
        for member in group.members() {
            if !self.probe_url(&probe_target(member, test_path)).await {
                return false;
            }
        }
        true
    }

    /// HEAD request: success is any response outside the 5xx class
    async fn probe_url(&self, url: &str) -> bool {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return false,
        };

        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_server_error() {
                    tracing::debug!(url, %status, "Probe failed");
                }
                !status.is_server_error()
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "Probe failed");
                false
            }
        }
    }
}

/// Join an instance base URL and a test path with exactly one `/`
pub fn probe_target(base: &str, test_path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        test_path.trim_start_matches('/')
    )
}
