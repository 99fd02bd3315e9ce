use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use anyhow::Result;
use shared::types::AvailabilityRecord;
use crate::catalog::Catalog;

/// Availability records per service type.
/// Each list is installed whole and never mutated afterwards.
pub type Snapshot = HashMap<String, Arc<[AvailabilityRecord]>>;

/// Commands sent to the state task
pub enum StateCommand {
    Replace(String, Vec<AvailabilityRecord>, oneshot::Sender<()>),
    Prune(Arc<Catalog>, oneshot::Sender<usize>),
    Shutdown,
}

/// Handle to the availability table.
///
/// A single task owns the table and applies writes in order. After every
/// write it publishes a fresh immutable copy over a watch channel, so reads
/// never wait on writers and always see whole per-service lists.
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::Sender<StateCommand>,
    snapshot_rx: watch::Receiver<Arc<Snapshot>>,
}

impl StateHandle {
    /// Spawn the state task with an empty table
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<StateCommand>(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Snapshot::new()));

        tokio::spawn(async move {
            let mut table = Snapshot::new();

            while let Some(cmd) = rx.recv().await {
                match cmd {
                    StateCommand::Replace(service_type, records, reply) => {
                        table.insert(service_type, records.into());
                        snapshot_tx.send_replace(Arc::new(table.clone()));
                        let _ = reply.send(());
                    }
                    StateCommand::Prune(catalog, reply) => {
                        let changed = prune_table(&mut table, &catalog);
                        if changed > 0 {
                            snapshot_tx.send_replace(Arc::new(table.clone()));
                        }
                        let _ = reply.send(changed);
                    }
                    StateCommand::Shutdown => {
                        tracing::info!("State task shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx, snapshot_rx }
    }

    /// Install `records` as the current list for `service_type`
    pub async fn replace(&self, service_type: String, records: Vec<AvailabilityRecord>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StateCommand::Replace(service_type, records, reply)).await?;
        rx.await?;
        Ok(())
    }

    /// Align the table with `catalog`: types gone from it are dropped, and
    /// records of groups no longer listed are filtered out of the remaining
    /// lists. Returns how many service types changed.
    pub async fn prune(&self, catalog: Arc<Catalog>) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StateCommand::Prune(catalog, reply)).await?;
        Ok(rx.await?)
    }

    /// Most recently installed list for a service type
    pub fn read(&self, service_type: &str) -> Option<Arc<[AvailabilityRecord]>> {
        self.snapshot_rx.borrow().get(service_type).cloned()
    }

    /// Point-in-time copy of the whole table
    pub fn read_all(&self) -> Arc<Snapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Shutdown the state task
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(StateCommand::Shutdown).await?;
        Ok(())
    }
}

/// Surviving records keep their probe result until the next cycle replaces the list
fn prune_table(table: &mut Snapshot, catalog: &Catalog) -> usize {
    let before = table.len();
    table.retain(|service_type, _| catalog.get(service_type).is_some());
    let mut changed = before - table.len();

    for (service_type, records) in table.iter_mut() {
        let Some(def) = catalog.get(service_type) else {
            continue;
        };
        let current: HashSet<String> = def.instance_groups.iter().map(|g| g.identifier()).collect();

        if records.iter().any(|r| !current.contains(&r.identifier)) {
            let kept: Vec<AvailabilityRecord> = records
                .iter()
                .filter(|r| current.contains(&r.identifier))
                .cloned()
                .collect();
            *records = kept.into();
            changed += 1;
        }
    }

    changed
}
