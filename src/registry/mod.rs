// src/registry/mod.rs

//! Worker registry.
//!
//! Tracks which range-aggregator process owns which contiguous shard
//! ranges, and answers the two resolution queries the dispatch pipeline
//! needs: "who owns shard i" and "which workers declared the identical
//! range".

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RanagError, Result};
use crate::shard::{ShardRange, ShardSpace};

mod ownership;
mod store;

pub use ownership::ShardOwnership;
pub use store::{MemoryWorkerStore, WorkerStore};

/// A registered range-aggregator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    /// User that owns this worker record.
    pub owner_id: Uuid,
    /// `host:port` the worker's aggregation endpoint listens on.
    pub address: String,
    /// Declared shard assignments. Ranges across different workers are
    /// not required to be disjoint.
    pub ranges: Vec<ShardRange>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Worker {
    fn new(owner_id: Uuid, address: String, ranges: Vec<ShardRange>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            address,
            ranges,
            registered_at: now,
            updated_at: now,
        }
    }
}

/// Registry of workers and their shard assignments.
pub struct WorkerRegistry {
    space: ShardSpace,
    store: Arc<dyn WorkerStore>,
}

impl WorkerRegistry {
    pub fn new(space: ShardSpace, store: Arc<dyn WorkerStore>) -> Self {
        Self { space, store }
    }

    pub fn space(&self) -> ShardSpace {
        self.space
    }

    /// Register a new worker.
    pub async fn register(
        &self,
        owner_id: Uuid,
        address: &str,
        ranges: Vec<ShardRange>,
    ) -> Result<Worker> {
        self.validate(address, &ranges)?;

        let worker = Worker::new(owner_id, address.to_string(), ranges);
        self.store.insert(worker.clone()).await?;

        tracing::info!(
            worker_id = %worker.id,
            address = %worker.address,
            ranges = worker.ranges.len(),
            "worker registered"
        );
        Ok(worker)
    }

    /// Update an existing worker's address and shard assignments.
    pub async fn update(
        &self,
        id: Uuid,
        address: &str,
        ranges: Vec<ShardRange>,
    ) -> Result<Worker> {
        self.validate(address, &ranges)?;

        let mut worker = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| RanagError::not_found("worker", id))?;

        worker.address = address.to_string();
        worker.ranges = ranges;
        worker.updated_at = Utc::now();
        self.store.update(worker.clone()).await?;

        tracing::info!(worker_id = %worker.id, address = %worker.address, "worker updated");
        Ok(worker)
    }

    pub async fn get(&self, id: Uuid) -> Result<Worker> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| RanagError::not_found("worker", id))
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Worker>> {
        self.store.list_by_owner(owner_id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(RanagError::not_found("worker", id));
        }
        tracing::info!(worker_id = %id, "worker deleted");
        Ok(())
    }

    /// Snapshot the current shard ownership as a point-queryable index.
    pub async fn ownership(&self) -> Result<ShardOwnership> {
        let workers = self.store.list().await?;
        Ok(ShardOwnership::build(&workers))
    }

    /// Materialized per-shard owner map, for introspection. Point queries
    /// should go through [`WorkerRegistry::ownership`] instead.
    pub async fn owners_by_shard(&self) -> Result<HashMap<u32, Vec<Worker>>> {
        let workers = self.store.list().await?;
        let by_id: HashMap<Uuid, &Worker> = workers.iter().map(|w| (w.id, w)).collect();

        let map = ShardOwnership::build(&workers)
            .owners_by_shard()
            .into_iter()
            .map(|(shard, ids)| {
                let owners = ids.iter().map(|id| by_id[id].clone()).collect();
                (shard, owners)
            })
            .collect();
        Ok(map)
    }

    /// Group workers by exact declared `(offset, length)` tuples.
    ///
    /// This is equality grouping, not containment: a worker declaring
    /// `(0, 10)` does not share a group with one declaring `(0, 5)`.
    pub async fn group_by_declared_range(&self) -> Result<HashMap<ShardRange, Vec<Worker>>> {
        let workers = self.store.list().await?;

        let mut groups: HashMap<ShardRange, Vec<Worker>> = HashMap::new();
        for worker in workers {
            for range in &worker.ranges {
                groups.entry(*range).or_default().push(worker.clone());
            }
        }
        Ok(groups)
    }

    /// Workers holding at least one non-empty range, deduplicated by
    /// address. These are the processes a job fans out to.
    pub async fn dispatch_targets(&self) -> Result<Vec<Worker>> {
        let mut workers = self.store.list().await?;
        workers.sort_by_key(|w| w.registered_at);

        let mut seen = std::collections::HashSet::new();
        Ok(workers
            .into_iter()
            .filter(|w| w.ranges.iter().any(|r| !r.is_empty()))
            .filter(|w| seen.insert(w.address.clone()))
            .collect())
    }

    fn validate(&self, address: &str, ranges: &[ShardRange]) -> Result<()> {
        let mut violations = validate_address(address);
        violations.extend(self.space.violations(ranges));
        if violations.is_empty() {
            Ok(())
        } else {
            Err(RanagError::validation(violations))
        }
    }
}

/// Validate a `host:port` worker address, collecting violations.
fn validate_address(address: &str) -> Vec<String> {
    let mut violations = Vec::new();

    let Some((host, port)) = address.rsplit_once(':') else {
        violations.push(format!("address '{address}' is not of the form host:port"));
        return violations;
    };

    if host.is_empty() {
        violations.push(format!("address '{address}' has an empty host"));
    } else if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        violations.push(format!("address '{address}' has an invalid host"));
    }

    match port.parse::<u16>() {
        Ok(0) => violations.push(format!("address '{address}' has port 0")),
        Ok(_) => {}
        Err(_) => violations.push(format!("address '{address}' has an invalid port")),
    }

    violations
}
