// src/registry/store.rs

//! Worker persistence seam.
//!
//! The registry talks to workers through the [`WorkerStore`] trait so the
//! backing store (in-memory, SQL, ...) can be swapped. Address uniqueness
//! is enforced inside the store's insert/update, under the store's own
//! synchronization, so two concurrent registrations of the same address
//! cannot both pass a separate existence check.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Worker;
use crate::error::{RanagError, Result};

#[async_trait]
pub trait WorkerStore: Send + Sync {
    /// Insert a new worker. Fails with `AddressConflict` if another worker
    /// already holds the same address.
    async fn insert(&self, worker: Worker) -> Result<()>;

    /// Replace an existing worker record. The worker's own prior address is
    /// excluded from the conflict check.
    async fn update(&self, worker: Worker) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Worker>>;

    /// Remove a worker, returning whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn list(&self) -> Result<Vec<Worker>>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Worker>>;
}

/// In-memory worker store.
#[derive(Default)]
pub struct MemoryWorkerStore {
    workers: RwLock<HashMap<Uuid, Worker>>,
}

impl MemoryWorkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkerStore for MemoryWorkerStore {
    async fn insert(&self, worker: Worker) -> Result<()> {
        let mut workers = self.workers.write().await;

        if workers.values().any(|w| w.address == worker.address) {
            return Err(RanagError::address_conflict(&worker.address));
        }

        workers.insert(worker.id, worker);
        Ok(())
    }

    async fn update(&self, worker: Worker) -> Result<()> {
        let mut workers = self.workers.write().await;

        if !workers.contains_key(&worker.id) {
            return Err(RanagError::not_found("worker", worker.id));
        }
        if workers
            .values()
            .any(|w| w.id != worker.id && w.address == worker.address)
        {
            return Err(RanagError::address_conflict(&worker.address));
        }

        workers.insert(worker.id, worker);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Worker>> {
        let workers = self.workers.read().await;
        Ok(workers.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut workers = self.workers.write().await;
        Ok(workers.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Worker>> {
        let workers = self.workers.read().await;
        Ok(workers.values().cloned().collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Worker>> {
        let workers = self.workers.read().await;
        Ok(workers
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect())
    }
}
