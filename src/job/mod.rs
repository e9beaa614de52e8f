// src/job/mod.rs

//! Job records and the job persistence seam.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{RanagError, Result};

mod orchestrator;

pub use orchestrator::{JobOrchestrator, JobReport};

/// Job life-cycle states.
///
/// `Pending` is initial; `Completed` and `Failed` are terminal. The only
/// legal path is `Pending -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One execution request of a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub strategy_id: Uuid,
    pub status: JobStatus,
    /// Populated when the job fails; the job record is the durable error
    /// signal for dispatch failures.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(user_id: Uuid, strategy_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            strategy_id,
            status: JobStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Job persistence seam.
///
/// `claim_pending` is the sole transition into `Running`: it must be
/// atomic with affected-row semantics so two orchestrator runs polling
/// the same table cannot both pick up one job.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    /// Atomically move a job from `Pending` to `Running`. Returns false
    /// if the job was not pending anymore (claimed elsewhere, or gone).
    async fn claim_pending(&self, id: Uuid) -> Result<bool>;

    /// Persist a job record. Rejects any change to a job already in a
    /// terminal state.
    async fn update(&self, job: Job) -> Result<()>;
}

/// In-memory job store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&id).cloned())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|j| j.created_at);
        Ok(matching)
    }

    async fn claim_pending(&self, id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Running;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let Some(existing) = jobs.get(&job.id) else {
            return Err(RanagError::not_found("job", job.id));
        };
        if existing.status.is_terminal() && job.status != existing.status {
            return Err(RanagError::store(format!(
                "job '{}' is already {:?}",
                job.id, existing.status
            )));
        }
        jobs.insert(job.id, job);
        Ok(())
    }
}
