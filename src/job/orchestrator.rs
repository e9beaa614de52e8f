// src/job/orchestrator.rs

//! Job orchestration.
//!
//! Owns every `Job.status` transition. `process_pending` is the batch
//! driver: claim, resolve, fan out, merge, finalize. Claiming is atomic
//! in the store, so overlapping batch runs each process a job at most
//! once.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::dispatch::{Dispatcher, Record};
use crate::error::{RanagError, Result};
use crate::registry::WorkerRegistry;
use crate::strategy::{ResolvedStrategy, StrategyAssembler};

use super::{Job, JobStatus, JobStore};

/// Outcome of one processed job, including the merged record set.
#[derive(Debug)]
pub struct JobReport {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub records: Vec<Record>,
}

pub struct JobOrchestrator {
    jobs: Arc<dyn JobStore>,
    registry: Arc<WorkerRegistry>,
    assembler: Arc<StrategyAssembler>,
    dispatcher: Arc<dyn Dispatcher>,
    max_fanout: usize,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        registry: Arc<WorkerRegistry>,
        assembler: Arc<StrategyAssembler>,
        dispatcher: Arc<dyn Dispatcher>,
        max_fanout: usize,
    ) -> Self {
        Self {
            jobs,
            registry,
            assembler,
            dispatcher,
            max_fanout: max_fanout.max(1),
        }
    }

    /// Create a new job in `Pending`. The strategy must resolve.
    pub async fn create(&self, user_id: Uuid, strategy_id: Uuid) -> Result<Job> {
        self.assembler.resolve(strategy_id).await?;

        let job = Job::new(user_id, strategy_id);
        self.jobs.insert(job.clone()).await?;

        tracing::info!(job_id = %job.id, strategy_id = %strategy_id, "job created");
        Ok(job)
    }

    /// Process every pending job and return per-job reports.
    ///
    /// A failure while persisting one job's terminal transition aborts
    /// that job only; the rest of the batch still runs.
    pub async fn process_pending(&self) -> Result<Vec<JobReport>> {
        let pending = self.jobs.list_by_status(JobStatus::Pending).await?;
        tracing::debug!(count = pending.len(), "processing pending jobs");

        let mut reports = Vec::new();
        for mut job in pending {
            // The claim is itself a status-transition persist; a store
            // failure here aborts this job only, like the terminal update.
            match self.jobs.claim_pending(job.id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(job_id = %job.id, "job claimed elsewhere, skipping");
                    continue;
                }
                Err(err) => {
                    tracing::error!(job_id = %job.id, error = %err, "failed to claim job");
                    continue;
                }
            }

            let (status, failure_reason, records) = match self.run_job(&job).await {
                Ok(records) => (JobStatus::Completed, None, records),
                Err(err) => {
                    tracing::warn!(job_id = %job.id, error = %err, "job failed");
                    (JobStatus::Failed, Some(err.to_string()), Vec::new())
                }
            };

            job.status = status;
            job.failure_reason = failure_reason;
            job.updated_at = chrono::Utc::now();

            if let Err(err) = self.jobs.update(job.clone()).await {
                tracing::error!(job_id = %job.id, error = %err, "failed to persist job status");
                continue;
            }

            tracing::info!(job_id = %job.id, status = ?status, records = records.len(), "job finalized");
            reports.push(JobReport {
                job_id: job.id,
                status,
                records,
            });
        }

        Ok(reports)
    }

    /// Resolve, fan out, and merge one claimed job.
    async fn run_job(&self, job: &Job) -> Result<Vec<Record>> {
        let plan = self.assembler.resolve(job.strategy_id).await?;
        let targets = self.registry.dispatch_targets().await?;

        if targets.is_empty() {
            return Err(RanagError::validation(vec![
                "no workers hold any shard range".to_string(),
            ]));
        }

        self.fan_out(&plan, targets.iter().map(|w| w.address.as_str()))
            .await
    }

    /// Dispatch to every target concurrently, bounded by `max_fanout`.
    ///
    /// The merge is a concatenated union of all worker record lists. Any
    /// worker failure fails the whole job; dropping the stream cancels
    /// whatever dispatches are still in flight.
    async fn fan_out<'a>(
        &self,
        plan: &ResolvedStrategy,
        addresses: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<Record>> {
        let results: Vec<Vec<Record>> = stream::iter(addresses)
            .map(|address| {
                let dispatcher = self.dispatcher.clone();
                async move { dispatcher.send(address, plan).await }
            })
            .buffer_unordered(self.max_fanout)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }
}
