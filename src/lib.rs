// src/lib.rs

//! Ranag Aggregation Core
//!
//! This crate is the shard-range worker registry and job-dispatch core of
//! the ranag data-extraction service: it tracks which range-aggregator
//! worker owns which contiguous ranges of a fixed shard space, resolves
//! extraction strategies into dispatchable plans, and drives jobs through
//! their life-cycle by fanning aggregation requests out to the owning
//! workers.
//!
//! HTTP routing, authentication, policy checks, and SQL wiring are
//! collaborator concerns; they plug in behind the store traits exposed
//! here.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod registry;
pub mod shard;
pub mod strategy;

// Re-export commonly used types for convenience
pub use config::CoreConfig;
pub use dispatch::{Dispatcher, HttpDispatcher, Record};
pub use error::{RanagError, Result};
pub use job::{Job, JobOrchestrator, JobReport, JobStatus, JobStore, MemoryJobStore};
pub use registry::{MemoryWorkerStore, ShardOwnership, Worker, WorkerRegistry, WorkerStore};
pub use shard::{ShardRange, ShardSpace};
pub use strategy::{MemoryCatalog, ResolvedStrategy, Strategy, StrategyAssembler};
