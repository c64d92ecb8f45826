//! Session orchestration and thread management.
//!
//! This module contains the top-level [`DenseMapper`] that owns the fusion thread,
//! along with the ingestion queue, shared state, configuration and the
//! inter-thread message types.

pub mod config;
mod dense_mapper;
pub mod ingest_queue;
pub mod messages;
pub mod shared_state;

pub use config::DenseMappingConfig;
pub use dense_mapper::DenseMapper;
pub use ingest_queue::IngestQueue;
pub use messages::{LoopEvent, LoopTrigger, MapUpdate, MappingJob, PendingKeyFrame};
pub use shared_state::{MappingStats, SharedState, WorkerState};
