//! # Job Queue
//!
//! In-process queue and fixed-size worker pool for long-running video jobs.
//!
//! Jobs are submitted without blocking, picked up by one of N workers, driven
//! through a closed stage/status state machine, and remain queryable forever
//! after reaching a terminal state. Shutdown drains every submitted job to a
//! terminal state before cancelling the idle workers.
//!
//! The work itself is behind the [`JobRunner`] seam; this crate knows nothing
//! about video.

use thiserror::Error;

mod job;
mod queue;

pub use job::{Job, JobId, JobStage, JobStatus};
pub use queue::{JobHandle, JobQueue, JobRunner};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job {id} not found")]
    NotFound { id: JobId },

    #[error("queue is shutting down")]
    ShuttingDown,
}
