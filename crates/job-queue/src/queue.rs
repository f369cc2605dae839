//! The queue, worker pool, and runner seam.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{Job, JobId, JobStage, JobStatus, QueueError};

type JobTable = Arc<RwLock<HashMap<JobId, Job>>>;

/// Executes one job end to end.
///
/// The runner is constructed up front and injected, owning its model/session
/// resources for the whole process lifetime; workers share one instance.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// What a submission carries (source location, processing options, ...).
    type Spec: Send + Sync + 'static;

    /// Run the job, reporting stage transitions through `handle`. The
    /// returned string is the published artifact reference.
    async fn run(
        &self,
        id: JobId,
        spec: &Self::Spec,
        handle: &JobHandle,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Stage-update handle owned by the worker running a job.
///
/// Only the owning worker holds a handle for a given id, so job mutation is
/// single-writer by construction.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    jobs: JobTable,
}

impl JobHandle {
    /// Record that the job entered `stage`. Ignored once the job is terminal
    /// (and for the terminal pseudo-stages, which only the pool itself sets).
    pub fn advance(&self, stage: JobStage) {
        if stage.is_terminal() {
            return;
        }
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&self.id)
            && job.status == JobStatus::Processing
        {
            info!(id = %self.id, stage = ?stage, "stage transition");
            job.stage = stage;
            job.touch();
        }
    }
}

/// The queue and its fixed worker pool. Wrap in an [`Arc`] to share with
/// submitters.
pub struct JobQueue<R: JobRunner> {
    runner: Arc<R>,
    jobs: JobTable,
    submit_tx: mpsc::UnboundedSender<(JobId, R::Spec)>,
    submit_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<(JobId, R::Spec)>>>,
    // Count of submitted-but-not-yet-terminal jobs; shutdown waits for zero.
    pending_tx: watch::Sender<usize>,
    // Serializes submissions against the shutdown cancel decision.
    gate: Mutex<()>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: JobRunner> JobQueue<R> {
    pub fn new(runner: R) -> Self {
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let (pending_tx, _) = watch::channel(0usize);
        Self {
            runner: Arc::new(runner),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            submit_tx,
            submit_rx: Arc::new(tokio::sync::Mutex::new(submit_rx)),
            pending_tx,
            gate: Mutex::new(()),
            shutdown: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue a job. Returns immediately; the pending channel is unbounded,
    /// admission control belongs to the caller.
    pub fn submit(&self, spec: R::Spec) -> Result<JobId, QueueError> {
        // Shutdown holds this gate while deciding to cancel, so a submission
        // either raises the pending count before the drain check or observes
        // the cancellation here.
        let _gate = self.gate.lock();
        if self.shutdown.is_cancelled() {
            return Err(QueueError::ShuttingDown);
        }
        let id = JobId::generate();
        self.jobs.write().insert(id, Job::queued(id));
        self.pending_tx.send_modify(|n| *n += 1);
        if self.submit_tx.send((id, spec)).is_err() {
            // Receiver only drops on shutdown.
            self.jobs.write().remove(&id);
            self.pending_tx.send_modify(|n| *n -= 1);
            return Err(QueueError::ShuttingDown);
        }
        info!(%id, "job submitted");
        Ok(id)
    }

    /// Read-only snapshot of a job, at any point of its lifecycle.
    pub fn status(&self, id: JobId) -> Result<Job, QueueError> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or(QueueError::NotFound { id })
    }

    /// Spawn `worker_count` workers, each running a pull-execute loop until
    /// shutdown.
    pub fn start(&self, worker_count: usize) {
        let worker_count = worker_count.max(1);
        let mut workers = self.workers.lock();
        for n in 0..worker_count {
            let runner = Arc::clone(&self.runner);
            let jobs = Arc::clone(&self.jobs);
            let submit_rx = Arc::clone(&self.submit_rx);
            let pending_tx = self.pending_tx.clone();
            let token = self.shutdown.clone();
            workers.push(tokio::spawn(async move {
                worker_loop(n, runner, jobs, submit_rx, pending_tx, token).await;
            }));
        }
        info!(worker_count, "worker pool started");
    }

    /// Wait for every submitted job to reach a terminal state, then cancel
    /// the idle workers and reap their tasks.
    pub async fn shutdown(&self) {
        let mut pending = self.pending_tx.subscribe();
        loop {
            // wait_for inspects the current value first, so a queue that is
            // already drained returns immediately.
            let _ = pending.wait_for(|&n| n == 0).await;

            let _gate = self.gate.lock();
            if *self.pending_tx.borrow() == 0 {
                self.shutdown.cancel();
                break;
            }
            // A submission landed between the drain wait and the gate;
            // drain again.
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "worker task did not shut down cleanly");
            }
        }
        info!("job queue shutdown complete");
    }
}

async fn worker_loop<R: JobRunner>(
    worker: usize,
    runner: Arc<R>,
    jobs: JobTable,
    submit_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<(JobId, R::Spec)>>>,
    pending_tx: watch::Sender<usize>,
    token: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = submit_rx.lock().await;
            tokio::select! {
                _ = token.cancelled() => None,
                msg = rx.recv() => msg,
            }
        };
        let Some((id, spec)) = next else {
            info!(worker, "worker stopping");
            return;
        };

        mark_processing(&jobs, id);
        info!(worker, %id, "job picked up");

        let handle = JobHandle {
            id,
            jobs: Arc::clone(&jobs),
        };
        // A panicking runner must take down neither the worker nor the pool;
        // it fails just this job.
        let outcome = std::panic::AssertUnwindSafe(runner.run(id, &spec, &handle))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                info!(worker, %id, "job completed");
                settle(&jobs, id, JobStatus::Completed, Some(result), None);
            }
            Ok(Err(e)) => {
                error!(worker, %id, error = %e, "job failed");
                settle(&jobs, id, JobStatus::Failed, None, Some(e.to_string()));
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "job runner panicked".to_string());
                error!(worker, %id, error = %msg, "job panicked");
                settle(&jobs, id, JobStatus::Failed, None, Some(msg));
            }
        }

        pending_tx.send_modify(|n| *n = n.saturating_sub(1));
    }
}

fn mark_processing(jobs: &JobTable, id: JobId) {
    if let Some(job) = jobs.write().get_mut(&id) {
        debug_assert_eq!(job.status, JobStatus::Queued);
        job.status = JobStatus::Processing;
        job.touch();
    }
}

fn settle(jobs: &JobTable, id: JobId, status: JobStatus, result: Option<String>, error: Option<String>) {
    debug_assert!(status.is_terminal());
    if let Some(job) = jobs.write().get_mut(&id) {
        if job.status.is_terminal() {
            return;
        }
        job.status = status;
        job.stage = match status {
            JobStatus::Completed => JobStage::Completed,
            _ => JobStage::Failed,
        };
        job.result = result;
        job.error = error;
        job.touch();
    }
}
