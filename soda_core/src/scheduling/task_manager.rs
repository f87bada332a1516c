use super::config::PipelineConfig;
use crate::error::{SodaError, SodaResult};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A unit of work the pool can run.
///
/// Implemented by [`super::DoubleBufferedTask`]; each trigger enqueues the
/// task once and one worker executes its back buffer.
pub trait PipelineJob: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self);
}

type Job = Arc<dyn PipelineJob>;

/// Fixed pool of worker threads draining triggered pipeline jobs
pub struct AsyncTaskManager {
    config: PipelineConfig,
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    executed: Arc<AtomicU64>,
}

impl AsyncTaskManager {
    /// Spawn the worker threads and return a shared handle
    pub fn start(config: PipelineConfig) -> SodaResult<Arc<Self>> {
        let num_threads = config.resolved_threads();
        let (tx, rx) = channel::unbounded::<Job>();
        let executed = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let rx = rx.clone();
            let executed = executed.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, i))
                .spawn(move || worker_loop(rx, executed))?;
            workers.push(handle);
        }

        tracing::info!("Started async task manager with {} workers", num_threads);

        Ok(Arc::new(Self {
            config,
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            executed,
        }))
    }

    /// Queue a job for execution. Never blocks.
    pub fn enqueue(&self, job: Job) -> SodaResult<()> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(SodaError::PoolStopped)?;
        tx.send(job).map_err(|_| SodaError::PoolStopped)
    }

    /// Number of jobs run to completion (or panic) so far
    pub fn executed_jobs(&self) -> u64 {
        self.executed.load(Ordering::Acquire)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Stop accepting jobs, let workers drain the queue, and join them
    pub fn stop(&self) {
        // Dropping the last sender ends every worker's receive loop
        let had_sender = self.tx.lock().take().is_some();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Worker thread exited with a panic");
            }
        }
        if had_sender {
            tracing::info!(
                "Async task manager stopped after {} jobs",
                self.executed_jobs()
            );
        }
    }
}

impl Drop for AsyncTaskManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AsyncTaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTaskManager")
            .field("workers", &self.num_workers())
            .field("running", &self.is_running())
            .field("executed", &self.executed_jobs())
            .finish()
    }
}

fn worker_loop(rx: Receiver<Job>, executed: Arc<AtomicU64>) {
    for job in rx.iter() {
        if panic::catch_unwind(AssertUnwindSafe(|| job.execute())).is_err() {
            tracing::error!("Job '{}' panicked; worker continues", job.name());
        }
        executed.fetch_add(1, Ordering::AcqRel);
    }
}
