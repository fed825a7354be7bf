//! Dedicated worker thread that runs blocking jobs one at a time.
//!
//! Jobs run in submission order on a named OS thread, outside the async
//! scheduler. A job that panics only fails its own submission; the thread
//! keeps serving the queue.

use crate::error::{BridgeError, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single OS thread with a FIFO job queue.
pub struct WorkerThread {
    /// Job queue; `None` once shutdown has begun.
    jobs: Option<Sender<Job>>,
    /// Handle to the spawned thread.
    handle: Option<JoinHandle<()>>,
    /// Jobs submitted but not yet finished.
    pending: Arc<AtomicUsize>,
    name: String,
}

/// Result of a submitted job, awaited from async code.
#[must_use = "dropping a submission detaches the job; it still runs"]
pub struct Submission<T> {
    rx: oneshot::Receiver<T>,
    worker: String,
}

impl<T> Submission<T> {
    /// Waits for the job to finish and returns its value.
    ///
    /// Fails with `WorkerTaskPanicked` if the job panicked.
    pub async fn join(self) -> Result<T> {
        self.rx.await.map_err(|_| BridgeError::WorkerTaskPanicked {
            worker: self.worker,
        })
    }
}

impl WorkerThread {
    /// Spawns a new worker thread with the given name.
    pub fn spawn(name: &str) -> Result<Self> {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));

        let thread_pending = pending.clone();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::run_jobs(&thread_name, jobs_rx, thread_pending))?;

        debug!(worker = name, "worker thread started");

        Ok(Self {
            jobs: Some(jobs_tx),
            handle: Some(handle),
            pending,
            name: name.to_string(),
        })
    }

    /// Main loop: run each job to completion, isolating panics.
    fn run_jobs(name: &str, jobs: Receiver<Job>, pending: Arc<AtomicUsize>) {
        while let Ok(job) = jobs.recv() {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(worker = name, "job panicked; worker continues");
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        }
        debug!(worker = name, "worker thread exiting");
    }

    /// Queues a blocking job behind any earlier submissions.
    ///
    /// The job runs even if the returned `Submission` is dropped.
    pub fn submit<F, T>(&self, job: F) -> Result<Submission<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let jobs = self.jobs.as_ref().ok_or_else(|| BridgeError::WorkerUnavailable {
            worker: self.name.clone(),
        })?;

        let (tx, rx) = oneshot::channel();
        let worker = self.name.clone();
        let wrapped: Job = Box::new(move || {
            let value = job();
            if tx.send(value).is_err() {
                debug!(worker = %worker, "submission result discarded");
            }
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        if jobs.send(wrapped).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(BridgeError::WorkerUnavailable {
                worker: self.name.clone(),
            });
        }

        Ok(Submission {
            rx,
            worker: self.name.clone(),
        })
    }

    /// Number of jobs queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Returns the thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops accepting jobs, lets queued jobs finish, and joins the thread.
    ///
    /// Blocks the caller; from async code run it via `spawn_blocking`.
    pub fn shutdown(mut self) -> Result<()> {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| BridgeError::WorkerTaskPanicked {
                worker: self.name.clone(),
            })?;
        }
        Ok(())
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        // Closing the queue lets the thread exit after its backlog; it is not joined here.
        self.jobs.take();
    }
}

impl std::fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}
