//! Fixed-size worker thread pool.

use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::group::TaskGroup;

pub(super) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Long-lived worker threads sharing one job queue.
///
/// The pool itself never tracks results; use [`WorkerPool::group`] for each
/// round of work.
pub struct WorkerPool {
    name: String,
    size: usize,
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `size` worker threads named `{name}-{i}` (at least one).
    pub fn new(name: &str, size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let rx = Arc::clone(&rx);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || loop {
                    // Guard is released at the end of the statement, before the job runs.
                    let job = rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })?;
            handles.push(handle);
        }
        tracing::debug!(pool = name, size, "worker pool started");
        Ok(Self {
            name: name.to_string(),
            size,
            jobs: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of worker threads (the concurrency cap).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fresh task group on this pool: no threads are created.
    pub fn group<T: Send + 'static>(&self) -> TaskGroup<'_, T> {
        TaskGroup::new(self)
    }

    /// Queue a job. A job that cannot be queued is dropped; its group then
    /// reports divergence.
    pub(super) fn dispatch(&self, job: Job) {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let sent = match jobs.as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        };
        if !sent {
            tracing::error!(pool = %self.name, "job dropped: worker pool is shut down");
        }
    }

    /// Stop accepting jobs, let queued jobs finish, and join the workers.
    pub fn shutdown(&self) {
        let tx = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(tx);
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for h in handles {
            // A worker may end up dropping the last reference to its own pool.
            if h.thread().id() == current {
                continue;
            }
            if h.join().is_err() {
                tracing::error!(pool = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
