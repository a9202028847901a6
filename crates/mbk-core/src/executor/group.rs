//! Per-round task group with submission-ordered results.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use super::outcome::{panic_message, FetchOutcome};
use super::pool::WorkerPool;
use super::ExecutorError;

/// One round of work on a [`WorkerPool`].
///
/// Each submission gets the next index starting at zero; [`TaskGroup::await_all`]
/// returns outcomes at those indices.
pub struct TaskGroup<'p, T> {
    pool: &'p WorkerPool,
    results_tx: mpsc::Sender<(usize, FetchOutcome<T>)>,
    results_rx: mpsc::Receiver<(usize, FetchOutcome<T>)>,
    submitted: usize,
}

impl<'p, T: Send + 'static> TaskGroup<'p, T> {
    pub(super) fn new(pool: &'p WorkerPool) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            pool,
            results_tx,
            results_rx,
            submitted: 0,
        }
    }

    /// Number of tasks submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Submit a task whose return value is its success.
    pub fn submit<F>(&mut self, task: F) -> &mut Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.spawn(move || FetchOutcome::Success(task()))
    }

    /// Submit a fallible task; `Err` becomes `Failure` with the error chain.
    pub fn submit_fallible<F, E>(&mut self, task: F) -> &mut Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: std::fmt::Display,
    {
        self.spawn(move || FetchOutcome::from_result(task()))
    }

    fn spawn<F>(&mut self, task: F) -> &mut Self
    where
        F: FnOnce() -> FetchOutcome<T> + Send + 'static,
    {
        let index = self.submitted;
        self.submitted += 1;
        let tx = self.results_tx.clone();
        self.pool.dispatch(Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(outcome) => outcome,
                Err(payload) => FetchOutcome::Failure(panic_message(payload.as_ref())),
            };
            // Receiver gone means the group was dropped without awaiting.
            let _ = tx.send((index, outcome));
        }));
        self
    }

    /// Block until every submitted task has reported, then return outcomes in
    /// submission order.
    pub fn await_all(self) -> Result<Vec<FetchOutcome<T>>, ExecutorError> {
        let TaskGroup {
            pool,
            results_tx,
            results_rx,
            submitted,
        } = self;
        // Only in-flight jobs hold senders now; a closed channel means lost tasks.
        drop(results_tx);

        let mut slots: Vec<Option<FetchOutcome<T>>> = (0..submitted).map(|_| None).collect();
        let mut completed = 0usize;
        while completed < submitted {
            match results_rx.recv() {
                Ok((index, outcome)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        if slot.replace(outcome).is_none() {
                            completed += 1;
                        }
                    }
                }
                Err(_) => {
                    tracing::error!(pool = pool.name(), submitted, completed, "task group diverged");
                    return Err(ExecutorError::Diverged {
                        submitted,
                        completed,
                    });
                }
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
