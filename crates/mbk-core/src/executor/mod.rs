//! Bounded-parallelism task execution.
//!
//! A [`WorkerPool`] owns a fixed number of long-lived worker threads fed from
//! one job channel. Work is submitted through a [`TaskGroup`]: a cheap,
//! per-round handle with its own result channel and a submission counter that
//! starts at zero. `await_all` returns one [`FetchOutcome`] per submitted task,
//! in submission order, whatever order the workers finished in. Panics inside
//! a task are caught and become that task's `Failure`; the worker keeps
//! running.

mod group;
mod outcome;
mod pool;

pub use group::TaskGroup;
pub use outcome::FetchOutcome;
pub use pool::WorkerPool;

/// Fatal executor condition: the results of a group can no longer be collected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The result channel closed before every submitted task reported back
    /// (pool shut down, or a task was dropped without running).
    #[error("task group diverged: {completed} of {submitted} tasks reported a result")]
    Diverged { submitted: usize, completed: usize },
}
