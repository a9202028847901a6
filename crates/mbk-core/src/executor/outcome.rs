use std::any::Any;
use std::fmt;

/// Result of one executor task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    Success(T),
    /// Error chain or panic message of the task.
    Failure(String),
}

impl<T> FetchOutcome<T> {
    /// Wrap a fallible task result; errors keep their full `{:#}` chain.
    pub fn from_result<E: fmt::Display>(res: Result<T, E>) -> Self {
        match res {
            Ok(v) => FetchOutcome::Success(v),
            Err(e) => FetchOutcome::Failure(format!("{:#}", e)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            FetchOutcome::Success(v) => Some(v),
            FetchOutcome::Failure(_) => None,
        }
    }
}

/// Human-readable text of a panic payload.
pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", s)
    } else {
        "task panicked".to_string()
    }
}
