//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, connection
//! failures, HTTP status, service error pages) and backoff decisions so that
//! every resilient call in the agent shares one policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_response, classify_transport_error, SERVICE_INTERNAL_ERROR_MARKER};
pub use error::{AttemptError, RetryExhausted};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
