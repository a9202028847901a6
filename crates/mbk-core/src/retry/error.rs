//! Error of a single request attempt, before retry classification.

use crate::http::TransportError;

/// Why one attempt of a GET did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// No response at all.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Response with a non-2xx status.
    #[error("HTTP {code}: {body}")]
    Status { code: u32, body: String },
    /// Non-2xx response carrying the service's internal error page.
    #[error("service internal error (HTTP {code})")]
    ServiceInternal { code: u32 },
}

/// Last attempt error together with the number of attempts made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub error: AttemptError,
    pub attempts: u32,
}
