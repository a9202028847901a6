//! Classify transport errors and HTTP responses into retry policy error kinds.

use super::error::AttemptError;
use super::policy::ErrorKind;
use crate::http::{HttpResponse, TransportError};

/// Fragment of the page the service renders when it hits an internal error.
pub const SERVICE_INTERNAL_ERROR_MARKER: &str =
    "<h1>We're sorry but Mingle found a problem it couldn't fix</h1>";

/// Turn a non-2xx response into an attempt error. Returns `None` for 2xx.
pub fn classify_response(response: &HttpResponse) -> Option<AttemptError> {
    if response.is_success() {
        return None;
    }
    let body = response.text();
    if body.contains(SERVICE_INTERNAL_ERROR_MARKER) {
        return Some(AttemptError::ServiceInternal {
            code: response.status,
        });
    }
    Some(AttemptError::Status {
        code: response.status,
        body,
    })
}

/// Classify a transport error for retry decisions.
pub fn classify_transport_error(e: &TransportError) -> ErrorKind {
    match e {
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::Connection(_) => ErrorKind::Connection,
        TransportError::Other(_) => ErrorKind::Other,
    }
}

/// Classify an attempt error into an ErrorKind.
pub fn classify(e: &AttemptError) -> ErrorKind {
    match e {
        AttemptError::Transport(t) => classify_transport_error(t),
        AttemptError::Status { code, .. } => ErrorKind::HttpStatus(*code),
        AttemptError::ServiceInternal { .. } => ErrorKind::ServiceInternal,
    }
}
