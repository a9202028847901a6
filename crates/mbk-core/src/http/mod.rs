//! Blocking HTTP transport.
//!
//! Every network call in the agent goes through [`Transport`], one request per
//! call, blocking the calling worker until the response (or a timeout) arrives.
//! [`CurlTransport`] is the libcurl implementation; tests plug in scripted
//! transports instead.

mod curl_transport;
mod parse;

pub use curl_transport::CurlTransport;
pub use parse::parse_header_lines;

use std::time::Duration;

/// One outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Extra headers as `(name, value)` pairs (e.g. signing headers).
    pub headers: Vec<(String, String)>,
    /// Total time allowed for the request (connect + transfer).
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response as returned by the server, whatever the status.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u32,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u32, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure below the HTTP layer: the request produced no response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connect or transfer did not finish within the request timeout.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Could not establish or keep the connection (refused, DNS, reset).
    #[error("connection failed: {0}")]
    Connection(String),
    /// Anything else (bad URL, local I/O, protocol misuse).
    #[error("{0}")]
    Other(String),
}

/// Blocking request/response client.
///
/// Implementations must be shareable across worker threads.
pub trait Transport: Send + Sync {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
