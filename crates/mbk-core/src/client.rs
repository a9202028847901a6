//! Resilient, signed access to the Mingle REST API.
//!
//! [`ApiClient::get`] performs one logical GET: it signs each attempt afresh,
//! sends it through the [`Transport`], classifies failures and retries them
//! according to the [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{RequestSigner, SigningError};
use crate::config::MbkConfig;
use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::retry::{classify_response, run_with_retry, AttemptError, RetryExhausted, RetryPolicy};

/// Longest response body excerpt carried in an error message.
const BODY_SNIPPET_LEN: usize = 300;

/// Whether a request carries the `APIAuth` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Signed,
    /// For URLs that embed their own access token (attachment payloads).
    Unsigned,
}

/// Terminal failure of a logical GET (or of reading its body).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("GET {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("GET {url} failed after {attempts} attempt(s): HTTP {status}: {body}")]
    Status {
        url: String,
        attempts: u32,
        status: u32,
        body: String,
    },
    #[error("service internal error while fetching {url} (HTTP {status})")]
    ServiceInternal { url: String, status: u32 },
    #[error("cannot parse response of {url}: {detail}")]
    Parse { url: String, detail: String },
}

impl FetchError {
    fn from_exhausted(url: &str, exhausted: RetryExhausted) -> Self {
        let RetryExhausted { error, attempts } = exhausted;
        let url = url.to_string();
        match error {
            AttemptError::Transport(source) => FetchError::Transport {
                url,
                attempts,
                source,
            },
            AttemptError::Status { code, body } => FetchError::Status {
                url,
                attempts,
                status: code,
                body: snippet(&body),
            },
            AttemptError::ServiceInternal { code } => FetchError::ServiceInternal { url, status: code },
        }
    }
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// API client for one project.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    signer: RequestSigner,
    project_base: String,
    policy: RetryPolicy,
    api_timeout: Duration,
    download_timeout: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("project_base", &self.project_base)
            .field("signer", &self.signer)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, cfg: &MbkConfig) -> Self {
        Self {
            transport,
            signer: RequestSigner::new(cfg.username.clone(), cfg.secret_key.clone()),
            project_base: format!(
                "{}/api/v2/projects/{}",
                cfg.host.trim().trim_end_matches('/'),
                cfg.project.trim()
            ),
            policy: RetryPolicy::from(&cfg.retry),
            api_timeout: cfg.timeouts.api(),
            download_timeout: cfg.timeouts.download(),
        }
    }

    /// Override the retry policy (tests use a policy without sleeps).
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `.../cards.xml?page={page}`
    pub fn cards_page_url(&self, page: u64) -> String {
        format!("{}/cards.xml?page={}", self.project_base, page)
    }

    /// `.../cards/{card}/attachments.xml`
    pub fn attachments_url(&self, card: u64) -> String {
        format!("{}/cards/{}/attachments.xml", self.project_base, card)
    }

    /// `.../cards/{card}/murmurs.xml`
    pub fn murmurs_url(&self, card: u64) -> String {
        format!("{}/cards/{}/murmurs.xml", self.project_base, card)
    }

    /// Signed API GET with the API timeout.
    pub fn get_api(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.get(url, Auth::Signed, self.api_timeout)
    }

    /// Unsigned payload download with the download timeout.
    pub fn get_download(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.get(url, Auth::Unsigned, self.download_timeout)
    }

    /// GET `url` with retries. Returns the first 2xx response.
    pub fn get(&self, url: &str, auth: Auth, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let mut signing_error: Option<SigningError> = None;
        let res = run_with_retry(&self.policy, |attempt| {
            let request = match self.build_request(url, auth, timeout) {
                Ok(r) => r,
                Err(e) => {
                    // Not retryable: `Other` stops the loop on the spot.
                    let msg = e.to_string();
                    signing_error = Some(e);
                    return Err(TransportError::Other(msg).into());
                }
            };
            tracing::trace!(url, attempt, "GET");
            let response = self.transport.get(&request)?;
            match classify_response(&response) {
                None => Ok(response),
                Some(e) => Err(e),
            }
        });
        if let Some(e) = signing_error {
            return Err(e.into());
        }
        res.map_err(|exhausted| FetchError::from_exhausted(url, exhausted))
    }

    fn build_request(&self, url: &str, auth: Auth, timeout: Duration) -> Result<HttpRequest, SigningError> {
        let request = HttpRequest::get(url, timeout);
        match auth {
            Auth::Unsigned => Ok(request),
            Auth::Signed => Ok(self.signer.sign_now(url, None)?.apply(request)),
        }
    }
}
