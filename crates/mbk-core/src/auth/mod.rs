//! Request signing for the Mingle API (`APIAuth` HMAC scheme).
//!
//! The canonical string is `<content-type>,,<path[?query]>,<date>`, signed
//! with HMAC-SHA1 keyed by the user's secret and sent base64-encoded as
//! `authorization: APIAuth <user>:<digest>` next to the `date` header that was
//! signed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::http::HttpRequest;

/// Content type announced (and signed) when a request carries a body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Signing failed; the request must not be sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("cannot sign malformed URL {url}: {reason}")]
    MalformedUrl { url: String, reason: String },
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Header values produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub date: String,
    /// Set only when the signed request has a body.
    pub content_type: Option<&'static str>,
}

impl SignedHeaders {
    /// Attach the headers to `request`. The target URL is left untouched.
    pub fn apply(self, mut request: HttpRequest) -> HttpRequest {
        if let Some(ct) = self.content_type {
            request = request.header("content-type", ct);
        }
        request
            .header("authorization", self.authorization)
            .header("date", self.date)
    }
}

/// Computes authentication headers from the shared secret.
#[derive(Clone)]
pub struct RequestSigner {
    username: String,
    secret: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Sign a GET of `url` with the current UTC time.
    pub fn sign_now(&self, url: &str, body: Option<&[u8]>) -> Result<SignedHeaders, SigningError> {
        self.sign(url, body, Utc::now())
    }

    /// Sign a request for `url`, with optional `body`, as of `at`.
    ///
    /// Deterministic: the same inputs always give the same headers.
    pub fn sign(
        &self,
        url: &str,
        body: Option<&[u8]>,
        at: DateTime<Utc>,
    ) -> Result<SignedHeaders, SigningError> {
        let path = request_path(url)?;
        let date = format_date(at);
        let content_type = match body {
            Some(b) if !b.is_empty() => Some(JSON_CONTENT_TYPE),
            _ => None,
        };
        let canonical = canonical_string(content_type, &path, &date);
        let digest = self.digest(&canonical)?;
        Ok(SignedHeaders {
            authorization: format!("APIAuth {}:{}", self.username, digest),
            date,
            content_type,
        })
    }

    /// Base64 HMAC-SHA1 of `message` under the secret.
    fn digest(&self, message: &str) -> Result<String, SigningError> {
        let mut mac = Hmac::<Sha1>::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        mac.update(message.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// `<content-type>,,<path>,<date>`; content type is empty for body-less requests.
pub fn canonical_string(content_type: Option<&str>, path: &str, date: &str) -> String {
    format!("{},,{},{}", content_type.unwrap_or(""), path, date)
}

/// RFC 1123-style date with a literal `UTC` zone, e.g. `Sat, 21 Oct 2023 07:28:00 UTC`.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Path plus `?query` (if any) of an absolute URL.
fn request_path(url: &str) -> Result<String, SigningError> {
    let parsed = url::Url::parse(url).map_err(|e| SigningError::MalformedUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.cannot_be_a_base() || !parsed.has_host() {
        return Err(SigningError::MalformedUrl {
            url: url.to_string(),
            reason: "not a hierarchical http URL".to_string(),
        });
    }
    let mut path = parsed.path().to_string();
    if let Some(q) = parsed.query().filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(q);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const URL: &str = "https://mingle.example.com/api/v2/projects/demo/cards.xml?page=2";

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 10, 21, 7, 28, 0).unwrap()
    }

    #[test]
    fn date_format() {
        assert_eq!(format_date(at()), "Sat, 21 Oct 2023 07:28:00 UTC");
    }

    #[test]
    fn known_signature() {
        let signer = RequestSigner::new("alice", "s3cret");
        let h = signer.sign(URL, None, at()).unwrap();
        assert_eq!(h.authorization, "APIAuth alice:OEedMtVhQEZPFiUZCXI/XJpXZR8=");
        assert_eq!(h.date, "Sat, 21 Oct 2023 07:28:00 UTC");
        assert_eq!(h.content_type, None);
    }

    #[test]
    fn body_adds_content_type_to_canonical_string() {
        let signer = RequestSigner::new("alice", "s3cret");
        let h = signer.sign(URL, Some(b"{}"), at()).unwrap();
        assert_eq!(h.authorization, "APIAuth alice:ii89P/2pKKZExKzlwZoWzL6OyBc=");
        assert_eq!(h.content_type, Some(JSON_CONTENT_TYPE));
        // Empty body counts as no body.
        let h = signer.sign(URL, Some(b""), at()).unwrap();
        assert_eq!(h.content_type, None);
    }

    #[test]
    fn deterministic_and_sensitive_to_each_input() {
        let signer = RequestSigner::new("alice", "s3cret");
        let base = signer.sign(URL, None, at()).unwrap();
        assert_eq!(base, signer.sign(URL, None, at()).unwrap());

        let other_url = signer
            .sign("https://mingle.example.com/api/v2/projects/demo/cards.xml?page=3", None, at())
            .unwrap();
        let with_body = signer.sign(URL, Some(b"x"), at()).unwrap();
        let later = signer
            .sign(URL, None, at() + chrono::Duration::seconds(1))
            .unwrap();
        let other_secret = RequestSigner::new("alice", "other").sign(URL, None, at()).unwrap();
        for changed in [other_url, with_body, later, other_secret] {
            assert_ne!(changed.authorization, base.authorization);
        }
    }

    #[test]
    fn host_does_not_take_part_in_signature() {
        let signer = RequestSigner::new("alice", "s3cret");
        let a = signer.sign(URL, None, at()).unwrap();
        let b = signer
            .sign("http://127.0.0.1:8080/api/v2/projects/demo/cards.xml?page=2", None, at())
            .unwrap();
        assert_eq!(a.authorization, b.authorization);
    }

    #[test]
    fn malformed_url_carries_the_url() {
        let signer = RequestSigner::new("alice", "s3cret");
        match signer.sign("not a url", None, at()) {
            Err(SigningError::MalformedUrl { url, .. }) => assert_eq!(url, "not a url"),
            other => panic!("expected MalformedUrl, got {other:?}"),
        }
        assert!(signer.sign("mailto:alice@example.com", None, at()).is_err());
    }

    #[test]
    fn apply_keeps_url() {
        let signer = RequestSigner::new("alice", "s3cret");
        let req = HttpRequest::get(URL, std::time::Duration::from_secs(1));
        let signed = signer.sign(URL, None, at()).unwrap().apply(req);
        assert_eq!(signed.url, URL);
        assert_eq!(signed.header_value("date"), Some("Sat, 21 Oct 2023 07:28:00 UTC"));
        assert!(signed.header_value("authorization").unwrap().starts_with("APIAuth alice:"));
        assert!(signed.header_value("content-type").is_none());
    }

    #[test]
    fn debug_redacts_secret() {
        let s = format!("{:?}", RequestSigner::new("alice", "s3cret"));
        assert!(!s.contains("s3cret"));
    }
}
