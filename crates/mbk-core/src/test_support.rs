//! In-memory Mingle double for unit tests.
//!
//! Serves card pages, attachment lists, attachment payloads and murmur feeds
//! from fixed data, rejects unsigned API calls and signed payload calls, and
//! can be told to fail specific URLs a number of times.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::ApiClient;
use crate::config::MbkConfig;
use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::retry::{RetryPolicy, SERVICE_INTERNAL_ERROR_MARKER};
use crate::subresource::{EMPTY_ATTACHMENTS_BODY, EMPTY_MURMURS_BODY};

pub(crate) const HOST: &str = "http://mingle.test";
pub(crate) const PROJECT: &str = "demo";
const FILES: &str = "http://files.test/";

#[derive(Debug, Clone, Copy)]
pub(crate) enum FakeFailure {
    Status(u32),
    Internal,
    Timeout,
}

#[derive(Default)]
pub(crate) struct FakeMingle {
    pages: Vec<Vec<u64>>,
    attachments: Mutex<HashMap<u64, Vec<(String, Vec<u8>)>>>,
    murmurs: Mutex<HashMap<u64, String>>,
    failures: Mutex<Vec<(String, u32, FakeFailure)>>,
    overrides: Mutex<Vec<(String, String)>>,
    requests: Mutex<Vec<String>>,
}

pub(crate) fn config() -> MbkConfig {
    MbkConfig {
        host: HOST.to_string(),
        project: PROJECT.to_string(),
        username: "alice".to_string(),
        secret_key: "s3cret".to_string(),
        ..MbkConfig::default()
    }
}

impl FakeMingle {
    /// Pages `1..=pages.len()`; later page numbers repeat the last page.
    pub(crate) fn with_pages(pages: Vec<Vec<u64>>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            ..Self::default()
        })
    }

    /// API client over this fake with `max_attempts` tries per request, no backoff.
    pub(crate) fn client(self: &Arc<Self>, max_attempts: u32) -> ApiClient {
        ApiClient::new(Arc::clone(self) as Arc<dyn Transport>, &config())
            .with_policy(RetryPolicy::immediate(max_attempts))
    }

    pub(crate) fn set_attachments(&self, card: u64, items: &[(&str, &[u8])]) {
        self.attachments.lock().unwrap().insert(
            card,
            items
                .iter()
                .map(|(n, b)| (n.to_string(), b.to_vec()))
                .collect(),
        );
    }

    pub(crate) fn set_murmurs(&self, card: u64, body: &str) {
        self.murmurs.lock().unwrap().insert(card, body.to_string());
    }

    /// Fail the next `times` requests whose URL ends with `suffix`.
    pub(crate) fn fail(&self, suffix: &str, times: u32, how: FakeFailure) {
        self.failures
            .lock()
            .unwrap()
            .push((suffix.to_string(), times, how));
    }

    /// Serve `body` with 200 for URLs ending with `suffix`.
    pub(crate) fn override_body(&self, suffix: &str, body: &str) {
        self.overrides
            .lock()
            .unwrap()
            .push((suffix.to_string(), body.to_string()));
    }

    pub(crate) fn requests_ending_with(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.ends_with(suffix))
            .count()
    }

    pub(crate) fn page_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains("/cards.xml?page="))
            .count()
    }

    /// Payload URL of an attachment, as listed by the fake.
    pub(crate) fn file_url(card: u64, name: &str) -> String {
        format!("{}{}/{}?token=t", FILES, card, name)
    }

    fn page_body(&self, page: usize) -> String {
        let ids = match self.pages.get(page.saturating_sub(1)).or(self.pages.last()) {
            Some(ids) if !ids.is_empty() => ids,
            _ => return "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<cards type=\"array\"/>\n".to_string(),
        };
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<cards type=\"array\">\n");
        for id in ids {
            xml.push_str(&format!(
                "  <card>\n    <name>Card {id}</name>\n    <number type=\"integer\">{id}</number>\n  </card>\n"
            ));
        }
        xml.push_str("</cards>\n");
        xml
    }

    fn attachments_body(&self, card: u64) -> String {
        let attachments = self.attachments.lock().unwrap();
        let items = match attachments.get(&card) {
            Some(items) if !items.is_empty() => items,
            _ => return EMPTY_ATTACHMENTS_BODY.to_string(),
        };
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<attachments type=\"array\">\n");
        for (name, _) in items {
            xml.push_str(&format!(
                "  <attachment>\n    <url>{}</url>\n    <file_name>{}</file_name>\n  </attachment>\n",
                quick_xml::escape::escape(&Self::file_url(card, name)),
                quick_xml::escape::escape(name.as_str()),
            ));
        }
        xml.push_str("</attachments>\n");
        xml
    }

    fn take_failure(&self, url: &str) -> Option<FakeFailure> {
        let mut failures = self.failures.lock().unwrap();
        let entry = failures
            .iter_mut()
            .find(|(suffix, left, _)| *left > 0 && url.ends_with(suffix.as_str()))?;
        entry.1 -= 1;
        Some(entry.2)
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let url = request.url.as_str();
        if let Some(rest) = url.strip_prefix(FILES) {
            if request.header_value("authorization").is_some() {
                return HttpResponse::new(400, "signed payload request");
            }
            let rest = rest.trim_end_matches("?token=t");
            let (card, name) = match rest.split_once('/') {
                Some((c, n)) => (c.parse::<u64>().unwrap_or(0), n),
                None => return HttpResponse::new(404, "no such file"),
            };
            let attachments = self.attachments.lock().unwrap();
            return match attachments
                .get(&card)
                .and_then(|items| items.iter().find(|(n, _)| n == name))
            {
                Some((_, bytes)) => HttpResponse::new(200, bytes.clone()),
                None => HttpResponse::new(404, "no such file"),
            };
        }

        let base = format!("{}/api/v2/projects/{}/", HOST, PROJECT);
        let Some(path) = url.strip_prefix(base.as_str()) else {
            return HttpResponse::new(404, "unknown host");
        };
        if request.header_value("authorization").is_none() || request.header_value("date").is_none() {
            return HttpResponse::new(401, "unsigned");
        }
        if let Some(page) = path.strip_prefix("cards.xml?page=") {
            return match page.parse::<usize>() {
                Ok(n) => HttpResponse::new(200, self.page_body(n)),
                Err(_) => HttpResponse::new(400, "bad page"),
            };
        }
        if let Some(rest) = path.strip_prefix("cards/") {
            if let Some((card, tail)) = rest.split_once('/') {
                let card = card.parse::<u64>().unwrap_or(0);
                return match tail {
                    "attachments.xml" => HttpResponse::new(200, self.attachments_body(card)),
                    "murmurs.xml" => HttpResponse::new(
                        200,
                        self.murmurs
                            .lock()
                            .unwrap()
                            .get(&card)
                            .cloned()
                            .unwrap_or_else(|| EMPTY_MURMURS_BODY.to_string()),
                    ),
                    _ => HttpResponse::new(404, "not found"),
                };
            }
        }
        HttpResponse::new(404, "not found")
    }
}

impl Transport for FakeMingle {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.url.clone());
        if let Some(how) = self.take_failure(&request.url) {
            return match how {
                FakeFailure::Status(code) => Ok(HttpResponse::new(code, "scripted failure")),
                FakeFailure::Internal => Ok(HttpResponse::new(
                    500,
                    format!("<html><body>{}</body></html>", SERVICE_INTERNAL_ERROR_MARKER),
                )),
                FakeFailure::Timeout => Err(TransportError::Timeout("scripted timeout".into())),
            };
        }
        if let Some((_, body)) = self
            .overrides
            .lock()
            .unwrap()
            .iter()
            .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
        {
            return Ok(HttpResponse::new(200, body.clone()));
        }
        Ok(self.route(request))
    }
}
