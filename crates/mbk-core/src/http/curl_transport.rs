//! libcurl-backed [`Transport`]: one easy handle per request.

use std::str;
use std::time::Duration;

use super::parse::parse_header_lines;
use super::{HttpRequest, HttpResponse, Transport, TransportError};

/// Cap on the connect phase; the request timeout still bounds the whole call.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking transport over libcurl. Stateless, so one value can be shared by
/// every worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlTransport;

impl CurlTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for CurlTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut header_lines: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(&request.url).map_err(map_curl_error)?;
        easy.get(true).map_err(map_curl_error)?;
        easy.follow_location(true).map_err(map_curl_error)?;
        easy.connect_timeout(CONNECT_TIMEOUT.min(request.timeout))
            .map_err(map_curl_error)?;
        easy.timeout(request.timeout).map_err(map_curl_error)?;

        // Build curl list for custom headers (e.g. "authorization: APIAuth ...").
        let mut list = curl::easy::List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))
                .map_err(map_curl_error)?;
        }
        if !request.headers.is_empty() {
            easy.http_headers(list).map_err(map_curl_error)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        header_lines.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(map_curl_error)?;
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(map_curl_error)?;
            transfer.perform().map_err(map_curl_error)?;
        }

        let status = easy.response_code().map_err(map_curl_error)?;
        Ok(HttpResponse {
            status,
            headers: parse_header_lines(&header_lines),
            body,
        })
    }
}

/// Map a curl error onto the transport taxonomy used for retry decisions.
fn map_curl_error(e: curl::Error) -> TransportError {
    if e.is_operation_timedout() {
        return TransportError::Timeout(e.to_string());
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return TransportError::Connection(e.to_string());
    }
    TransportError::Other(e.to_string())
}
