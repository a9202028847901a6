//! Minimal HTTP/1.1 server that imitates the Mingle endpoints the agent uses.
//!
//! Card pages past the last configured page repeat the last page, as the real
//! service does. API paths require an `APIAuth` header; attachment payloads
//! under `/files/` reject one. Scripted failures are served by path.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const PROJECT: &str = "demo";
pub const INTERNAL_ERROR_PAGE: &str =
    "<html><body><h1>We're sorry but Mingle found a problem it couldn't fix</h1></body></html>";
const EMPTY_ATTACHMENTS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<attachments type=\"array\"/>\n";
const EMPTY_MURMURS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<murmurs type=\"array\"/>\n";

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Status(u16),
    Internal,
}

#[derive(Debug, Default)]
pub struct Scenario {
    /// Card numbers per page, page 1 first.
    pub pages: Vec<Vec<u64>>,
    /// Attachments per card: (file name, payload).
    pub attachments: HashMap<u64, Vec<(String, Vec<u8>)>>,
    pub murmurs: HashMap<u64, String>,
    /// Path (without query) -> (remaining failures, how).
    pub failures: HashMap<String, (u32, Failure)>,
}

#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub signed: bool,
}

pub struct MingleServer {
    pub base: String,
    state: Arc<Mutex<Scenario>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl MingleServer {
    /// Starts the server in a background thread. It runs until the process exits.
    pub fn start(scenario: Scenario) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let base = format!("http://127.0.0.1:{}", port);
        let state = Arc::new(Mutex::new(scenario));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let state = Arc::clone(&state);
            let seen = Arc::clone(&seen);
            let base = base.clone();
            thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    let state = Arc::clone(&state);
                    let seen = Arc::clone(&seen);
                    let base = base.clone();
                    thread::spawn(move || handle(stream, &base, &state, &seen));
                }
            });
        }
        Self { base, state, seen }
    }

    /// Requests whose path (query included) ends with `suffix`.
    pub fn hits(&self, suffix: &str) -> Vec<Seen> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.path.ends_with(suffix))
            .cloned()
            .collect()
    }
}

fn handle(mut stream: TcpStream, base: &str, state: &Mutex<Scenario>, seen: &Mutex<Vec<Seen>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&raw).into_owned();
    let mut lines = request.lines();
    let path = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let auth = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("authorization"))
        .map(|(_, v)| v.trim().to_string());
    seen.lock().unwrap().push(Seen {
        path: path.clone(),
        signed: auth.is_some(),
    });

    let (status, body) = respond(&path, auth.as_deref(), base, &mut state.lock().unwrap());
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
}

fn respond(path: &str, auth: Option<&str>, base: &str, s: &mut Scenario) -> (&'static str, Vec<u8>) {
    let bare = path.split('?').next().unwrap_or(path).to_string();
    if let Some((left, how)) = s.failures.get_mut(&bare) {
        if *left > 0 {
            *left -= 1;
            return match how {
                Failure::Status(503) => ("503 Service Unavailable", b"busy".to_vec()),
                Failure::Status(_) => ("500 Internal Server Error", b"boom".to_vec()),
                Failure::Internal => ("500 Internal Server Error", INTERNAL_ERROR_PAGE.as_bytes().to_vec()),
            };
        }
    }

    if let Some(rest) = bare.strip_prefix("/files/") {
        if auth.is_some() {
            return ("400 Bad Request", b"signed payload request".to_vec());
        }
        let Some((card, name)) = rest.split_once('/') else {
            return ("404 Not Found", Vec::new());
        };
        let card: u64 = card.parse().unwrap_or(0);
        return match s
            .attachments
            .get(&card)
            .and_then(|items| items.iter().find(|(n, _)| n == name))
        {
            Some((_, bytes)) => ("200 OK", bytes.clone()),
            None => ("404 Not Found", Vec::new()),
        };
    }

    let api = format!("/api/v2/projects/{}/", PROJECT);
    let Some(rest) = path.strip_prefix(api.as_str()) else {
        return ("404 Not Found", Vec::new());
    };
    if !auth.map_or(false, |a| a.starts_with("APIAuth ")) {
        return ("401 Unauthorized", b"unsigned".to_vec());
    }
    if let Some(page) = rest.strip_prefix("cards.xml?page=") {
        let n: usize = page.parse().unwrap_or(0);
        return ("200 OK", page_xml(&s.pages, n).into_bytes());
    }
    let parts: Vec<&str> = rest.split('/').collect();
    match parts.as_slice() {
        ["cards", card, "attachments.xml"] => {
            let card: u64 = card.parse().unwrap_or(0);
            ("200 OK", attachments_xml(base, card, s.attachments.get(&card)).into_bytes())
        }
        ["cards", card, "murmurs.xml"] => {
            let card: u64 = card.parse().unwrap_or(0);
            let body = s.murmurs.get(&card).cloned().unwrap_or_else(|| EMPTY_MURMURS.to_string());
            ("200 OK", body.into_bytes())
        }
        _ => ("404 Not Found", Vec::new()),
    }
}

fn page_xml(pages: &[Vec<u64>], n: usize) -> String {
    let ids = pages.get(n.saturating_sub(1)).or(pages.last());
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    match ids {
        Some(ids) if !ids.is_empty() => {
            xml.push_str("<cards type=\"array\">\n");
            for id in ids {
                xml.push_str(&format!(
                    "  <card>\n    <name>Card {id}</name>\n    <number type=\"integer\">{id}</number>\n    <card_type><name>Story</name></card_type>\n  </card>\n"
                ));
            }
            xml.push_str("</cards>\n");
        }
        _ => xml.push_str("<cards type=\"array\"/>\n"),
    }
    xml
}

fn attachments_xml(base: &str, card: u64, items: Option<&Vec<(String, Vec<u8>)>>) -> String {
    let Some(items) = items.filter(|i| !i.is_empty()) else {
        return EMPTY_ATTACHMENTS.to_string();
    };
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<attachments type=\"array\">\n");
    for (name, _) in items {
        xml.push_str(&format!(
            "  <attachment>\n    <url>{base}/files/{card}/{name}?sig=a&amp;exp=1</url>\n    <file_name>{name}</file_name>\n  </attachment>\n"
        ));
    }
    xml.push_str("</attachments>\n");
    xml
}
