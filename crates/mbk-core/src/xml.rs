//! Minimal readers for the Mingle XML documents the agent needs to look into.
//!
//! Only identifiers and links are extracted; the documents themselves are
//! persisted byte-for-byte.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One entry of `cards/{id}/attachments.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub file_name: String,
    pub url: String,
}

/// Malformed or unexpected XML.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct XmlError(String);

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError(e.to_string())
    }
}

/// Card numbers of a `cards.xml` page: the text of every `<number
/// type="integer">` that is a direct child of a `<card>`, in document order.
pub fn parse_card_numbers(xml: &str) -> Result<Vec<u64>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;
    let mut capture: Option<String> = None;
    let mut numbers = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                saw_root = true;
                if is_card_number(&e, &stack)? {
                    capture = Some(String::new());
                }
                stack.push(e.name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                saw_root = true;
                if is_card_number(&e, &stack)? {
                    return Err(XmlError("empty card <number> element".to_string()));
                }
            }
            Event::Text(t) => {
                if let Some(buf) = capture.as_mut() {
                    buf.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some(buf) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                stack.pop();
                if let Some(text) = capture.take() {
                    let n = text
                        .trim()
                        .parse::<u64>()
                        .map_err(|e| XmlError(format!("card number {:?}: {}", text, e)))?;
                    numbers.push(n);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    finish(saw_root, &stack)?;
    Ok(numbers)
}

/// `<number>` whose only attribute is `type="integer"`, directly under `<card>`.
fn is_card_number(e: &BytesStart<'_>, stack: &[Vec<u8>]) -> Result<bool, XmlError> {
    if e.name().as_ref() != b"number" || stack.last().map(Vec::as_slice) != Some(b"card".as_slice()) {
        return Ok(false);
    }
    let mut typed_integer = false;
    let mut other = false;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| XmlError(err.to_string()))?;
        if attr.key.as_ref() == b"type" && attr.unescape_value()? == "integer" {
            typed_integer = true;
        } else {
            other = true;
        }
    }
    Ok(typed_integer && !other)
}

/// Entries of an attachment list. Every `<attachment>` must carry `<url>` and
/// `<file_name>` children. Values are unescaped twice, since the service
/// HTML-escapes them before XML-escaping.
pub fn parse_attachment_list(xml: &str) -> Result<Vec<AttachmentRef>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        Url,
        FileName,
    }

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;
    let mut field: Option<(Field, String)> = None;
    let mut url: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut items = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                saw_root = true;
                let name = e.name().as_ref().to_vec();
                if name.as_slice() == b"attachment" {
                    url = None;
                    file_name = None;
                }
                if stack.last().map(Vec::as_slice) == Some(b"attachment".as_slice()) {
                    field = match name.as_slice() {
                        b"url" => Some((Field::Url, String::new())),
                        b"file_name" => Some((Field::FileName, String::new())),
                        _ => None,
                    };
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                saw_root = true;
                if stack.last().map(Vec::as_slice) == Some(b"attachment".as_slice()) {
                    match e.name().as_ref() {
                        b"url" => url = Some(String::new()),
                        b"file_name" => file_name = Some(String::new()),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                stack.pop();
                if let Some((which, text)) = field.take() {
                    match which {
                        Field::Url => url = Some(text),
                        Field::FileName => file_name = Some(text),
                    }
                } else if e.name().as_ref() == b"attachment" {
                    match (url.take(), file_name.take()) {
                        (Some(u), Some(n)) if !u.is_empty() && !n.is_empty() => {
                            items.push(AttachmentRef {
                                file_name: unescape_html(&n),
                                url: unescape_html(&u),
                            })
                        }
                        _ => {
                            return Err(XmlError(
                                "attachment without url or file_name".to_string(),
                            ))
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    finish(saw_root, &stack)?;
    Ok(items)
}

fn finish(saw_root: bool, stack: &[Vec<u8>]) -> Result<(), XmlError> {
    if !saw_root {
        return Err(XmlError("no root element".to_string()));
    }
    if let Some(open) = stack.last() {
        return Err(XmlError(format!(
            "unexpected end of document inside <{}>",
            String::from_utf8_lossy(open)
        )));
    }
    Ok(())
}

/// Second unescape pass; text that is not valid after one more pass is kept as is.
fn unescape_html(s: &str) -> String {
    match quick_xml::escape::unescape(s) {
        Ok(u) => u.into_owned(),
        Err(_) => s.to_string(),
    }
}
