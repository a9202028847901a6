//! Fetching and reading one page of cards.

use crate::client::{ApiClient, FetchError};
use crate::xml;

/// Lowest and highest card number on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRange {
    pub min: u64,
    pub max: u64,
}

/// One page of `cards.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// The `page` request parameter.
    pub number: u64,
    /// Raw response body, persisted unchanged.
    pub body: Vec<u8>,
    /// Card numbers in document order.
    pub ids: Vec<u64>,
    /// `None` when the page lists no cards.
    pub range: Option<RecordRange>,
}

impl Page {
    /// Build a page from its body, reading out the card numbers.
    pub fn parse(number: u64, body: Vec<u8>) -> Result<Self, xml::XmlError> {
        let ids = xml::parse_card_numbers(&String::from_utf8_lossy(&body))?;
        let range = match (ids.iter().min(), ids.iter().max()) {
            (Some(&min), Some(&max)) => Some(RecordRange { min, max }),
            _ => None,
        };
        Ok(Self {
            number,
            body,
            ids,
            range,
        })
    }
}

/// GET and parse page `number`.
pub fn try_fetch_page(client: &ApiClient, number: u64) -> Result<Page, FetchError> {
    let url = client.cards_page_url(number);
    let response = client.get_api(&url)?;
    Page::parse(number, response.body).map_err(|e| FetchError::Parse {
        url,
        detail: e.to_string(),
    })
}

/// Fetch page `number`, logging any failure and returning `None`. An empty
/// page is `Some` with no range.
///
/// Nothing is recorded here: a round fetches pages past the end of the data
/// too, and only pages the sweep actually examines count as failed.
pub fn fetch_page(client: &ApiClient, number: u64) -> Option<Page> {
    match try_fetch_page(client, number) {
        Ok(page) => Some(page),
        Err(e) => {
            tracing::warn!(page = number, error = %e, "failed to fetch card page");
            None
        }
    }
}
