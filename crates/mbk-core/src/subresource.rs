//! Per-card sub-resources: the murmur feed and the attachments.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::client::{ApiClient, FetchError};
use crate::executor::{FetchOutcome, WorkerPool};
use crate::storage::BackupStore;
use crate::xml::{self, AttachmentRef};

/// Body Mingle returns for a card with no attachments.
pub const EMPTY_ATTACHMENTS_BODY: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<attachments type=\"array\"/>\n";

/// Body Mingle returns for a card with no murmurs.
pub const EMPTY_MURMURS_BODY: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<murmurs type=\"array\"/>\n";

/// Save the murmur feed of `card` unless it is empty. Failures land in the
/// failed-murmurs list. Returns whether a file was written.
pub fn fetch_murmurs(client: &ApiClient, store: &BackupStore, card: u64) -> bool {
    let url = client.murmurs_url(card);
    let res = client.get_api(&url).map_err(anyhow::Error::from).and_then(|response| {
        if response.body == EMPTY_MURMURS_BODY.as_bytes() {
            return Ok(false);
        }
        store.save_murmurs(card, &response.body)?;
        Ok(true)
    });
    match res {
        Ok(written) => {
            tracing::debug!(card, written, "murmurs done");
            written
        }
        Err(e) => {
            store.record_failed_murmurs(card);
            tracing::error!(card, error = %format!("{:#}", e), "failed to get murmurs");
            false
        }
    }
}

/// Outcome of the attachment pipeline for one card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentReport {
    /// Attachment files written.
    pub saved: usize,
    /// Names still failing after the last round.
    pub failed: BTreeSet<String>,
    /// Rounds run (list fetch included).
    pub rounds: u32,
    /// The attachment list itself could not be read.
    pub list_failed: bool,
}

/// Fetch the attachment list of `card`, then every attachment on `items`.
///
/// Round 0 downloads every listed item; each of the following `retry_rounds`
/// rounds re-reads the list (item URLs expire) and downloads only the names
/// that failed in the round before. Names still failing afterwards are
/// recorded as `{card}-{name}`.
pub fn fetch_attachments(
    client: &Arc<ApiClient>,
    store: &Arc<BackupStore>,
    items: &WorkerPool,
    card: u64,
    retry_rounds: u32,
) -> AttachmentReport {
    let mut report = AttachmentReport::default();
    let mut pending: Option<BTreeSet<String>> = None;

    for round in 0..=retry_rounds {
        report.rounds = round + 1;
        let list = match fetch_attachment_list(client, card) {
            Ok(list) => list,
            Err(e) => {
                store.record_failed_attachment_list(card);
                tracing::error!(card, round, error = %e, "failed to get attachment list");
                report.list_failed = true;
                for name in pending.unwrap_or_default() {
                    store.record_failed_attachment(card, &name);
                    report.failed.insert(name);
                }
                return report;
            }
        };

        let wanted: Vec<AttachmentRef> = match &pending {
            None => list,
            Some(names) => list.into_iter().filter(|a| names.contains(&a.file_name)).collect(),
        };
        // Names that vanished from the list stay failed.
        let mut failed: BTreeSet<String> = pending
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .filter(|n| !wanted.iter().any(|a| &a.file_name == *n))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let (saved, round_failed) = download_round(client, store, items, card, wanted);
        report.saved += saved;
        failed.extend(round_failed);

        if failed.is_empty() {
            tracing::debug!(card, saved = report.saved, "attachments done");
            return report;
        }
        if round < retry_rounds {
            tracing::warn!(card, retry = round + 1, failed = failed.len(), "retrying attachments");
        }
        pending = Some(failed);
    }

    let failed = pending.unwrap_or_default();
    for name in &failed {
        store.record_failed_attachment(card, name);
    }
    tracing::error!(
        card,
        rounds = report.rounds,
        failed = ?failed,
        "gave up on attachments; see error log"
    );
    report.failed = failed;
    report
}

fn fetch_attachment_list(client: &ApiClient, card: u64) -> Result<Vec<AttachmentRef>, FetchError> {
    let url = client.attachments_url(card);
    let response = client.get_api(&url)?;
    if response.body == EMPTY_ATTACHMENTS_BODY.as_bytes() {
        return Ok(Vec::new());
    }
    xml::parse_attachment_list(&response.text()).map_err(|e| FetchError::Parse {
        url,
        detail: e.to_string(),
    })
}

/// Download `wanted` on the item pool. Returns (saved, failed names).
fn download_round(
    client: &Arc<ApiClient>,
    store: &Arc<BackupStore>,
    items: &WorkerPool,
    card: u64,
    wanted: Vec<AttachmentRef>,
) -> (usize, BTreeSet<String>) {
    if wanted.is_empty() {
        return (0, BTreeSet::new());
    }
    let names: Vec<String> = wanted.iter().map(|a| a.file_name.clone()).collect();
    let mut group = items.group::<()>();
    for attachment in wanted {
        let client = Arc::clone(client);
        let store = Arc::clone(store);
        group.submit_fallible(move || download_one(&client, &store, card, &attachment));
    }

    let outcomes = match group.await_all() {
        Ok(outcomes) => outcomes,
        Err(e) => {
            tracing::error!(card, error = %e, "attachment round lost results");
            return (0, names.into_iter().collect());
        }
    };
    let mut saved = 0;
    let mut failed = BTreeSet::new();
    for (name, outcome) in names.into_iter().zip(outcomes) {
        match outcome {
            FetchOutcome::Success(()) => saved += 1,
            FetchOutcome::Failure(detail) => {
                tracing::warn!(card, attachment = %name, error = %detail, "attachment failed");
                failed.insert(name);
            }
        }
    }
    (saved, failed)
}

fn download_one(client: &ApiClient, store: &BackupStore, card: u64, attachment: &AttachmentRef) -> anyhow::Result<()> {
    let response = client.get_download(&attachment.url)?;
    store.save_attachment(card, &attachment.file_name, &response.body)?;
    tracing::info!(card, attachment = %attachment.file_name, bytes = response.body.len(), "got attachment");
    Ok(())
}
