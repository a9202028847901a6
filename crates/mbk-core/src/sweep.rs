//! Pagination sweep: walk `cards.xml?page=N` until the data runs out.
//!
//! The API has no total count and, past the last page, keeps answering with
//! the final page again. Pages are requested in rounds of `batch_size`
//! concurrent fetches; once a round is complete its pages are examined in page
//! order, and the sweep stops at the first page whose lowest card number was
//! already seen in this run (or at an empty page). Any examined page that cannot be
//! fetched stops the sweep as aborted and is recorded as failed; pages after
//! the stop are never recorded.
//!
//! Whatever way the sweep ends, the work queue receives its end marker.

use std::collections::HashSet;
use std::sync::Arc;

use crate::client::ApiClient;
use crate::executor::{FetchOutcome, WorkerPool};
use crate::pages::{fetch_page, Page};
use crate::queue::WorkSender;
use crate::storage::BackupStore;

/// Why the sweep stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepEnd {
    /// A repeated or empty page was reached: every card has been enqueued.
    Exhausted,
    /// A page could not be fetched or saved; later pages were never examined.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub end: SweepEnd,
    /// Rounds started.
    pub rounds: u64,
    /// Page files written.
    pub pages_saved: usize,
    /// Card numbers pushed onto the work queue.
    pub records_enqueued: usize,
    /// Page number that ended the sweep.
    pub stop_page: u64,
}

/// Producer of the work queue.
#[derive(Debug)]
pub struct PaginationSweep {
    client: Arc<ApiClient>,
    store: Arc<BackupStore>,
    batch_size: u64,
}

impl PaginationSweep {
    pub fn new(client: Arc<ApiClient>, store: Arc<BackupStore>, batch_size: u64) -> Self {
        Self {
            client,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Run the sweep on `pool`, pushing card numbers onto `queue`.
    pub fn run(&self, pool: &WorkerPool, mut queue: WorkSender) -> SweepReport {
        let mut report = SweepReport {
            end: SweepEnd::Aborted,
            rounds: 0,
            pages_saved: 0,
            records_enqueued: 0,
            stop_page: 0,
        };
        let (end, stop_page) = self.rounds(pool, &mut queue, &mut report);
        report.end = end;
        report.stop_page = stop_page;
        report.records_enqueued = queue.pushed();
        queue.finish();

        match end {
            SweepEnd::Exhausted => tracing::info!(
                pages = report.pages_saved,
                cards = report.records_enqueued,
                "all card pages retrieved"
            ),
            SweepEnd::Aborted => tracing::error!(
                page = stop_page,
                pages = report.pages_saved,
                cards = report.records_enqueued,
                "stopped retrieving cards; see error log"
            ),
        }
        report
    }

    fn rounds(&self, pool: &WorkerPool, queue: &mut WorkSender, report: &mut SweepReport) -> (SweepEnd, u64) {
        let mut seen_min: HashSet<u64> = HashSet::new();
        let mut first = 1u64;
        loop {
            report.rounds += 1;
            let mut group = pool.group::<Option<Page>>();
            for number in first..first + self.batch_size {
                let client = Arc::clone(&self.client);
                group.submit(move || fetch_page(&client, number));
            }
            tracing::debug!(round = report.rounds, first, last = first + self.batch_size - 1, "card page round");

            let outcomes = match group.await_all() {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    tracing::error!(error = %e, first_page = first, "card page round lost results");
                    return (SweepEnd::Aborted, first);
                }
            };

            for (number, outcome) in (first..).zip(outcomes) {
                let page = match outcome {
                    FetchOutcome::Success(Some(page)) => page,
                    FetchOutcome::Success(None) => {
                        self.store.record_failed_page(number);
                        tracing::error!(page = number, "could not retrieve card page");
                        return (SweepEnd::Aborted, number);
                    }
                    FetchOutcome::Failure(detail) => {
                        self.store.record_failed_page(number);
                        tracing::error!(page = number, error = %detail, "card page task failed");
                        return (SweepEnd::Aborted, number);
                    }
                };
                let Some(range) = page.range else {
                    tracing::debug!(page = number, "empty card page");
                    return (SweepEnd::Exhausted, number);
                };
                if !seen_min.insert(range.min) {
                    tracing::debug!(page = number, min = range.min, "card page repeats an earlier page");
                    return (SweepEnd::Exhausted, number);
                }
                if let Err(e) = self.store.save_page(range.min, range.max, &page.body) {
                    self.store.record_failed_page(number);
                    tracing::error!(page = number, error = %format!("{:#}", e), "failed to save card page");
                    return (SweepEnd::Aborted, number);
                }
                report.pages_saved += 1;
                for &id in &page.ids {
                    queue.push(id);
                }
                tracing::info!(page = number, min = range.min, max = range.max, "got cards {} - {}", range.min, range.max);
            }
            first += self.batch_size;
        }
    }
}
