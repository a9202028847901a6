//! One complete backup run.
//!
//! The sweep (producer) and the work-queue consumer run side by side on a
//! pool of two. The consumer hands every card number to the record pool as
//! two jobs, attachments and murmurs, and waits for all of them once the
//! queue ends. Only setup (resetting the destination, starting pools) can
//! fail the run; everything else ends up in the failure lists.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::client::ApiClient;
use crate::config::MbkConfig;
use crate::executor::{ExecutorError, FetchOutcome, WorkerPool};
use crate::http::{CurlTransport, Transport};
use crate::queue::{work_queue, WorkReceiver};
use crate::storage::{BackupStore, FailureSummary, WriteCounts};
use crate::subresource::{fetch_attachments, fetch_murmurs};
use crate::sweep::{PaginationSweep, SweepReport};

/// Workers of the top-level pool: the sweep and the consumer.
const TOP_LEVEL_WORKERS: usize = 2;

/// What a run achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// `None` when the sweep task itself failed.
    pub sweep: Option<SweepReport>,
    /// Cards taken off the work queue.
    pub records: usize,
    pub written: WriteCounts,
    pub failures: FailureSummary,
}

impl BackupReport {
    /// Every page, attachment and murmur feed came through.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
            && matches!(&self.sweep, Some(s) if s.end == crate::sweep::SweepEnd::Exhausted)
    }
}

enum Stage {
    Sweep(SweepReport),
    Consumer(usize),
}

pub struct BackupAgent {
    cfg: MbkConfig,
    client: Arc<ApiClient>,
    store: Arc<BackupStore>,
}

impl BackupAgent {
    /// Agent talking to the configured host over libcurl.
    pub fn new(cfg: MbkConfig) -> Self {
        Self::with_transport(cfg, Arc::new(CurlTransport::new()))
    }

    pub fn with_transport(cfg: MbkConfig, transport: Arc<dyn Transport>) -> Self {
        let client = ApiClient::new(transport, &cfg);
        Self::with_client(cfg, client)
    }

    pub fn with_client(cfg: MbkConfig, client: ApiClient) -> Self {
        let store = Arc::new(BackupStore::new(cfg.destination.clone()));
        Self {
            cfg,
            client: Arc::new(client),
            store,
        }
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    /// Run the backup to completion.
    pub fn run(&self) -> Result<BackupReport> {
        self.store
            .reset()
            .with_context(|| format!("prepare backup destination {}", self.store.root().display()))?;
        tracing::info!(
            destination = %self.store.root().display(),
            batch_size = self.cfg.batch_size,
            "starting backup"
        );

        let pools = &self.cfg.pools;
        let top = WorkerPool::new("backup", TOP_LEVEL_WORKERS).context("start top-level pool")?;
        let pages = Arc::new(WorkerPool::new("pages", pools.pages).context("start page pool")?);
        let records = Arc::new(WorkerPool::new("records", pools.records).context("start record pool")?);
        let items =
            Arc::new(WorkerPool::new("items", pools.attachment_items).context("start attachment pool")?);

        let (queue_tx, queue_rx) = work_queue();
        let mut group = top.group::<Stage>();
        {
            let sweep = PaginationSweep::new(
                Arc::clone(&self.client),
                Arc::clone(&self.store),
                self.cfg.batch_size,
            );
            let pages = Arc::clone(&pages);
            group.submit(move || Stage::Sweep(sweep.run(&pages, queue_tx)));
        }
        {
            let consumer = Consumer {
                client: Arc::clone(&self.client),
                store: Arc::clone(&self.store),
                records: Arc::clone(&records),
                items: Arc::clone(&items),
                retry_rounds: self.cfg.attachment_retry_rounds,
            };
            group.submit_fallible(move || consumer.run(queue_rx).map(Stage::Consumer));
        }

        let mut report = BackupReport {
            sweep: None,
            records: 0,
            written: WriteCounts::default(),
            failures: FailureSummary::default(),
        };
        match group.await_all() {
            Ok(outcomes) => {
                for (name, outcome) in ["card sweep", "card consumer"].into_iter().zip(outcomes) {
                    match outcome {
                        FetchOutcome::Success(Stage::Sweep(s)) => report.sweep = Some(s),
                        FetchOutcome::Success(Stage::Consumer(n)) => report.records = n,
                        FetchOutcome::Failure(detail) => {
                            tracing::error!(task = name, error = %detail, "backup task failed")
                        }
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "backup tasks lost"),
        }

        report.written = self.store.written();
        report.failures = self.store.failures();
        log_summary(&report);
        Ok(report)
    }
}

/// Drains the work queue onto the record pool.
struct Consumer {
    client: Arc<ApiClient>,
    store: Arc<BackupStore>,
    records: Arc<WorkerPool>,
    items: Arc<WorkerPool>,
    retry_rounds: u32,
}

impl Consumer {
    fn run(self, queue: WorkReceiver) -> Result<usize, ExecutorError> {
        let mut group = self.records.group::<()>();
        let mut cards = 0usize;
        while let Some(card) = queue.next_record() {
            cards += 1;
            {
                let client = Arc::clone(&self.client);
                let store = Arc::clone(&self.store);
                let items = Arc::clone(&self.items);
                let rounds = self.retry_rounds;
                group.submit(move || {
                    fetch_attachments(&client, &store, &items, card, rounds);
                });
            }
            {
                let client = Arc::clone(&self.client);
                let store = Arc::clone(&self.store);
                group.submit(move || {
                    fetch_murmurs(&client, &store, card);
                });
            }
        }
        tracing::info!(cards, jobs = group.submitted(), "all cards queued; waiting for attachments and murmurs");

        for outcome in group.await_all()? {
            if let FetchOutcome::Failure(detail) = outcome {
                tracing::error!(error = %detail, "card job failed");
            }
        }
        tracing::info!(cards, "finished getting attachments and murmurs");
        Ok(cards)
    }
}

fn log_summary(report: &BackupReport) {
    let w = &report.written;
    let f = &report.failures;
    if f.is_empty() {
        tracing::info!(
            pages = w.pages,
            attachments = w.attachments,
            murmurs = w.murmurs,
            cards = report.records,
            "backup finished"
        );
        return;
    }
    if !f.pages.is_empty() {
        tracing::error!(pages = ?f.pages, "failed to retrieve these pages of cards");
    }
    if !f.attachments.is_empty() {
        tracing::error!(attachments = ?f.attachments, "failed to retrieve these attachments");
    }
    if !f.comments.is_empty() {
        tracing::error!(cards = ?f.comments, "failed to retrieve murmurs of these cards");
    }
    tracing::warn!(
        pages = w.pages,
        attachments = w.attachments,
        murmurs = w.murmurs,
        cards = report.records,
        failed = f.total(),
        "backup finished with failures"
    );
}
