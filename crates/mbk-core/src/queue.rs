//! Work queue between the pagination sweep (producer) and the per-card
//! fan-out (consumer).
//!
//! Unbounded FIFO of [`WorkItem`]s. The producer side pushes exactly one
//! [`WorkItem::End`]: explicitly via [`WorkSender::finish`], or from `Drop`
//! when the producer exits any other way.

use std::sync::mpsc;

/// Message on the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItem {
    /// A card number to back up.
    Record(u64),
    /// No more records will ever be pushed.
    End,
}

/// Create a connected producer/consumer pair.
pub fn work_queue() -> (WorkSender, WorkReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        WorkSender {
            tx,
            pushed: 0,
            ended: false,
        },
        WorkReceiver { rx },
    )
}

/// Producer half.
#[derive(Debug)]
pub struct WorkSender {
    tx: mpsc::Sender<WorkItem>,
    pushed: usize,
    ended: bool,
}

impl WorkSender {
    /// Enqueue a card number. Dropped silently if the consumer is gone.
    pub fn push(&mut self, id: u64) {
        if self.tx.send(WorkItem::Record(id)).is_ok() {
            self.pushed += 1;
        }
    }

    /// Number of records successfully enqueued.
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    /// Push the terminal marker.
    pub fn finish(mut self) {
        self.end();
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            let _ = self.tx.send(WorkItem::End);
        }
    }
}

impl Drop for WorkSender {
    fn drop(&mut self) {
        self.end();
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct WorkReceiver {
    rx: mpsc::Receiver<WorkItem>,
}

impl WorkReceiver {
    /// Block for the next card number; `None` once the end marker arrives.
    pub fn next_record(&self) -> Option<u64> {
        match self.rx.recv() {
            Ok(WorkItem::Record(id)) => Some(id),
            Ok(WorkItem::End) | Err(_) => None,
        }
    }

    /// Raw next message (`None` when the producer vanished without a marker).
    pub fn recv(&self) -> Option<WorkItem> {
        self.rx.recv().ok()
    }
}
