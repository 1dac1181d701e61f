use crate::capture::record::RequestRecord;
use crate::error::PutterError;
use crate::metrics::registry::METRICS;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Shared backing sequence, newest record at the front.
type Records = Arc<RwLock<VecDeque<RequestRecord>>>;

/// Build a bounded history of `capacity` records.
///
/// Returns three handles:
/// - `HistoryWriter`: cloned into every request handler, enqueues records
/// - `HistoryView`: cloned into the inspection path, takes snapshots
/// - `HistoryConsumer`: the single task allowed to mutate the sequence
///
/// Invariants:
/// - Insertion order equals ingestion order (one drainer, FIFO queue)
/// - Insertions never interleave
///
/// The queue holds at most `capacity` pending records. A handler that finds it
/// full waits for the consumer; this is the only backpressure in the system.
pub fn history(
    capacity: usize,
) -> Result<(HistoryWriter, HistoryView, HistoryConsumer), PutterError> {
    if capacity == 0 {
        return Err(PutterError::InvalidCapacity(capacity));
    }

    let (tx, rx) = mpsc::channel(capacity);
    let records: Records = Arc::new(RwLock::new(VecDeque::with_capacity(capacity)));

    Ok((
        HistoryWriter { tx },
        HistoryView {
            records: Arc::clone(&records),
        },
        HistoryConsumer {
            rx,
            records,
            capacity,
        },
    ))
}

/// Producer side of the ingestion queue.
#[derive(Clone, Debug)]
pub struct HistoryWriter {
    tx: mpsc::Sender<RequestRecord>,
}

impl HistoryWriter {
    /// Queue a record for insertion.
    ///
    /// Suspends while the queue is full. Fails only if the consumer has exited.
    pub async fn ingest(&self, record: RequestRecord) -> Result<(), PutterError> {
        self.tx
            .send(record)
            .await
            .map_err(|_| PutterError::HistoryClosed)
    }
}

/// Read-only access to the history.
#[derive(Clone, Debug)]
pub struct HistoryView {
    records: Records,
}

impl HistoryView {
    /// Copy of the current records, newest first.
    ///
    /// Taken under the read lock, so it never observes a half-applied
    /// eviction/insertion. It may miss a record ingested concurrently.
    pub fn snapshot(&self) -> Result<Vec<RequestRecord>, PutterError> {
        let records = self.records.read().map_err(|_| PutterError::LockPoisoned)?;
        Ok(records.iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer side: drains the queue and owns all mutation of the sequence.
#[derive(Debug)]
pub struct HistoryConsumer {
    rx: mpsc::Receiver<RequestRecord>,
    records: Records,
    capacity: usize,
}

impl HistoryConsumer {
    /// Drain the queue until every writer is dropped.
    ///
    /// In the server this never returns: the pipeline holds a writer for the
    /// life of the process.
    pub async fn run(mut self) {
        while let Some(record) = self.rx.recv().await {
            if let Err(e) = self.insert(record) {
                error!(error = %e, "history insert failed");
            }
        }
        debug!("history ingestion queue closed");
    }

    /// Apply one record: evict the oldest if full, then insert at the front.
    ///
    /// The write lock is held only for this O(1) step and never across an await.
    fn insert(&self, record: RequestRecord) -> Result<(), PutterError> {
        let mut records = self.records.write().map_err(|_| PutterError::LockPoisoned)?;
        if records.len() >= self.capacity {
            records.pop_back();
            METRICS.inc_history_evictions();
        }
        records.push_front(record);
        Ok(())
    }
}
