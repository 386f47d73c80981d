//! Single-lane FIFO write queue.

use crate::placeables::Kind;
use crate::store::{ObjectUpdate, UpdateContext, WriteGateway};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};

/// One batched write for a single kind.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteJob {
    pub kind: Kind,
    pub updates: Vec<ObjectUpdate>,
    pub context: UpdateContext,
}

enum QueueMessage {
    Write(WriteJob),
    Flush(oneshot::Sender<()>),
}

/// Serializes every cascade write through one worker task, so overlapping
/// cascades never interleave partial writes to the same object.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
    pending: Arc<AtomicUsize>,
}

impl WriteQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(gateway: Arc<WriteGateway>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueueMessage>();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    QueueMessage::Write(job) => {
                        let count = job.updates.len();
                        match gateway
                            .update_documents(job.kind, job.updates, job.context)
                            .await
                        {
                            Ok(keys) => {
                                log::debug!("Wrote {}/{} {} updates", keys.len(), count, job.kind)
                            }
                            Err(e) => log::warn!("Queued {} write failed: {}", job.kind, e),
                        }
                        worker_pending.fetch_sub(1, Ordering::AcqRel);
                    }
                    QueueMessage::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            log::debug!("Write queue closed");
        });

        Self { tx, pending }
    }

    /// Append a job. Returns `false` if the worker has stopped.
    pub fn enqueue(&self, job: WriteJob) -> bool {
        if job.updates.is_empty() {
            return true;
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(QueueMessage::Write(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            log::warn!("Write queue is closed, dropping job");
            return false;
        }
        true
    }

    /// Jobs enqueued but not yet written.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until every job is written, including jobs enqueued by writes
    /// that were themselves in the queue.
    pub async fn flush(&self) {
        loop {
            let (ack, done) = oneshot::channel();
            if self.tx.send(QueueMessage::Flush(ack)).is_err() {
                return;
            }
            if done.await.is_err() || self.pending() == 0 {
                return;
            }
        }
    }
}
