//! Bounded job queue between the request reader and the worker pool
//!
//! `enqueue` waits while the queue is full, which stalls the reader and with it stdin
//! consumption. Workers share one receiver and race for the next job, so jobs leave in
//! arrival order but may finish in any order.

use keytag_common::protocol::TagRequest;
use keytag_common::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Create a queue holding at most `capacity` pending jobs
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        JobSender { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half, owned by the request reader
#[derive(Debug)]
pub struct JobSender {
    tx: mpsc::Sender<TagRequest>,
}

impl JobSender {
    /// Queue a job, waiting for space if the queue is full
    pub async fn enqueue(&self, request: TagRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| Error::Internal("job queue closed: no workers running".to_string()))
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer half, cloned into every worker
#[derive(Debug, Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<TagRequest>>>,
}

impl JobReceiver {
    /// Next job, or `None` once the sender is gone and the queue is empty
    pub async fn next_job(&self) -> Option<TagRequest> {
        self.rx.lock().await.recv().await
    }

    /// Drop every job still waiting; returns how many were discarded
    pub async fn discard_pending(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}
