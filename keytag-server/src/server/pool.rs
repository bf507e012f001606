//! Worker pool
//!
//! A fixed set of workers, each looping: take one job from the queue, run it on the
//! blocking thread pool, send exactly one response to the sink. Any failure of a job,
//! including a panic inside the tag adapter, becomes an error response for that job only.

use super::queue::JobReceiver;
use super::sink::ResponseSink;
use crate::tagging::{TagError, TagWriter};
use keytag_common::protocol::{TagAction, TagRequest, TagResponse};
use keytag_common::{Error, Result};
use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fixed-size pool of tagging workers
pub struct WorkerPool {
    workers: Vec<JoinHandle<u64>>,
}

impl WorkerPool {
    /// Spawn `count` workers sharing `jobs` and `sink`
    ///
    /// Workers exit when the queue is closed and empty or when `abort` is cancelled; a job
    /// already taken is always finished first. A worker that finds the sink gone cancels
    /// `abort` itself.
    pub fn spawn(
        count: usize,
        jobs: JobReceiver,
        tagger: Arc<dyn TagWriter>,
        sink: ResponseSink,
        abort: CancellationToken,
    ) -> Result<Self> {
        if count == 0 {
            return Err(Error::Startup("worker pool needs at least one worker".to_string()));
        }

        let workers = (0..count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    jobs.clone(),
                    Arc::clone(&tagger),
                    sink.clone(),
                    abort.clone(),
                ))
            })
            .collect();

        info!("Worker pool started with {} workers", count);
        Ok(Self { workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to exit; returns the number of jobs completed
    pub async fn join(self) -> u64 {
        let mut completed = 0;
        for (worker_id, handle) in self.workers.into_iter().enumerate() {
            match handle.await {
                Ok(jobs) => completed += jobs,
                Err(e) => error!(worker_id, error = %e, "Worker task failed"),
            }
        }
        completed
    }
}

async fn worker_loop(
    worker_id: usize,
    jobs: JobReceiver,
    tagger: Arc<dyn TagWriter>,
    sink: ResponseSink,
    abort: CancellationToken,
) -> u64 {
    debug!("Worker {} started", worker_id);
    let mut completed = 0u64;

    loop {
        let job = tokio::select! {
            biased;
            _ = abort.cancelled() => break,
            job = jobs.next_job() => job,
        };
        let Some(request) = job else {
            break;
        };

        debug!(
            worker_id,
            id = %request.id,
            file = %request.filename(),
            action = ?request.action,
            "Processing request"
        );

        let response = run_job(Arc::clone(&tagger), request).await;
        completed += 1;

        if sink.send(response).await.is_err() {
            // Nobody can hear the rest of the pool either
            warn!("Worker {} stopping: response writer is gone", worker_id);
            abort.cancel();
            break;
        }
    }

    debug!("Worker {} exiting after {} jobs", worker_id, completed);
    completed
}

/// Run one job on the blocking pool, turning a panic into an error response
pub async fn run_job(tagger: Arc<dyn TagWriter>, request: TagRequest) -> TagResponse {
    let id = request.id.clone();
    let filename = request.filename();

    match tokio::task::spawn_blocking(move || execute(tagger.as_ref(), &request)).await {
        Ok(response) => response,
        Err(e) => {
            let reason = if e.is_panic() {
                TagError::Panicked(panic_message(e.into_panic()))
            } else {
                TagError::Panicked("job was cancelled".to_string())
            };
            error!(id = %id, file = %filename, error = %reason, "Tag job aborted");
            TagResponse::error(id, filename, reason.to_string())
        }
    }
}

/// Execute a request against the adapter synchronously
pub fn execute(tagger: &dyn TagWriter, request: &TagRequest) -> TagResponse {
    let filename = request.filename();
    let path = Path::new(&request.path);

    if !path.exists() {
        return TagResponse::error(&request.id, filename, TagError::NotFound.to_string());
    }

    match request.action {
        TagAction::Write => {
            let key = request.key.as_deref().unwrap_or_default();
            if key.is_empty() {
                return TagResponse::error(&request.id, filename, TagError::EmptyKey.to_string());
            }
            match tagger.write_key(path, key) {
                Ok(format) => {
                    info!(id = %request.id, file = %filename, key, format = %format, "Key written");
                    TagResponse::success(&request.id, filename, Some(key.to_string()), format.as_str())
                }
                Err(e) => {
                    warn!(id = %request.id, file = %filename, error = %e, "Key write failed");
                    TagResponse::error(&request.id, filename, e.to_string())
                }
            }
        }
        TagAction::Read => match tagger.read_key(path) {
            Ok(reading) => {
                debug!(id = %request.id, file = %filename, key = ?reading.key, "Key read");
                TagResponse::success(&request.id, filename, reading.key, reading.format.as_str())
                    .with_album_art(
                        reading
                            .album_art
                            .map(|art| art.to_string_lossy().into_owned()),
                    )
            }
            Err(e) => {
                warn!(id = %request.id, file = %filename, error = %e, "Key read failed");
                TagResponse::error(&request.id, filename, e.to_string())
            }
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
