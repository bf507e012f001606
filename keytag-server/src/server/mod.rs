//! Tagging server supervisor
//!
//! Wires the request reader, job queue, worker pool, response sink and heartbeat together
//! and walks them through the server lifecycle:
//!
//! ```text
//! Initializing -> Ready -> Running -> Draining -> Stopped
//! ```
//!
//! `ready` is written before any input is read, so it always precedes the first response.
//! End of input drains the queue completely; a shutdown request finishes only the jobs
//! workers have already taken and discards the rest.

pub mod heartbeat;
pub mod parser;
pub mod pool;
pub mod queue;
pub mod sink;

use crate::tagging::TagWriter;
use heartbeat::spawn_heartbeat;
use keytag_common::config::ServerConfig;
use keytag_common::protocol::{SystemMessage, TagResponse};
use keytag_common::{Error, Result};
use parser::{parse_line, ParsedLine};
use pool::WorkerPool;
use queue::job_queue;
use sink::spawn_sink;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a [`TaggingServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Building the queue and worker pool
    Initializing,
    /// Workers started, `ready` being announced
    Ready,
    /// Reading requests; heartbeat active
    Running,
    /// Input closed or shutdown requested; waiting for workers
    Draining,
    /// Terminal
    Stopped,
}

/// Counters reported when the server stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerReport {
    /// Requests placed on the job queue
    pub requests_accepted: u64,
    /// Non-blank lines that did not parse into a request
    pub lines_rejected: u64,
    /// Jobs that produced a response
    pub jobs_completed: u64,
    /// Queued jobs dropped by a shutdown request
    pub jobs_discarded: u64,
    /// Lines written to the output stream, system messages included
    pub lines_written: u64,
}

/// Why the read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    EndOfInput,
    ShutdownRequested,
    OutputClosed,
}

/// Stdio key-tagging server
pub struct TaggingServer {
    config: ServerConfig,
    tagger: Arc<dyn TagWriter>,
    state: watch::Sender<ServerState>,
}

impl TaggingServer {
    pub fn new(config: ServerConfig, tagger: Arc<dyn TagWriter>) -> Self {
        let (state, _) = watch::channel(ServerState::Initializing);
        Self {
            config,
            tagger,
            state,
        }
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ServerState) {
        let previous = self.state.send_replace(next);
        info!("Server state: {:?} -> {:?}", previous, next);
    }

    /// Serve requests from `input`, writing responses to `output`
    ///
    /// Returns once `input` reaches end of stream (after every accepted request has been
    /// answered) or once `shutdown` is cancelled (after in-flight jobs finish).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The configuration is invalid (nothing is written)
    /// - The `ready` message cannot be written
    /// - The output stream fails while responses are pending
    pub async fn run<R, W>(
        &self,
        input: R,
        output: W,
        shutdown: CancellationToken,
    ) -> Result<ServerReport>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.config.validate()?;

        let (sink, writer) = spawn_sink(output, self.config.workers * 2 + 1);
        let (jobs_tx, jobs_rx) = job_queue(self.config.queue_capacity);
        let abort = CancellationToken::new();
        let pool = WorkerPool::spawn(
            self.config.workers,
            jobs_rx.clone(),
            Arc::clone(&self.tagger),
            sink.clone(),
            abort.clone(),
        )?;

        self.set_state(ServerState::Ready);
        if let Err(e) = sink.send(SystemMessage::Ready).await {
            abort.cancel();
            drop(jobs_tx);
            pool.join().await;
            self.set_state(ServerState::Stopped);
            return Err(Error::Startup(format!("failed to announce ready: {}", e)));
        }

        self.set_state(ServerState::Running);
        let heartbeat_stop = CancellationToken::new();
        let heartbeat = spawn_heartbeat(
            sink.clone(),
            self.config.heartbeat_interval,
            heartbeat_stop.clone(),
        );
        info!(
            workers = pool.size(),
            queue_capacity = self.config.queue_capacity,
            heartbeat_secs = self.config.heartbeat_interval.as_secs(),
            "Ready for requests"
        );

        let mut report = ServerReport::default();
        let mut reader = BufReader::new(input);
        let mut line = Vec::new();

        let reason = loop {
            line.clear();
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break StopReason::ShutdownRequested,
                _ = abort.cancelled() => break StopReason::OutputClosed,
                read = reader.read_until(b'\n', &mut line) => read,
            };

            match read {
                Ok(0) => break StopReason::EndOfInput,
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to read input, treating as end of stream");
                    break StopReason::EndOfInput;
                }
            }

            match parse_line(&line) {
                ParsedLine::Blank => {}
                ParsedLine::Request(request) => {
                    let id = request.id.clone();
                    let queued = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            warn!(id = %id, "Shutdown requested, request not queued");
                            report.jobs_discarded += 1;
                            break StopReason::ShutdownRequested;
                        }
                        _ = abort.cancelled() => break StopReason::OutputClosed,
                        queued = jobs_tx.enqueue(request) => queued,
                    };
                    if let Err(e) = queued {
                        error!(id = %id, error = %e, "Failed to queue request");
                        break StopReason::OutputClosed;
                    }
                    report.requests_accepted += 1;
                    debug!(id = %id, "Request queued");
                }
                ParsedLine::Rejected(rejected) => {
                    report.lines_rejected += 1;
                    match rejected.id {
                        Some(id) => {
                            warn!(id = %id, reason = %rejected.reason, "Rejected request");
                            let response = TagResponse::error(id, rejected.filename, rejected.reason);
                            if sink.send(response).await.is_err() {
                                break StopReason::OutputClosed;
                            }
                        }
                        None => {
                            warn!(reason = %rejected.reason, "Dropped malformed line without id");
                        }
                    }
                }
            }
        };

        self.set_state(ServerState::Draining);
        info!("Stopping: {:?}", reason);
        drop(jobs_tx);

        if reason != StopReason::EndOfInput {
            abort.cancel();
            let discarded = jobs_rx.discard_pending().await as u64;
            if discarded > 0 {
                warn!("Discarded {} queued requests without processing", discarded);
            }
            report.jobs_discarded += discarded;
        }
        drop(jobs_rx);

        report.jobs_completed = pool.join().await;

        heartbeat_stop.cancel();
        match heartbeat.await {
            Ok(beats) => debug!(beats, "Heartbeat stopped"),
            Err(e) => error!(error = %e, "Heartbeat task failed"),
        }

        drop(sink);
        let written = writer
            .await
            .map_err(|e| Error::Internal(format!("response writer task failed: {}", e)));

        self.set_state(ServerState::Stopped);
        report.lines_written = written??;

        info!(
            accepted = report.requests_accepted,
            rejected = report.lines_rejected,
            completed = report.jobs_completed,
            discarded = report.jobs_discarded,
            written = report.lines_written,
            "Server stopped"
        );
        Ok(report)
    }
}
