//! Test Helper Utilities
//!
//! Shared utilities for testing keytag-server: fixture generation, an in-process server
//! driven over duplex pipes, and tag writers with controllable behavior.

#![allow(dead_code)]

pub mod audio_generator;

pub use audio_generator::{
    generate_test_aiff, generate_test_flac, generate_test_library, generate_test_m4a,
    generate_test_mp3, generate_test_wav, AudioConfig,
};

use keytag_common::config::ServerConfig;
use keytag_server::tagging::{KeyReading, TagError, TagFormat, TagWriter};
use keytag_server::{ServerReport, TaggingServer};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running server with its stdin and stdout attached to the test
pub struct ServerHarness {
    pub stdin: DuplexStream,
    pub stdout: Lines<BufReader<DuplexStream>>,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<keytag_common::Result<ServerReport>>,
}

impl ServerHarness {
    pub fn start(config: ServerConfig, tagger: Arc<dyn TagWriter>) -> Self {
        Self::start_with_pipe_size(config, tagger, 64 * 1024)
    }

    /// Start with a specific stdin pipe capacity (small pipes make backpressure visible)
    pub fn start_with_pipe_size(
        config: ServerConfig,
        tagger: Arc<dyn TagWriter>,
        stdin_capacity: usize,
    ) -> Self {
        let (stdin, server_input) = tokio::io::duplex(stdin_capacity);
        let (server_output, stdout) = tokio::io::duplex(64 * 1024);
        let shutdown = CancellationToken::new();

        let server = TaggingServer::new(config, tagger);
        let token = shutdown.clone();
        let handle =
            tokio::spawn(async move { server.run(server_input, server_output, token).await });

        Self {
            stdin,
            stdout: BufReader::new(stdout).lines(),
            shutdown,
            handle,
        }
    }

    /// Write one request line
    pub async fn send(&mut self, line: &str) {
        self.stdin.write_all(line.as_bytes()).await.unwrap();
        self.stdin.write_all(b"\n").await.unwrap();
    }

    pub async fn send_write(&mut self, id: &str, path: &Path, key: &str) {
        let line = serde_json::json!({"id": id, "path": path, "key": key}).to_string();
        self.send(&line).await;
    }

    /// Next output line as JSON, `None` at end of output
    pub async fn next_message(&mut self) -> Option<Value> {
        let line = self.stdout.next_line().await.unwrap()?;
        Some(serde_json::from_str(&line).unwrap())
    }

    /// Next output line, failing the test if none arrives within `limit`
    pub async fn expect_message(&mut self, limit: Duration) -> Value {
        tokio::time::timeout(limit, self.next_message())
            .await
            .expect("timed out waiting for output")
            .expect("output closed unexpectedly")
    }

    /// Close stdin and collect every remaining output line plus the run report
    pub async fn finish(self) -> (Vec<Value>, ServerReport) {
        let Self {
            stdin,
            mut stdout,
            handle,
            ..
        } = self;
        drop(stdin);

        let mut messages = Vec::new();
        while let Some(line) = stdout.next_line().await.unwrap() {
            messages.push(serde_json::from_str(&line).unwrap());
        }
        let report = handle.await.unwrap().unwrap();
        (messages, report)
    }
}

/// True for `{"type":"ready"}`
pub fn is_ready(message: &Value) -> bool {
    message.get("type").and_then(Value::as_str) == Some("ready")
}

/// True for `{"type":"heartbeat"}`
pub fn is_heartbeat(message: &Value) -> bool {
    message.get("type").and_then(Value::as_str) == Some("heartbeat")
}

/// Responses only, system messages removed
pub fn responses(messages: &[Value]) -> Vec<&Value> {
    messages.iter().filter(|m| m.get("id").is_some()).collect()
}

/// Tag writer that accepts every supported file without touching it
pub struct NoopTagger;

impl TagWriter for NoopTagger {
    fn write_key(&self, path: &Path, _key: &str) -> Result<TagFormat, TagError> {
        TagFormat::from_path(path)
    }

    fn read_key(&self, path: &Path) -> Result<KeyReading, TagError> {
        Ok(KeyReading {
            format: TagFormat::from_path(path)?,
            key: None,
            album_art: None,
        })
    }
}

/// Tag writer that panics for any path containing "boom"
pub struct ExplodingTagger;

impl TagWriter for ExplodingTagger {
    fn write_key(&self, path: &Path, key: &str) -> Result<TagFormat, TagError> {
        if path.to_string_lossy().contains("boom") {
            panic!("tag library exploded");
        }
        NoopTagger.write_key(path, key)
    }

    fn read_key(&self, path: &Path) -> Result<KeyReading, TagError> {
        NoopTagger.read_key(path)
    }
}

/// Tag writer whose jobs hold until the gate opens, tracking concurrency
#[derive(Default)]
pub struct GatedTagger {
    open: Mutex<bool>,
    opened: Condvar,
    started: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl GatedTagger {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened() -> Arc<Self> {
        let tagger = Self::closed();
        tagger.release();
        tagger
    }

    /// Let every held and future job through
    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    /// Jobs that have entered the writer
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Highest number of jobs seen inside the writer at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` jobs have started
    pub async fn wait_started(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.started() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("jobs never reached the tag writer");
    }
}

impl TagWriter for GatedTagger {
    fn write_key(&self, path: &Path, _key: &str) -> Result<TagFormat, TagError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        drop(open);

        // Keep jobs overlapping long enough to observe the pool width
        std::thread::sleep(Duration::from_millis(20));
        self.active.fetch_sub(1, Ordering::SeqCst);
        TagFormat::from_path(path)
    }

    fn read_key(&self, path: &Path) -> Result<KeyReading, TagError> {
        NoopTagger.read_key(path)
    }
}
