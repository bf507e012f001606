//! Wire protocol types
//!
//! The server speaks newline-delimited JSON over stdio. Every inbound line is one
//! [`TagRequest`]; every outbound line is one [`OutboundMessage`], which is either a
//! [`TagResponse`] correlated by `id` or an uncorrelated [`SystemMessage`].
//!
//! ```text
//! -> {"id":"r1","path":"/music/song.mp3","key":"9A"}
//! <- {"type":"ready"}
//! <- {"id":"r1","status":"success","key":"9A","filename":"song.mp3","format":"mp3"}
//! <- {"type":"heartbeat"}
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Filename reported when a request carried no usable path
pub const UNKNOWN_FILENAME: &str = "unknown";

/// What a request asks the server to do with the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    /// Store `key` in the file's key field
    #[default]
    Write,
    /// Report the key currently stored in the file
    Read,
}

/// A validated tagging request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRequest {
    /// Caller-supplied correlation token
    pub id: String,

    /// Absolute path of the audio file
    pub path: String,

    /// Key value to write (absent for reads)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Requested operation
    #[serde(default)]
    pub action: TagAction,
}

impl TagRequest {
    /// Build a write request
    pub fn write(id: impl Into<String>, path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            key: Some(key.into()),
            action: TagAction::Write,
        }
    }

    /// Build a read request
    pub fn read(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            key: None,
            action: TagAction::Read,
        }
    }

    /// Base name of the request path
    pub fn filename(&self) -> String {
        filename_for(&self.path)
    }
}

/// Outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Response correlated to exactly one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    /// Echo of the request id
    pub id: String,

    pub status: ResponseStatus,

    /// Key written (write) or found (read)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Human-readable failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Base name of the request path, always present
    pub filename: String,

    /// Detected container format (e.g. "mp3", "flac")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Temporary file holding embedded album art (reads only)
    #[serde(
        rename = "albumArtPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art_path: Option<String>,
}

impl TagResponse {
    /// Successful write or read
    pub fn success(
        id: impl Into<String>,
        filename: impl Into<String>,
        key: Option<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            status: ResponseStatus::Success,
            key,
            error: None,
            filename: filename.into(),
            format: Some(format.into()),
            album_art_path: None,
        }
    }

    /// Failed request
    pub fn error(
        id: impl Into<String>,
        filename: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            status: ResponseStatus::Error,
            key: None,
            error: Some(reason.into()),
            filename: filename.into(),
            format: None,
            album_art_path: None,
        }
    }

    /// Attach an extracted album art path
    pub fn with_album_art(mut self, path: Option<String>) -> Self {
        self.album_art_path = path;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Uncorrelated liveness messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SystemMessage {
    /// Pool is up; emitted once before any response
    Ready,
    /// Periodic liveness signal
    Heartbeat,
}

/// Any line the server writes to stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    System(SystemMessage),
    Response(TagResponse),
}

impl From<SystemMessage> for OutboundMessage {
    fn from(message: SystemMessage) -> Self {
        Self::System(message)
    }
}

impl From<TagResponse> for OutboundMessage {
    fn from(response: TagResponse) -> Self {
        Self::Response(response)
    }
}

/// Base name of `path`, falling back to the path itself
///
/// An empty path yields [`UNKNOWN_FILENAME`].
pub fn filename_for(path: &str) -> String {
    if path.is_empty() {
        return UNKNOWN_FILENAME.to_string();
    }
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
