//! Key tag adapter
//!
//! Writes (and reads back) the musical key of an audio file. The container is chosen from
//! the file extension through [`TagFormat`], and each format maps to exactly one
//! [`Container`] strategy:
//!
//! | Container | Formats | Field |
//! |-----------|---------|-------|
//! | ID3v2 at file head | mp3, aac | `TKEY` |
//! | ID3v2 in RIFF chunk | wav | `TKEY` |
//! | ID3v2 in IFF chunk | aiff, aif | `TKEY` |
//! | MP4 `ilst` | m4a, mp4, alac | `----:com.apple.iTunes:KEY` |
//! | FLAC / Ogg Vorbis comments | flac, ogg | `KEY` |
//!
//! Writes are flushed to disk before returning. Nothing here serializes access to a
//! path: two concurrent writes to the same file race at the filesystem layer.

mod album_art;
mod id3_tags;
mod mp4_tags;
mod vorbis_tags;

pub use album_art::{extract_album_art, image_extension};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Tag adapter errors
#[derive(Debug, Error)]
pub enum TagError {
    /// Path does not exist
    #[error("File not found")]
    NotFound,

    /// File exists but cannot be modified
    #[error("Permission denied")]
    PermissionDenied,

    /// Extension has no known key field (carries the dotted extension)
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Write request without a key value
    #[error("No key value provided")]
    EmptyKey,

    /// File layout leaves no place to insert a tag block
    #[error("Cannot add a tag to this file: {0}")]
    NoRoomForTag(&'static str),

    /// ID3 read or write failure
    #[error("ID3 error: {0}")]
    Id3(#[from] id3::Error),

    /// MP4/FLAC/Ogg read or write failure
    #[error("Metadata error: {0}")]
    Metadata(#[from] lofty::error::LoftyError),

    /// I/O error outside the tag libraries
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Adapter panicked; the message is whatever the panic carried
    #[error("Tag writer panicked: {0}")]
    Panicked(String),
}

impl TagError {
    /// Classify an I/O error, keeping the not-found and permission cases distinct
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Supported audio formats, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFormat {
    Mp3,
    Aac,
    Wav,
    Aiff,
    Aif,
    M4a,
    Mp4,
    Alac,
    Flac,
    Ogg,
}

/// Where a format keeps its key field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// ID3v2 tag prepended to the raw stream
    Id3,
    /// ID3v2 tag inside a RIFF `id3 ` chunk
    Id3Riff,
    /// ID3v2 tag inside an IFF `ID3 ` chunk
    Id3Aiff,
    /// Freeform atom in the MP4 `ilst`
    Mp4Freeform,
    /// Vorbis comment block of a FLAC stream
    FlacComments,
    /// Vorbis comment header of an Ogg Vorbis stream
    OggComments,
}

impl TagFormat {
    /// Every supported format
    pub const ALL: [TagFormat; 10] = [
        TagFormat::Mp3,
        TagFormat::Aac,
        TagFormat::Wav,
        TagFormat::Aiff,
        TagFormat::Aif,
        TagFormat::M4a,
        TagFormat::Mp4,
        TagFormat::Alac,
        TagFormat::Flac,
        TagFormat::Ogg,
    ];

    /// Look up a format by extension (without the dot, case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL.into_iter().find(|format| format.as_str() == ext)
    }

    /// Determine the format of `path` from its extension
    pub fn from_path(path: &Path) -> Result<Self, TagError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_extension(&ext).ok_or_else(|| {
            TagError::UnsupportedFormat(format!(".{}", ext.to_ascii_lowercase()))
        })
    }

    /// Format name reported in responses (the lowercase extension)
    pub fn as_str(self) -> &'static str {
        match self {
            TagFormat::Mp3 => "mp3",
            TagFormat::Aac => "aac",
            TagFormat::Wav => "wav",
            TagFormat::Aiff => "aiff",
            TagFormat::Aif => "aif",
            TagFormat::M4a => "m4a",
            TagFormat::Mp4 => "mp4",
            TagFormat::Alac => "alac",
            TagFormat::Flac => "flac",
            TagFormat::Ogg => "ogg",
        }
    }

    /// Container strategy for this format
    pub fn container(self) -> Container {
        match self {
            TagFormat::Mp3 | TagFormat::Aac => Container::Id3,
            TagFormat::Wav => Container::Id3Riff,
            TagFormat::Aiff | TagFormat::Aif => Container::Id3Aiff,
            TagFormat::M4a | TagFormat::Mp4 | TagFormat::Alac => Container::Mp4Freeform,
            TagFormat::Flac => Container::FlacComments,
            TagFormat::Ogg => Container::OggComments,
        }
    }
}

impl std::fmt::Display for TagFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reading a file's key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReading {
    pub format: TagFormat,

    /// Stored key, if any
    pub key: Option<String>,

    /// Temporary file holding the first embedded picture, if any
    pub album_art: Option<PathBuf>,
}

/// The adapter boundary used by the worker pool
///
/// Implementations must be callable from several blocking threads at once.
pub trait TagWriter: Send + Sync {
    /// Write `key` into the key field of the file at `path`
    fn write_key(&self, path: &Path, key: &str) -> Result<TagFormat, TagError>;

    /// Read the stored key of the file at `path`
    fn read_key(&self, path: &Path) -> Result<KeyReading, TagError>;
}

/// File-backed adapter dispatching on [`TagFormat::container`]
#[derive(Debug, Clone, Default)]
pub struct FileTagger {
    /// Whether reads extract embedded album art to a temporary file
    extract_art: bool,
}

impl FileTagger {
    /// Create a tagger that extracts album art on reads
    pub fn new() -> Self {
        Self { extract_art: true }
    }

    /// Create a tagger that never touches album art
    pub fn without_album_art() -> Self {
        Self { extract_art: false }
    }
}

impl TagWriter for FileTagger {
    fn write_key(&self, path: &Path, key: &str) -> Result<TagFormat, TagError> {
        if key.is_empty() {
            return Err(TagError::EmptyKey);
        }
        let format = TagFormat::from_path(path)?;
        ensure_writable(path)?;

        match format.container() {
            Container::Id3 | Container::Id3Riff | Container::Id3Aiff => {
                id3_tags::write_key(path, key)?
            }
            Container::Mp4Freeform => mp4_tags::write_key(path, key)?,
            Container::FlacComments => vorbis_tags::write_flac_key(path, key)?,
            Container::OggComments => vorbis_tags::write_ogg_key(path, key)?,
        }

        sync_file(path);
        debug!(file = %path.display(), format = %format, "Wrote key tag");
        Ok(format)
    }

    fn read_key(&self, path: &Path) -> Result<KeyReading, TagError> {
        let format = TagFormat::from_path(path)?;
        if !path.exists() {
            return Err(TagError::NotFound);
        }

        let key = match format.container() {
            Container::Id3 | Container::Id3Riff | Container::Id3Aiff => id3_tags::read_key(path)?,
            Container::Mp4Freeform => mp4_tags::read_key(path)?,
            Container::FlacComments => vorbis_tags::read_flac_key(path)?,
            Container::OggComments => vorbis_tags::read_ogg_key(path)?,
        };

        let album_art = if self.extract_art {
            extract_album_art(path, format)
        } else {
            None
        };

        Ok(KeyReading {
            format,
            key,
            album_art,
        })
    }
}

/// Fail early when the file is missing or read-only
fn ensure_writable(path: &Path) -> Result<(), TagError> {
    let metadata = std::fs::metadata(path).map_err(TagError::from_io)?;
    if metadata.permissions().readonly() {
        return Err(TagError::PermissionDenied);
    }
    Ok(())
}

/// Best-effort flush of the rewritten file to durable storage
fn sync_file(path: &Path) {
    let result = std::fs::File::open(path).and_then(|file| file.sync_all());
    if let Err(e) = result {
        debug!(file = %path.display(), error = %e, "fsync after tag write failed");
    }
}
