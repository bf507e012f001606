//! Vorbis comment `KEY` field for FLAC and Ogg Vorbis files
//!
//! Comment names are case-insensitive, so a stored `key` or `Key` is replaced too.

use super::TagError;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::flac::FlacFile;
use lofty::ogg::{VorbisComments, VorbisFile};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const KEY_FIELD: &str = "KEY";
const INITIAL_KEY_FIELD: &str = "INITIALKEY";
const LAST_BLOCK_FLAG: u8 = 0x80;

pub(super) fn write_flac_key(path: &Path, key: &str) -> Result<(), TagError> {
    ensure_flac_block_after_streaminfo(path)?;
    let mut flac: FlacFile = open(path)?;

    let mut comments = flac.remove_vorbis_comments().unwrap_or_default();
    comments.insert(KEY_FIELD.to_string(), key.to_string());
    flac.set_vorbis_comments(comments);

    flac.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

pub(super) fn write_ogg_key(path: &Path, key: &str) -> Result<(), TagError> {
    let mut ogg: VorbisFile = open(path)?;
    ogg.vorbis_comments_mut()
        .insert(KEY_FIELD.to_string(), key.to_string());
    ogg.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

pub(super) fn read_flac_key(path: &Path) -> Result<Option<String>, TagError> {
    let flac: FlacFile = open(path)?;
    Ok(flac.vorbis_comments().and_then(find_key))
}

pub(super) fn read_ogg_key(path: &Path) -> Result<Option<String>, TagError> {
    let ogg: VorbisFile = open(path)?;
    Ok(find_key(ogg.vorbis_comments()))
}

/// `INITIALKEY` wins over the legacy `KEY` field
fn find_key(comments: &VorbisComments) -> Option<String> {
    [INITIAL_KEY_FIELD, KEY_FIELD].iter().find_map(|field| {
        comments
            .get(field)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// lofty cannot insert blocks into a stream whose only metadata block is STREAMINFO
fn ensure_flac_block_after_streaminfo(path: &Path) -> Result<(), TagError> {
    let mut header = [0u8; 5];
    let mut file = File::open(path).map_err(TagError::from_io)?;
    if file.read_exact(&mut header).is_err() {
        // Too short to be FLAC; lofty reports the real problem
        return Ok(());
    }
    if &header[..4] == b"fLaC" && header[4] & LAST_BLOCK_FLAG != 0 {
        return Err(TagError::NoRoomForTag(
            "FLAC stream has no metadata block after STREAMINFO",
        ));
    }
    Ok(())
}

fn open<F: AudioFile>(path: &Path) -> Result<F, TagError> {
    let mut file = File::open(path).map_err(TagError::from_io)?;
    let audio = F::read_from(&mut file, ParseOptions::new().read_properties(false))?;
    Ok(audio)
}
