//! ID3v2 `TKEY` frame access for MP3, AAC, WAV and AIFF files
//!
//! The id3 crate finds the tag by header magic: a RIFF `id3 ` chunk for WAV, an IFF `ID3 `
//! chunk for AIFF, otherwise a tag at the head of the stream.

use super::TagError;
use id3::{ErrorKind, Frame, Tag, TagLike, Version};
use std::path::Path;

const KEY_FRAME: &str = "TKEY";

/// Replace the `TKEY` frame, creating an ID3v2.4 tag if the file has none
pub(super) fn write_key(path: &Path, key: &str) -> Result<(), TagError> {
    let mut tag = read_tag(path)?.unwrap_or_else(Tag::new);

    tag.remove(KEY_FRAME);
    tag.add_frame(Frame::text(KEY_FRAME, key));
    tag.write_to_path(path, Version::Id3v24)?;
    Ok(())
}

/// Text of the first `TKEY` frame, if any
pub(super) fn read_key(path: &Path) -> Result<Option<String>, TagError> {
    let Some(tag) = read_tag(path)? else {
        return Ok(None);
    };
    let key = tag
        .get(KEY_FRAME)
        .and_then(|frame| frame.content().text())
        .map(str::to_string);
    Ok(key)
}

/// First attached picture as (MIME type, image bytes)
pub(super) fn first_picture(path: &Path) -> Result<Option<(String, Vec<u8>)>, TagError> {
    let Some(tag) = read_tag(path)? else {
        return Ok(None);
    };
    let picture = tag
        .pictures()
        .next()
        .map(|picture| (picture.mime_type.clone(), picture.data.clone()));
    Ok(picture)
}

/// Read the file's tag; a file without one yields `None`
fn read_tag(path: &Path) -> Result<Option<Tag>, TagError> {
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(Some(tag)),
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Ok(None),
        Err(e) => match e.kind {
            ErrorKind::Io(io) => Err(TagError::from_io(io)),
            _ => Err(TagError::Id3(e)),
        },
    }
}
