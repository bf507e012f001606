//! Embedded album art extraction for read requests
//!
//! The first embedded picture is copied to `<temp dir>/keytag-art-<uuid>.<ext>` so the host
//! can display it. Failures are logged and reported as "no art"; they never fail the read.

use super::{id3_tags, Container, TagError, TagFormat};
use lofty::config::ParseOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Copy the first embedded picture of `path` to a temporary file
pub fn extract_album_art(path: &Path, format: TagFormat) -> Option<PathBuf> {
    match first_picture(path, format) {
        Ok(Some((mime, data))) if !data.is_empty() => match write_temp_image(&mime, &data) {
            Ok(art_path) => {
                debug!(
                    file = %path.display(),
                    art = %art_path.display(),
                    bytes = data.len(),
                    "Extracted album art"
                );
                Some(art_path)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to save album art");
                None
            }
        },
        Ok(_) => None,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to extract album art");
            None
        }
    }
}

/// File extension for an image, from its MIME type or else its magic bytes
///
/// Anything that is not recognisably PNG is treated as JPEG.
pub fn image_extension(mime: &str, data: &[u8]) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        _ if data.starts_with(PNG_SIGNATURE) => "png",
        _ => "jpg",
    }
}

fn first_picture(path: &Path, format: TagFormat) -> Result<Option<(String, Vec<u8>)>, TagError> {
    match format.container() {
        Container::Id3 | Container::Id3Riff | Container::Id3Aiff => id3_tags::first_picture(path),
        Container::Mp4Freeform | Container::FlacComments | Container::OggComments => {
            let tagged_file = Probe::open(path)?
                .options(ParseOptions::new().read_properties(false))
                .guess_file_type()?
                .read()?;

            let picture = tagged_file
                .primary_tag()
                .or_else(|| tagged_file.first_tag())
                .and_then(|tag| tag.pictures().first());

            Ok(picture.map(|picture| {
                let mime = picture
                    .mime_type()
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                (mime, picture.data().to_vec())
            }))
        }
    }
}

fn write_temp_image(mime: &str, data: &[u8]) -> std::io::Result<PathBuf> {
    let ext = image_extension(mime, data);
    let path = std::env::temp_dir().join(format!("keytag-art-{}.{}", Uuid::new_v4(), ext));
    std::fs::write(&path, data)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use id3::frame::{Content, Picture, PictureType};
    use id3::{Frame, Tag, TagLike, Version};

    #[test]
    fn test_image_extension_from_mime() {
        assert_eq!(image_extension("image/png", &[]), "png");
        assert_eq!(image_extension("IMAGE/JPEG", &[]), "jpg");
        assert_eq!(image_extension("image/jpg", &[]), "jpg");
    }

    #[test]
    fn test_image_extension_sniffs_png() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&[0, 0, 0, 13]);
        assert_eq!(image_extension("", &data), "png");
        assert_eq!(image_extension("application/octet-stream", &[0xFF, 0xD8, 0xFF]), "jpg");
    }

    #[test]
    fn test_extracts_id3_picture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.mp3");
        std::fs::write(&path, vec![0u8; 256]).unwrap();

        let image = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4];
        let mut tag = Tag::new();
        let picture = Picture {
            mime_type: "image/jpeg".to_string(),
            picture_type: PictureType::CoverFront,
            description: String::new(),
            data: image.clone(),
        };
        tag.add_frame(Frame::with_content("APIC", Content::Picture(picture)));
        tag.write_to_path(&path, Version::Id3v24).unwrap();

        let art = extract_album_art(&path, TagFormat::Mp3).expect("album art extracted");
        assert_eq!(art.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_eq!(std::fs::read(&art).unwrap(), image);
        std::fs::remove_file(art).unwrap();
    }

    #[test]
    fn test_no_picture_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.mp3");
        std::fs::write(&path, vec![0u8; 256]).unwrap();

        assert!(extract_album_art(&path, TagFormat::Mp3).is_none());
    }
}
