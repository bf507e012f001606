//! MP4 freeform key atom (`----:com.apple.iTunes:KEY`)

use super::TagError;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::mp4::{Atom, AtomData, AtomIdent, Ilst, Mp4File};
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

const ITUNES_MEAN: &str = "com.apple.iTunes";
const KEY_NAME: &str = "KEY";

/// Freeform names checked on read, most standard first; matched case-insensitively
const READ_NAMES: [&str; 2] = ["initialkey", "KEY"];

/// Set the freeform KEY atom, keeping every other atom in the `ilst`
pub(super) fn write_key(path: &Path, key: &str) -> Result<(), TagError> {
    let mut mp4 = open(path)?;

    let mut ilst = mp4.remove_ilst().unwrap_or_default();
    ilst.replace_atom(Atom::new(
        freeform(KEY_NAME),
        AtomData::UTF8(key.to_string()),
    ));
    mp4.set_ilst(ilst);

    mp4.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

/// Stored key, preferring `initialkey` over `KEY`
pub(super) fn read_key(path: &Path) -> Result<Option<String>, TagError> {
    let mp4 = open(path)?;
    Ok(mp4.ilst().and_then(find_key))
}

fn find_key(ilst: &Ilst) -> Option<String> {
    READ_NAMES.iter().find_map(|wanted| {
        ilst.into_iter()
            .filter(|atom| is_itunes_freeform(atom.ident(), wanted))
            .flat_map(|atom| atom.data())
            .find_map(|data| match data {
                AtomData::UTF8(text) if !text.is_empty() => Some(text.clone()),
                _ => None,
            })
    })
}

fn is_itunes_freeform(ident: &AtomIdent<'_>, wanted: &str) -> bool {
    matches!(
        ident,
        AtomIdent::Freeform { mean, name }
            if mean == ITUNES_MEAN && name.eq_ignore_ascii_case(wanted)
    )
}

fn freeform(name: &str) -> AtomIdent<'static> {
    AtomIdent::Freeform {
        mean: Cow::Borrowed(ITUNES_MEAN),
        name: Cow::Owned(name.to_string()),
    }
}

fn open(path: &Path) -> Result<Mp4File, TagError> {
    let mut file = File::open(path).map_err(TagError::from_io)?;
    let mp4 = Mp4File::read_from(&mut file, ParseOptions::new().read_properties(false))?;
    Ok(mp4)
}
