//! ID3 tag synchronizer
//!
//! Maps credit fields to ID3v2 text frames. Artist and original artist hold
//! several values (null-separated); every other frame must hold one. The
//! relation graph JSON and the product hint live in TXXX frames.

use crate::types::{CreditRead, TagError, TagSynchronizer, TrackFields};
use id3::{ErrorKind, Tag, TagLike, Version};
use std::path::Path;
use tracing::debug;

/// TXXX description holding the relation graph JSON
pub const RELATIONS_DESCRIPTION: &str = "artist_relations_json";
/// TXXX description holding the product hint
pub const PRODUCT_DESCRIPTION: &str = "product";

const TITLE: &str = "TIT2";
const ARTIST: &str = "TPE1";
const ALBUM: &str = "TALB";
const ALBUM_ARTIST: &str = "TPE2";
const GROUPING: &str = "TIT1";
const ORIGINAL_ALBUM: &str = "TOAL";
const ORIGINAL_ARTIST: &str = "TOPE";
const ORIGINAL_TITLE: &str = "TPE3";

const SEPARATOR: char = '\0';

impl From<id3::Error> for TagError {
    fn from(e: id3::Error) -> Self {
        match e.kind {
            ErrorKind::Io(io) => TagError::Io(io),
            _ => TagError::Format(e.description.to_string()),
        }
    }
}

/// Reads and writes credits in MP3 files
#[derive(Debug, Clone, Default)]
pub struct Id3TagSynchronizer;

impl Id3TagSynchronizer {
    pub fn new() -> Self {
        Self
    }
}

fn read_tag(path: &Path) -> Result<Tag, TagError> {
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => {
            debug!(path = %path.display(), "File has no ID3 tag");
            Ok(Tag::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn values(tag: &Tag, frame: &str) -> Vec<String> {
    tag.get(frame)
        .and_then(|f| f.content().text())
        .map(|text| {
            text.split(SEPARATOR)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn single(tag: &Tag, frame: &str) -> Result<Option<String>, TagError> {
    let mut found = values(tag, frame);
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        count => Err(TagError::UnexpectedMultiValue {
            frame: frame.to_string(),
            count,
        }),
    }
}

fn extended(tag: &Tag, description: &str) -> Option<String> {
    tag.extended_texts()
        .find(|t| t.description == description)
        .map(|t| t.value.clone())
        .filter(|v| !v.trim().is_empty())
}

fn set_single(tag: &mut Tag, frame: &str, value: &Option<String>) {
    match value.as_deref().filter(|v| !v.is_empty()) {
        Some(v) => tag.set_text(frame, v),
        None => {
            tag.remove(frame);
        }
    }
}

fn set_multi(tag: &mut Tag, frame: &str, values: &[String]) {
    let values: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        tag.remove(frame);
    } else {
        tag.set_text(frame, values.join(&SEPARATOR.to_string()));
    }
}

impl TagSynchronizer for Id3TagSynchronizer {
    fn read_credits(&self, path: &Path) -> Result<CreditRead, TagError> {
        let tag = read_tag(path)?;

        let fields = TrackFields {
            title: single(&tag, TITLE)?,
            artist: values(&tag, ARTIST),
            album: single(&tag, ALBUM)?,
            album_artist: single(&tag, ALBUM_ARTIST)?,
            grouping: single(&tag, GROUPING)?,
            original_album: single(&tag, ORIGINAL_ALBUM)?,
            original_artist: values(&tag, ORIGINAL_ARTIST),
            original_title: single(&tag, ORIGINAL_TITLE)?,
        };

        Ok(CreditRead {
            fields,
            product: extended(&tag, PRODUCT_DESCRIPTION),
            relation_graph_json: extended(&tag, RELATIONS_DESCRIPTION),
        })
    }

    fn write_credits(&self, path: &Path, fields: &TrackFields) -> Result<(), TagError> {
        let mut tag = read_tag(path)?;

        set_single(&mut tag, TITLE, &fields.title);
        set_multi(&mut tag, ARTIST, &fields.artist);
        set_single(&mut tag, ALBUM, &fields.album);
        set_single(&mut tag, ALBUM_ARTIST, &fields.album_artist);
        set_single(&mut tag, GROUPING, &fields.grouping);
        set_single(&mut tag, ORIGINAL_ALBUM, &fields.original_album);
        set_multi(&mut tag, ORIGINAL_ARTIST, &fields.original_artist);
        set_single(&mut tag, ORIGINAL_TITLE, &fields.original_title);

        tag.write_to_path(path, Version::Id3v24)?;
        debug!(path = %path.display(), "Wrote credit tags");
        Ok(())
    }
}
