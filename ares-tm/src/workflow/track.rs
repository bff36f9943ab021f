//! Track Aggregator
//!
//! A loaded file: its credit fields, the values stored in the file when it
//! was read, and the ordered artists credited on it. Artists are shared
//! handles into the identity registry.

use crate::models::ArtistRef;
use crate::types::{CreditRead, TrackFields};
use std::path::{Path, PathBuf};

/// Separator between artists in the joined artist credit
pub const ARTIST_SEPARATOR: &str = "; ";

#[derive(Debug)]
pub struct Track {
    file_path: PathBuf,
    /// Current, possibly edited, field values
    pub fields: TrackFields,
    /// Values in the file as last read or written
    stored: TrackFields,
    /// Product hint, replaced by the resolved franchise for text credits
    product: Option<String>,
    relation_graph_json: Option<String>,
    artists: Vec<ArtistRef>,
    /// Whether [`save_files`](super::TrackManager::save_files) writes this track
    pub update_file: bool,
}

impl Track {
    pub(crate) fn new(file_path: PathBuf, read: CreditRead, artists: Vec<ArtistRef>) -> Self {
        Self {
            file_path,
            stored: read.fields.clone(),
            fields: read.fields,
            product: read.product,
            relation_graph_json: read.relation_graph_json,
            artists,
            update_file: true,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.title.as_deref()
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub(crate) fn set_product(&mut self, product: String) {
        self.product = Some(product);
    }

    pub fn relation_graph_json(&self) -> Option<&str> {
        self.relation_graph_json.as_deref()
    }

    /// Credited artists in resolved order
    pub fn artists(&self) -> &[ArtistRef] {
        &self.artists
    }

    pub fn stored_fields(&self) -> &TrackFields {
        &self.stored
    }

    /// Artist field as currently set
    pub fn formatted_artist(&self) -> String {
        self.fields.artist.join(ARTIST_SEPARATOR)
    }

    /// Display names of included artists, in order
    pub fn included_artist_list(&self) -> Vec<String> {
        self.artists
            .iter()
            .filter(|a| a.include())
            .map(|a| a.formatted_artist())
            .collect()
    }

    /// Artist credit built from the resolved artists
    pub fn formatted_new_artist(&self) -> String {
        self.included_artist_list().join(ARTIST_SEPARATOR)
    }

    /// Replace the artist field with the resolved credit
    ///
    /// Edited names may hold several artists separated by `;`, so every entry
    /// is split again. Without included artists the field is left as is.
    pub fn apply_custom_tag_values(&mut self) {
        let included = self.included_artist_list();
        let source = if included.is_empty() {
            &self.fields.artist
        } else {
            &included
        };

        self.fields.artist = source
            .iter()
            .flat_map(|entry| entry.split(';'))
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn replace_original_title(&mut self, overwrite: bool) {
        if overwrite || is_blank(&self.fields.original_title) {
            self.fields.original_title = self.fields.title.clone();
        }
    }

    pub fn replace_original_artist(&mut self, overwrite: bool) {
        if overwrite || self.fields.original_artist.is_empty() {
            self.fields.original_artist = self.fields.artist.clone();
        }
    }

    /// Some field differs from the file
    pub fn has_changes(&self) -> bool {
        normalized(&self.fields) != normalized(&self.stored)
    }

    pub(crate) fn mark_saved(&mut self) {
        self.stored = self.fields.clone();
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::is_empty).unwrap_or(true)
}

/// Empty strings and missing values are stored the same way
fn normalized(fields: &TrackFields) -> TrackFields {
    let opt = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
    let list = |v: &[String]| -> Vec<String> {
        v.iter().filter(|s| !s.is_empty()).cloned().collect()
    };
    TrackFields {
        title: opt(&fields.title),
        artist: list(&fields.artist),
        album: opt(&fields.album),
        album_artist: opt(&fields.album_artist),
        grouping: opt(&fields.grouping),
        original_album: opt(&fields.original_album),
        original_artist: list(&fields.original_artist),
        original_title: opt(&fields.original_title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artist, ArtistDetails, ArtistSource, ArtistType, IdentityKey};
    use std::sync::Arc;

    fn artist(id: &str, name: &str, kind: ArtistType, include: bool) -> ArtistRef {
        Arc::new(Artist::new(
            IdentityKey::external(id),
            ArtistSource::Graph,
            ArtistDetails::new(name, kind, include, name),
        ))
    }

    fn track(artist_field: &[&str], artists: Vec<ArtistRef>) -> Track {
        let read = CreditRead {
            fields: TrackFields {
                title: Some("Title".to_string()),
                artist: artist_field.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        Track::new(PathBuf::from("/music/track.mp3"), read, artists)
    }

    #[test]
    fn test_new_artist_credit() {
        let t = track(
            &["Original"],
            vec![
                artist("p", "Person", ArtistType::Person, true),
                artist("c", "Character", ArtistType::Character, false),
                artist("g", "Unit", ArtistType::Group, true),
            ],
        );
        assert_eq!(t.formatted_new_artist(), "Person; (Unit)");
        assert_eq!(t.formatted_artist(), "Original");
    }

    #[test]
    fn test_apply_custom_tag_values_splits_edited_names() {
        let a = artist("p", "Person", ArtistType::Person, true);
        a.set_custom_name("Person A; Person B");
        let mut t = track(&["Original"], vec![a]);

        t.apply_custom_tag_values();

        assert_eq!(t.fields.artist, vec!["Person A", "Person B"]);
        assert!(t.has_changes());
    }

    #[test]
    fn test_apply_without_included_artists_keeps_field() {
        let mut t = track(
            &["Char1", "Char2"],
            vec![artist("c", "Char1", ArtistType::Character, false)],
        );
        t.apply_custom_tag_values();
        assert_eq!(t.fields.artist, vec!["Char1", "Char2"]);
        assert!(!t.has_changes());
    }

    #[test]
    fn test_replace_original_fields() {
        let mut t = track(&["A"], Vec::new());
        t.fields.original_title = Some("Kept".to_string());

        t.replace_original_title(false);
        t.replace_original_artist(false);
        assert_eq!(t.fields.original_title.as_deref(), Some("Kept"));
        assert_eq!(t.fields.original_artist, vec!["A"]);

        t.replace_original_title(true);
        assert_eq!(t.fields.original_title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_empty_values_are_not_changes() {
        let mut t = track(&["A"], Vec::new());
        t.fields.album = Some(String::new());
        assert!(!t.has_changes());

        t.fields.album = Some("Album".to_string());
        assert!(t.has_changes());
        t.mark_saved();
        assert!(!t.has_changes());
    }
}
