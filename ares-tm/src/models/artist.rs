//! Artist entity
//!
//! One `Artist` exists per identity key. Tracks hold `ArtistRef` handles to
//! the same object, so an edit or a reconciliation result is visible from
//! every track that credits the artist.

use crate::models::remote::{AliasRecord, GraphArtistRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, MutexGuard};

/// Shared handle to a registered artist
pub type ArtistRef = Arc<Artist>;

/// Stable key deduplicating an artist
///
/// Graph-sourced artists use the metadata authority's external id.
/// Text-sourced artists use a SHA-256 of `"{name}-{franchise_id}"`, so equal
/// names inside one franchise always collapse to the same artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn external(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn text(name: &str, franchise_id: i64) -> Self {
        let unique = format!("{}-{}", name.trim(), franchise_id);
        let digest = Sha256::digest(unique.as_bytes());
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Artist type as credited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtistType {
    Person,
    Character,
    Group,
    /// Missing, unknown, or any other authority type (orchestra, choir, ...)
    Other,
}

impl ArtistType {
    /// Map the authority's type label, case-insensitively
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("person") => ArtistType::Person,
            Some("character") => ArtistType::Character,
            Some("group") => ArtistType::Group,
            _ => ArtistType::Other,
        }
    }

    /// Characters and groups are rendered in parentheses
    pub fn is_parenthesized(self) -> bool {
        matches!(self, ArtistType::Character | ArtistType::Group)
    }
}

/// Where the artist came from; selects the reconciliation branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtistSource {
    /// Nested relation graph from the metadata authority
    Graph,
    /// Free-text credit string, namespaced by franchise
    Text { franchise: String, franchise_id: i64 },
}

/// Locale-tagged alternate name from the metadata authority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alias {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub alias_type: Option<String>,
    pub locale: Option<String>,
    #[serde(rename = "sort-name", alias = "sort_name", alias = "sortName")]
    pub sort_name: Option<String>,
    pub begin: Option<String>,
    pub end: Option<String>,
    pub ended: bool,
    pub primary: Option<bool>,
}

/// Reconciliation progress of a single artist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncState {
    /// Never compared with the store
    #[default]
    Local,
    /// Remote record inspected, local changes may still be pending
    Verified,
    /// Remote record confirmed equal or just written
    Synced,
}

/// Mutable artist state
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistDetails {
    /// Name as credited by the source
    pub name: String,
    pub kind: ArtistType,
    pub disambiguation: Option<String>,
    pub sort_name: Option<String>,
    pub aliases: Vec<Alias>,
    /// Whether the artist is written to the artist tag
    pub include: bool,
    /// Human-curated display name
    pub custom_name: String,
    /// `custom_name` as last loaded, used to detect edits
    pub unedited_custom_name: String,
    pub custom_original_name: Option<String>,
    pub remote_id: Option<i64>,
    pub has_remote_data: bool,
    /// Customizations were already pulled this session
    pub hydrated: bool,
    pub sync_state: SyncState,
}

impl ArtistDetails {
    /// Details for a freshly parsed artist; the custom name starts as `display_name`
    pub fn new(name: impl Into<String>, kind: ArtistType, include: bool, display_name: impl Into<String>) -> Self {
        let custom_name = display_name.into();
        Self {
            name: name.into(),
            kind,
            disambiguation: None,
            sort_name: None,
            aliases: Vec::new(),
            include,
            unedited_custom_name: custom_name.clone(),
            custom_name,
            custom_original_name: None,
            remote_id: None,
            has_remote_data: false,
            hydrated: false,
            sync_state: SyncState::Local,
        }
    }
}

/// A canonical artist entity
#[derive(Debug)]
pub struct Artist {
    key: IdentityKey,
    source: ArtistSource,
    details: RwLock<ArtistDetails>,
    /// Serializes remote operations for this artist
    gate: Mutex<()>,
}

impl Artist {
    pub fn new(key: IdentityKey, source: ArtistSource, details: ArtistDetails) -> Self {
        Self {
            key,
            source,
            details: RwLock::new(details),
            gate: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    pub fn source(&self) -> &ArtistSource {
        &self.source
    }

    pub fn is_graph_sourced(&self) -> bool {
        matches!(self.source, ArtistSource::Graph)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ArtistDetails {
        self.details
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ArtistDetails) -> R) -> R {
        let mut details = self
            .details
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut details)
    }

    fn read<R>(&self, f: impl FnOnce(&ArtistDetails) -> R) -> R {
        let details = self.details.read().unwrap_or_else(PoisonError::into_inner);
        f(&details)
    }

    /// Hold while issuing remote calls for this artist
    pub(crate) async fn lock_remote(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    pub fn name(&self) -> String {
        self.read(|d| d.name.clone())
    }

    pub fn kind(&self) -> ArtistType {
        self.read(|d| d.kind)
    }

    pub fn include(&self) -> bool {
        self.read(|d| d.include)
    }

    pub fn custom_name(&self) -> String {
        self.read(|d| d.custom_name.clone())
    }

    pub fn remote_id(&self) -> Option<i64> {
        self.read(|d| d.remote_id)
    }

    pub fn sync_state(&self) -> SyncState {
        self.read(|d| d.sync_state)
    }

    pub fn has_remote_data(&self) -> bool {
        self.read(|d| d.has_remote_data)
    }

    pub fn custom_name_edited(&self) -> bool {
        self.read(|d| d.custom_name != d.unedited_custom_name)
    }

    /// Display form used in the artist tag
    ///
    /// Characters and groups are wrapped in parentheses, without doubling
    /// parentheses the name already carries.
    pub fn formatted_artist(&self) -> String {
        self.read(|d| {
            let display = if d.custom_name.is_empty() {
                d.name.as_str()
            } else {
                d.custom_name.as_str()
            };
            if d.kind.is_parenthesized() {
                format!("({})", display.trim_matches(|c| c == '(' || c == ')'))
            } else {
                display.to_string()
            }
        })
    }

    pub fn set_custom_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.update(|d| {
            d.custom_name = name;
            d.mark_edited();
        });
    }

    pub fn set_custom_original_name(&self, name: Option<String>) {
        self.update(|d| {
            d.custom_original_name = name;
            d.mark_edited();
        });
    }

    pub fn set_include(&self, include: bool) {
        self.update(|d| {
            d.include = include;
            d.mark_edited();
        });
    }

    /// Adopt human-curated values stored for a graph-sourced artist
    pub fn apply_graph_customization(&self, record: &GraphArtistRecord) {
        self.update(|d| {
            d.include = record.include;
            d.custom_name = record.name.clone();
            d.unedited_custom_name = record.name.clone();
            d.custom_original_name = record.original_name.clone();
            d.remote_id = Some(record.id);
            d.has_remote_data = true;
        });
    }

    /// Adopt the artist an alias points to for a text-sourced artist
    pub fn apply_alias_customization(&self, alias: &AliasRecord) {
        self.update(|d| {
            if let Some(artist_name) = &alias.artist {
                d.custom_name = artist_name.clone();
                d.unedited_custom_name = artist_name.clone();
            }
            d.custom_original_name = Some(alias.name.clone());
            d.remote_id = Some(alias.artist_id);
            d.has_remote_data = true;
        });
    }
}

impl ArtistDetails {
    /// A synced artist with a local edit needs another round trip
    fn mark_edited(&mut self) {
        if self.sync_state == SyncState::Synced {
            self.sync_state = SyncState::Verified;
        }
    }
}

impl fmt::Display for Artist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(kind: ArtistType, custom_name: &str) -> Artist {
        Artist::new(
            IdentityKey::external("mbid-1"),
            ArtistSource::Graph,
            ArtistDetails::new("Name", kind, true, custom_name),
        )
    }

    #[test]
    fn test_text_key_matches_sha256_of_name_and_franchise() {
        let key = IdentityKey::text("ArtistName", 1);
        let expected = format!("{:x}", Sha256::digest(b"ArtistName-1"));
        assert_eq!(key.as_str(), expected);
    }

    #[test]
    fn test_text_key_is_namespaced_by_franchise() {
        assert_eq!(IdentityKey::text("Artist", 2), IdentityKey::text("Artist", 2));
        assert_ne!(IdentityKey::text("Artist", 2), IdentityKey::text("Artist", 3));
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(ArtistType::from_label(Some("Person")), ArtistType::Person);
        assert_eq!(ArtistType::from_label(Some("group")), ArtistType::Group);
        assert_eq!(ArtistType::from_label(Some("Character")), ArtistType::Character);
        assert_eq!(ArtistType::from_label(Some("Orchestra")), ArtistType::Other);
        assert_eq!(ArtistType::from_label(None), ArtistType::Other);
    }

    #[test]
    fn test_formatted_artist() {
        assert_eq!(artist(ArtistType::Person, "Artist1").formatted_artist(), "Artist1");
        assert_eq!(artist(ArtistType::Character, "Char1").formatted_artist(), "(Char1)");
        assert_eq!(artist(ArtistType::Group, "(Band)").formatted_artist(), "(Band)");
        assert_eq!(artist(ArtistType::Person, "").formatted_artist(), "Name");
    }

    #[test]
    fn test_edit_tracking() {
        let a = artist(ArtistType::Person, "Original");
        assert!(!a.custom_name_edited());
        a.set_custom_name("Edited");
        assert!(a.custom_name_edited());
    }

    #[test]
    fn test_edit_after_sync_requires_new_round_trip() {
        let a = artist(ArtistType::Person, "Original");
        a.update(|d| d.sync_state = SyncState::Synced);
        a.set_include(false);
        assert_eq!(a.sync_state(), SyncState::Verified);
    }

    #[test]
    fn test_apply_graph_customization() {
        let a = artist(ArtistType::Person, "Lastname, First");
        a.apply_graph_customization(&GraphArtistRecord {
            id: 239,
            mb_id: Some("mbid-1".to_string()),
            name: "Curated".to_string(),
            original_name: Some("Curated Original".to_string()),
            include: false,
        });

        let d = a.snapshot();
        assert_eq!(d.custom_name, "Curated");
        assert_eq!(d.custom_original_name.as_deref(), Some("Curated Original"));
        assert_eq!(d.remote_id, Some(239));
        assert!(!d.include);
        assert!(d.has_remote_data);
        assert!(!a.custom_name_edited());
    }
}
