//! Core Types and Trait Definitions for ares-tm
//!
//! Defines the two collaborator seams of the track manager:
//! - **CustomizationStore:** remote store of human-curated artist data
//! - **TagSynchronizer:** reads and writes credit fields of audio files
//!
//! Both are traits so the manager can run against the HTTP store and ID3
//! files in production and against in-memory doubles in tests.

use crate::models::{
    AliasPayload, AliasRecord, Franchise, GraphArtistPayload, GraphArtistRecord,
    SimpleArtistPayload, SimpleArtistRecord,
};
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Customization Store
// ============================================================================

/// Customization store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    /// Uniqueness conflict on create (HTTP 409)
    #[error("Conflict on field '{field}': {message}")]
    Conflict { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Remote store of artist customizations
///
/// Lookups return `None` / empty lists for absent records; only transport,
/// protocol and conflict failures are errors.
#[async_trait::async_trait]
pub trait CustomizationStore: Send + Sync {
    /// Graph-sourced artist by the authority's external id
    async fn graph_artist(&self, external_id: &str) -> StoreResult<Option<GraphArtistRecord>>;

    async fn create_graph_artist(&self, payload: &GraphArtistPayload)
        -> StoreResult<GraphArtistRecord>;

    async fn update_graph_artist(
        &self,
        id: i64,
        payload: &GraphArtistPayload,
    ) -> StoreResult<GraphArtistRecord>;

    /// Simple artists filtered by display name
    async fn simple_artists_by_name(&self, name: &str) -> StoreResult<Vec<SimpleArtistRecord>>;

    async fn simple_artist(&self, id: i64) -> StoreResult<Option<SimpleArtistRecord>>;

    async fn create_simple_artist(&self, payload: &SimpleArtistPayload)
        -> StoreResult<SimpleArtistRecord>;

    async fn update_simple_artist(
        &self,
        id: i64,
        payload: &SimpleArtistPayload,
    ) -> StoreResult<SimpleArtistRecord>;

    /// Aliases by (space-stripped name, franchise id)
    async fn aliases(&self, name: &str, franchise_id: i64) -> StoreResult<Vec<AliasRecord>>;

    async fn create_alias(&self, payload: &AliasPayload) -> StoreResult<()>;

    async fn delete_alias(&self, id: i64) -> StoreResult<()>;

    async fn franchises(&self) -> StoreResult<Vec<Franchise>>;

    /// Availability check; never fails, returns `false` instead
    async fn health(&self) -> bool;
}

// ============================================================================
// Tag Synchronizer
// ============================================================================

/// Tag read/write errors
#[derive(Debug, Error)]
pub enum TagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tag format error: {0}")]
    Format(String),

    #[error("Tag {frame} contains {count} values where one was expected")]
    UnexpectedMultiValue { frame: String, count: usize },
}

/// Credit-related fields of one audio file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFields {
    pub title: Option<String>,
    pub artist: Vec<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub grouping: Option<String>,
    pub original_album: Option<String>,
    pub original_artist: Vec<String>,
    pub original_title: Option<String>,
}

/// Result of reading one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreditRead {
    pub fields: TrackFields,
    /// Franchise/product hint, read-only
    pub product: Option<String>,
    /// Raw relation graph JSON stored alongside the tags
    pub relation_graph_json: Option<String>,
}

/// Reads and writes credit fields
///
/// Implementations are blocking; the track manager calls them from
/// `spawn_blocking`.
pub trait TagSynchronizer: Send + Sync {
    fn read_credits(&self, path: &Path) -> Result<CreditRead, TagError>;

    /// Persist `fields`; empty fields remove the stored value
    fn write_credits(&self, path: &Path, fields: &TrackFields) -> Result<(), TagError>;
}
