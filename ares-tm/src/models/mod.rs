//! Data models for ares-tm

pub mod artist;
pub mod franchise;
pub mod remote;

pub use artist::{
    Alias, Artist, ArtistDetails, ArtistRef, ArtistSource, ArtistType, IdentityKey, SyncState,
};
pub use franchise::{Franchise, DEFAULT_FRANCHISE};
pub use remote::{
    alias_name, AliasPayload, AliasRecord, GraphArtistPayload, GraphArtistRecord,
    SimpleArtistPayload, SimpleArtistRecord,
};
