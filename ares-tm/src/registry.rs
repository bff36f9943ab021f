//! Identity registry
//!
//! Single map from identity key to the canonical artist. The first
//! registration of a key wins: later registrations return the existing
//! artist and drop the candidate, so concurrent resolution of the same key
//! from two sources still yields exactly one entity.
//!
//! The registry also keeps per-key reference counts on behalf of tracks.
//! An artist is evicted when the last track referencing it is removed.

use crate::models::{Artist, ArtistRef, IdentityKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug)]
struct Entry {
    artist: ArtistRef,
    refs: usize,
    /// Registration order, for deterministic listing
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<IdentityKey, Entry>,
    next_seq: u64,
}

/// Registry of canonical artists
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    inner: Mutex<Inner>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `candidate`, or return the artist already holding its key
    pub fn register(&self, candidate: Artist) -> ArtistRef {
        self.register_with_status(candidate).0
    }

    /// Like [`register`](Self::register); the flag is `true` when the candidate was inserted
    pub fn register_with_status(&self, candidate: Artist) -> (ArtistRef, bool) {
        let mut inner = self.lock();

        if let Some(entry) = inner.entries.get(candidate.key()) {
            return (Arc::clone(&entry.artist), false);
        }

        let key = candidate.key().clone();
        let artist = Arc::new(candidate);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.clone(),
            Entry {
                artist: Arc::clone(&artist),
                refs: 0,
                seq,
            },
        );

        debug!(key = %key, name = %artist.name(), "Registered artist");
        (artist, true)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<ArtistRef> {
        self.lock().entries.get(key).map(|e| Arc::clone(&e.artist))
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// All registered artists in registration order
    pub fn artists(&self) -> Vec<ArtistRef> {
        let inner = self.lock();
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.iter().map(|e| Arc::clone(&e.artist)).collect()
    }

    /// Add one reference per listed artist
    pub fn retain(&self, artists: &[ArtistRef]) {
        let mut inner = self.lock();
        for artist in artists {
            if let Some(entry) = inner.entries.get_mut(artist.key()) {
                entry.refs += 1;
            }
        }
    }

    /// Drop one reference per listed artist; returns the evicted keys
    pub fn release(&self, artists: &[ArtistRef]) -> Vec<IdentityKey> {
        let mut inner = self.lock();
        let mut evicted = Vec::new();

        for artist in artists {
            let key = artist.key();
            let remove = match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.refs = entry.refs.saturating_sub(1);
                    entry.refs == 0
                }
                None => false,
            };

            if remove {
                inner.entries.remove(key);
                debug!(key = %key, "Evicted unreferenced artist");
                evicted.push(key.clone());
            }
        }

        evicted
    }

    pub fn ref_count(&self, key: &IdentityKey) -> usize {
        self.lock().entries.get(key).map(|e| e.refs).unwrap_or(0)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.next_seq = 0;
    }
}
