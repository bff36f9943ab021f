//! Test Helper Utilities
//!
//! Shared utilities for testing ares-tm: an in-memory tag synchronizer and
//! track manager setup against the in-memory customization store.

#![allow(dead_code)]

use ares_tm::models::Franchise;
use ares_tm::services::MemoryStore;
use ares_tm::types::{CreditRead, TagError, TagSynchronizer, TrackFields};
use ares_tm::TrackManager;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tag synchronizer over a map of path → stored credits
#[derive(Default)]
pub struct FakeTags {
    files: Mutex<HashMap<PathBuf, CreditRead>>,
    reads: Mutex<Vec<PathBuf>>,
    writes: Mutex<Vec<(PathBuf, TrackFields)>>,
}

impl FakeTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, path: &str, read: CreditRead) {
        self.files.lock().unwrap().insert(PathBuf::from(path), read);
    }

    pub fn reads(&self) -> Vec<PathBuf> {
        self.reads.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(PathBuf, TrackFields)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn stored(&self, path: &str) -> Option<TrackFields> {
        self.files
            .lock()
            .unwrap()
            .get(Path::new(path))
            .map(|r| r.fields.clone())
    }
}

impl TagSynchronizer for FakeTags {
    fn read_credits(&self, path: &Path) -> Result<CreditRead, TagError> {
        self.reads.lock().unwrap().push(path.to_path_buf());
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                TagError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    path.display().to_string(),
                ))
            })
    }

    fn write_credits(&self, path: &Path, fields: &TrackFields) -> Result<(), TagError> {
        self.writes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), fields.clone()));
        if let Some(read) = self.files.lock().unwrap().get_mut(path) {
            read.fields = fields.clone();
        }
        Ok(())
    }
}

/// Franchise list `[_, F1, F2]`
pub fn franchises() -> Vec<Franchise> {
    vec![
        Franchise { id: 1, name: "_".to_string() },
        Franchise { id: 2, name: "F1".to_string() },
        Franchise { id: 3, name: "F2".to_string() },
    ]
}

pub fn franchise_id(name: &str) -> i64 {
    franchises()
        .into_iter()
        .find(|f| f.name == name)
        .map(|f| f.id)
        .unwrap()
}

/// Store, tags and a manager wired to both
pub fn setup() -> (Arc<MemoryStore>, Arc<FakeTags>, TrackManager) {
    let store = Arc::new(MemoryStore::with_franchises(franchises()));
    let tags = Arc::new(FakeTags::new());
    let manager = TrackManager::new(store.clone(), tags.clone(), 4);
    (store, tags, manager)
}

/// File with free-text artist credits
pub fn text_read(artists: &[&str], album_artist: Option<&str>) -> CreditRead {
    CreditRead {
        fields: TrackFields {
            title: Some("Title".to_string()),
            artist: artists.iter().map(|a| a.to_string()).collect(),
            album_artist: album_artist.map(str::to_string),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// File with a relation graph alongside its artist tag
pub fn graph_read(json: serde_json::Value, artists: &[&str]) -> CreditRead {
    CreditRead {
        relation_graph_json: Some(json.to_string()),
        ..text_read(artists, None)
    }
}

pub fn names(manager: &TrackManager, path: &str) -> Vec<String> {
    manager
        .track(path)
        .unwrap()
        .artists()
        .iter()
        .map(|a| a.name())
        .collect()
}
