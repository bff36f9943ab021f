//! In-memory customization store
//!
//! Implements [`CustomizationStore`] over plain maps and records every call,
//! so callers can assert exactly which reads and writes were issued.
//! Uniqueness rules match the HTTP service: one graph artist per external
//! id, one simple artist per name, one alias per (name, franchise).

use crate::models::{
    alias_name, AliasPayload, AliasRecord, Franchise, GraphArtistPayload, GraphArtistRecord,
    SimpleArtistPayload, SimpleArtistRecord,
};
use crate::types::{CustomizationStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    GetGraphArtist(String),
    CreateGraphArtist(String),
    UpdateGraphArtist(i64),
    FindSimpleArtists(String),
    GetSimpleArtist(i64),
    CreateSimpleArtist(String),
    UpdateSimpleArtist(i64),
    FindAliases(String, i64),
    CreateAlias(String),
    DeleteAlias(i64),
    ListFranchises,
    Health,
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreCall::CreateGraphArtist(_)
                | StoreCall::UpdateGraphArtist(_)
                | StoreCall::CreateSimpleArtist(_)
                | StoreCall::UpdateSimpleArtist(_)
                | StoreCall::CreateAlias(_)
                | StoreCall::DeleteAlias(_)
        )
    }
}

#[derive(Debug)]
struct State {
    graph_artists: BTreeMap<i64, GraphArtistRecord>,
    simple_artists: BTreeMap<i64, SimpleArtistRecord>,
    aliases: BTreeMap<i64, AliasRecord>,
    franchises: Vec<Franchise>,
    next_id: i64,
    calls: Vec<StoreCall>,
    healthy: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            graph_artists: BTreeMap::new(),
            simple_artists: BTreeMap::new(),
            aliases: BTreeMap::new(),
            franchises: Vec::new(),
            next_id: 1,
            calls: Vec::new(),
            healthy: true,
        }
    }
}

impl State {
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn artist_name(&self, id: i64) -> Option<String> {
        self.simple_artists.get(&id).map(|a| a.name.clone())
    }
}

/// Customization store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_franchises(franchises: Vec<Franchise>) -> Self {
        let store = Self::new();
        store.lock().franchises = franchises;
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_franchises(&self, franchises: Vec<Franchise>) {
        self.lock().franchises = franchises;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    pub fn insert_graph_artist(&self, record: GraphArtistRecord) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(record.id + 1);
        state.graph_artists.insert(record.id, record);
    }

    /// Insert a simple artist and return its id
    pub fn insert_simple_artist(&self, name: &str) -> i64 {
        let mut state = self.lock();
        let id = state.next_id();
        state.simple_artists.insert(
            id,
            SimpleArtistRecord {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn rename_simple_artist(&self, id: i64, name: &str) {
        if let Some(record) = self.lock().simple_artists.get_mut(&id) {
            record.name = name.to_string();
        }
    }

    pub fn remove_simple_artist(&self, id: i64) {
        self.lock().simple_artists.remove(&id);
    }

    /// Insert an alias and return its id
    pub fn insert_alias(&self, name: &str, artist_id: i64, franchise_id: i64) -> i64 {
        let mut state = self.lock();
        let id = state.next_id();
        let artist = state.artist_name(artist_id);
        state.aliases.insert(
            id,
            AliasRecord {
                id,
                name: alias_name(name),
                artist_id,
                artist,
                franchise_id: Some(franchise_id),
            },
        );
        id
    }

    pub fn graph_artists(&self) -> Vec<GraphArtistRecord> {
        self.lock().graph_artists.values().cloned().collect()
    }

    pub fn simple_artists(&self) -> Vec<SimpleArtistRecord> {
        self.lock().simple_artists.values().cloned().collect()
    }

    pub fn all_aliases(&self) -> Vec<AliasRecord> {
        self.lock().aliases.values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.is_write()).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn record(&self, call: StoreCall) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }
}

#[async_trait::async_trait]
impl CustomizationStore for MemoryStore {
    async fn graph_artist(&self, external_id: &str) -> StoreResult<Option<GraphArtistRecord>> {
        let state = self.record(StoreCall::GetGraphArtist(external_id.to_string()));
        Ok(state
            .graph_artists
            .values()
            .find(|r| r.mb_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create_graph_artist(
        &self,
        payload: &GraphArtistPayload,
    ) -> StoreResult<GraphArtistRecord> {
        let mut state = self.record(StoreCall::CreateGraphArtist(payload.mb_id.clone()));
        if state
            .graph_artists
            .values()
            .any(|r| r.mb_id.as_deref() == Some(payload.mb_id.as_str()))
        {
            return Err(StoreError::Conflict {
                field: "mbId".to_string(),
                message: format!("artist with MBID {} already exists", payload.mb_id),
            });
        }
        let id = state.next_id();
        let record = GraphArtistRecord {
            id,
            mb_id: Some(payload.mb_id.clone()),
            name: payload.name.clone(),
            original_name: payload.original_name.clone(),
            include: payload.include,
        };
        state.graph_artists.insert(id, record.clone());
        Ok(record)
    }

    async fn update_graph_artist(
        &self,
        id: i64,
        payload: &GraphArtistPayload,
    ) -> StoreResult<GraphArtistRecord> {
        let mut state = self.record(StoreCall::UpdateGraphArtist(id));
        let record = state
            .graph_artists
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("graph artist {}", id)))?;
        record.name = payload.name.clone();
        record.original_name = payload.original_name.clone();
        record.include = payload.include;
        Ok(record.clone())
    }

    async fn simple_artists_by_name(&self, name: &str) -> StoreResult<Vec<SimpleArtistRecord>> {
        let state = self.record(StoreCall::FindSimpleArtists(name.to_string()));
        Ok(state
            .simple_artists
            .values()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    async fn simple_artist(&self, id: i64) -> StoreResult<Option<SimpleArtistRecord>> {
        let state = self.record(StoreCall::GetSimpleArtist(id));
        Ok(state.simple_artists.get(&id).cloned())
    }

    async fn create_simple_artist(
        &self,
        payload: &SimpleArtistPayload,
    ) -> StoreResult<SimpleArtistRecord> {
        let mut state = self.record(StoreCall::CreateSimpleArtist(payload.name.clone()));
        if state.simple_artists.values().any(|r| r.name == payload.name) {
            return Err(StoreError::Conflict {
                field: "name".to_string(),
                message: format!("artist {} already exists", payload.name),
            });
        }
        let id = state.next_id();
        let record = SimpleArtistRecord {
            id,
            name: payload.name.clone(),
        };
        state.simple_artists.insert(id, record.clone());
        Ok(record)
    }

    async fn update_simple_artist(
        &self,
        id: i64,
        payload: &SimpleArtistPayload,
    ) -> StoreResult<SimpleArtistRecord> {
        let mut state = self.record(StoreCall::UpdateSimpleArtist(id));
        let record = state
            .simple_artists
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("simple artist {}", id)))?;
        record.name = payload.name.clone();
        let record = record.clone();
        // embedded artist names follow the rename
        for alias in state.aliases.values_mut().filter(|a| a.artist_id == id) {
            alias.artist = Some(record.name.clone());
        }
        Ok(record)
    }

    async fn aliases(&self, name: &str, franchise_id: i64) -> StoreResult<Vec<AliasRecord>> {
        let name = alias_name(name);
        let state = self.record(StoreCall::FindAliases(name.clone(), franchise_id));
        Ok(state
            .aliases
            .values()
            .filter(|a| a.name == name && a.franchise_id == Some(franchise_id))
            .cloned()
            .collect())
    }

    async fn create_alias(&self, payload: &AliasPayload) -> StoreResult<()> {
        let name = alias_name(&payload.name);
        let mut state = self.record(StoreCall::CreateAlias(name.clone()));
        if state
            .aliases
            .values()
            .any(|a| a.name == name && a.franchise_id == Some(payload.franchise_id))
        {
            return Err(StoreError::Conflict {
                field: "name".to_string(),
                message: format!("alias {} already exists", name),
            });
        }
        let id = state.next_id();
        let artist = state.artist_name(payload.artist_id);
        state.aliases.insert(
            id,
            AliasRecord {
                id,
                name,
                artist_id: payload.artist_id,
                artist,
                franchise_id: Some(payload.franchise_id),
            },
        );
        Ok(())
    }

    async fn delete_alias(&self, id: i64) -> StoreResult<()> {
        let mut state = self.record(StoreCall::DeleteAlias(id));
        state
            .aliases
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("alias {}", id)))
    }

    async fn franchises(&self) -> StoreResult<Vec<Franchise>> {
        let state = self.record(StoreCall::ListFranchises);
        Ok(state.franchises.clone())
    }

    async fn health(&self) -> bool {
        self.record(StoreCall::Health).healthy
    }
}
