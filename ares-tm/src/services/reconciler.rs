//! Reconciliation Engine
//!
//! Brings the customization store in line with local artist state using as
//! few writes as possible.
//!
//! # State machine
//! `Local` → `Verified` (remote record inspected) → `Synced` (confirmed
//! equal, or just written). An interrupted run leaves the artist `Verified`;
//! running again is safe.
//!
//! # Graph-sourced artists
//! Fetch by external id. Missing → create. Present with a different name,
//! original name, or include flag → update. Otherwise nothing is written.
//!
//! # Text-sourced artists
//! The store keys simple artists by display name, so identity is resolved in
//! two phases:
//! 1. Look up by custom name. Found → adopt that id and stop.
//! 2. Not found without a local id → create. Not found with a local id →
//!    re-fetch by id: same name → stop, other name → update, gone →
//!    [`ReconcileError::OrphanedArtistReference`] (never recreated).
//!
//! The alias step follows: missing → create, pointing elsewhere → delete and
//! create. Excluded text-sourced artists are skipped entirely.
//!
//! Each artist's sequence runs under its own async gate and is strictly
//! sequential. Different artists run concurrently in [`Reconciler::reconcile_all`],
//! except text-sourced artists sharing a custom name: the store's name
//! keyspace is shared across franchises, so they are serialized by name.

use crate::models::{
    AliasPayload, Artist, ArtistRef, ArtistSource, GraphArtistPayload, IdentityKey,
    SimpleArtistPayload, SimpleArtistRecord, SyncState,
};
use crate::types::{CustomizationStore, StoreError};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Per-artist reconciliation failure
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Local remote id no longer exists in the store
    #[error("Artist {key} references remote id {remote_id}, which no longer exists")]
    OrphanedArtistReference { key: IdentityKey, remote_id: i64 },

    #[error("Store rejected {key}: conflicting '{field}'")]
    RemoteConflict { key: IdentityKey, field: String },

    #[error("Artist {key} has no remote id after identity reconciliation")]
    MissingRemoteId { key: IdentityKey },

    #[error("Store error for {key}: {source}")]
    Store {
        key: IdentityKey,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    fn from_store(key: &IdentityKey, error: StoreError) -> Self {
        match error {
            StoreError::Conflict { field, .. } => ReconcileError::RemoteConflict {
                key: key.clone(),
                field,
            },
            source => ReconcileError::Store {
                key: key.clone(),
                source,
            },
        }
    }

    pub fn key(&self) -> &IdentityKey {
        match self {
            ReconcileError::OrphanedArtistReference { key, .. }
            | ReconcileError::RemoteConflict { key, .. }
            | ReconcileError::MissingRemoteId { key }
            | ReconcileError::Store { key, .. } => key,
        }
    }
}

/// What happened to the artist record itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOutcome {
    Created,
    Updated,
    Unchanged,
    /// Text-sourced artist took the id of a remote artist with its name
    Adopted,
    /// Excluded text-sourced artist; nothing inspected
    Skipped,
}

/// What happened to the text-sourced artist's alias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOutcome {
    Created,
    Unchanged,
    /// Stale alias deleted and recreated
    Replaced,
}

/// Result of reconciling one artist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReport {
    pub key: IdentityKey,
    pub name: String,
    pub identity: IdentityOutcome,
    pub alias: Option<AliasOutcome>,
    pub remote_id: Option<i64>,
    /// Remote id held before a by-name adoption replaced it
    pub reassigned_from: Option<i64>,
}

impl EntityReport {
    /// Store writes issued for this artist
    pub fn writes(&self) -> usize {
        let identity = match self.identity {
            IdentityOutcome::Created | IdentityOutcome::Updated => 1,
            _ => 0,
        };
        let alias = match self.alias {
            Some(AliasOutcome::Created) => 1,
            Some(AliasOutcome::Replaced) => 2,
            _ => 0,
        };
        identity + alias
    }
}

/// Results of a batch run
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub entities: Vec<EntityReport>,
    pub failures: Vec<ReconcileError>,
}

impl ReconcileReport {
    pub fn writes(&self) -> usize {
        self.entities.iter().map(EntityReport::writes).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn reassigned(&self) -> impl Iterator<Item = &EntityReport> {
        self.entities.iter().filter(|e| e.reassigned_from.is_some())
    }
}

/// Results of pulling customizations
#[derive(Debug, Default)]
pub struct HydrationReport {
    /// Artists queried this run
    pub hydrated: usize,
    /// Of those, artists that had stored customizations
    pub with_remote_data: usize,
    /// Already hydrated earlier in the session
    pub skipped: usize,
    pub failures: Vec<ReconcileError>,
}

/// Diffs artists against the customization store
pub struct Reconciler {
    store: Arc<dyn CustomizationStore>,
    concurrency: usize,
    /// Gates for text-sourced identity reconciliation, by custom name
    name_gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CustomizationStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            name_gates: Mutex::new(HashMap::new()),
        }
    }

    fn name_gate(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.name_gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(name.trim().to_string()).or_default())
    }

    /// Reconcile every artist, isolating failures
    ///
    /// Reports are returned in input order.
    pub async fn reconcile_all(&self, artists: &[ArtistRef]) -> ReconcileReport {
        let mut results: Vec<(usize, Result<EntityReport, ReconcileError>)> =
            stream::iter(artists.iter().enumerate())
                .map(|(index, artist)| async move { (index, self.reconcile(artist).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);

        let mut report = ReconcileReport::default();
        for (_, result) in results {
            match result {
                Ok(entity) => report.entities.push(entity),
                Err(e) => {
                    warn!(key = %e.key(), error = %e, "Reconciliation failed");
                    report.failures.push(e);
                }
            }
        }

        info!(
            artists = artists.len(),
            writes = report.writes(),
            failures = report.failures.len(),
            "Reconciliation finished"
        );
        report
    }

    /// Reconcile one artist
    pub async fn reconcile(&self, artist: &Artist) -> Result<EntityReport, ReconcileError> {
        let _gate = artist.lock_remote().await;

        match artist.source() {
            ArtistSource::Graph => self.reconcile_graph(artist).await,
            ArtistSource::Text { franchise_id, .. } => {
                let franchise_id = *franchise_id;
                if !artist.include() {
                    debug!(key = %artist.key(), name = %artist.name(), "Skipping excluded artist");
                    return Ok(entity_report(artist, IdentityOutcome::Skipped, None, None));
                }
                let gate = self.name_gate(&artist.custom_name());
                let _name = gate.lock().await;
                self.reconcile_text(artist, franchise_id).await
            }
        }
    }

    async fn reconcile_graph(&self, artist: &Artist) -> Result<EntityReport, ReconcileError> {
        let key = artist.key();
        let details = artist.snapshot();
        let payload = GraphArtistPayload {
            mb_id: key.to_string(),
            name: details.custom_name.clone(),
            original_name: details.custom_original_name.clone(),
            include: details.include,
        };

        let existing = self
            .store
            .graph_artist(key.as_str())
            .await
            .map_err(|e| ReconcileError::from_store(key, e))?;
        artist.update(|d| d.sync_state = SyncState::Verified);

        let (outcome, remote_id) = match existing {
            None => {
                let created = self
                    .store
                    .create_graph_artist(&payload)
                    .await
                    .map_err(|e| ReconcileError::from_store(key, e))?;
                info!(key = %key, id = created.id, name = %created.name, "Created graph artist");
                (IdentityOutcome::Created, created.id)
            }
            Some(record)
                if record.name != payload.name
                    || record.original_name != payload.original_name
                    || record.include != payload.include =>
            {
                let updated = self
                    .store
                    .update_graph_artist(record.id, &payload)
                    .await
                    .map_err(|e| ReconcileError::from_store(key, e))?;
                info!(key = %key, id = updated.id, name = %updated.name, "Updated graph artist");
                (IdentityOutcome::Updated, updated.id)
            }
            Some(record) => {
                debug!(key = %key, id = record.id, "Graph artist unchanged");
                (IdentityOutcome::Unchanged, record.id)
            }
        };

        artist.update(|d| {
            d.remote_id = Some(remote_id);
            d.sync_state = SyncState::Synced;
        });
        Ok(entity_report(artist, outcome, None, None))
    }

    async fn reconcile_text(
        &self,
        artist: &Artist,
        franchise_id: i64,
    ) -> Result<EntityReport, ReconcileError> {
        let key = artist.key();
        let (identity, reassigned_from) = self.reconcile_text_identity(artist).await?;

        let remote_id = artist
            .remote_id()
            .ok_or_else(|| ReconcileError::MissingRemoteId { key: key.clone() })?;
        let alias = self.reconcile_alias(artist, remote_id, franchise_id).await?;

        artist.update(|d| d.sync_state = SyncState::Synced);
        Ok(entity_report(artist, identity, Some(alias), reassigned_from))
    }

    async fn reconcile_text_identity(
        &self,
        artist: &Artist,
    ) -> Result<(IdentityOutcome, Option<i64>), ReconcileError> {
        let key = artist.key();
        let custom_name = artist.custom_name();
        let held_id = artist.remote_id();
        let store_err = |e| ReconcileError::from_store(key, e);

        let by_name = self
            .store
            .simple_artists_by_name(&custom_name)
            .await
            .map_err(store_err)?;
        artist.update(|d| d.sync_state = SyncState::Verified);

        if let Some(found) = pick_by_name(by_name, &custom_name) {
            let reassigned_from = held_id.filter(|held| *held != found.id);
            if let Some(previous) = reassigned_from {
                warn!(
                    key = %key,
                    name = %custom_name,
                    previous_id = previous,
                    adopted_id = found.id,
                    "Artist adopted a different remote id by name"
                );
            }
            artist.update(|d| d.remote_id = Some(found.id));
            debug!(key = %key, id = found.id, "Adopted simple artist by name");
            return Ok((IdentityOutcome::Adopted, reassigned_from));
        }

        let payload = SimpleArtistPayload {
            name: custom_name.clone(),
        };

        let held_id = match held_id {
            None => {
                let created = self
                    .store
                    .create_simple_artist(&payload)
                    .await
                    .map_err(store_err)?;
                info!(key = %key, id = created.id, name = %created.name, "Created simple artist");
                artist.update(|d| d.remote_id = Some(created.id));
                return Ok((IdentityOutcome::Created, None));
            }
            Some(id) => id,
        };

        match self.store.simple_artist(held_id).await.map_err(store_err)? {
            Some(existing) if existing.name == custom_name => {
                debug!(key = %key, id = held_id, "Simple artist unchanged");
                Ok((IdentityOutcome::Unchanged, None))
            }
            Some(existing) => {
                let updated = self
                    .store
                    .update_simple_artist(existing.id, &payload)
                    .await
                    .map_err(store_err)?;
                info!(
                    key = %key,
                    id = updated.id,
                    from = %existing.name,
                    to = %updated.name,
                    "Renamed simple artist"
                );
                artist.update(|d| d.remote_id = Some(updated.id));
                Ok((IdentityOutcome::Updated, None))
            }
            None => Err(ReconcileError::OrphanedArtistReference {
                key: key.clone(),
                remote_id: held_id,
            }),
        }
    }

    async fn reconcile_alias(
        &self,
        artist: &Artist,
        remote_id: i64,
        franchise_id: i64,
    ) -> Result<AliasOutcome, ReconcileError> {
        let key = artist.key();
        let name = artist.name();
        let store_err = |e| ReconcileError::from_store(key, e);
        let payload = AliasPayload {
            name: name.clone(),
            artist_id: remote_id,
            franchise_id,
        };

        let existing = self
            .store
            .aliases(&name, franchise_id)
            .await
            .map_err(store_err)?;

        match existing.into_iter().next() {
            None => {
                self.store.create_alias(&payload).await.map_err(store_err)?;
                info!(key = %key, alias = %name, artist_id = remote_id, "Created alias");
                Ok(AliasOutcome::Created)
            }
            Some(alias) if alias.artist_id == remote_id => Ok(AliasOutcome::Unchanged),
            Some(alias) => {
                self.store.delete_alias(alias.id).await.map_err(store_err)?;
                self.store.create_alias(&payload).await.map_err(store_err)?;
                info!(
                    key = %key,
                    alias = %name,
                    from = alias.artist_id,
                    to = remote_id,
                    "Replaced stale alias"
                );
                Ok(AliasOutcome::Replaced)
            }
        }
    }

    /// Pull stored customizations for artists not yet hydrated this session
    pub async fn hydrate_all(&self, artists: &[ArtistRef]) -> HydrationReport {
        let results: Vec<Result<Option<bool>, ReconcileError>> = stream::iter(artists.iter())
            .map(|artist| self.hydrate(artist))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = HydrationReport::default();
        for result in results {
            match result {
                Ok(None) => report.skipped += 1,
                Ok(Some(found)) => {
                    report.hydrated += 1;
                    if found {
                        report.with_remote_data += 1;
                    }
                }
                Err(e) => {
                    warn!(key = %e.key(), error = %e, "Loading customizations failed");
                    report.failures.push(e);
                }
            }
        }

        debug!(
            hydrated = report.hydrated,
            with_remote_data = report.with_remote_data,
            skipped = report.skipped,
            "Loaded customizations"
        );
        report
    }

    /// Pull stored customizations for one artist
    ///
    /// Returns `None` when the artist was already hydrated, otherwise whether
    /// stored data was found.
    pub async fn hydrate(&self, artist: &Artist) -> Result<Option<bool>, ReconcileError> {
        let _gate = artist.lock_remote().await;
        if artist.snapshot().hydrated {
            return Ok(None);
        }

        let key = artist.key();
        let found = match artist.source() {
            ArtistSource::Graph => {
                let record = self
                    .store
                    .graph_artist(key.as_str())
                    .await
                    .map_err(|e| ReconcileError::from_store(key, e))?;
                record.map(|r| artist.apply_graph_customization(&r)).is_some()
            }
            ArtistSource::Text { franchise_id, .. } => {
                let aliases = self
                    .store
                    .aliases(&artist.name(), *franchise_id)
                    .await
                    .map_err(|e| ReconcileError::from_store(key, e))?;
                aliases
                    .first()
                    .map(|a| artist.apply_alias_customization(a))
                    .is_some()
            }
        };

        artist.update(|d| d.hydrated = true);
        Ok(Some(found))
    }
}

/// Prefer an exact name match, else the store's first result
fn pick_by_name(records: Vec<SimpleArtistRecord>, name: &str) -> Option<SimpleArtistRecord> {
    let exact = records.iter().position(|r| r.name == name);
    let mut records = records;
    match exact {
        Some(index) => Some(records.swap_remove(index)),
        None => records.into_iter().next(),
    }
}

fn entity_report(
    artist: &Artist,
    identity: IdentityOutcome,
    alias: Option<AliasOutcome>,
    reassigned_from: Option<i64>,
) -> EntityReport {
    EntityReport {
        key: artist.key().clone(),
        name: artist.name(),
        identity,
        alias,
        remote_id: artist.remote_id(),
        reassigned_from,
    }
}
