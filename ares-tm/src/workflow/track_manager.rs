//! Track manager
//!
//! Owns the loaded tracks and the identity registry they share. Loading a
//! batch validates every path first, reads all files concurrently, then
//! resolves credits: relation graph JSON when the file carries it, otherwise
//! the free-text artist tag under the track's franchise.
//!
//! Every credited artist is retained in the registry once per track
//! occurrence; removing a track releases its artists and evicts those no
//! other track references.

use crate::error::{Result, TrackManagerError};
use crate::models::{ArtistRef, Franchise, IdentityKey};
use crate::registry::IdentityRegistry;
use crate::services::{
    resolve_franchise, CreditParser, FranchiseCatalog, GraphResolver, HydrationReport,
    MalformedGraphError, ReconcileReport, Reconciler,
};
use crate::types::{CreditRead, CustomizationStore, TagSynchronizer};
use crate::workflow::track::Track;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const AUDIO_EXTENSION: &str = "mp3";

/// Outcome of [`TrackManager::load_files`]
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    /// Already loaded, or repeated within the batch
    pub skipped: usize,
    /// Graph records skipped while resolving, per file
    pub malformed: Vec<(PathBuf, MalformedGraphError)>,
    /// Files whose graph JSON was unreadable and fell back to text credits
    pub graph_fallbacks: Vec<PathBuf>,
}

/// Loaded tracks plus the collaborators used to resolve and sync them
pub struct TrackManager {
    tracks: Vec<Track>,
    registry: Arc<IdentityRegistry>,
    franchises: FranchiseCatalog,
    store: Arc<dyn CustomizationStore>,
    tags: Arc<dyn TagSynchronizer>,
    reconciler: Reconciler,
}

impl TrackManager {
    pub fn new(
        store: Arc<dyn CustomizationStore>,
        tags: Arc<dyn TagSynchronizer>,
        concurrency: usize,
    ) -> Self {
        Self {
            tracks: Vec::new(),
            registry: Arc::new(IdentityRegistry::new()),
            franchises: FranchiseCatalog::new(),
            reconciler: Reconciler::new(Arc::clone(&store), concurrency),
            store,
            tags,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, path: impl AsRef<Path>) -> Option<&Track> {
        let path = normalize_path(path.as_ref());
        self.tracks.iter().find(|t| t.file_path() == path)
    }

    pub fn track_mut(&mut self, path: impl AsRef<Path>) -> Option<&mut Track> {
        let path = normalize_path(path.as_ref());
        self.tracks.iter_mut().find(|t| t.file_path() == path)
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Registered artists in first-seen order
    pub fn artists(&self) -> Vec<ArtistRef> {
        self.registry.artists()
    }

    /// Reject the batch if any path is not an MP3 file
    pub fn validate_files<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
        for path in paths {
            let path = path.as_ref();
            let is_audio = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(AUDIO_EXTENSION))
                .unwrap_or(false);
            if !is_audio {
                return Err(TrackManagerError::InvalidFileType {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Load files and resolve their credits
    ///
    /// Nothing is loaded when validation or any read fails.
    pub async fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<LoadReport> {
        Self::validate_files(paths)?;

        let mut report = LoadReport::default();
        let mut seen: HashSet<PathBuf> = self
            .tracks
            .iter()
            .map(|t| t.file_path().to_path_buf())
            .collect();

        let mut pending = Vec::new();
        for path in paths {
            let path = normalize_path(path.as_ref());
            if seen.insert(path.clone()) {
                pending.push(path);
            } else {
                debug!(path = %path.display(), "Skipping already loaded file");
                report.skipped += 1;
            }
        }

        let reads = self.read_all(pending).await?;

        let mut loaded: Vec<Track> = Vec::with_capacity(reads.len());
        for (path, read) in reads {
            match self.build_track(path, read, &mut report).await {
                Ok(track) => {
                    self.registry.retain(track.artists());
                    loaded.push(track);
                }
                Err(e) => {
                    for track in &loaded {
                        self.registry.release(track.artists());
                    }
                    return Err(e);
                }
            }
        }

        report.loaded = loaded.len();
        self.tracks.extend(loaded);
        info!(
            loaded = report.loaded,
            skipped = report.skipped,
            artists = self.registry.len(),
            "Loaded files"
        );
        Ok(report)
    }

    async fn read_all(&self, paths: Vec<PathBuf>) -> Result<Vec<(PathBuf, CreditRead)>> {
        let handles = paths.into_iter().map(|path| {
            let tags = Arc::clone(&self.tags);
            tokio::task::spawn_blocking(move || {
                let read = tags.read_credits(&path);
                (path, read)
            })
        });

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined? {
                (path, Ok(read)) => Ok((path, read)),
                (path, Err(source)) => Err(TrackManagerError::Tag { path, source }),
            })
            .collect()
    }

    async fn build_track(
        &self,
        path: PathBuf,
        read: CreditRead,
        report: &mut LoadReport,
    ) -> Result<Track> {
        if let Some(json) = read.relation_graph_json.as_deref() {
            match GraphResolver::new(&self.registry).resolve_json(json) {
                Ok(resolved) => {
                    report
                        .malformed
                        .extend(resolved.errors.into_iter().map(|e| (path.clone(), e)));
                    return Ok(Track::new(path, read, resolved.artists));
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Unreadable relation graph, using artist tag"
                    );
                    report.graph_fallbacks.push(path.clone());
                }
            }
        }

        let franchise = self
            .franchise_for(read.product.as_deref(), read.fields.album_artist.as_deref())
            .await?;
        let artists = CreditParser::new(&self.registry).parse(&read.fields.artist, &franchise);

        let mut track = Track::new(path, read, artists);
        track.set_product(franchise.name);
        Ok(track)
    }

    async fn franchise_for(
        &self,
        product: Option<&str>,
        album_artist: Option<&str>,
    ) -> Result<Franchise> {
        let list = self.franchises.get(self.store.as_ref()).await?;
        Ok(resolve_franchise(product, album_artist, list)?)
    }

    /// Remove a track; returns the keys of artists evicted with it
    pub fn remove_track(&mut self, path: impl AsRef<Path>) -> Result<Vec<IdentityKey>> {
        let path = normalize_path(path.as_ref());
        let index = self
            .tracks
            .iter()
            .position(|t| t.file_path() == path)
            .ok_or_else(|| TrackManagerError::TrackNotLoaded(path.clone()))?;

        let track = self.tracks.remove(index);
        let evicted = self.registry.release(track.artists());
        debug!(
            path = %path.display(),
            evicted = evicted.len(),
            "Removed track"
        );
        Ok(evicted)
    }

    /// Drop all tracks and artists and forget the franchise list
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.registry.clear();
        self.franchises.invalidate();
    }

    /// Pull stored customizations for artists not yet hydrated
    pub async fn load_customizations(&self) -> HydrationReport {
        self.reconciler.hydrate_all(&self.registry.artists()).await
    }

    /// Push local artist state to the customization store
    pub async fn send_changes(&self) -> ReconcileReport {
        self.reconciler.reconcile_all(&self.registry.artists()).await
    }

    pub fn replace_original_title(&mut self, overwrite: bool) {
        for track in &mut self.tracks {
            track.replace_original_title(overwrite);
        }
    }

    pub fn replace_original_artist(&mut self, overwrite: bool) {
        for track in &mut self.tracks {
            track.replace_original_artist(overwrite);
        }
    }

    /// Set the artist field of every writable track to its resolved credit
    pub fn apply_custom_tag_values(&mut self) {
        for track in self.tracks.iter_mut().filter(|t| t.update_file) {
            track.apply_custom_tag_values();
        }
    }

    /// Apply resolved credits and write every changed, writable track
    ///
    /// Returns the number of files written. Files that were written stay
    /// saved even if another write fails.
    pub async fn save_files(&mut self) -> Result<usize> {
        self.apply_custom_tag_values();

        let pending: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.update_file && t.has_changes())
            .map(|(i, _)| i)
            .collect();

        let handles = pending.iter().map(|&index| {
            let tags = Arc::clone(&self.tags);
            let path = self.tracks[index].file_path().to_path_buf();
            let fields = self.tracks[index].fields.clone();
            tokio::task::spawn_blocking(move || (index, tags.write_credits(&path, &fields)))
        });
        let results = join_all(handles).await;

        let mut written = 0;
        let mut first_error = None;
        for joined in results {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    first_error.get_or_insert(TrackManagerError::from(e));
                    continue;
                }
            };
            let track = &mut self.tracks[index];
            match result {
                Ok(()) => {
                    track.mark_saved();
                    written += 1;
                }
                Err(source) => {
                    warn!(path = %track.file_path().display(), error = %source, "Failed to write tags");
                    first_error.get_or_insert(TrackManagerError::Tag {
                        path: track.file_path().to_path_buf(),
                        source,
                    });
                }
            }
        }

        info!(written = written, candidates = pending.len(), "Saved files");
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    pub async fn server_health(&self) -> bool {
        self.store.health().await
    }
}

/// Lexically clean a path: drop `.` and resolve `..` against prior components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_mp3() {
        let result = TrackManager::validate_files(&["/a/one.mp3", "/a/two.flac"]);
        match result {
            Err(TrackManagerError::InvalidFileType { path }) => {
                assert_eq!(path, PathBuf::from("/a/two.flac"))
            }
            other => panic!("expected invalid file type, got {:?}", other),
        }
        assert!(TrackManager::validate_files(&["/a/ONE.MP3"]).is_ok());
        assert!(TrackManager::validate_files(&["/a/no_extension"]).is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c.mp3")), PathBuf::from("/a/c.mp3"));
        assert_eq!(normalize_path(Path::new("a//b.mp3")), PathBuf::from("a/b.mp3"));
        assert_eq!(normalize_path(Path::new("../x.mp3")), PathBuf::from("../x.mp3"));
        assert_eq!(normalize_path(Path::new("/../x.mp3")), PathBuf::from("/x.mp3"));
    }
}
