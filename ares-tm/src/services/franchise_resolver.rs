//! Franchise Resolver
//!
//! Chooses the namespace text-sourced artists are keyed under: the track's
//! product, else its album artist, else the fallback franchise `_`.

use crate::models::{Franchise, DEFAULT_FRANCHISE};
use crate::types::{CustomizationStore, StoreResult};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// The fallback franchise is missing from the store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Fallback franchise '{}' is not configured in the store", DEFAULT_FRANCHISE)]
pub struct FranchiseNotConfiguredError;

fn normalize(name: &str) -> String {
    name.replace(' ', "")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pick the franchise for a track
///
/// Names are compared with spaces stripped. An unknown name falls back to
/// `_`; only a missing `_` is an error.
pub fn resolve_franchise(
    product: Option<&str>,
    album_artist: Option<&str>,
    franchises: &[Franchise],
) -> Result<Franchise, FranchiseNotConfiguredError> {
    let wanted = non_blank(product)
        .or_else(|| non_blank(album_artist))
        .unwrap_or(DEFAULT_FRANCHISE);
    let wanted = normalize(wanted);

    if let Some(found) = franchises.iter().find(|f| normalize(&f.name) == wanted) {
        return Ok(found.clone());
    }

    debug!(franchise = %wanted, "Unknown franchise, using fallback");
    franchises
        .iter()
        .find(|f| f.is_default())
        .cloned()
        .ok_or(FranchiseNotConfiguredError)
}

/// Franchise list fetched once per session
///
/// Failed fetches and empty lists are not cached; the next call fetches again.
#[derive(Debug, Default)]
pub struct FranchiseCatalog {
    cell: OnceCell<Vec<Franchise>>,
}

impl FranchiseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, store: &dyn CustomizationStore) -> StoreResult<&[Franchise]> {
        if let Some(list) = self.cell.get() {
            return Ok(list.as_slice());
        }

        let list = store.franchises().await?;
        if list.is_empty() {
            warn!("Store returned no franchises");
            return Ok(&[]);
        }

        info!(count = list.len(), "Fetched franchise list");
        let list = self.cell.get_or_init(|| async move { list }).await;
        Ok(list.as_slice())
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Forget the cached list
    pub fn invalidate(&mut self) {
        self.cell = OnceCell::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::{MemoryStore, StoreCall};

    fn list() -> Vec<Franchise> {
        vec![
            Franchise { id: 1, name: "_".to_string() },
            Franchise { id: 2, name: "F1".to_string() },
            Franchise { id: 3, name: "F2".to_string() },
            Franchise { id: 4, name: "LoveLive!Sunshine!!".to_string() },
        ]
    }

    #[test]
    fn test_product_wins_over_album_artist() {
        let f = resolve_franchise(Some("F2"), Some("F1"), &list()).unwrap();
        assert_eq!(f.name, "F2");
    }

    #[test]
    fn test_album_artist_used_without_product() {
        let f = resolve_franchise(None, Some("F1"), &list()).unwrap();
        assert_eq!(f.id, 2);
        let f = resolve_franchise(Some("  "), Some("F1"), &list()).unwrap();
        assert_eq!(f.id, 2);
    }

    #[test]
    fn test_neither_resolves_fallback() {
        let f = resolve_franchise(None, None, &list()).unwrap();
        assert!(f.is_default());
    }

    #[test]
    fn test_unknown_name_resolves_fallback() {
        let f = resolve_franchise(Some("Various Artists"), None, &list()).unwrap();
        assert!(f.is_default());
    }

    #[test]
    fn test_spaces_are_ignored() {
        let f = resolve_franchise(Some("LoveLive! Sunshine!!"), None, &list()).unwrap();
        assert_eq!(f.id, 4);
    }

    #[test]
    fn test_missing_fallback_is_error() {
        let franchises = vec![Franchise { id: 2, name: "F1".to_string() }];
        assert_eq!(
            resolve_franchise(Some("Other"), None, &franchises),
            Err(FranchiseNotConfiguredError)
        );
        // a direct match does not need the fallback
        assert!(resolve_franchise(Some("F1"), None, &franchises).is_ok());
    }

    #[tokio::test]
    async fn test_catalog_caches_fetched_list() {
        let store = MemoryStore::with_franchises(list());
        let catalog = FranchiseCatalog::new();

        assert_eq!(catalog.get(&store).await.unwrap().len(), 4);
        assert_eq!(catalog.get(&store).await.unwrap().len(), 4);

        assert!(catalog.is_loaded());
        assert_eq!(store.calls(), vec![StoreCall::ListFranchises]);
    }

    #[tokio::test]
    async fn test_catalog_refetches_after_empty_list() {
        let store = MemoryStore::new();
        let catalog = FranchiseCatalog::new();

        assert!(catalog.get(&store).await.unwrap().is_empty());
        assert!(!catalog.is_loaded());

        store.set_franchises(list());
        let fetched = catalog.get(&store).await.unwrap();

        assert_eq!(fetched.len(), 4);
        assert!(catalog.is_loaded());
        assert_eq!(
            store.calls(),
            vec![StoreCall::ListFranchises, StoreCall::ListFranchises]
        );
    }
}
