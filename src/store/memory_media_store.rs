//! In-memory MediaStore implementation.
//!
//! Holds folders and assets in ordered maps. Used by tests and by `mbr` when a
//! store is configured as `memory://`. Faults can be injected per instance and
//! every trait call is counted, so tests can observe exactly which backend
//! calls an operation made.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::folder_path::{FolderPath, PathError};
use crate::store::{
    AssetEntry, AssetPolicy, AssetUrls, FolderEntry, MediaStore, Result, Source, StoreError,
    extension_for_mime,
};

struct StoredAsset {
    entry: AssetEntry,
    file_name: String,
}

#[derive(Default)]
struct State {
    folders: BTreeMap<FolderPath, DateTime<Utc>>,
    /// Keyed by url.
    assets: BTreeMap<String, StoredAsset>,
    next_asset: u64,
}

#[derive(Default)]
struct Faults {
    fail_listing: bool,
    fail_mutations: bool,
    /// Folders (with their subtrees) that recursive deletes cannot remove.
    protected: BTreeSet<FolderPath>,
    listing_delay: Option<Duration>,
}

#[derive(Default)]
struct CallCounts {
    folder_exists: AtomicUsize,
    list_folders: AtomicUsize,
    list_assets: AtomicUsize,
    create_folder: AtomicUsize,
    delete_folder: AtomicUsize,
    store_asset: AtomicUsize,
    delete_asset: AtomicUsize,
}

/// An in-memory implementation of `MediaStore`, intended primarily for testing.
pub struct MemoryMediaStore {
    source: Source,
    urls: AssetUrls,
    policy: AssetPolicy,
    state: Mutex<State>,
    faults: Mutex<Faults>,
    calls: CallCounts,
}

impl MemoryMediaStore {
    /// Create an empty store with urls under `memory://{source}`.
    pub fn new(source: Source) -> Self {
        Self::with_url_base(source, format!("memory://{}", source))
    }

    /// Create an empty store with urls under `url_base`.
    pub fn with_url_base(source: Source, url_base: impl Into<String>) -> Self {
        Self {
            source,
            urls: AssetUrls::new(url_base),
            policy: AssetPolicy::default(),
            state: Mutex::new(State::default()),
            faults: Mutex::new(Faults::default()),
            calls: CallCounts::default(),
        }
    }

    pub fn with_policy(mut self, policy: AssetPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding and inspection
    // =========================================================================

    /// Create `path` and any missing ancestors without counting a call.
    pub fn seed_folder(&self, path: &FolderPath) {
        let mut state = self.state();
        let mut current = FolderPath::root();
        for segment in path.segments() {
            let Ok(next) = current.join(segment) else {
                return;
            };
            state.folders.entry(next.clone()).or_insert_with(Utc::now);
            current = next;
        }
    }

    /// Number of folders currently held.
    pub fn folder_count(&self) -> usize {
        self.state().folders.len()
    }

    /// Number of assets currently held.
    pub fn asset_count(&self) -> usize {
        self.state().assets.len()
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Make `list_folders`, `list_assets` and `folder_exists` fail.
    pub fn set_fail_listing(&self, fail: bool) {
        self.faults().fail_listing = fail;
    }

    /// Make folder creation, asset storage and all deletes fail.
    pub fn set_fail_mutations(&self, fail: bool) {
        self.faults().fail_mutations = fail;
    }

    /// Prevent recursive deletes from removing `path` and its subtree.
    pub fn protect_from_delete(&self, path: &FolderPath) {
        self.faults().protected.insert(path.clone());
    }

    /// Delay every listing call by `delay`.
    pub fn set_listing_delay(&self, delay: Option<Duration>) {
        self.faults().listing_delay = delay;
    }

    // =========================================================================
    // Call counters
    // =========================================================================

    pub fn store_calls(&self) -> usize {
        self.calls.store_asset.load(Ordering::SeqCst)
    }

    pub fn delete_folder_calls(&self) -> usize {
        self.calls.delete_folder.load(Ordering::SeqCst)
    }

    pub fn delete_asset_calls(&self) -> usize {
        self.calls.delete_asset.load(Ordering::SeqCst)
    }

    /// Every trait call made against this store.
    pub fn total_calls(&self) -> usize {
        [
            &self.calls.folder_exists,
            &self.calls.list_folders,
            &self.calls.list_assets,
            &self.calls.create_folder,
            &self.calls.delete_folder,
            &self.calls.store_asset,
            &self.calls.delete_asset,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn unavailable(&self, operation: &str) -> StoreError {
        StoreError::unavailable(self.source, format!("injected {} failure", operation))
    }

    async fn before_listing(&self) -> Result<()> {
        let (fail, delay) = {
            let faults = self.faults();
            (faults.fail_listing, faults.listing_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(self.unavailable("listing"));
        }
        Ok(())
    }

    fn before_mutation(&self, operation: &str) -> Result<()> {
        if self.faults().fail_mutations {
            return Err(self.unavailable(operation));
        }
        Ok(())
    }

    fn exists(state: &State, path: &FolderPath) -> bool {
        path.is_root() || state.folders.contains_key(path)
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    fn source(&self) -> Source {
        self.source
    }

    fn owns_url(&self, url: &str) -> bool {
        self.urls.owns(url)
    }

    async fn folder_exists(&self, path: &FolderPath) -> Result<bool> {
        self.calls.folder_exists.fetch_add(1, Ordering::SeqCst);
        self.before_listing().await?;
        Ok(Self::exists(&self.state(), path))
    }

    async fn list_folders(&self, path: &FolderPath) -> Result<Vec<FolderEntry>> {
        self.calls.list_folders.fetch_add(1, Ordering::SeqCst);
        self.before_listing().await?;
        let state = self.state();
        Ok(state
            .folders
            .iter()
            .filter(|(folder, _)| folder.parent().as_ref() == Some(path))
            .map(|(folder, created_at)| FolderEntry::new(folder.clone(), self.source, *created_at))
            .collect())
    }

    async fn list_assets(&self, path: &FolderPath) -> Result<Vec<AssetEntry>> {
        self.calls.list_assets.fetch_add(1, Ordering::SeqCst);
        self.before_listing().await?;
        let state = self.state();
        Ok(state
            .assets
            .values()
            .filter(|a| &a.entry.folder_path == path)
            .map(|a| a.entry.clone())
            .collect())
    }

    async fn create_folder(&self, parent: &FolderPath, name: &str) -> Result<FolderEntry> {
        self.calls.create_folder.fetch_add(1, Ordering::SeqCst);
        let path = parent.join(name)?;
        self.before_mutation("create")?;

        let mut state = self.state();
        if !Self::exists(&state, parent) {
            return Err(StoreError::FolderNotFound {
                path: parent.clone(),
                backend: self.source,
            });
        }
        if state.folders.contains_key(&path) {
            return Err(StoreError::DuplicateFolder {
                parent: parent.clone(),
                name: name.to_string(),
                backend: self.source,
            });
        }
        let created_at = Utc::now();
        state.folders.insert(path.clone(), created_at);
        Ok(FolderEntry::new(path, self.source, created_at))
    }

    async fn delete_folder_recursive(&self, path: &FolderPath) -> Result<()> {
        self.calls.delete_folder.fetch_add(1, Ordering::SeqCst);
        if path.is_root() {
            return Err(PathError::InvalidPath {
                path: path.to_string(),
                message: "the root folder cannot be deleted".to_string(),
            }
            .into());
        }
        self.before_mutation("delete")?;

        let protected: Vec<FolderPath> = self
            .faults()
            .protected
            .iter()
            .filter(|p| path.is_ancestor_of(p))
            .cloned()
            .collect();

        let mut state = self.state();
        if !state.folders.contains_key(path) {
            return Err(StoreError::FolderNotFound {
                path: path.clone(),
                backend: self.source,
            });
        }

        let mut survivors = Vec::new();

        let asset_urls: Vec<String> = state
            .assets
            .iter()
            .filter(|(_, a)| path.is_ancestor_of(&a.entry.folder_path))
            .map(|(url, _)| url.clone())
            .collect();
        for url in asset_urls {
            let folder = match state.assets.get(&url) {
                Some(asset) => asset.entry.folder_path.clone(),
                None => continue,
            };
            if protected.iter().any(|p| p.is_ancestor_of(&folder)) {
                if let Some(asset) = state.assets.get(&url) {
                    survivors.push(format!("{}/{}", folder.to_relative(), asset.file_name));
                }
            } else {
                state.assets.remove(&url);
            }
        }

        let folders: Vec<FolderPath> = state
            .folders
            .keys()
            .filter(|f| path.is_ancestor_of(f))
            .cloned()
            .collect();
        for folder in folders {
            let blocked = protected
                .iter()
                .any(|p| p.is_ancestor_of(&folder) || folder.is_ancestor_of(p));
            if blocked {
                survivors.push(folder.to_relative());
            } else {
                state.folders.remove(&folder);
            }
        }

        if survivors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::PartialDelete {
                path: path.clone(),
                backend: self.source,
                survivors,
            })
        }
    }

    async fn store_asset(
        &self,
        path: &FolderPath,
        blob: Bytes,
        mime_type: &str,
        size_bytes: u64,
    ) -> Result<AssetEntry> {
        self.calls.store_asset.fetch_add(1, Ordering::SeqCst);
        self.policy.validate_blob(mime_type, size_bytes, blob.len())?;
        self.before_mutation("store")?;

        let mut state = self.state();
        if !Self::exists(&state, path) {
            return Err(StoreError::FolderNotFound {
                path: path.clone(),
                backend: self.source,
            });
        }

        state.next_asset += 1;
        let file_name = format!("asset-{}.{}", state.next_asset, extension_for_mime(mime_type));
        let entry = AssetEntry {
            url: self.urls.url_for(path, &file_name),
            folder_path: path.clone(),
            size_bytes,
            mime_type: mime_type.to_string(),
            created_at: Utc::now(),
        };
        state.assets.insert(
            entry.url.clone(),
            StoredAsset {
                entry: entry.clone(),
                file_name,
            },
        );
        Ok(entry)
    }

    async fn delete_asset(&self, url: &str) -> Result<()> {
        self.calls.delete_asset.fetch_add(1, Ordering::SeqCst);
        self.before_mutation("delete")?;
        self.state().assets.remove(url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> FolderPath {
        FolderPath::normalize(raw).unwrap()
    }

    #[tokio::test]
    async fn test_create_list_and_duplicate() {
        let store = MemoryMediaStore::new(Source::Cloud);
        store.create_folder(&FolderPath::root(), "b").await.unwrap();
        store.create_folder(&FolderPath::root(), "a").await.unwrap();
        store.create_folder(&p("a"), "inner").await.unwrap();

        let names: Vec<_> = store
            .list_folders(&FolderPath::root())
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        assert!(matches!(
            store.create_folder(&FolderPath::root(), "a").await,
            Err(StoreError::DuplicateFolder { .. })
        ));
        assert!(matches!(
            store.create_folder(&p("missing"), "x").await,
            Err(StoreError::FolderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_and_delete_asset() {
        let store = MemoryMediaStore::new(Source::Local);
        store.seed_folder(&p("products"));

        let asset = store
            .store_asset(&p("products"), Bytes::from_static(b"abc"), "image/png", 3)
            .await
            .unwrap();
        assert_eq!(asset.url, "memory://local/products/asset-1.png");
        assert!(store.owns_url(&asset.url));
        assert_eq!(store.list_assets(&p("products")).await.unwrap(), vec![asset.clone()]);

        store.delete_asset(&asset.url).await.unwrap();
        store.delete_asset(&asset.url).await.unwrap();
        assert_eq!(store.asset_count(), 0);
        assert_eq!(store.delete_asset_calls(), 2);
    }

    #[tokio::test]
    async fn test_recursive_delete() {
        let store = MemoryMediaStore::new(Source::Local);
        store.seed_folder(&p("a/b/c"));
        store.seed_folder(&p("keep"));
        store
            .store_asset(&p("a/b"), Bytes::from_static(b"x"), "image/gif", 1)
            .await
            .unwrap();

        store.delete_folder_recursive(&p("a")).await.unwrap();
        assert_eq!(store.folder_count(), 1);
        assert_eq!(store.asset_count(), 0);
    }

    #[tokio::test]
    async fn test_protected_subtree_survives_delete() {
        let store = MemoryMediaStore::new(Source::Local);
        store.seed_folder(&p("a/locked"));
        store.seed_folder(&p("a/free"));
        store
            .store_asset(&p("a/locked"), Bytes::from_static(b"x"), "image/gif", 1)
            .await
            .unwrap();
        store.protect_from_delete(&p("a/locked"));

        match store.delete_folder_recursive(&p("a")).await {
            Err(StoreError::PartialDelete { survivors, .. }) => {
                assert!(survivors.contains(&"a".to_string()));
                assert!(survivors.contains(&"a/locked".to_string()));
                assert!(survivors.contains(&"a/locked/asset-1.gif".to_string()));
                assert!(!survivors.contains(&"a/free".to_string()));
            }
            other => panic!("expected partial delete, got {:?}", other),
        }
        assert!(!store.folder_exists(&p("a/free")).await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryMediaStore::new(Source::Cloud);
        store.set_fail_listing(true);
        assert!(matches!(
            store.list_folders(&FolderPath::root()).await,
            Err(StoreError::BackendUnavailable { backend: Source::Cloud, .. })
        ));

        store.set_fail_mutations(true);
        assert!(
            store
                .create_folder(&FolderPath::root(), "x")
                .await
                .unwrap_err()
                .is_retryable()
        );
        assert_eq!(store.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_store_validates_before_counting_as_written() {
        let store = MemoryMediaStore::new(Source::Local);
        let result = store
            .store_asset(&FolderPath::root(), Bytes::from_static(b"x"), "text/plain", 1)
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.asset_count(), 0);
    }
}
