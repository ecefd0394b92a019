//! Folder listing, creation and deletion across both stores.

use std::sync::Arc;

use crate::folder_path::{FolderPath, PathError};
use crate::folders::{FolderListing, PartialListingError};
use crate::store::{
    AssetEntry, FolderEntry, MediaStore, MediaStores, Result, Source, StoreError,
};

/// Presents the local and cloud stores as one folder tree.
///
/// Cheap to clone; clones share the same stores.
#[derive(Clone)]
pub struct FolderService {
    stores: MediaStores,
}

impl FolderService {
    pub fn new(stores: MediaStores) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &MediaStores {
        &self.stores
    }

    /// List the folders and assets directly inside `path` in both stores.
    ///
    /// Both stores are queried concurrently. If exactly one fails, the other's
    /// entries are returned with `partial` set; if both fail, the call fails.
    pub async fn list(&self, path: &FolderPath) -> Result<FolderListing> {
        let (local, cloud) = tokio::join!(
            list_store(self.stores.get(Source::Local), path),
            list_store(self.stores.get(Source::Cloud), path)
        );

        let (local, cloud, partial) = match (local, cloud) {
            (Ok(local), Ok(cloud)) => (local, cloud, None),
            (Ok(local), Err(e)) => (local, Contents::default(), Some(partial(Source::Cloud, e))),
            (Err(e), Ok(cloud)) => (Contents::default(), cloud, Some(partial(Source::Local, e))),
            (Err(local_err), Err(cloud_err)) => {
                tracing::warn!(
                    target: "media_browser::folders::list",
                    "both stores failed to list {}",
                    path
                );
                return Err(StoreError::AllBackendsUnavailable {
                    message: format!("local: {}; cloud: {}", local_err, cloud_err),
                });
            }
        };

        if let Some(ref partial) = partial {
            tracing::warn!(target: "media_browser::folders::list", "partial listing of {}: {}", path, partial);
        }

        let mut folders = local.folders;
        folders.extend(cloud.folders);
        let mut assets = local.assets;
        assets.extend(cloud.assets);

        Ok(FolderListing {
            path: path.clone(),
            folders,
            assets,
            partial,
        })
    }

    /// Create `name` under `parent`.
    ///
    /// Goes to `preferred_source` if given, otherwise to the store owning
    /// `parent`. Duplicate names are reported by the store's own create.
    pub async fn create_folder(
        &self,
        parent: &FolderPath,
        name: &str,
        preferred_source: Option<Source>,
    ) -> Result<FolderEntry> {
        // Reject bad names before any routing lookups.
        parent.join(name)?;

        let source = match preferred_source {
            Some(source) => source,
            None => self.stores.owner_of(parent).await?,
        };
        tracing::debug!(
            target: "media_browser::folders::create_folder",
            "creating {}/{} in {} storage",
            parent,
            name,
            source
        );

        let entry = self.stores.get(source).create_folder(parent, name).await?;
        tracing::info!(
            target: "media_browser::folders::create_folder",
            "created folder {} in {} storage",
            entry.path,
            entry.source
        );
        Ok(entry)
    }

    /// Recursively delete the folder at `path` from the store that owns it,
    /// returning that store.
    ///
    /// Ownership follows [`MediaStores::owner_of`], so a name held by both
    /// stores resolves to the default root source. Use
    /// [`delete_folder_in`](Self::delete_folder_in) to pick the other one.
    pub async fn delete_folder(&self, path: &FolderPath) -> Result<Source> {
        if path.is_root() {
            return Err(PathError::InvalidPath {
                path: path.to_string(),
                message: "the root folder cannot be deleted".to_string(),
            }
            .into());
        }
        let source = self.stores.owner_of(path).await?;
        self.delete_folder_in(path, source).await?;
        Ok(source)
    }

    /// Recursively delete the folder at `path` from the given store.
    pub async fn delete_folder_in(&self, path: &FolderPath, source: Source) -> Result<()> {
        self.stores.get(source).delete_folder_recursive(path).await?;
        tracing::info!(
            target: "media_browser::folders::delete_folder",
            "deleted folder {} from {} storage",
            path,
            source
        );
        Ok(())
    }

    /// Delete a listed folder from the store recorded on the entry.
    pub async fn delete_folder_entry(&self, entry: &FolderEntry) -> Result<()> {
        self.delete_folder_in(&entry.path, entry.source).await
    }

    /// The store that owns the folder at `path`.
    pub async fn owner_of(&self, path: &FolderPath) -> Result<Source> {
        self.stores.owner_of(path).await
    }
}

#[derive(Default)]
struct Contents {
    folders: Vec<FolderEntry>,
    assets: Vec<AssetEntry>,
}

async fn list_store(store: &Arc<dyn MediaStore>, path: &FolderPath) -> Result<Contents> {
    let (folders, assets) = tokio::try_join!(store.list_folders(path), store.list_assets(path))?;
    Ok(Contents { folders, assets })
}

fn partial(backend: Source, err: StoreError) -> PartialListingError {
    PartialListingError {
        backend,
        message: err.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
