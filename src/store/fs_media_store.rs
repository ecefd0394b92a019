//! Filesystem-based MediaStore implementation.
//!
//! Folders are directories under a root directory and assets are the files
//! directly inside them. Dot-prefixed entries are never listed; the root's
//! `.tmp` directory stages uploads so a failed write leaves nothing behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

use crate::folder_path::{FolderPath, PathError};
use crate::store::{
    AssetEntry, AssetPolicy, AssetUrls, FolderEntry, MediaStore, Result, Source, StoreError,
    extension_for_mime, mime_for_file_name,
};

/// Name of the staging directory under the store root.
const STAGING_DIR: &str = ".tmp";

/// Counter for generating unique temp file names.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A MediaStore backed by the local filesystem.
pub struct FsMediaStore {
    /// Root directory on the filesystem.
    root: PathBuf,
    source: Source,
    urls: AssetUrls,
    policy: AssetPolicy,
}

impl FsMediaStore {
    /// Create a store rooted at `root` whose assets are served under `url_base`.
    pub fn new(
        root: impl AsRef<Path>,
        source: Source,
        url_base: impl Into<String>,
        policy: AssetPolicy,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            source,
            urls: AssetUrls::new(url_base),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a folder path to an absolute filesystem path.
    fn to_absolute(&self, path: &FolderPath) -> PathBuf {
        let mut absolute = self.root.clone();
        absolute.extend(path.segments());
        absolute
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Generate a unique temp file path.
    fn temp_file_path(&self) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        self.staging_dir().join(format!("upload.{}.{}", pid, counter))
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> StoreError {
        StoreError::unavailable(self.source, err)
    }

    fn not_found(&self, path: &FolderPath) -> StoreError {
        StoreError::FolderNotFound {
            path: path.clone(),
            backend: self.source,
        }
    }

    /// Best available creation time from metadata.
    fn created_at(metadata: &std::fs::Metadata) -> DateTime<Utc> {
        metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH))
    }

    /// Whether `path` exists as a directory.
    async fn is_dir(&self, path: &FolderPath) -> Result<bool> {
        match fs::metadata(self.to_absolute(path)).await {
            Ok(m) => Ok(m.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    /// Read the visible entries of a directory, sorted by name.
    ///
    /// Returns an empty list if the directory does not exist.
    async fn read_visible(&self, path: &FolderPath) -> Result<Vec<(String, std::fs::Metadata)>> {
        let mut entries = match fs::read_dir(self.to_absolute(path)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(e)),
        };

        let mut visible = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.unavailable(e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await.map_err(|e| self.unavailable(e))?;
            visible.push((name, metadata));
        }
        visible.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(visible)
    }

    /// Write `blob` to a staged temp file, then move it to `target`.
    async fn write_atomically(&self, target: &Path, blob: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(self.staging_dir()).await?;
        let temp_path = self.temp_file_path();
        let result = async {
            fs::write(&temp_path, blob).await?;
            fs::rename(&temp_path, target).await
        }
        .await;
        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    fn source(&self) -> Source {
        self.source
    }

    fn owns_url(&self, url: &str) -> bool {
        self.urls.owns(url)
    }

    async fn folder_exists(&self, path: &FolderPath) -> Result<bool> {
        if path.is_root() {
            return Ok(true);
        }
        self.is_dir(path).await
    }

    async fn list_folders(&self, path: &FolderPath) -> Result<Vec<FolderEntry>> {
        let mut folders = Vec::new();
        for (name, metadata) in self.read_visible(path).await? {
            if !metadata.is_dir() {
                continue;
            }
            match path.join(&name) {
                Ok(child) => folders.push(FolderEntry::new(
                    child,
                    self.source,
                    Self::created_at(&metadata),
                )),
                Err(e) => debug!("skipping unrepresentable directory {:?}: {}", name, e),
            }
        }
        Ok(folders)
    }

    async fn list_assets(&self, path: &FolderPath) -> Result<Vec<AssetEntry>> {
        let mut assets = Vec::new();
        for (name, metadata) in self.read_visible(path).await? {
            if !metadata.is_file() {
                continue;
            }
            assets.push(AssetEntry {
                url: self.urls.url_for(path, &name),
                folder_path: path.clone(),
                size_bytes: metadata.len(),
                mime_type: mime_for_file_name(&name),
                created_at: Self::created_at(&metadata),
            });
        }
        Ok(assets)
    }

    async fn create_folder(&self, parent: &FolderPath, name: &str) -> Result<FolderEntry> {
        let path = parent.join(name)?;

        if parent.is_root() {
            fs::create_dir_all(&self.root)
                .await
                .map_err(|e| self.unavailable(e))?;
        }

        // create_dir fails atomically if the name is taken.
        match fs::create_dir(self.to_absolute(&path)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::DuplicateFolder {
                    parent: parent.clone(),
                    name: name.to_string(),
                    backend: self.source,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(self.not_found(parent));
            }
            Err(e) => return Err(self.unavailable(e)),
        }

        let created_at = match fs::metadata(self.to_absolute(&path)).await {
            Ok(metadata) => Self::created_at(&metadata),
            Err(_) => Utc::now(),
        };
        Ok(FolderEntry::new(path, self.source, created_at))
    }

    async fn delete_folder_recursive(&self, path: &FolderPath) -> Result<()> {
        if path.is_root() {
            return Err(PathError::InvalidPath {
                path: path.to_string(),
                message: "the root folder cannot be deleted".to_string(),
            }
            .into());
        }
        if !self.is_dir(path).await? {
            return Err(self.not_found(path));
        }

        let mut survivors = Vec::new();
        remove_tree(&self.to_absolute(path), &path.to_relative(), &mut survivors).await;

        if survivors.is_empty() {
            Ok(())
        } else {
            warn!(
                "partial delete of {} in {} storage: {} entries survived",
                path,
                self.source,
                survivors.len()
            );
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
        self.policy.validate_blob(mime_type, size_bytes, blob.len())?;

        if path.is_root() {
            fs::create_dir_all(&self.root)
                .await
                .map_err(|e| self.unavailable(e))?;
        } else if !self.is_dir(path).await? {
            return Err(self.not_found(path));
        }

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), extension_for_mime(mime_type));
        let target = self.to_absolute(path).join(&file_name);
        self.write_atomically(&target, &blob)
            .await
            .map_err(|e| self.unavailable(e))?;

        Ok(AssetEntry {
            url: self.urls.url_for(path, &file_name),
            folder_path: path.clone(),
            size_bytes,
            mime_type: mime_type.to_string(),
            created_at: Utc::now(),
        })
    }

    async fn delete_asset(&self, url: &str) -> Result<()> {
        let Some((folder, file_name)) = self.urls.parse(url) else {
            debug!("{} storage does not recognize {}, nothing to delete", self.source, url);
            return Ok(());
        };
        let target = self.to_absolute(&folder).join(file_name);
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.unavailable(e)),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Remove a directory tree depth-first, continuing past failures.
///
/// Every entry that could not be removed is recorded in `survivors` by its
/// store-relative path.
async fn remove_tree(dir: &Path, relative: &str, survivors: &mut Vec<String>) {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(_) => {
            survivors.push(relative.to_string());
            return;
        }
    };

    let mut children = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => children.push(entry),
            Ok(None) => break,
            Err(_) => {
                survivors.push(relative.to_string());
                return;
            }
        }
    }

    for entry in children {
        let name = entry.file_name().to_string_lossy().into_owned();
        let child_relative = format!("{}/{}", relative, name);
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            Box::pin(remove_tree(&entry.path(), &child_relative, survivors)).await;
        } else if let Err(e) = fs::remove_file(entry.path()).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            survivors.push(child_relative);
        }
    }

    if let Err(e) = fs::remove_dir(dir).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        survivors.push(relative.to_string());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store(temp: &TempDir) -> FsMediaStore {
        FsMediaStore::new(temp.path(), Source::Local, "/media", AssetPolicy::default())
    }

    fn p(raw: &str) -> FolderPath {
        FolderPath::normalize(raw).unwrap()
    }

    #[tokio::test]
    async fn test_list_empty_and_missing() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        assert!(store.list_folders(&FolderPath::root()).await.unwrap().is_empty());
        assert!(store.list_assets(&p("missing")).await.unwrap().is_empty());
        assert!(store.list_folders(&p("missing/deeper")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_and_list_folders() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        let products = store
            .create_folder(&FolderPath::root(), "products")
            .await
            .unwrap();
        assert_eq!(products.path, p("products"));
        assert_eq!(products.source, Source::Local);
        assert!(!products.is_nested);

        let shoes = store.create_folder(&products.path, "shoes").await.unwrap();
        assert!(shoes.is_nested);
        assert_eq!(shoes.parent_path, p("products"));

        let top: Vec<_> = store
            .list_folders(&FolderPath::root())
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(top, vec!["products"]);

        let nested = store.list_folders(&p("products")).await.unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].path, p("products/shoes"));
    }

    #[tokio::test]
    async fn test_create_duplicate_folder() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        store.create_folder(&FolderPath::root(), "x").await.unwrap();
        let result = store.create_folder(&FolderPath::root(), "x").await;
        assert!(matches!(result, Err(StoreError::DuplicateFolder { .. })));
    }

    #[tokio::test]
    async fn test_create_under_missing_parent() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        let result = store.create_folder(&p("nope"), "x").await;
        assert!(matches!(result, Err(StoreError::FolderNotFound { .. })));
    }

    #[tokio::test]
    async fn test_store_and_list_asset() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);
        store.create_folder(&FolderPath::root(), "products").await.unwrap();

        let blob = Bytes::from(vec![7u8; 2048]);
        let asset = store
            .store_asset(&p("products"), blob, "image/jpeg", 2048)
            .await
            .unwrap();
        assert!(asset.url.starts_with("/media/products/"));
        assert!(asset.url.ends_with(".jpg"));
        assert_eq!(asset.folder_path, p("products"));

        let listed = store.list_assets(&p("products")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].url, asset.url);
        assert_eq!(listed[0].size_bytes, 2048);
        assert_eq!(listed[0].mime_type, "image/jpeg");

        // The staging directory stays hidden and empty.
        assert!(store.list_folders(&FolderPath::root()).await.unwrap().len() == 1);
        let staged: Vec<_> = std::fs::read_dir(temp.path().join(STAGING_DIR))
            .unwrap()
            .collect();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn test_store_asset_validates_before_io() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        let result = store
            .store_asset(&p("does-not-exist"), Bytes::from_static(b"hi"), "text/plain", 2)
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(!temp.path().join(STAGING_DIR).exists());
    }

    #[tokio::test]
    async fn test_store_asset_into_missing_folder() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        let result = store
            .store_asset(&p("ghost"), Bytes::from_static(b"png"), "image/png", 3)
            .await;
        assert!(matches!(result, Err(StoreError::FolderNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_asset_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        let asset = store
            .store_asset(&FolderPath::root(), Bytes::from_static(b"gif"), "image/gif", 3)
            .await
            .unwrap();
        store.delete_asset(&asset.url).await.unwrap();
        assert!(store.list_assets(&FolderPath::root()).await.unwrap().is_empty());
        store.delete_asset(&asset.url).await.unwrap();

        // Foreign and malformed urls are no-ops.
        store.delete_asset("https://elsewhere/x.png").await.unwrap();
        store.delete_asset("/media/../outside.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_folder_recursive() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);
        let products = store
            .create_folder(&FolderPath::root(), "products")
            .await
            .unwrap();
        store.create_folder(&products.path, "shoes").await.unwrap();
        store
            .store_asset(&p("products/shoes"), Bytes::from_static(b"a"), "image/png", 1)
            .await
            .unwrap();

        store.delete_folder_recursive(&p("products")).await.unwrap();

        assert!(store.list_folders(&FolderPath::root()).await.unwrap().is_empty());
        assert!(store.list_folders(&p("products")).await.unwrap().is_empty());
        assert!(store.list_assets(&p("products/shoes")).await.unwrap().is_empty());
        assert!(!store.folder_exists(&p("products")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_root_and_missing() {
        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);

        assert!(matches!(
            store.delete_folder_recursive(&FolderPath::root()).await,
            Err(StoreError::Path(PathError::InvalidPath { .. }))
        ));
        assert!(matches!(
            store.delete_folder_recursive(&p("missing")).await,
            Err(StoreError::FolderNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_folder_reports_survivors() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = create_store(&temp);
        store.create_folder(&FolderPath::root(), "a").await.unwrap();
        store.create_folder(&p("a"), "locked").await.unwrap();
        std::fs::write(temp.path().join("a/locked/pic.png"), b"x").unwrap();

        // A read-only directory keeps its children.
        let locked = temp.path().join("a/locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        let result = store.delete_folder_recursive(&p("a")).await;

        let _ = std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755));

        // Privileged users can delete regardless of permissions.
        if locked.exists() {
            match result {
                Err(StoreError::PartialDelete { survivors, .. }) => {
                    assert!(survivors.contains(&"a/locked/pic.png".to_string()));
                    assert!(survivors.contains(&"a".to_string()));
                }
                other => panic!("expected partial delete, got {:?}", other),
            }
        } else {
            assert!(result.is_ok());
        }
    }
}
