//! Media store traits and types.
//!
//! A [`MediaStore`] is one physical backend (local filesystem, S3 bucket, or an
//! in-memory stand-in) exposing the same folder and asset capability set. The
//! services in [`crate::folders`] and [`crate::assets`] only ever see
//! `Arc<dyn MediaStore>`.

mod asset_policy;
mod asset_url;
mod create_media_store;
mod fs_media_store;
mod media_stores;
mod memory_media_store;
mod s3_media_store;

pub use asset_policy::{
    AssetPolicy, DEFAULT_ALLOWED_MIME_PREFIX, DEFAULT_MAX_ASSET_SIZE_BYTES, ValidationError,
    extension_for_mime, mime_for_file_name,
};
pub use asset_url::AssetUrls;
pub use create_media_store::{
    CreateMediaStoreContext, CreateMediaStoreError, DEFAULT_LOCAL_URL_BASE, MediaStoreType,
    ParsedMediaStoreSpec, create_media_store,
};
pub use fs_media_store::FsMediaStore;
pub use media_stores::MediaStores;
pub use memory_media_store::MemoryMediaStore;
pub use s3_media_store::{S3MediaStore, S3MediaStoreConfig};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::folder_path::{FolderPath, PathError};

// =============================================================================
// Source
// =============================================================================

/// Which physical backend a folder or asset lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Local,
    Cloud,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Local => "local",
            Source::Cloud => "cloud",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Source::Local),
            "cloud" => Ok(Source::Cloud),
            other => Err(format!(
                "unknown storage source '{}': expected 'local' or 'cloud'",
                other
            )),
        }
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur in media store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("asset rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("folder '{name}' already exists under {parent} in {backend} storage")]
    DuplicateFolder {
        parent: FolderPath,
        name: String,
        backend: Source,
    },

    #[error("folder {path} not found in {backend} storage")]
    FolderNotFound { path: FolderPath, backend: Source },

    #[error(
        "deleting {path} from {backend} storage left {} entries behind: {}",
        .survivors.len(),
        .survivors.join(", ")
    )]
    PartialDelete {
        path: FolderPath,
        backend: Source,
        /// Store-relative paths of the entries that could not be removed.
        survivors: Vec<String>,
    },

    #[error("{backend} storage unavailable: {message}")]
    BackendUnavailable { backend: Source, message: String },

    /// Every store failed the same call.
    #[error("all storage unavailable: {message}")]
    AllBackendsUnavailable { message: String },
}

impl StoreError {
    /// Build a `BackendUnavailable` error from anything displayable.
    pub fn unavailable(backend: Source, err: impl fmt::Display) -> Self {
        StoreError::BackendUnavailable {
            backend,
            message: err.to_string(),
        }
    }

    /// Whether retrying the same call later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::BackendUnavailable { .. } | StoreError::AllBackendsUnavailable { .. }
        )
    }
}

/// Result type for media store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// =============================================================================
// Entry Types
// =============================================================================

/// One folder node as observed by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Display label; the last path segment.
    pub name: String,
    pub path: FolderPath,
    pub parent_path: FolderPath,
    pub source: Source,
    pub created_at: DateTime<Utc>,
    /// True iff the parent is not root.
    pub is_nested: bool,
}

impl FolderEntry {
    /// Describe the folder at `path`.
    ///
    /// `path` is never root for a real folder; root yields an empty name.
    pub fn new(path: FolderPath, source: Source, created_at: DateTime<Utc>) -> Self {
        Self {
            name: path.name().unwrap_or_default().to_string(),
            parent_path: path.parent().unwrap_or_default(),
            is_nested: path.is_nested(),
            path,
            source,
            created_at,
        }
    }
}

/// One stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Caller-dereferenceable locator, unique per stored asset.
    pub url: String,
    pub folder_path: FolderPath,
    pub size_bytes: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// MediaStore Trait
// =============================================================================

/// A backend holding folders and image assets.
///
/// Paths passed in are already normalized. Listings are non-recursive and
/// return empty vectors for folders that do not exist.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// The source tag this store reports on its entries.
    fn source(&self) -> Source;

    /// Whether `url` carries this store's locator prefix.
    fn owns_url(&self, url: &str) -> bool;

    /// Whether a folder exists at `path`. Root always exists.
    async fn folder_exists(&self, path: &FolderPath) -> Result<bool>;

    /// Immediate child folders of `path`.
    async fn list_folders(&self, path: &FolderPath) -> Result<Vec<FolderEntry>>;

    /// Assets stored directly in `path`.
    async fn list_assets(&self, path: &FolderPath) -> Result<Vec<AssetEntry>>;

    /// Create `name` under `parent`.
    ///
    /// Returns `DuplicateFolder` if a sibling of that name already exists. The
    /// check is made by the create itself, not by a prior lookup.
    async fn create_folder(&self, parent: &FolderPath, name: &str) -> Result<FolderEntry>;

    /// Delete a folder with every descendant folder and asset.
    ///
    /// If some entries cannot be removed, returns `PartialDelete` naming them.
    async fn delete_folder_recursive(&self, path: &FolderPath) -> Result<()>;

    /// Store an image in `path`.
    ///
    /// Policy violations are reported before any I/O happens. A failed store
    /// leaves no partial artifact behind.
    async fn store_asset(
        &self,
        path: &FolderPath,
        blob: Bytes,
        mime_type: &str,
        size_bytes: u64,
    ) -> Result<AssetEntry>;

    /// Delete an asset by url. Deleting an absent asset succeeds.
    async fn delete_asset(&self, url: &str) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================
