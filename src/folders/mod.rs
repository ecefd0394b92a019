//! The unified folder namespace over the local and cloud stores.

mod folder_service;

pub use folder_service::FolderService;

use serde::Serialize;
use thiserror::Error;

use crate::folder_path::FolderPath;
use crate::store::{AssetEntry, FolderEntry, Source};

/// One store failed while the other answered a listing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{backend} storage could not be listed: {message}")]
pub struct PartialListingError {
    pub backend: Source,
    pub message: String,
}

/// The merged contents of one folder.
///
/// Local entries come first, then cloud entries. Same-named folders from the
/// two stores are kept as separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderListing {
    pub path: FolderPath,
    pub folders: Vec<FolderEntry>,
    pub assets: Vec<AssetEntry>,
    /// Set when only one store could be listed.
    pub partial: Option<PartialListingError>,
}

impl FolderListing {
    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    pub fn contains_asset(&self, url: &str) -> bool {
        self.assets.iter().any(|a| a.url == url)
    }

    /// Folders in this listing with the given name, one per store holding it.
    pub fn folders_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FolderEntry> {
        self.folders.iter().filter(move |f| f.name == name)
    }
}
