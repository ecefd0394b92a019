//! media-browser - one folder tree over local and cloud media storage.

pub mod app;
pub mod assets;
pub mod cli;
pub mod config;
pub mod folder_path;
pub mod folders;
pub mod logging;
pub mod navigation;
pub mod store;

pub use assets::AssetService;
pub use folder_path::{FolderPath, PathError};
pub use folders::{FolderListing, FolderService, PartialListingError};
pub use navigation::{ApplyOutcome, ListRequest, NavigationController, NavigationError};
pub use store::{AssetEntry, FolderEntry, MediaStore, MediaStores, Source, StoreError};
