//! Per-session navigation over the unified folder tree.
//!
//! Every transition bumps a request epoch and hands back a [`ListRequest`].
//! Listings are fetched outside the controller and handed back to
//! [`NavigationController::apply`], which only shows a listing if it still
//! belongs to the current epoch.

mod navigation_controller;
mod navigation_state;

pub use navigation_controller::{ApplyOutcome, NavigationController};
pub use navigation_state::{Breadcrumb, NavigationState};

use thiserror::Error;

use crate::folder_path::{FolderPath, PathError};
use crate::folders::FolderListing;
use crate::store::StoreError;

/// Errors that can occur during navigation.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("history index {index} is out of range (history has {len} entries)")]
    HistoryIndexOutOfRange { index: usize, len: usize },
}

/// Result type for navigation operations.
pub type Result<T> = std::result::Result<T, NavigationError>;

/// A listing to fetch on behalf of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub epoch: u64,
    pub path: FolderPath,
}

/// The result of fetching a [`ListRequest`], still tagged with its epoch.
#[derive(Debug)]
pub struct TaggedListing {
    pub epoch: u64,
    pub path: FolderPath,
    pub outcome: std::result::Result<FolderListing, StoreError>,
}
