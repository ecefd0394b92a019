//! The per-session navigation state machine.

use std::future::Future;

use bytes::Bytes;

use crate::assets::AssetService;
use crate::folder_path::FolderPath;
use crate::folders::{FolderListing, FolderService, PartialListingError};
use crate::navigation::{Breadcrumb, ListRequest, NavigationState, Result, TaggedListing};
use crate::store::{AssetEntry, FolderEntry, Source};

/// What [`NavigationController::apply`] did with a listing.
///
/// A partial listing's error is carried on both variants so that it is
/// reported even when the data itself is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The listing belongs to the current epoch and is now shown.
    Shown { partial: Option<PartialListingError> },
    /// The listing was superseded and has been dropped.
    Discarded { partial: Option<PartialListingError> },
}

impl ApplyOutcome {
    pub fn is_shown(&self) -> bool {
        matches!(self, ApplyOutcome::Shown { .. })
    }

    pub fn partial(&self) -> Option<&PartialListingError> {
        match self {
            ApplyOutcome::Shown { partial } | ApplyOutcome::Discarded { partial } => {
                partial.as_ref()
            }
        }
    }
}

/// Drives one browsing session.
///
/// Owns its [`NavigationState`]; only `&mut self` methods change it. Listings
/// are produced by [`fetch`](Self::fetch) futures that hold no borrow of the
/// controller, so several can be in flight at once and complete in any order.
pub struct NavigationController {
    folders: FolderService,
    assets: AssetService,
    state: NavigationState,
    shown: Option<FolderListing>,
}

impl NavigationController {
    /// A controller at root, with nothing shown yet.
    pub fn new(folders: FolderService, assets: AssetService) -> Self {
        Self {
            folders,
            assets,
            state: NavigationState::new(),
            shown: None,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn current_path(&self) -> &FolderPath {
        self.state.current_path()
    }

    pub fn epoch(&self) -> u64 {
        self.state.epoch()
    }

    /// The listing of the current path, once one has been applied.
    ///
    /// `None` from a transition until its listing is applied.
    pub fn listing(&self) -> Option<&FolderListing> {
        self.shown
            .as_ref()
            .filter(|listing| &listing.path == self.current_path())
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.state.breadcrumbs()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Enter the child folder `name` of the current folder.
    pub fn navigate_into(&mut self, name: &str) -> Result<ListRequest> {
        let path = self.current_path().join(name)?;
        let epoch = self.state.push(path.clone());
        self.shown = None;
        Ok(ListRequest { epoch, path })
    }

    /// Return to the previous history entry. `None` at the first entry.
    pub fn navigate_back(&mut self) -> Option<ListRequest> {
        let epoch = self.state.pop()?;
        self.shown = None;
        Some(ListRequest {
            epoch,
            path: self.current_path().clone(),
        })
    }

    /// Jump to history entry `index`, dropping every later entry.
    pub fn navigate_to_history_index(&mut self, index: usize) -> Result<ListRequest> {
        let epoch = self.state.truncate_to(index)?;
        self.shown = None;
        Ok(ListRequest {
            epoch,
            path: self.current_path().clone(),
        })
    }

    /// Re-list the current folder without advancing the epoch.
    pub fn refresh(&self) -> ListRequest {
        ListRequest {
            epoch: self.epoch(),
            path: self.current_path().clone(),
        }
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Fetch the listing for `request`.
    ///
    /// The returned future owns everything it needs.
    pub fn fetch(
        &self,
        request: ListRequest,
    ) -> impl Future<Output = TaggedListing> + Send + 'static {
        let folders = self.folders.clone();
        async move {
            let outcome = folders.list(&request.path).await;
            TaggedListing {
                epoch: request.epoch,
                path: request.path,
                outcome,
            }
        }
    }

    /// Show `listing` if it belongs to the current epoch; drop it otherwise.
    ///
    /// Failures are returned whatever their epoch.
    pub fn apply(&mut self, listing: TaggedListing) -> Result<ApplyOutcome> {
        let TaggedListing {
            epoch,
            path,
            outcome,
        } = listing;
        let listing = outcome?;
        let partial = listing.partial.clone();

        if epoch != self.epoch() || &path != self.current_path() {
            tracing::debug!(
                target: "media_browser::navigation::apply",
                "discarding listing of {} from epoch {} (current epoch {})",
                path,
                epoch,
                self.epoch()
            );
            return Ok(ApplyOutcome::Discarded { partial });
        }

        let selection_gone = self
            .state
            .selected_asset_url()
            .is_some_and(|url| !listing.contains_asset(url));
        if selection_gone {
            self.state.select(None);
        }
        self.shown = Some(listing);
        Ok(ApplyOutcome::Shown { partial })
    }

    /// Fetch and immediately apply `request`.
    pub async fn load(&mut self, request: ListRequest) -> Result<ApplyOutcome> {
        let listing = self.fetch(request).await;
        self.apply(listing)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn select_asset(&mut self, url: impl Into<String>) {
        self.state.select(Some(url.into()));
    }

    pub fn clear_selection(&mut self) {
        self.state.select(None);
    }

    pub fn selected_asset_url(&self) -> Option<&str> {
        self.state.selected_asset_url()
    }

    // =========================================================================
    // Mutations in the current folder
    // =========================================================================
    //
    // None of these touch the epoch. Callers refresh afterwards.

    /// Create `name` in the current folder.
    pub async fn create_folder(
        &self,
        name: &str,
        preferred_source: Option<Source>,
    ) -> Result<FolderEntry> {
        Ok(self
            .folders
            .create_folder(self.current_path(), name, preferred_source)
            .await?)
    }

    /// Recursively delete the child folder `name`.
    ///
    /// With no `source`, the store owning the folder is looked up; naming one
    /// picks between same-named folders in both stores.
    pub async fn delete_folder(&self, name: &str, source: Option<Source>) -> Result<()> {
        let path = self.current_path().join(name)?;
        match source {
            Some(source) => self.folders.delete_folder_in(&path, source).await?,
            None => {
                self.folders.delete_folder(&path).await?;
            }
        }
        Ok(())
    }

    /// Upload an image into the current folder.
    pub async fn upload(&self, blob: Bytes, mime_type: &str, size_bytes: u64) -> Result<AssetEntry> {
        Ok(self
            .assets
            .upload(self.current_path(), blob, mime_type, size_bytes)
            .await?)
    }

    /// Delete an asset, clearing the selection if it pointed at it.
    pub async fn delete_asset(&mut self, url: &str) -> Result<()> {
        self.assets.delete(url).await?;
        if self.selected_asset_url() == Some(url) {
            self.clear_selection();
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
