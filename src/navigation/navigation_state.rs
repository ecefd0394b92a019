use serde::Serialize;

use crate::folder_path::{FolderPath, ROOT_SENTINEL};
use crate::navigation::{NavigationError, Result};

/// Where one session is in the folder tree.
///
/// The history is never empty and its last entry is the current path. No two
/// consecutive entries are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    path_history: Vec<FolderPath>,
    selected_asset_url: Option<String>,
    epoch: u64,
}

/// One history entry, as shown in a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub index: usize,
    pub name: String,
    pub path: FolderPath,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationState {
    /// A fresh state at root, epoch 0.
    pub fn new() -> Self {
        Self {
            path_history: vec![FolderPath::root()],
            selected_asset_url: None,
            epoch: 0,
        }
    }

    pub fn current_path(&self) -> &FolderPath {
        // The history always holds at least the root entry.
        &self.path_history[self.path_history.len() - 1]
    }

    pub fn path_history(&self) -> &[FolderPath] {
        &self.path_history
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn selected_asset_url(&self) -> Option<&str> {
        self.selected_asset_url.as_deref()
    }

    pub(crate) fn select(&mut self, url: Option<String>) {
        self.selected_asset_url = url;
    }

    /// Push `path` and advance the epoch.
    ///
    /// Pushing the current path again only advances the epoch.
    pub(crate) fn push(&mut self, path: FolderPath) -> u64 {
        if &path != self.current_path() {
            self.path_history.push(path);
        }
        self.advance()
    }

    /// Drop the current entry and advance the epoch. `None` at the first entry.
    pub(crate) fn pop(&mut self) -> Option<u64> {
        if self.path_history.len() <= 1 {
            return None;
        }
        self.path_history.pop();
        Some(self.advance())
    }

    /// Keep entries `0..=index` and advance the epoch.
    pub(crate) fn truncate_to(&mut self, index: usize) -> Result<u64> {
        if index >= self.path_history.len() {
            return Err(NavigationError::HistoryIndexOutOfRange {
                index,
                len: self.path_history.len(),
            });
        }
        self.path_history.truncate(index + 1);
        Ok(self.advance())
    }

    fn advance(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// The history as breadcrumbs, root first.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.path_history
            .iter()
            .enumerate()
            .map(|(index, path)| Breadcrumb {
                index,
                name: path.name().unwrap_or(ROOT_SENTINEL).to_string(),
                path: path.clone(),
            })
            .collect()
    }
}
