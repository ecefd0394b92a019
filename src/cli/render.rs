//! Plain-text rendering of listings and entries.

use crate::folders::FolderListing;
use crate::navigation::Breadcrumb;
use crate::store::{AssetEntry, FolderEntry};

pub fn format_folder(entry: &FolderEntry) -> String {
    format!(
        "{:<5}  {}/  (created {})",
        entry.source,
        entry.name,
        entry.created_at.format("%Y-%m-%d %H:%M")
    )
}

pub fn format_asset(entry: &AssetEntry) -> String {
    format!(
        "{:<5}  {}  {}  {} bytes",
        "",
        entry.url,
        entry.mime_type,
        entry.size_bytes
    )
}

/// One line per entry, folders first, under a header naming the folder.
pub fn format_listing(listing: &FolderListing) -> String {
    let mut lines = vec![format!("{}:", listing.path)];
    if let Some(partial) = &listing.partial {
        lines.push(format!("warning: {}", partial));
    }
    if listing.folders.is_empty() && listing.assets.is_empty() {
        lines.push("  (empty)".to_string());
    }
    for folder in &listing.folders {
        lines.push(format!("  {}", format_folder(folder)));
    }
    for asset in &listing.assets {
        lines.push(format!("  {}", format_asset(asset)));
    }
    lines.join("\n")
}

/// `[0] root > [1] products > [2] summer`
pub fn format_breadcrumbs(breadcrumbs: &[Breadcrumb]) -> String {
    breadcrumbs
        .iter()
        .map(|crumb| format!("[{}] {}", crumb.index, crumb.name))
        .collect::<Vec<_>>()
        .join(" > ")
}
