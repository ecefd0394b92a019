//! Validates uploads and routes asset operations to the right store.

use bytes::Bytes;

use crate::folder_path::FolderPath;
use crate::store::{AssetEntry, AssetPolicy, MediaStores, Result, Source};

/// Stores and deletes image assets across both stores.
#[derive(Clone)]
pub struct AssetService {
    stores: MediaStores,
    policy: AssetPolicy,
}

impl AssetService {
    pub fn new(stores: MediaStores, policy: AssetPolicy) -> Self {
        Self { stores, policy }
    }

    pub fn policy(&self) -> &AssetPolicy {
        &self.policy
    }

    /// Upload an image into the folder at `path`, in whichever store owns it.
    ///
    /// The policy is checked first; a rejected upload makes no store calls.
    pub async fn upload(
        &self,
        path: &FolderPath,
        blob: Bytes,
        mime_type: &str,
        size_bytes: u64,
    ) -> Result<AssetEntry> {
        self.policy.validate_blob(mime_type, size_bytes, blob.len())?;
        let source = self.stores.owner_of(path).await?;
        self.store(source, path, blob, mime_type, size_bytes).await
    }

    /// Upload an image into the folder at `path` in the given store.
    pub async fn upload_to(
        &self,
        source: Source,
        path: &FolderPath,
        blob: Bytes,
        mime_type: &str,
        size_bytes: u64,
    ) -> Result<AssetEntry> {
        self.policy.validate_blob(mime_type, size_bytes, blob.len())?;
        self.store(source, path, blob, mime_type, size_bytes).await
    }

    async fn store(
        &self,
        source: Source,
        path: &FolderPath,
        blob: Bytes,
        mime_type: &str,
        size_bytes: u64,
    ) -> Result<AssetEntry> {
        let asset = self
            .stores
            .get(source)
            .store_asset(path, blob, mime_type, size_bytes)
            .await?;
        tracing::info!(
            target: "media_browser::assets::upload",
            "stored {} ({} bytes) in {} storage",
            asset.url,
            asset.size_bytes,
            source
        );
        Ok(asset)
    }

    /// Delete the asset at `url`.
    ///
    /// Urls no store recognizes, and assets that are already gone, succeed
    /// without doing anything.
    pub async fn delete(&self, url: &str) -> Result<()> {
        let Some(store) = self.stores.store_for_url(url) else {
            tracing::debug!(
                target: "media_browser::assets::delete",
                "no store recognizes {}, nothing to delete",
                url
            );
            return Ok(());
        };
        store.delete_asset(url).await?;
        tracing::info!(
            target: "media_browser::assets::delete",
            "deleted {} from {} storage",
            url,
            store.source()
        );
        Ok(())
    }
}
