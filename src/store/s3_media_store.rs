//! S3-based MediaStore implementation.
//!
//! Object keys use "/" as the folder separator. A folder is represented by an
//! empty marker object whose key ends in "/", so empty folders survive and
//! carry a creation time. Folders that only exist implicitly (objects under a
//! prefix with no marker) are still listed.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::folder_path::{FolderPath, PathError};
use crate::store::{
    AssetEntry, AssetPolicy, AssetUrls, FolderEntry, MediaStore, Result, Source, StoreError,
    extension_for_mime, mime_for_file_name,
};

/// Maximum number of keys accepted by one DeleteObjects request.
const DELETE_BATCH_SIZE: usize = 1000;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for S3MediaStore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3MediaStoreConfig {
    /// S3 bucket name.
    pub bucket: String,
    /// Optional prefix within the bucket.
    pub prefix: Option<String>,
    /// Optional custom endpoint URL (for LocalStack, MinIO, etc.).
    pub endpoint_url: Option<String>,
    /// Optional region override.
    pub region: Option<String>,
    /// Base of the urls handed out for stored assets.
    pub public_url_base: Option<String>,
}

impl S3MediaStoreConfig {
    /// Create a new S3MediaStoreConfig with the given bucket name.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            endpoint_url: None,
            region: None,
            public_url_base: None,
        }
    }

    /// Set an optional prefix within the bucket.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        let prefix = prefix.trim_matches('/');
        self.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self
    }

    /// Set a custom endpoint URL (for LocalStack, MinIO, etc.).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Set a region override.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the base used to build asset urls.
    pub fn with_public_url_base(mut self, base: impl Into<String>) -> Self {
        self.public_url_base = Some(base.into());
        self
    }

    /// The asset url base: the configured one, or the bucket's own address.
    pub fn url_base(&self) -> String {
        let bucket_base = match (&self.public_url_base, &self.endpoint_url, &self.region) {
            (Some(base), _, _) => return base.trim_end_matches('/').to_string(),
            (None, Some(endpoint), _) => {
                format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket)
            }
            (None, None, Some(region)) => {
                format!("https://{}.s3.{}.amazonaws.com", self.bucket, region)
            }
            (None, None, None) => format!("https://{}.s3.amazonaws.com", self.bucket),
        };
        match &self.prefix {
            Some(prefix) => format!("{}/{}", bucket_base, prefix),
            None => bucket_base,
        }
    }

    /// The key prefix of everything inside `path`, ending in "/" except at an
    /// unprefixed root.
    pub fn folder_prefix(&self, path: &FolderPath) -> String {
        let relative = path.to_relative();
        match (&self.prefix, relative.is_empty()) {
            (Some(prefix), true) => format!("{}/", prefix),
            (Some(prefix), false) => format!("{}/{}/", prefix, relative),
            (None, true) => String::new(),
            (None, false) => format!("{}/", relative),
        }
    }

    /// Key of an asset file inside `path`.
    pub fn asset_key(&self, path: &FolderPath, file_name: &str) -> String {
        format!("{}{}", self.folder_prefix(path), file_name)
    }

    /// A key relative to the configured prefix, without a trailing "/".
    pub fn relative_from_key(&self, key: &str) -> String {
        let relative = match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|k| k.strip_prefix('/'))
                .unwrap_or(key),
            None => key,
        };
        relative.trim_end_matches('/').to_string()
    }
}

// =============================================================================
// S3MediaStore
// =============================================================================

/// A MediaStore backed by an S3 bucket.
pub struct S3MediaStore {
    client: Client,
    config: S3MediaStoreConfig,
    source: Source,
    urls: AssetUrls,
    policy: AssetPolicy,
}

impl S3MediaStore {
    /// Create a new S3MediaStore with the given configuration.
    pub async fn new(config: S3MediaStoreConfig, source: Source, policy: AssetPolicy) -> Self {
        let mut aws_config_loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(ref region) = config.region {
            aws_config_loader =
                aws_config_loader.region(aws_sdk_s3::config::Region::new(region.clone()));
        }

        let aws_config = aws_config_loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(ref endpoint) = config.endpoint_url {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());
        let urls = AssetUrls::new(config.url_base());

        Self {
            client,
            config,
            source,
            urls,
            policy,
        }
    }

    pub fn config(&self) -> &S3MediaStoreConfig {
        &self.config
    }

    fn map_sdk_error<E: std::error::Error + 'static>(&self, err: SdkError<E>) -> StoreError {
        StoreError::unavailable(self.source, DisplayErrorContext(&err))
    }

    /// Last-modified time of a marker object, if it exists.
    async fn marker_time(&self, marker_key: &str) -> Result<Option<DateTime<Utc>>> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(marker_key)
            .send()
            .await
        {
            Ok(head) => Ok(Some(head.last_modified().map(to_chrono).unwrap_or_default())),
            Err(err) if has_status(&err, 404) => Ok(None),
            Err(err) => Err(self.map_sdk_error(err)),
        }
    }

    /// Marker time of a listed child, or the epoch for an implicit folder.
    async fn marker_time_or_epoch(&self, child: &FolderPath) -> Result<DateTime<Utc>> {
        Ok(self
            .marker_time(&self.config.folder_prefix(child))
            .await?
            .unwrap_or_default())
    }

    /// Every key under `prefix`, across all pages.
    async fn all_keys_under(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| self.map_sdk_error(e))?;
            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Delete one batch of keys, returning the keys that could not be removed.
    async fn delete_batch(&self, batch: &[String]) -> Vec<String> {
        let mut objects = Vec::with_capacity(batch.len());
        for key in batch {
            match ObjectIdentifier::builder().key(key).build() {
                Ok(id) => objects.push(id),
                Err(_) => return batch.to_vec(),
            }
        }
        let delete = match Delete::builder().set_objects(Some(objects)).quiet(true).build() {
            Ok(delete) => delete,
            Err(_) => return batch.to_vec(),
        };

        match self
            .client
            .delete_objects()
            .bucket(&self.config.bucket)
            .delete(delete)
            .send()
            .await
        {
            Ok(response) => response
                .errors()
                .iter()
                .filter_map(|e| {
                    debug!(
                        "failed to delete {:?}: {}",
                        e.key(),
                        e.message().unwrap_or("unknown error")
                    );
                    e.key().map(str::to_string)
                })
                .collect(),
            Err(err) => {
                warn!("batch delete failed: {}", DisplayErrorContext(&err));
                batch.to_vec()
            }
        }
    }

    /// Name of a listed common prefix, relative to its parent folder.
    fn child_name(folder_prefix: &str, common_prefix: &str) -> Option<String> {
        let name = common_prefix
            .strip_prefix(folder_prefix)?
            .trim_end_matches('/');
        if name.is_empty() || name.contains('/') {
            return None;
        }
        Some(name.to_string())
    }
}

/// Whether the service responded with the given HTTP status.
fn has_status<E>(err: &SdkError<E>, status: u16) -> bool {
    matches!(err, SdkError::ServiceError(e) if e.raw().status().as_u16() == status)
}

fn to_chrono(time: &aws_sdk_s3::primitives::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos()).unwrap_or_default()
}

#[async_trait]
impl MediaStore for S3MediaStore {
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
        let prefix = self.config.folder_prefix(path);
        if self.marker_time(&prefix).await?.is_some() {
            return Ok(true);
        }

        // Implicit folder: objects under the prefix without a marker.
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| self.map_sdk_error(e))?;
        Ok(!response.contents().is_empty())
    }

    async fn list_folders(&self, path: &FolderPath) -> Result<Vec<FolderEntry>> {
        let prefix = self.config.folder_prefix(path);
        let mut children = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .delimiter("/");

            if !prefix.is_empty() {
                request = request.prefix(&prefix);
            }

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| self.map_sdk_error(e))?;

            for cp in response.common_prefixes() {
                let Some(name) = cp.prefix().and_then(|p| Self::child_name(&prefix, p)) else {
                    continue;
                };
                match path.join(&name) {
                    Ok(child) => children.push(child),
                    Err(e) => debug!("skipping unrepresentable prefix {:?}: {}", name, e),
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        children.sort();

        let times = join_all(
            children
                .iter()
                .map(|child| self.marker_time_or_epoch(child)),
        )
        .await;

        children
            .into_iter()
            .zip(times)
            .map(|(child, created_at)| Ok(FolderEntry::new(child, self.source, created_at?)))
            .collect()
    }

    async fn list_assets(&self, path: &FolderPath) -> Result<Vec<AssetEntry>> {
        let prefix = self.config.folder_prefix(path);
        let mut assets = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .delimiter("/");

            if !prefix.is_empty() {
                request = request.prefix(&prefix);
            }

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| self.map_sdk_error(e))?;

            for obj in response.contents() {
                let Some(key) = obj.key() else {
                    continue;
                };
                let Some(name) = key.strip_prefix(prefix.as_str()) else {
                    continue;
                };
                // Skip the folder marker and hidden objects.
                if name.is_empty() || name.ends_with('/') || name.starts_with('.') {
                    continue;
                }
                assets.push(AssetEntry {
                    url: self.urls.url_for(path, name),
                    folder_path: path.clone(),
                    size_bytes: obj.size().unwrap_or(0).max(0) as u64,
                    mime_type: mime_for_file_name(name),
                    created_at: obj.last_modified().map(to_chrono).unwrap_or_default(),
                });
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        assets.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(assets)
    }

    async fn create_folder(&self, parent: &FolderPath, name: &str) -> Result<FolderEntry> {
        let path = parent.join(name)?;
        if !self.folder_exists(parent).await? {
            return Err(StoreError::FolderNotFound {
                path: parent.clone(),
                backend: self.source,
            });
        }

        // The conditional put is the duplicate check.
        let result = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(self.config.folder_prefix(&path))
            .if_none_match("*")
            .body(ByteStream::from_static(b""))
            .send()
            .await;

        match result {
            Ok(_) => Ok(FolderEntry::new(path, self.source, Utc::now())),
            Err(err) if has_status(&err, 412) || has_status(&err, 409) => {
                Err(StoreError::DuplicateFolder {
                    parent: parent.clone(),
                    name: name.to_string(),
                    backend: self.source,
                })
            }
            Err(err) => Err(self.map_sdk_error(err)),
        }
    }

    async fn delete_folder_recursive(&self, path: &FolderPath) -> Result<()> {
        if path.is_root() {
            return Err(PathError::InvalidPath {
                path: path.to_string(),
                message: "the root folder cannot be deleted".to_string(),
            }
            .into());
        }

        let mut keys = self.all_keys_under(&self.config.folder_prefix(path)).await?;
        if keys.is_empty() {
            return Err(StoreError::FolderNotFound {
                path: path.clone(),
                backend: self.source,
            });
        }

        // Content first, then markers from the deepest up.
        keys.sort_by(|a, b| {
            let a_marker = a.ends_with('/');
            let b_marker = b.ends_with('/');
            a_marker
                .cmp(&b_marker)
                .then_with(|| b.len().cmp(&a.len()))
                .then_with(|| a.cmp(b))
        });

        let mut survivors = Vec::new();
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            for key in self.delete_batch(batch).await {
                survivors.push(self.config.relative_from_key(&key));
            }
        }

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

        if !self.folder_exists(path).await? {
            return Err(StoreError::FolderNotFound {
                path: path.clone(),
                backend: self.source,
            });
        }

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), extension_for_mime(mime_type));

        // A single put either lands the whole object or nothing.
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(self.config.asset_key(path, &file_name))
            .content_type(mime_type)
            .content_length(size_bytes as i64)
            .body(ByteStream::from(blob))
            .send()
            .await
            .map_err(|e| self.map_sdk_error(e))?;

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

        match self
            .client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(self.config.asset_key(&folder, &file_name))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if has_status(&err, 404) => Ok(()),
            Err(err) => Err(self.map_sdk_error(err)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> FolderPath {
        FolderPath::normalize(raw).unwrap()
    }

    #[test]
    fn test_config_builder() {
        let config = S3MediaStoreConfig::new("my-bucket")
            .with_prefix("/media/")
            .with_endpoint_url("http://localhost:4566")
            .with_region("us-west-2");

        assert_eq!(config.bucket, "my-bucket");
        assert_eq!(config.prefix, Some("media".to_string()));
        assert_eq!(config.endpoint_url, Some("http://localhost:4566".to_string()));
        assert_eq!(config.region, Some("us-west-2".to_string()));

        assert_eq!(S3MediaStoreConfig::new("b").with_prefix("/").prefix, None);
    }

    #[test]
    fn test_url_base_defaults() {
        assert_eq!(
            S3MediaStoreConfig::new("b").url_base(),
            "https://b.s3.amazonaws.com"
        );
        assert_eq!(
            S3MediaStoreConfig::new("b").with_region("eu-west-1").url_base(),
            "https://b.s3.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            S3MediaStoreConfig::new("b")
                .with_endpoint_url("http://localhost:9000/")
                .with_prefix("media")
                .url_base(),
            "http://localhost:9000/b/media"
        );
        assert_eq!(
            S3MediaStoreConfig::new("b")
                .with_prefix("media")
                .with_public_url_base("https://cdn.example.com/")
                .url_base(),
            "https://cdn.example.com"
        );
    }

    #[test]
    fn test_folder_prefix() {
        let plain = S3MediaStoreConfig::new("b");
        assert_eq!(plain.folder_prefix(&FolderPath::root()), "");
        assert_eq!(plain.folder_prefix(&p("a/b")), "a/b/");
        assert_eq!(plain.asset_key(&p("a"), "x.png"), "a/x.png");
        assert_eq!(plain.asset_key(&FolderPath::root(), "x.png"), "x.png");

        let prefixed = S3MediaStoreConfig::new("b").with_prefix("media");
        assert_eq!(prefixed.folder_prefix(&FolderPath::root()), "media/");
        assert_eq!(prefixed.folder_prefix(&p("a")), "media/a/");
    }

    #[test]
    fn test_relative_from_key() {
        let prefixed = S3MediaStoreConfig::new("b").with_prefix("media");
        assert_eq!(prefixed.relative_from_key("media/a/b/"), "a/b");
        assert_eq!(prefixed.relative_from_key("media/a/x.png"), "a/x.png");
        assert_eq!(S3MediaStoreConfig::new("b").relative_from_key("a/"), "a");
    }

    #[test]
    fn test_child_name() {
        assert_eq!(
            S3MediaStore::child_name("media/", "media/shoes/"),
            Some("shoes".to_string())
        );
        assert_eq!(S3MediaStore::child_name("", "top/"), Some("top".to_string()));
        assert_eq!(S3MediaStore::child_name("media/", "other/x/"), None);
        assert_eq!(S3MediaStore::child_name("media/", "media/"), None);
    }
}
