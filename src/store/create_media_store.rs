//! Media store creation utilities.
//!
//! Parses store specifications such as `file:///srv/media` or
//! `s3://bucket/prefix?region=...` and builds the matching [`MediaStore`].

use std::collections::HashMap;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::store::{
    AssetPolicy, FsMediaStore, MediaStore, MemoryMediaStore, S3MediaStore, S3MediaStoreConfig,
    Source,
};

/// Url base of local assets when none is configured.
pub const DEFAULT_LOCAL_URL_BASE: &str = "/media";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during media store creation.
#[derive(Debug, Error)]
pub enum CreateMediaStoreError {
    /// The media store specification is invalid.
    #[error("invalid media store spec: {0}")]
    InvalidSpec(String),

    /// The URL scheme is not supported.
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// No url is configured for the named store.
    #[error("no url configured for the {0} store (set [{0}] url)")]
    NotConfigured(String),
}

/// Result type for media store creation.
pub type Result<T> = std::result::Result<T, CreateMediaStoreError>;

// =============================================================================
// Parsed Media Store Specification
// =============================================================================

/// The type of media store indicated by a specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStoreType {
    /// S3-compatible storage (s3:// URL).
    S3,
    /// Local filesystem (file:// URL).
    FileSystem,
    /// Process-local store (memory:// URL).
    Memory,
}

/// A parsed media store specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMediaStoreSpec {
    /// The type of media store.
    pub store_type: MediaStoreType,

    /// For S3: the bucket name. For filesystem: the base path. Empty for memory.
    pub location: String,

    /// For S3: optional prefix within the bucket.
    pub prefix: Option<String>,

    /// Optional endpoint URL (S3 only).
    pub endpoint_url: Option<String>,

    /// Optional region (S3 only).
    pub region: Option<String>,
}

impl ParsedMediaStoreSpec {
    /// Parse a media store specification string.
    ///
    /// Accepts:
    /// - `s3://bucket/prefix?endpoint_url=...&region=...`
    /// - `file:///path/to/directory`
    /// - `memory://`
    pub fn parse(spec: &str) -> Result<Self> {
        if let Some(rest) = spec.strip_prefix("s3://") {
            return Self::parse_s3_url(rest);
        }
        if let Some(rest) = spec.strip_prefix("file://") {
            return Self::parse_file_url(rest);
        }
        if spec.starts_with("memory://") {
            return Ok(Self {
                store_type: MediaStoreType::Memory,
                location: String::new(),
                prefix: None,
                endpoint_url: None,
                region: None,
            });
        }
        match spec.split_once("://") {
            Some((scheme, _)) => Err(CreateMediaStoreError::UnsupportedScheme(scheme.to_string())),
            None => Err(CreateMediaStoreError::InvalidSpec(format!(
                "'{}' is not a store url (expected s3://, file:// or memory://)",
                spec
            ))),
        }
    }

    fn parse_s3_url(without_scheme: &str) -> Result<Self> {
        // Format: bucket/prefix?endpoint_url=...&region=...
        let (path_part, query_part) = match without_scheme.split_once('?') {
            Some((path, query)) => (path, query),
            None => (without_scheme, ""),
        };

        let (bucket, prefix) = match path_part.split_once('/') {
            Some((bucket, prefix)) => {
                let prefix = prefix.trim_matches('/');
                (
                    bucket.to_string(),
                    (!prefix.is_empty()).then(|| prefix.to_string()),
                )
            }
            None => (path_part.to_string(), None),
        };

        if bucket.is_empty() {
            return Err(CreateMediaStoreError::InvalidSpec(
                "S3 URL must include bucket name".to_string(),
            ));
        }

        let params = parse_query_string(query_part);

        Ok(Self {
            store_type: MediaStoreType::S3,
            location: bucket,
            prefix,
            endpoint_url: params.get("endpoint_url").cloned(),
            region: params.get("region").cloned(),
        })
    }

    fn parse_file_url(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(CreateMediaStoreError::InvalidSpec(
                "file:// URL must include a path".to_string(),
            ));
        }

        Ok(Self {
            store_type: MediaStoreType::FileSystem,
            location: path.to_string(),
            prefix: None,
            endpoint_url: None,
            region: None,
        })
    }
}

/// Parse a query string into key-value pairs.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| {
            (
                key.to_string(),
                percent_decode_str(value).decode_utf8_lossy().into_owned(),
            )
        })
        .collect()
}

// =============================================================================
// CreateMediaStoreContext
// =============================================================================

/// Settings shared by every store created for one application.
#[derive(Debug, Clone, Default)]
pub struct CreateMediaStoreContext {
    policy: AssetPolicy,
}

impl CreateMediaStoreContext {
    pub fn new(policy: AssetPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AssetPolicy {
        &self.policy
    }

    /// Create a media store from a specification string.
    ///
    /// `public_url_base` overrides the store's default asset url base.
    pub async fn create_media_store(
        &self,
        spec: &str,
        source: Source,
        public_url_base: Option<&str>,
    ) -> Result<Arc<dyn MediaStore>> {
        let parsed = ParsedMediaStoreSpec::parse(spec)?;
        Ok(self
            .create_media_store_from_spec(&parsed, source, public_url_base)
            .await)
    }

    /// Create a media store from a parsed specification.
    pub async fn create_media_store_from_spec(
        &self,
        spec: &ParsedMediaStoreSpec,
        source: Source,
        public_url_base: Option<&str>,
    ) -> Arc<dyn MediaStore> {
        match spec.store_type {
            MediaStoreType::S3 => {
                let mut s3_config = S3MediaStoreConfig::new(&spec.location);
                if let Some(ref prefix) = spec.prefix {
                    s3_config = s3_config.with_prefix(prefix);
                }
                if let Some(ref endpoint_url) = spec.endpoint_url {
                    s3_config = s3_config.with_endpoint_url(endpoint_url);
                }
                if let Some(ref region) = spec.region {
                    s3_config = s3_config.with_region(region);
                }
                if let Some(base) = public_url_base {
                    s3_config = s3_config.with_public_url_base(base);
                }
                Arc::new(S3MediaStore::new(s3_config, source, self.policy.clone()).await)
            }

            MediaStoreType::FileSystem => Arc::new(FsMediaStore::new(
                &spec.location,
                source,
                public_url_base.unwrap_or(DEFAULT_LOCAL_URL_BASE),
                self.policy.clone(),
            )),

            MediaStoreType::Memory => {
                let store = match public_url_base {
                    Some(base) => MemoryMediaStore::with_url_base(source, base),
                    None => MemoryMediaStore::new(source),
                };
                Arc::new(store.with_policy(self.policy.clone()))
            }
        }
    }
}

// =============================================================================
// Convenience Function
// =============================================================================

/// Create a media store from a specification string.
///
/// This is a convenience function that delegates to
/// [`CreateMediaStoreContext::create_media_store`].
pub async fn create_media_store(
    spec: &str,
    source: Source,
    public_url_base: Option<&str>,
    ctx: &CreateMediaStoreContext,
) -> Result<Arc<dyn MediaStore>> {
    ctx.create_media_store(spec, source, public_url_base).await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder_path::FolderPath;

    #[test]
    fn test_parse_s3_url_simple() {
        let spec = ParsedMediaStoreSpec::parse("s3://mybucket").unwrap();
        assert_eq!(spec.store_type, MediaStoreType::S3);
        assert_eq!(spec.location, "mybucket");
        assert_eq!(spec.prefix, None);
        assert_eq!(spec.endpoint_url, None);
        assert_eq!(spec.region, None);
    }

    #[test]
    fn test_parse_s3_url_with_prefix_and_params() {
        let spec = ParsedMediaStoreSpec::parse(
            "s3://mybucket/path/to/media/?endpoint_url=http%3A%2F%2Flocalhost%3A9000&region=us-west-2",
        )
        .unwrap();
        assert_eq!(spec.location, "mybucket");
        assert_eq!(spec.prefix, Some("path/to/media".to_string()));
        assert_eq!(spec.endpoint_url, Some("http://localhost:9000".to_string()));
        assert_eq!(spec.region, Some("us-west-2".to_string()));
    }

    #[test]
    fn test_parse_file_and_memory_urls() {
        let spec = ParsedMediaStoreSpec::parse("file:///srv/media").unwrap();
        assert_eq!(spec.store_type, MediaStoreType::FileSystem);
        assert_eq!(spec.location, "/srv/media");

        let spec = ParsedMediaStoreSpec::parse("memory://").unwrap();
        assert_eq!(spec.store_type, MediaStoreType::Memory);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ParsedMediaStoreSpec::parse("s3://"),
            Err(CreateMediaStoreError::InvalidSpec(_))
        ));
        assert!(matches!(
            ParsedMediaStoreSpec::parse("file://"),
            Err(CreateMediaStoreError::InvalidSpec(_))
        ));
        assert!(matches!(
            ParsedMediaStoreSpec::parse("https://example.com"),
            Err(CreateMediaStoreError::UnsupportedScheme(s)) if s == "https"
        ));
        assert!(matches!(
            ParsedMediaStoreSpec::parse("mystore"),
            Err(CreateMediaStoreError::InvalidSpec(_))
        ));
    }

    #[tokio::test]
    async fn test_create_fs_media_store() {
        let temp = tempfile::TempDir::new().unwrap();
        let ctx = CreateMediaStoreContext::default();
        let spec = format!("file://{}", temp.path().display());

        let store = create_media_store(&spec, Source::Local, None, &ctx)
            .await
            .unwrap();
        assert_eq!(store.source(), Source::Local);
        assert!(store.owns_url("/media/a.png"));
        assert!(store.folder_exists(&FolderPath::root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_memory_store_with_url_base() {
        let ctx = CreateMediaStoreContext::default();
        let store = ctx
            .create_media_store("memory://", Source::Cloud, Some("https://cdn.test"))
            .await
            .unwrap();
        assert_eq!(store.source(), Source::Cloud);
        assert!(store.owns_url("https://cdn.test/x.png"));
    }
}
