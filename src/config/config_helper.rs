//! Configuration helper for interpreting config values.
//!
//! The `ConfigHelper` wraps a `Config` and turns its raw values into the
//! objects the services are built from.

use super::Config;
use crate::store::{AssetPolicy, CreateMediaStoreError, ParsedMediaStoreSpec, Source};

/// Default level when neither RUST_LOG nor the config sets one.
const DEFAULT_LOG_LEVEL: &str = "warn";

/// A store spec with its settings resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStoreSpec {
    pub spec: ParsedMediaStoreSpec,
    pub public_url_base: Option<String>,
}

/// Helper for interpreting configuration values.
#[derive(Debug, Clone)]
pub struct ConfigHelper {
    config: Config,
}

impl ConfigHelper {
    /// Create a new ConfigHelper wrapping the given config.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get a reference to the underlying config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The upload policy from the [assets] section.
    pub fn asset_policy(&self) -> AssetPolicy {
        AssetPolicy {
            max_size_bytes: self.config.assets.max_size.0,
            allowed_mime_prefix: self.config.assets.allowed_mime_prefix.clone(),
        }
    }

    pub fn default_root_source(&self) -> Source {
        self.config.folders.default_root_source
    }

    /// The logging filter directive, falling back to `warn`.
    pub fn log_level(&self) -> &str {
        self.config
            .logging
            .level
            .as_deref()
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Parse the store url for `source` and fill in its section's settings.
    ///
    /// Settings from the section only apply where the url's own query string
    /// is silent.
    pub fn resolve_store_spec(
        &self,
        source: Source,
    ) -> Result<ResolvedStoreSpec, CreateMediaStoreError> {
        let store = self.config.store(source);
        let url = store
            .url
            .as_deref()
            .ok_or_else(|| CreateMediaStoreError::NotConfigured(source.to_string()))?;

        let mut spec = ParsedMediaStoreSpec::parse(url)?;
        if spec.endpoint_url.is_none() {
            spec.endpoint_url = store.settings.endpoint_url.clone();
        }
        if spec.region.is_none() {
            spec.region = store.settings.region.clone();
        }

        Ok(ResolvedStoreSpec {
            spec,
            public_url_base: store.public_url_base.clone(),
        })
    }
}

impl From<Config> for ConfigHelper {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, read_config};
    use crate::store::MediaStoreType;

    fn helper(overrides: &[(&str, &str)]) -> ConfigHelper {
        let source = ConfigSource {
            config_file: None,
            override_file: None,
            overrides: overrides
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        ConfigHelper::new(read_config(&source).unwrap().config)
    }

    #[test]
    fn test_asset_policy() {
        let policy = helper(&[("assets.max_size", "1MB")]).asset_policy();
        assert_eq!(policy.max_size_bytes, 1024 * 1024);
        assert_eq!(policy.allowed_mime_prefix, "image/");
    }

    #[test]
    fn test_resolve_store_spec_merges_settings() {
        let helper = helper(&[
            ("cloud.url", "s3://bucket/media?region=eu-west-1"),
            ("cloud.region", "us-east-1"),
            ("cloud.endpoint_url", "http://localhost:9000"),
            ("cloud.public_url_base", "https://cdn.example.com"),
        ]);
        let resolved = helper.resolve_store_spec(Source::Cloud).unwrap();
        assert_eq!(resolved.spec.store_type, MediaStoreType::S3);
        assert_eq!(resolved.spec.region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            resolved.spec.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(
            resolved.public_url_base.as_deref(),
            Some("https://cdn.example.com")
        );
    }

    #[test]
    fn test_resolve_unconfigured_store() {
        let helper = helper(&[("cloud.url", "s3://b")]);
        assert!(helper.resolve_store_spec(Source::Local).is_ok());

        let config = {
            let mut config = helper.config().clone();
            config.cloud.url = None;
            config
        };
        assert!(matches!(
            ConfigHelper::new(config).resolve_store_spec(Source::Cloud),
            Err(CreateMediaStoreError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(helper(&[]).log_level(), "warn");
        assert_eq!(helper(&[("logging.level", "debug")]).log_level(), "debug");
    }
}
