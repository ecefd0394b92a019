//! Top-level application component.
//!
//! The [`App`] owns both stores and the services built on them, and is the root
//! for the application's functionality.

use thiserror::Error;

use crate::assets::AssetService;
use crate::config::{ConfigError, ConfigHelper, ConfigSource, read_config};
use crate::folders::FolderService;
use crate::navigation::NavigationController;
use crate::store::{CreateMediaStoreContext, CreateMediaStoreError, MediaStores, Source};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during App operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Media store creation error.
    #[error("failed to create media store: {0}")]
    CreateMediaStore(#[from] CreateMediaStoreError),

    /// Both stores would hand out urls under the same base.
    #[error("local and cloud stores share the public url base '{0}'")]
    SharedUrlBase(String),
}

/// Result type for App operations.
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Context Types
// =============================================================================

/// Context for creating an App.
#[derive(Debug, Default)]
pub struct AppContext {
    /// Source for configuration files.
    pub config_source: ConfigSource,
}

// =============================================================================
// App
// =============================================================================

/// The top-level application component.
pub struct App {
    config: ConfigHelper,
    warnings: Vec<String>,
    stores: MediaStores,
    folders: FolderService,
    assets: AssetService,
}

impl App {
    /// Create a new App with the given context.
    ///
    /// Reads configuration and builds the local and cloud stores from their
    /// sections.
    pub async fn new(ctx: AppContext) -> Result<Self> {
        let config_result = read_config(&ctx.config_source)?;
        let config = ConfigHelper::new(config_result.config);

        let local = config.resolve_store_spec(Source::Local)?;
        let cloud = config.resolve_store_spec(Source::Cloud)?;
        if let (Some(a), Some(b)) = (&local.public_url_base, &cloud.public_url_base)
            && a.trim_end_matches('/') == b.trim_end_matches('/')
        {
            return Err(AppError::SharedUrlBase(a.clone()));
        }

        let store_ctx = CreateMediaStoreContext::new(config.asset_policy());
        let local = store_ctx
            .create_media_store_from_spec(
                &local.spec,
                Source::Local,
                local.public_url_base.as_deref(),
            )
            .await;
        let cloud = store_ctx
            .create_media_store_from_spec(
                &cloud.spec,
                Source::Cloud,
                cloud.public_url_base.as_deref(),
            )
            .await;

        let stores = MediaStores::new(local, cloud, config.default_root_source());
        let mut app = Self::with_stores(config, stores);
        app.warnings = config_result.warnings;
        Ok(app)
    }

    /// Create an App around already-built stores.
    pub fn with_stores(config: ConfigHelper, stores: MediaStores) -> Self {
        let folders = FolderService::new(stores.clone());
        let assets = AssetService::new(stores.clone(), config.asset_policy());
        Self {
            config,
            warnings: Vec::new(),
            stores,
            folders,
            assets,
        }
    }

    /// Get the configuration helper.
    pub fn config(&self) -> &ConfigHelper {
        &self.config
    }

    /// Non-fatal problems found while reading configuration.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn stores(&self) -> &MediaStores {
        &self.stores
    }

    pub fn folders(&self) -> &FolderService {
        &self.folders
    }

    pub fn assets(&self) -> &AssetService {
        &self.assets
    }

    /// Start a browsing session at root.
    pub fn new_navigation(&self) -> NavigationController {
        NavigationController::new(self.folders.clone(), self.assets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder_path::FolderPath;
    use tempfile::NamedTempFile;

    /// A context with an empty base file so the environment cannot leak in.
    fn context(overrides: &[(&str, &str)]) -> (NamedTempFile, AppContext) {
        let base = NamedTempFile::new().unwrap();
        let ctx = AppContext {
            config_source: ConfigSource {
                config_file: Some(base.path().to_path_buf()),
                override_file: None,
                overrides: overrides
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        };
        (base, ctx)
    }

    fn memory_context(extra: &[(&str, &str)]) -> (NamedTempFile, AppContext) {
        let mut overrides = vec![("local.url", "memory://"), ("cloud.url", "memory://")];
        overrides.extend_from_slice(extra);
        context(&overrides)
    }

    #[tokio::test]
    async fn test_app_creation() {
        let (_base, ctx) = memory_context(&[]);
        let app = App::new(ctx).await.unwrap();
        assert_eq!(app.config().default_root_source(), Source::Cloud);
        assert_eq!(app.stores().get(Source::Local).source(), Source::Local);
        assert_eq!(app.stores().get(Source::Cloud).source(), Source::Cloud);
        assert!(app.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_app_services_share_stores() {
        let (_base, ctx) = memory_context(&[("folders.default_root_source", "local")]);
        let app = App::new(ctx).await.unwrap();
        let entry = app
            .folders()
            .create_folder(&FolderPath::root(), "products", None)
            .await
            .unwrap();
        assert_eq!(entry.source, Source::Local);

        let mut navigation = app.new_navigation();
        let request = navigation.navigate_into("products").unwrap();
        assert!(navigation.load(request).await.unwrap().is_shown());
    }

    #[tokio::test]
    async fn test_app_with_file_store() {
        let root = tempfile::TempDir::new().unwrap();
        let url = format!("file://{}", root.path().display());
        let (_base, ctx) = context(&[("local.url", &url), ("cloud.url", "memory://")]);
        let app = App::new(ctx).await.unwrap();

        app.folders()
            .create_folder(&FolderPath::root(), "drafts", Some(Source::Local))
            .await
            .unwrap();
        assert!(root.path().join("drafts").is_dir());
    }

    #[tokio::test]
    async fn test_app_rejects_shared_url_base() {
        let (_base, ctx) = memory_context(&[
            ("local.public_url_base", "https://cdn.example.com/"),
            ("cloud.public_url_base", "https://cdn.example.com"),
        ]);
        assert!(matches!(
            App::new(ctx).await,
            Err(AppError::SharedUrlBase(_))
        ));
    }

    #[tokio::test]
    async fn test_app_requires_cloud_url() {
        let (_base, ctx) = context(&[("local.url", "memory://")]);
        assert!(matches!(
            App::new(ctx).await,
            Err(AppError::CreateMediaStore(CreateMediaStoreError::NotConfigured(_)))
        ));
    }
}
