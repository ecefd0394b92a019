//! The pair of stores a browser works against.

use std::sync::Arc;

use crate::folder_path::FolderPath;
use crate::store::{MediaStore, Result, Source, StoreError};

/// The local and cloud stores, plus the store that owns root-level creates.
#[derive(Clone)]
pub struct MediaStores {
    local: Arc<dyn MediaStore>,
    cloud: Arc<dyn MediaStore>,
    default_root_source: Source,
}

impl MediaStores {
    pub fn new(
        local: Arc<dyn MediaStore>,
        cloud: Arc<dyn MediaStore>,
        default_root_source: Source,
    ) -> Self {
        Self {
            local,
            cloud,
            default_root_source,
        }
    }

    /// The store for a given source.
    pub fn get(&self, source: Source) -> &Arc<dyn MediaStore> {
        match source {
            Source::Local => &self.local,
            Source::Cloud => &self.cloud,
        }
    }

    /// Both stores, local first.
    pub fn all(&self) -> [&Arc<dyn MediaStore>; 2] {
        [&self.local, &self.cloud]
    }

    pub fn default_root_source(&self) -> Source {
        self.default_root_source
    }

    /// The store whose url prefix `url` carries, if any.
    pub fn store_for_url(&self, url: &str) -> Option<&Arc<dyn MediaStore>> {
        self.all().into_iter().find(|store| store.owns_url(url))
    }

    /// The source that owns the folder at `path`.
    ///
    /// Root belongs to the default root source. A folder present in exactly one
    /// store belongs to it; a folder present in both belongs to the default
    /// root source. A failing store is ignored when the other one has the
    /// folder.
    pub async fn owner_of(&self, path: &FolderPath) -> Result<Source> {
        if path.is_root() {
            return Ok(self.default_root_source);
        }

        let (local, cloud) = tokio::join!(
            self.local.folder_exists(path),
            self.cloud.folder_exists(path)
        );

        match (local, cloud) {
            (Ok(true), Ok(true)) => Ok(self.default_root_source),
            (Ok(true), _) => Ok(Source::Local),
            (_, Ok(true)) => Ok(Source::Cloud),
            (Err(e), _) | (_, Err(e)) => Err(e),
            (Ok(false), Ok(false)) => Err(StoreError::FolderNotFound {
                path: path.clone(),
                backend: self.default_root_source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMediaStore;

    fn p(raw: &str) -> FolderPath {
        FolderPath::normalize(raw).unwrap()
    }

    fn stores() -> (Arc<MemoryMediaStore>, Arc<MemoryMediaStore>, MediaStores) {
        let local = Arc::new(MemoryMediaStore::new(Source::Local));
        let cloud = Arc::new(MemoryMediaStore::new(Source::Cloud));
        let stores = MediaStores::new(local.clone(), cloud.clone(), Source::Cloud);
        (local, cloud, stores)
    }

    #[tokio::test]
    async fn test_owner_of() {
        let (local, cloud, stores) = stores();
        local.seed_folder(&p("only-local"));
        cloud.seed_folder(&p("only-cloud"));
        local.seed_folder(&p("both"));
        cloud.seed_folder(&p("both"));

        assert_eq!(stores.owner_of(&FolderPath::root()).await.unwrap(), Source::Cloud);
        assert_eq!(stores.owner_of(&p("only-local")).await.unwrap(), Source::Local);
        assert_eq!(stores.owner_of(&p("only-cloud")).await.unwrap(), Source::Cloud);
        assert_eq!(stores.owner_of(&p("both")).await.unwrap(), Source::Cloud);
        assert!(matches!(
            stores.owner_of(&p("nowhere")).await,
            Err(StoreError::FolderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_owner_of_tolerates_one_failing_store() {
        let (local, cloud, stores) = stores();
        local.seed_folder(&p("a"));
        cloud.set_fail_listing(true);

        assert_eq!(stores.owner_of(&p("a")).await.unwrap(), Source::Local);
        assert!(stores.owner_of(&p("b")).await.unwrap_err().is_retryable());
    }

    #[test]
    fn test_store_for_url() {
        let (_, _, stores) = stores();
        let store = stores.store_for_url("memory://local/a.png").unwrap();
        assert_eq!(store.source(), Source::Local);
        assert!(stores.store_for_url("https://elsewhere/a.png").is_none());
    }
}
