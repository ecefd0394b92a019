//! Configuration types for media-browser.
//!
//! This module defines the structures used to represent application configuration
//! as parsed from an INI-format config file.

use crate::store::Source;

// =============================================================================
// Primitive Types
// =============================================================================

/// A byte size that can be parsed from strings like "100MB", "1GB", etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(pub u64);

// =============================================================================
// S3 Settings
// =============================================================================

/// S3-specific connection settings.
///
/// These fill in whatever the store url's query string leaves unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Settings {
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
}

// =============================================================================
// Config Sections
// =============================================================================

/// [assets] section - upload policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetsConfig {
    pub max_size: ByteSize,
    pub allowed_mime_prefix: String,
}

/// [folders] section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldersConfig {
    /// Store that receives root-level folders when none is named.
    pub default_root_source: Source,
}

/// [local] and [cloud] sections - one store each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store spec, e.g. `file:///var/lib/media` or `s3://bucket/prefix`.
    pub url: Option<String>,
    /// Base of the urls handed out for stored assets.
    pub public_url_base: Option<String>,
    pub settings: S3Settings,
}

/// [logging] section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `media_browser=debug`.
    pub level: Option<String>,
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete application configuration as parsed from config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub assets: AssetsConfig,
    pub folders: FoldersConfig,
    pub local: StoreConfig,
    pub cloud: StoreConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// The section configuring the store for `source`.
    pub fn store(&self, source: Source) -> &StoreConfig {
        match source {
            Source::Local => &self.local,
            Source::Cloud => &self.cloud,
        }
    }

    pub fn store_mut(&mut self, source: Source) -> &mut StoreConfig {
        match source {
            Source::Local => &mut self.local,
            Source::Cloud => &mut self.cloud,
        }
    }
}
