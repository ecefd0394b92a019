//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format configuration files,
//! with support for layered overrides.

use std::env;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use thiserror::Error;

use super::{AssetsConfig, ByteSize, Config, FoldersConfig, LoggingConfig, StoreConfig};
use crate::store::{DEFAULT_ALLOWED_MIME_PREFIX, DEFAULT_MAX_ASSET_SIZE_BYTES, Source};

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_LOCAL_URL: &str = "file://./media";
const DEFAULT_ROOT_SOURCE: Source = Source::Cloud;

const ENV_CONFIG_FILE: &str = "MBR_CONFIG_FILE";
const DEFAULT_CONFIG_FILENAME: &str = ".mbrconfig";

/// Sections holding one store each, with the source they configure.
const STORE_SECTIONS: [(&str, Source); 2] = [("local", Source::Local), ("cloud", Source::Cloud)];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid byte size '{value}': {message}")]
    InvalidByteSize { value: String, message: String },

    #[error("invalid value '{value}' for key '{key}': {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },

    #[error("missing required field '{field}' in section '{section}'")]
    MissingRequiredField { section: String, field: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist, error.
    /// If None, fall back to MBR_CONFIG_FILE env var, then ~/.mbrconfig.
    pub config_file: Option<PathBuf>,

    /// Additional override config file (layered on top of base config).
    pub override_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "assets.max_size", "cloud.region"
    pub overrides: Vec<(String, String)>,
}

/// Result of reading configuration.
#[derive(Debug)]
pub struct ConfigResult {
    pub config: Config,
    /// Non-fatal problems noticed while locating config files.
    pub warnings: Vec<String>,
}

// =============================================================================
// ByteSize Parsing
// =============================================================================

impl ByteSize {
    /// Parse a byte size from a string like "100MB", "1GB", "500KB", or plain "1024".
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidByteSize {
                value: s.to_string(),
                message: "empty string".to_string(),
            });
        }

        // Find where the numeric part ends
        let num_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());

        if num_end == 0 {
            return Err(ConfigError::InvalidByteSize {
                value: s.to_string(),
                message: "no numeric value".to_string(),
            });
        }

        let num_str = &s[..num_end];
        let suffix = s[num_end..].trim().to_uppercase();

        let base: u64 = num_str.parse().map_err(|e| ConfigError::InvalidByteSize {
            value: s.to_string(),
            message: format!("invalid number: {}", e),
        })?;

        let multiplier: u64 = match suffix.as_str() {
            "" | "B" => 1,
            "K" | "KB" => 1024,
            "M" | "MB" => 1024 * 1024,
            "G" | "GB" => 1024 * 1024 * 1024,
            "T" | "TB" => 1024 * 1024 * 1024 * 1024,
            _ => {
                return Err(ConfigError::InvalidByteSize {
                    value: s.to_string(),
                    message: format!("unknown suffix '{}'", suffix),
                });
            }
        };

        Ok(ByteSize(base.saturating_mul(multiplier)))
    }
}

// =============================================================================
// Value Parsing
// =============================================================================

fn parse_source_value(key: &str, value: &str) -> Result<Source> {
    value.parse().map_err(|message| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message,
    })
}

fn parse_mime_prefix_value(key: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() || !value.contains('/') {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: "expected a media type prefix such as 'image/'".to_string(),
        });
    }
    Ok(value.to_string())
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
pub struct ResolvedConfigFile {
    /// The path to the config file, if one was found.
    pub path: Option<PathBuf>,
    /// Warning message if env var pointed to nonexistent file.
    pub warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    // If explicit path provided, it must exist
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        } else {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
    }

    // Check environment variable
    if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        } else {
            // Warn but continue with defaults
            return Ok(ResolvedConfigFile {
                path: None,
                warning: Some(format!(
                    "config file specified by {} does not exist: {}",
                    ENV_CONFIG_FILE, env_path
                )),
            });
        }
    }

    // Check ~/.mbrconfig
    if let Some(home) = home_dir() {
        let default_path = home.join(DEFAULT_CONFIG_FILENAME);
        if default_path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(default_path),
                warning: None,
            });
        }
    }

    // No config file found
    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

// =============================================================================
// Default Config
// =============================================================================

/// Create a Config with all default values.
fn default_config() -> Config {
    Config {
        assets: AssetsConfig {
            max_size: ByteSize(DEFAULT_MAX_ASSET_SIZE_BYTES),
            allowed_mime_prefix: DEFAULT_ALLOWED_MIME_PREFIX.to_string(),
        },
        folders: FoldersConfig {
            default_root_source: DEFAULT_ROOT_SOURCE,
        },
        local: StoreConfig {
            url: Some(DEFAULT_LOCAL_URL.to_string()),
            ..StoreConfig::default()
        },
        cloud: StoreConfig::default(),
        logging: LoggingConfig::default(),
    }
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Apply an INI file's contents to a Config, layering on top of existing values.
fn apply_ini_to_config(config: &mut Config, ini: &Ini) -> Result<()> {
    // [assets] section
    if let Some(max_size) = ini.get("assets", "max_size") {
        config.assets.max_size = ByteSize::parse(&max_size)?;
    }
    if let Some(prefix) = ini.get("assets", "allowed_mime_prefix") {
        config.assets.allowed_mime_prefix =
            parse_mime_prefix_value("assets.allowed_mime_prefix", &prefix)?;
    }

    // [folders] section
    if let Some(source) = ini.get("folders", "default_root_source") {
        config.folders.default_root_source =
            parse_source_value("folders.default_root_source", &source)?;
    }

    // [local] and [cloud] sections
    for (section, source) in STORE_SECTIONS {
        let store = config.store_mut(source);
        if let Some(url) = ini.get(section, "url") {
            store.url = Some(url);
        }
        if let Some(base) = ini.get(section, "public_url_base") {
            store.public_url_base = Some(base);
        }
        if let Some(endpoint_url) = ini.get(section, "endpoint_url") {
            store.settings.endpoint_url = Some(endpoint_url);
        }
        if let Some(region) = ini.get(section, "region") {
            store.settings.region = Some(region);
        }
    }

    // [logging] section
    if let Some(level) = ini.get("logging", "level") {
        config.logging.level = Some(level);
    }

    Ok(())
}

/// Load and parse an INI file.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single key=value override to the config.
fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.splitn(2, '.').collect();

    match parts.as_slice() {
        // assets.max_size, assets.allowed_mime_prefix
        ["assets", param] => apply_assets_override(config, param, value),

        // folders.default_root_source
        ["folders", "default_root_source"] => {
            config.folders.default_root_source = parse_source_value(key, value)?;
            Ok(())
        }

        // local.url, cloud.region, etc.
        ["local", param] => apply_store_override(config.store_mut(Source::Local), key, param, value),
        ["cloud", param] => apply_store_override(config.store_mut(Source::Cloud), key, param, value),

        // logging.level
        ["logging", "level"] => {
            config.logging.level = Some(value.to_string());
            Ok(())
        }

        [_, _] => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unknown parameter".to_string(),
        }),

        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unrecognized key format".to_string(),
        }),
    }
}

fn apply_assets_override(config: &mut Config, param: &str, value: &str) -> Result<()> {
    match param {
        "max_size" => {
            config.assets.max_size = ByteSize::parse(value)?;
            Ok(())
        }
        "allowed_mime_prefix" => {
            config.assets.allowed_mime_prefix =
                parse_mime_prefix_value("assets.allowed_mime_prefix", value)?;
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: format!("assets.{}", param),
            message: "unknown parameter".to_string(),
        }),
    }
}

fn apply_store_override(store: &mut StoreConfig, key: &str, param: &str, value: &str) -> Result<()> {
    let value = Some(value.to_string());
    match param {
        "url" => store.url = value,
        "public_url_base" => store.public_url_base = value,
        "endpoint_url" => store.settings.endpoint_url = value,
        "region" => store.settings.region = value,
        _ => {
            return Err(ConfigError::InvalidOverrideKey {
                key: key.to_string(),
                message: "unknown parameter".to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Read configuration from the given source.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Base config file (from CLI, env var, or ~/.mbrconfig)
/// 3. Override config file (if specified)
/// 4. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    let mut warnings = Vec::new();

    // Start with defaults
    let mut config = default_config();

    // Resolve and apply base config file
    let resolved = resolve_config_file(source)?;
    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    // Apply override config file if specified
    if let Some(ref override_path) = source.override_file {
        if !override_path.exists() {
            return Err(ConfigError::FileNotFound(override_path.clone()));
        }
        let ini = load_ini(override_path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    // Apply individual overrides
    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value)?;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================
