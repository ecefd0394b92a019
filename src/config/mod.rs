//! Configuration module.

mod config_helper;
mod read_config;
mod types;

pub use config_helper::{ConfigHelper, ResolvedStoreSpec};
pub use read_config::{ConfigError, ConfigResult, ConfigSource, read_config};
pub use types::{
    AssetsConfig, ByteSize, Config, FoldersConfig, LoggingConfig, S3Settings, StoreConfig,
};
