//! Command-line interface for media-browser.

pub mod args;
mod commands;
mod render;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::app::{App, AppError};
use crate::folder_path::PathError;
use crate::logging::init_logging;
use crate::navigation::NavigationError;
use crate::store::StoreError;

pub use args::{GlobalArgs, OutputSink};
pub use commands::browse::BrowseSession;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument processing error.
    #[error("{0}")]
    Args(#[from] args::ArgsError),

    /// App error.
    #[error("{0}")]
    App(#[from] AppError),

    #[error("{0}")]
    Path(#[from] PathError),

    /// Media store error.
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Navigation(#[from] NavigationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// mbr - browse and manage media across local and cloud storage.
#[derive(Parser, Debug)]
#[command(name = "mbr", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a folder's subfolders and assets from both stores.
    Ls(commands::folders::LsArgs),

    /// Create a folder.
    Mkdir(commands::folders::MkdirArgs),

    /// Delete a folder and everything below it.
    Rmdir(commands::folders::RmdirArgs),

    /// Upload an image into a folder.
    Upload(commands::assets::UploadArgs),

    /// Delete an asset by url.
    #[command(name = "rm-asset")]
    RmAsset(commands::assets::RmAssetArgs),

    /// Browse interactively, reading commands from stdin.
    Browse(commands::browse::BrowseArgs),
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let app = App::new(self.global.to_app_context()).await?;

        init_logging(app.config().log_level(), self.global.verbose);
        for warning in app.warnings() {
            tracing::warn!(target: "media_browser::config", "{}", warning);
        }

        match self.command {
            Command::Ls(args) => args.run(&app, &self.global).await,
            Command::Mkdir(args) => args.run(&app, &self.global).await,
            Command::Rmdir(args) => args.run(&app, &self.global).await,
            Command::Upload(args) => args.run(&app, &self.global).await,
            Command::RmAsset(args) => args.run(&app, &self.global).await,
            Command::Browse(args) => args.run(&app, &self.global).await,
        }
    }
}

/// Main entry point for the CLI.
pub async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rmdir() {
        let cli = Cli::try_parse_from(["mbr", "rmdir", "products/old", "--source", "local", "--yes"])
            .unwrap();
        match cli.command {
            Command::Rmdir(args) => {
                assert_eq!(args.path, "products/old");
                assert_eq!(args.source, Some(crate::store::Source::Local));
                assert!(args.yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
        match Cli::try_parse_from(["mbr", "rmdir", "products/old", "--yes"]).unwrap().command {
            Command::Rmdir(args) => assert_eq!(args.source, None),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rmdir_requires_confirmation() {
        let base = tempfile::NamedTempFile::new().unwrap();
        let cli = Cli::try_parse_from([
            "mbr",
            "--config-file",
            base.path().to_str().unwrap(),
            "--config",
            "local.url=memory://",
            "--config",
            "cloud.url=memory://",
            "rmdir",
            "products",
        ])
        .unwrap();
        let err = cli.run().await.unwrap_err();
        assert!(err.to_string().contains("without --yes"));
    }
}
