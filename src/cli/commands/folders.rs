//! Folder subcommands.

use clap::Args;
use serde_json::json;

use crate::app::App;
use crate::cli::render::{format_folder, format_listing};
use crate::cli::{CliError, GlobalArgs, OutputSink, Result};
use crate::folder_path::FolderPath;
use crate::store::Source;

// =============================================================================
// ls
// =============================================================================

/// Arguments for the ls command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Folder to list; `root` when omitted.
    pub path: Option<String>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl LsArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let path = match self.path.as_deref() {
            Some(raw) => FolderPath::normalize(raw)?,
            None => FolderPath::root(),
        };
        let listing = app.folders().list(&path).await?;
        self.output
            .write(&listing, global.json, &format_listing(&listing))
            .await?;
        Ok(())
    }
}

// =============================================================================
// mkdir
// =============================================================================

/// Arguments for the mkdir command.
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Folder to create the new folder in (`root` for the top level).
    pub parent: String,

    /// Name of the new folder.
    pub name: String,

    /// Store to create the folder in; by default the store owning the parent.
    #[arg(long)]
    pub source: Option<Source>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl MkdirArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let parent = FolderPath::normalize(&self.parent)?;
        let entry = app
            .folders()
            .create_folder(&parent, &self.name, self.source)
            .await?;
        self.output
            .write(&entry, global.json, &format_folder(&entry))
            .await?;
        Ok(())
    }
}

// =============================================================================
// rmdir
// =============================================================================

/// Arguments for the rmdir command.
#[derive(Args, Debug)]
pub struct RmdirArgs {
    /// Folder to delete, with everything below it.
    pub path: String,

    /// Store holding the folder, when both stores have one at this path.
    #[arg(long)]
    pub source: Option<Source>,

    /// Confirm the recursive delete.
    #[arg(long)]
    pub yes: bool,

    #[command(flatten)]
    pub output: OutputSink,
}

impl RmdirArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let path = FolderPath::normalize(&self.path)?;
        if !self.yes {
            return Err(CliError::Other(format!(
                "refusing to delete {} and its contents without --yes",
                path
            )));
        }
        let source = match self.source {
            Some(source) => {
                app.folders().delete_folder_in(&path, source).await?;
                source
            }
            None => app.folders().delete_folder(&path).await?,
        };
        let text = format!("deleted {} from {} storage", path, source);
        self.output
            .write(
                &json!({ "deleted": path, "source": source }),
                global.json,
                &text,
            )
            .await?;
        Ok(())
    }
}
