//! Asset subcommands.

use std::path::Path;

use bytes::Bytes;
use clap::Args;
use serde_json::json;

use crate::app::App;
use crate::cli::render::format_asset;
use crate::cli::{GlobalArgs, OutputSink, Result};
use crate::folder_path::FolderPath;
use crate::store::mime_for_file_name;

/// Media type for an upload: explicit, then sniffed, then by extension.
pub(crate) fn detect_mime(explicit: Option<&str>, data: &[u8], file: &Path) -> String {
    if let Some(mime) = explicit {
        return mime.to_string();
    }
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    mime_for_file_name(&file_name)
}

/// Read a file for upload, returning its contents and media type.
pub(crate) async fn read_upload(file: &Path, explicit_mime: Option<&str>) -> Result<(Bytes, String)> {
    let data = tokio::fs::read(file).await?;
    let mime = detect_mime(explicit_mime, &data, file);
    Ok((Bytes::from(data), mime))
}

// =============================================================================
// upload
// =============================================================================

/// Arguments for the upload command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Folder to upload into.
    pub path: String,

    /// Image file to upload.
    pub file: std::path::PathBuf,

    /// Media type of the file, when it cannot be detected.
    #[arg(long)]
    pub mime: Option<String>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl UploadArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let path = FolderPath::normalize(&self.path)?;
        let (blob, mime) = read_upload(&self.file, self.mime.as_deref()).await?;
        let size = blob.len() as u64;
        let asset = app.assets().upload(&path, blob, &mime, size).await?;
        self.output
            .write(&asset, global.json, &format_asset(&asset))
            .await?;
        Ok(())
    }
}

// =============================================================================
// rm-asset
// =============================================================================

/// Arguments for the rm-asset command.
#[derive(Args, Debug)]
pub struct RmAssetArgs {
    /// Url of the asset, as shown by `ls`.
    pub url: String,

    #[command(flatten)]
    pub output: OutputSink,
}

impl RmAssetArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        app.assets().delete(&self.url).await?;
        self.output
            .write(
                &json!({ "deleted": self.url }),
                global.json,
                &format!("deleted {}", self.url),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_detect_mime_order() {
        let file = Path::new("photo.jpg");
        assert_eq!(detect_mime(Some("image/webp"), PNG_HEADER, file), "image/webp");
        assert_eq!(detect_mime(None, PNG_HEADER, file), "image/png");
        assert_eq!(detect_mime(None, b"not an image", file), "image/jpeg");
        assert_eq!(
            detect_mime(None, b"not an image", Path::new("notes")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_read_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("logo");
        std::fs::write(&file, PNG_HEADER).unwrap();

        let (blob, mime) = read_upload(&file, None).await.unwrap();
        assert_eq!(blob.len(), PNG_HEADER.len());
        assert_eq!(mime, "image/png");
    }
}
