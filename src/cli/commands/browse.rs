//! Line-oriented interactive browsing over stdin.

use std::path::Path;

use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::app::App;
use crate::cli::commands::assets::read_upload;
use crate::cli::render::{format_breadcrumbs, format_listing};
use crate::cli::{CliError, GlobalArgs, Result};
use crate::folders::FolderListing;
use crate::navigation::{Breadcrumb, ListRequest, NavigationController};
use crate::store::Source;

const HELP: &str = "\
commands:
  ls                      show the current folder
  cd NAME | cd ..         enter a child folder, or go back
  back                    go back one history entry
  jump N                  jump to breadcrumb N
  refresh                 re-list the current folder
  mkdir NAME [local|cloud]
  rmdir NAME [local|cloud]
                          delete a child folder and its contents
  upload FILE             upload an image into the current folder
  rm URL                  delete an asset
  select URL              select an asset
  quit";

/// Arguments for the browse command.
#[derive(Args, Debug)]
pub struct BrowseArgs {}

impl BrowseArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let mut session = BrowseSession::new(app.new_navigation(), global.json);
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        session.run(stdin, tokio::io::stdout()).await
    }
}

/// What the session prints after each command in JSON mode.
#[derive(Debug, Serialize)]
struct SessionView<'a> {
    breadcrumbs: Vec<Breadcrumb>,
    listing: Option<&'a FolderListing>,
    selected_asset_url: Option<&'a str>,
}

enum Step {
    Print(String),
    Quit,
}

/// One browsing session driven by text commands.
pub struct BrowseSession {
    controller: NavigationController,
    json: bool,
}

impl BrowseSession {
    pub fn new(controller: NavigationController, json: bool) -> Self {
        Self { controller, json }
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    /// Show root, then execute lines from `input` until EOF or `quit`.
    ///
    /// A failing command prints its error and the session carries on.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let initial = self.controller.refresh();
        let first = match self.show(initial).await {
            Ok(text) => text,
            Err(e) => format!("error: {}", e),
        };
        write_line(&mut output, &first).await?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.execute(line).await {
                Ok(Step::Print(text)) => write_line(&mut output, &text).await?,
                Ok(Step::Quit) => break,
                Err(e) => write_line(&mut output, &format!("error: {}", e)).await?,
            }
        }
        Ok(())
    }

    async fn execute(&mut self, line: &str) -> Result<Step> {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let text = match (command, rest) {
            ("quit" | "exit", _) => return Ok(Step::Quit),
            ("help", _) => HELP.to_string(),
            ("ls", _) => self.render(),
            ("cd", "..") | ("back", _) => {
                let request = self
                    .controller
                    .navigate_back()
                    .ok_or_else(|| CliError::Other("already at the first folder".to_string()))?;
                self.show(request).await?
            }
            ("cd", name) => {
                let name = required(name, "cd NAME")?;
                let listing = self.controller.listing().ok_or_else(|| {
                    CliError::Other(
                        "this folder is not listed yet; try 'refresh' or 'back'".to_string(),
                    )
                })?;
                if listing.folders_named(name).next().is_none() {
                    return Err(CliError::Other(format!("no folder named '{}' here", name)));
                }
                let request = self.controller.navigate_into(name)?;
                self.show(request).await?
            }
            ("jump", index) => {
                let index = required(index, "jump N")?
                    .parse::<usize>()
                    .map_err(|_| CliError::Other(format!("'{}' is not an index", index)))?;
                let request = self.controller.navigate_to_history_index(index)?;
                self.show(request).await?
            }
            ("refresh", _) => {
                let request = self.controller.refresh();
                self.show(request).await?
            }
            ("mkdir", args) => {
                let mut words = args.split_whitespace();
                let name = required(words.next().unwrap_or(""), "mkdir NAME [local|cloud]")?;
                let source = words.next().map(parse_source).transpose()?;
                self.controller.create_folder(name, source).await?;
                self.show_refreshed().await?
            }
            ("rmdir", args) => {
                let mut words = args.split_whitespace();
                let name = required(words.next().unwrap_or(""), "rmdir NAME [local|cloud]")?;
                let source = words.next().map(parse_source).transpose()?;
                self.controller.delete_folder(name, source).await?;
                self.show_refreshed().await?
            }
            ("upload", file) => {
                let file = required(file, "upload FILE")?;
                let (blob, mime) = read_upload(Path::new(file), None).await?;
                let size = blob.len() as u64;
                self.controller.upload(blob, &mime, size).await?;
                self.show_refreshed().await?
            }
            ("rm", url) => {
                let url = required(url, "rm URL")?;
                self.controller.delete_asset(url).await?;
                self.show_refreshed().await?
            }
            ("select", url) => {
                let url = required(url, "select URL")?;
                if let Some(listing) = self.controller.listing()
                    && !listing.contains_asset(url)
                {
                    return Err(CliError::Other(format!("no asset '{}' here", url)));
                }
                self.controller.select_asset(url);
                self.render()
            }
            (other, _) => {
                return Err(CliError::Other(format!(
                    "unknown command '{}' (try 'help')",
                    other
                )));
            }
        };
        Ok(Step::Print(text))
    }

    async fn show(&mut self, request: ListRequest) -> Result<String> {
        self.controller.load(request).await?;
        Ok(self.render())
    }

    async fn show_refreshed(&mut self) -> Result<String> {
        let request = self.controller.refresh();
        self.show(request).await
    }

    fn render(&self) -> String {
        if self.json {
            let view = SessionView {
                breadcrumbs: self.controller.breadcrumbs(),
                listing: self.controller.listing(),
                selected_asset_url: self.controller.selected_asset_url(),
            };
            return serde_json::to_string_pretty(&view).unwrap_or_default();
        }

        let mut text = format_breadcrumbs(&self.controller.breadcrumbs());
        if let Some(listing) = self.controller.listing() {
            text.push('\n');
            text.push_str(&format_listing(listing));
        }
        if let Some(url) = self.controller.selected_asset_url() {
            text.push_str(&format!("\nselected: {}", url));
        }
        text
    }
}

fn required<'a>(value: &'a str, usage: &str) -> Result<&'a str> {
    if value.is_empty() {
        Err(CliError::Other(format!("usage: {}", usage)))
    } else {
        Ok(value)
    }
}

fn parse_source(value: &str) -> Result<Source> {
    value.parse::<Source>().map_err(CliError::Other)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetService;
    use crate::folder_path::FolderPath;
    use crate::folders::FolderService;
    use crate::store::{AssetPolicy, MediaStores, MemoryMediaStore};
    use std::sync::Arc;

    struct Fixture {
        local: Arc<MemoryMediaStore>,
        cloud: Arc<MemoryMediaStore>,
        session: BrowseSession,
    }

    fn fixture(json: bool) -> Fixture {
        let local = Arc::new(MemoryMediaStore::new(Source::Local));
        let cloud = Arc::new(MemoryMediaStore::new(Source::Cloud));
        let stores = MediaStores::new(local.clone(), cloud.clone(), Source::Cloud);
        let controller = NavigationController::new(
            FolderService::new(stores.clone()),
            AssetService::new(stores, AssetPolicy::default()),
        );
        Fixture {
            local,
            cloud,
            session: BrowseSession::new(controller, json),
        }
    }

    async fn run(session: &mut BrowseSession, script: &str) -> String {
        let mut output = Vec::new();
        session.run(script.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn test_session_navigation() {
        let mut f = fixture(false);
        f.cloud.seed_folder(&FolderPath::normalize("products/summer").unwrap());

        let output = run(&mut f.session, "cd products\ncd summer\njump 0\nquit\ncd products\n").await;

        assert!(output.starts_with("[0] root\nroot:\n"));
        assert!(output.contains("[0] root > [1] products > [2] summer"));
        assert!(f.session.controller().current_path().is_root());
        assert_eq!(f.session.controller().state().path_history().len(), 1);
    }

    #[tokio::test]
    async fn test_session_mutations() {
        let mut f = fixture(false);
        let dir = tempfile::TempDir::new().unwrap();
        let image = dir.path().join("logo.png");
        std::fs::write(&image, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();

        let script = format!(
            "mkdir drafts local\ncd drafts\nupload {}\nback\nrmdir drafts\n",
            image.display()
        );
        let output = run(&mut f.session, &script).await;

        assert!(!output.contains("error:"), "{}", output);
        assert!(output.contains("image/png"));
        assert_eq!(f.local.store_calls(), 1);
        assert_eq!(f.local.folder_count(), 0);
        assert_eq!(f.local.asset_count(), 0);
        assert_eq!(f.cloud.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_session_reports_errors_and_continues() {
        let mut f = fixture(false);
        let output = run(&mut f.session, "cd missing\nback\nfrobnicate\nmkdir\nls\n").await;

        assert!(output.contains("error: no folder named 'missing' here"));
        assert!(output.contains("error: already at the first folder"));
        assert!(output.contains("error: unknown command 'frobnicate'"));
        assert!(output.contains("error: usage: mkdir NAME [local|cloud]"));
        assert!(output.trim_end().ends_with("(empty)"));
    }

    #[tokio::test]
    async fn test_session_cd_checks_the_current_folder() {
        let mut f = fixture(false);
        f.cloud.seed_folder(&FolderPath::normalize("products/products").unwrap());

        f.session.run(&b""[..], Vec::new()).await.unwrap();
        f.local.set_fail_listing(true);
        f.cloud.set_fail_listing(true);
        let output = run(&mut f.session, "cd products\ncd products\n").await;

        assert!(output.contains("error: all storage unavailable"));
        assert!(output.contains("error: this folder is not listed yet"));
        assert_eq!(
            f.session.controller().current_path(),
            &FolderPath::normalize("products").unwrap()
        );
    }

    #[tokio::test]
    async fn test_session_json_view() {
        let mut f = fixture(true);
        f.local.seed_folder(&FolderPath::normalize("drafts").unwrap());

        let output = run(&mut f.session, "quit\n").await;
        let view: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(view["breadcrumbs"][0]["name"], "root");
        assert_eq!(view["listing"]["folders"][0]["name"], "drafts");
        assert_eq!(view["listing"]["folders"][0]["source"], "local");
        assert!(view["selected_asset_url"].is_null());
    }
}
