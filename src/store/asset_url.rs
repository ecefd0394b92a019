//! Mapping between asset locations and caller-facing urls.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::folder_path::{FolderPath, validate_name};

/// Characters left unescaped inside a url path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Builds and parses asset urls of the form `{base}/{folder...}/{file}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUrls {
    base: String,
}

impl AssetUrls {
    /// Create a mapper for the given base. Trailing slashes are ignored.
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// The url of `file_name` inside `folder`.
    pub fn url_for(&self, folder: &FolderPath, file_name: &str) -> String {
        let mut url = self.base.clone();
        for segment in folder.segments() {
            url.push('/');
            url.extend(utf8_percent_encode(segment, SEGMENT));
        }
        url.push('/');
        url.extend(utf8_percent_encode(file_name, SEGMENT));
        url
    }

    /// Whether `url` starts with this base.
    pub fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.base)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Split an owned url back into folder and file name.
    ///
    /// Returns `None` for foreign urls and for urls whose segments do not form
    /// a valid path, so a malformed url can never address anything outside
    /// the store.
    pub fn parse(&self, url: &str) -> Option<(FolderPath, String)> {
        let rest = url.strip_prefix(&self.base)?.strip_prefix('/')?;
        let mut segments = Vec::new();
        for raw in rest.split('/') {
            let decoded = percent_decode_str(raw).decode_utf8().ok()?;
            validate_name(&decoded).ok()?;
            segments.push(decoded.into_owned());
        }
        let file_name = segments.pop()?;
        let mut folder = FolderPath::root();
        for segment in &segments {
            folder = folder.join(segment).ok()?;
        }
        Some((folder, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_encodes_segments() {
        let urls = AssetUrls::new("https://cdn.example.com/media/");
        let folder = FolderPath::normalize("summer sale/shoes").unwrap();
        assert_eq!(
            urls.url_for(&folder, "a.jpg"),
            "https://cdn.example.com/media/summer%20sale/shoes/a.jpg"
        );
        assert_eq!(
            urls.url_for(&FolderPath::root(), "b.png"),
            "https://cdn.example.com/media/b.png"
        );
    }

    #[test]
    fn test_parse_inverts_url_for() {
        let urls = AssetUrls::new("/media");
        let folder = FolderPath::normalize("summer sale/shoes").unwrap();
        let url = urls.url_for(&folder, "a b.jpg");
        assert_eq!(urls.parse(&url), Some((folder, "a b.jpg".to_string())));
    }

    #[test]
    fn test_owns() {
        let urls = AssetUrls::new("/media");
        assert!(urls.owns("/media/a.jpg"));
        assert!(!urls.owns("/mediakit/a.jpg"));
        assert!(!urls.owns("https://elsewhere/a.jpg"));
    }

    #[test]
    fn test_parse_rejects_traversal() {
        let urls = AssetUrls::new("/media");
        assert_eq!(urls.parse("/media/../etc/passwd"), None);
        assert_eq!(urls.parse("/media/%2E%2E/secret.png"), None);
        assert_eq!(urls.parse("/media/a%2Fb.png"), None);
        assert_eq!(urls.parse("/media/"), None);
        assert_eq!(urls.parse("/other/a.png"), None);
    }
}
