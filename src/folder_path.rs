//! Folder paths relative to the media root.
//!
//! A [`FolderPath`] is an immutable, normalized sequence of segments. The empty
//! sequence is the root sentinel, written `root`. Paths compare equal iff their
//! segments are equal, and never contain empty or dot-prefixed segments (which
//! rules out `.` and `..`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The textual name of the top-level folder.
pub const ROOT_SENTINEL: &str = "root";

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while parsing paths or validating folder names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("invalid folder name '{name}': {message}")]
    InvalidName { name: String, message: String },
}

/// Result type for path operations.
pub type Result<T> = std::result::Result<T, PathError>;

fn invalid_path(path: &str, message: impl Into<String>) -> PathError {
    PathError::InvalidPath {
        path: path.to_string(),
        message: message.into(),
    }
}

fn invalid_name(name: &str, message: impl Into<String>) -> PathError {
    PathError::InvalidName {
        name: name.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// FolderPath
// =============================================================================

/// A normalized folder path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderPath {
    segments: Vec<String>,
}

impl FolderPath {
    /// The root sentinel.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse and normalize a raw slash-delimited path.
    ///
    /// Repeated slashes collapse and leading/trailing slashes are stripped. The
    /// literal `root`, alone or as the leading segment, names the top level
    /// explicitly. Any other input that normalizes to nothing is rejected.
    pub fn normalize(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            check_segment(segment).map_err(|message| invalid_path(raw, message))?;
            segments.push(segment.to_string());
        }

        match segments.first().map(String::as_str) {
            None => Err(invalid_path(raw, "path is empty")),
            Some(ROOT_SENTINEL) => {
                segments.remove(0);
                if segments.first().map(String::as_str) == Some(ROOT_SENTINEL) {
                    return Err(invalid_path(raw, "'root' is reserved at the top level"));
                }
                Ok(Self { segments })
            }
            Some(_) => Ok(Self { segments }),
        }
    }

    /// Whether this is the root sentinel.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments of this path, outermost first. Empty for root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments below root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last segment, or `None` for root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path with its final segment removed; `None` for root.
    pub fn parent(&self) -> Option<FolderPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True iff this path has a parent other than root.
    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    /// True iff `other`'s segments begin with all of this path's segments.
    ///
    /// Every path is its own ancestor, and root is an ancestor of every path.
    pub fn is_ancestor_of(&self, other: &FolderPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Append a single folder name.
    pub fn join(&self, name: &str) -> Result<FolderPath> {
        validate_name(name)?;
        if self.is_root() && name == ROOT_SENTINEL {
            return Err(invalid_name(name, "'root' is reserved at the top level"));
        }
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// The path as a slash-joined string relative to the store root.
    ///
    /// Root maps to the empty string; adapters use this to build keys.
    pub fn to_relative(&self) -> String {
        self.segments.join("/")
    }
}

/// Validate a single folder name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid_name(name, "name is empty"));
    }
    if name.contains('/') {
        return Err(invalid_name(name, "name contains a path separator"));
    }
    check_segment(name).map_err(|message| invalid_name(name, message))
}

fn check_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.starts_with('.') {
        return Err("names may not start with '.'");
    }
    if segment.contains('\\') {
        return Err("backslashes are not allowed");
    }
    if segment.chars().any(char::is_control) {
        return Err("control characters are not allowed");
    }
    Ok(())
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(ROOT_SENTINEL)
        } else {
            f.write_str(&self.segments.join("/"))
        }
    }
}

impl FromStr for FolderPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

impl Serialize for FolderPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FolderPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> FolderPath {
        FolderPath::normalize(raw).unwrap()
    }

    #[test]
    fn test_normalize_collapses_slashes() {
        assert_eq!(p("//products///shoes/").segments(), ["products", "shoes"]);
        assert_eq!(p("products").to_string(), "products");
        assert_eq!(p("/a/b/c/").to_string(), "a/b/c");
    }

    #[test]
    fn test_normalize_root_sentinel() {
        assert!(p("root").is_root());
        assert!(p("/root/").is_root());
        assert_eq!(p("root/products"), p("products"));
        assert_eq!(FolderPath::root().to_string(), "root");
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        for raw in [
            "",
            "/",
            "///",
            "a/./b",
            "../a",
            "a/..",
            "a/.hidden",
            "a\\b",
            "root/root",
            "a/\u{7}",
        ] {
            assert!(
                matches!(FolderPath::normalize(raw), Err(PathError::InvalidPath { .. })),
                "expected {:?} to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "root",
            "a",
            "/a//b/",
            "root/a/b",
            "products/2024/summer",
            "x y/z",
            "///deep/er/est///",
            "a/root",
        ];
        for raw in inputs {
            let once = p(raw);
            let twice = p(&once.to_string());
            assert_eq!(once, twice, "normalize not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_parent() {
        assert_eq!(FolderPath::root().parent(), None);
        assert_eq!(p("a").parent(), Some(FolderPath::root()));
        assert_eq!(p("a/b/c").parent(), Some(p("a/b")));
    }

    #[test]
    fn test_is_nested() {
        assert!(!FolderPath::root().is_nested());
        assert!(!p("a").is_nested());
        assert!(p("a/b").is_nested());
    }

    #[test]
    fn test_is_ancestor_of_reflexive_and_transitive() {
        let paths = [
            FolderPath::root(),
            p("a"),
            p("a/b"),
            p("a/b/c"),
            p("a/bc"),
            p("x"),
        ];
        for a in &paths {
            assert!(a.is_ancestor_of(a));
            for b in &paths {
                for c in &paths {
                    if a.is_ancestor_of(b) && b.is_ancestor_of(c) {
                        assert!(a.is_ancestor_of(c), "{} / {} / {}", a, b, c);
                    }
                }
            }
        }
        assert!(FolderPath::root().is_ancestor_of(&p("x")));
        assert!(!p("a/b").is_ancestor_of(&p("a/bc")));
        assert!(!p("a/b").is_ancestor_of(&p("a")));
    }

    #[test]
    fn test_join() {
        let products = FolderPath::root().join("products").unwrap();
        assert_eq!(products, p("products"));
        assert_eq!(products.join("shoes").unwrap(), p("products/shoes"));
        assert_eq!(products.join("root").unwrap(), p("products/root"));
    }

    #[test]
    fn test_join_rejects_invalid_names() {
        let root = FolderPath::root();
        for name in ["", "a/b", ".", "..", ".tmp", "a\\b", "root"] {
            assert!(
                matches!(root.join(name), Err(PathError::InvalidName { .. })),
                "expected {:?} to be rejected",
                name
            );
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&p("a/b")).unwrap();
        assert_eq!(json, "\"a/b\"");
        let parsed: FolderPath = serde_json::from_str("\"root\"").unwrap();
        assert!(parsed.is_root());
        assert!(serde_json::from_str::<FolderPath>("\"a/../b\"").is_err());
    }
}
