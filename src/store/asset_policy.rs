//! Size and media-type policy for stored assets.

use thiserror::Error;

/// 5 MiB.
pub const DEFAULT_MAX_ASSET_SIZE_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_ALLOWED_MIME_PREFIX: &str = "image/";

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Why an asset was rejected before reaching a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("media type '{mime_type}' is not allowed (expected {allowed_prefix}*)")]
    MimeTypeNotAllowed {
        mime_type: String,
        allowed_prefix: String,
    },

    #[error("asset is {size_bytes} bytes, the maximum is {max_bytes}")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("declared size {declared} does not match the {actual} bytes supplied")]
    SizeMismatch { declared: u64, actual: u64 },
}

/// Limits applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPolicy {
    pub max_size_bytes: u64,
    pub allowed_mime_prefix: String,
}

impl Default for AssetPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_ASSET_SIZE_BYTES,
            allowed_mime_prefix: DEFAULT_ALLOWED_MIME_PREFIX.to_string(),
        }
    }
}

impl AssetPolicy {
    /// Check a declared media type and size. Touches no backend.
    pub fn validate(&self, mime_type: &str, size_bytes: u64) -> Result<(), ValidationError> {
        let mime = mime_type.trim().to_ascii_lowercase();
        let prefix = self.allowed_mime_prefix.to_ascii_lowercase();
        if !mime.starts_with(&prefix) || mime.len() == prefix.len() {
            return Err(ValidationError::MimeTypeNotAllowed {
                mime_type: mime_type.to_string(),
                allowed_prefix: self.allowed_mime_prefix.clone(),
            });
        }
        if size_bytes > self.max_size_bytes {
            return Err(ValidationError::TooLarge {
                size_bytes,
                max_bytes: self.max_size_bytes,
            });
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), and also require the blob length to
    /// match the declared size.
    pub fn validate_blob(
        &self,
        mime_type: &str,
        size_bytes: u64,
        blob_len: usize,
    ) -> Result<(), ValidationError> {
        self.validate(mime_type, size_bytes)?;
        if blob_len as u64 != size_bytes {
            return Err(ValidationError::SizeMismatch {
                declared: size_bytes,
                actual: blob_len as u64,
            });
        }
        Ok(())
    }
}

/// File extension used when storing an asset of the given media type.
pub fn extension_for_mime(mime_type: &str) -> String {
    let mime = mime_type.trim().to_ascii_lowercase();
    let subtype = mime
        .split_once('/')
        .map(|(_, sub)| sub)
        .unwrap_or(mime.as_str());
    // Drop parameters such as "; charset=..."
    let subtype = subtype.split(';').next().unwrap_or("").trim();
    match subtype {
        "jpeg" | "pjpeg" => "jpg".to_string(),
        "svg+xml" => "svg".to_string(),
        "x-icon" | "vnd.microsoft.icon" => "ico".to_string(),
        "" => "bin".to_string(),
        other => other
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>(),
    }
}

/// Media type inferred from a stored file's extension.
pub fn mime_for_file_name(file_name: &str) -> String {
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return FALLBACK_MIME_TYPE.to_string(),
    };
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "heic" => "image/heic",
        _ => FALLBACK_MIME_TYPE,
    };
    mime.to_string()
}

// =============================================================================
// Tests
// =============================================================================
