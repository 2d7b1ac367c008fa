use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// MIME types accepted for upload, matched against sniffed content.
pub const ALLOWED_IMAGE_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

const MAX_NAME_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("duplicate")]
    Duplicate,
    #[error("not_found")]
    NotFound,
    #[error("invalid file name")]
    InvalidName,
    #[error("other: {0}")]
    Other(String),
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Write a new file; `Duplicate` if the name is taken.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), ImageStoreError>;
    /// Bytes plus sniffed content type.
    async fn load(&self, name: &str) -> Result<(Vec<u8>, String), ImageStoreError>;
    /// Deleting a missing file succeeds.
    async fn delete(&self, name: &str) -> Result<(), ImageStoreError>;
}

/// Stores images as flat files under one directory.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, ImageStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ImageStoreError::Other(format!("create {}: {e}", root.display())))?;
        info!("image store rooted at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ImageStoreError> {
        if !is_safe_name(name) {
            return Err(ImageStoreError::InvalidName);
        }
        Ok(self.root.join(name))
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), ImageStoreError> {
        let path = self.path_for(name)?;
        let mut file = match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Err(ImageStoreError::Duplicate),
            Err(e) => return Err(ImageStoreError::Other(format!("open {}: {e}", path.display()))),
        };
        if let Err(e) = file.write_all(bytes).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(ImageStoreError::Other(format!("write {}: {e}", path.display())));
        }
        file.flush().await.map_err(|e| ImageStoreError::Other(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<(Vec<u8>, String), ImageStoreError> {
        let path = self.path_for(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ImageStoreError::NotFound),
            Err(e) => return Err(ImageStoreError::Other(format!("read {}: {e}", path.display()))),
        };
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        Ok((bytes, mime))
    }

    async fn delete(&self, name: &str) -> Result<(), ImageStoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ImageStoreError::Other(format!("remove {}: {e}", path.display()))),
        }
    }
}

/// Sniffed MIME type when the bytes are an accepted image format.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|t| t.mime_type()).filter(|m| ALLOWED_IMAGE_MIME.contains(m))
}

/// Basename of a client-supplied file name reduced to `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<unix-millis>_<sanitized basename>`
pub fn stored_name(original: &str, unix_millis: i64) -> String {
    format!("{unix_millis}_{}", sanitize_file_name(original))
}

fn with_suffix(name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{name}_{suffix}"),
    }
}

/// Save under the timestamped name, adding a random suffix if it collides.
/// Returns the name actually written.
pub async fn store_upload(store: &dyn ImageStore, original: &str, bytes: &[u8]) -> Result<String, ImageStoreError> {
    let base = stored_name(original, chrono::Utc::now().timestamp_millis());
    let mut name = base.clone();
    for _ in 0..MAX_NAME_ATTEMPTS {
        match store.save(&name, bytes).await {
            Ok(()) => return Ok(name),
            Err(ImageStoreError::Duplicate) => name = with_suffix(&base),
            Err(e) => return Err(e),
        }
    }
    Err(ImageStoreError::Duplicate)
}

/// Best-effort removal of files whose rows are gone.
pub async fn reap(store: &Arc<dyn ImageStore>, names: &[String]) {
    for name in names {
        if let Err(e) = store.delete(name).await {
            warn!("failed to remove image {name}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_reduced_to_safe_basenames() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\my room.jpg"), "my_room.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "image");
        assert_eq!(stored_name("a b.png", 1700000000000), "1700000000000_a_b.png");
    }

    #[test]
    fn suffix_keeps_extension() {
        let n = with_suffix("1_room.png");
        assert!(n.starts_with("1_room_"));
        assert!(n.ends_with(".png"));
        assert_eq!(n.len(), "1_room_.png".len() + 8);
    }

    #[test]
    fn unsafe_names_are_rejected() {
        assert!(is_safe_name("1700_room.png"));
        assert!(!is_safe_name("../x.png"));
        assert!(!is_safe_name(".env"));
        assert!(!is_safe_name("a/b.png"));
    }

    #[test]
    fn only_supported_images_are_sniffed() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_image(&png), Some("image/png"));
        assert_eq!(sniff_image(b"just some text"), None);
    }
}
