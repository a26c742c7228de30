//! Filesystem utilities for handling uploads.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::MediaResult;

/// Write an uploaded file into `dir` under a unique name and return its
/// path. The original file name is kept as a suffix so the extension (and
/// human readability) survive; path components are stripped first.
pub async fn save_upload(
    dir: impl AsRef<Path>,
    original_name: &str,
    bytes: &[u8],
) -> MediaResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).await?;

    let name = sanitize_file_name(original_name);
    let path = dir.join(format!("{}_{}", Uuid::new_v4(), name));
    fs::write(&path, bytes).await?;
    Ok(path)
}

/// Reduce a client-supplied file name to its final component.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_upload_creates_dir_and_file() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");

        let path = save_upload(&uploads, "photo.jpg", b"fake jpeg").await.unwrap();
        assert!(path.starts_with(&uploads));
        assert!(path.to_string_lossy().ends_with("photo.jpg"));
        assert_eq!(fs::read(&path).await.unwrap(), b"fake jpeg");
    }

    #[tokio::test]
    async fn test_save_upload_unique_names() {
        let dir = TempDir::new().unwrap();
        let a = save_upload(dir.path(), "x.png", b"a").await.unwrap();
        let b = save_upload(dir.path(), "x.png", b"b").await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a.jpg"), "a.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }
}
