//! Filesystem helpers.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ClawError, Result};

/// Write `contents` to `path` without ever exposing a partially written file.
///
/// The data goes to a temp file in the destination directory, is synced, and
/// is then renamed over `path`. A crash mid-write leaves the previous copy
/// intact.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<()> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents))
        .await
        .map_err(|e| ClawError::Io(std::io::Error::other(e)))?
}

fn write_atomic_blocking(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    // Same directory as the target so the rename never crosses filesystems.
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| ClawError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("file.json");

        write_atomic(&target, b"first".to_vec()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "first");

        write_atomic(&target, b"second".to_vec()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("only.json");
        write_atomic(&target, b"{}".to_vec()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
