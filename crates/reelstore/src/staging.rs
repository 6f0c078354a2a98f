//! Atomic writes through a staging directory.
//!
//! A document is written in full to a uniquely named staging file, then
//! renamed over its final path. Readers never observe a half-written entry.
//! The staging directory sits inside the namespace directory, so the rename
//! never crosses filesystems.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Unique identifier for a staging file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingId(String);

impl StagingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StagingId {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `data` to `target` via a staging file in `staging_dir`.
pub async fn write_atomic(staging_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    fs::create_dir_all(staging_dir)
        .await
        .map_err(|e| StoreError::io(staging_dir, e))?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let staging_path: PathBuf = staging_dir.join(StagingId::new().as_str());
    fs::write(&staging_path, data)
        .await
        .map_err(|e| StoreError::io(&staging_path, e))?;

    if let Err(e) = fs::rename(&staging_path, target).await {
        // Leave no debris behind on failure
        let _ = fs::remove_file(&staging_path).await;
        return Err(StoreError::io(target, e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staging_ids_are_unique() {
        assert_ne!(StagingId::new(), StagingId::new());
        assert_eq!(StagingId::new().as_str().len(), 32);
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents_and_cleans_staging() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let staging = temp.path().join(".staging");
        let target = temp.path().join("ab").join("cdef.json");

        write_atomic(&staging, &target, b"{}").await?;

        assert_eq!(std::fs::read(&target)?, b"{}");
        assert_eq!(std::fs::read_dir(&staging)?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_existing() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let staging = temp.path().join(".staging");
        let target = temp.path().join("entry.json");

        write_atomic(&staging, &target, b"first").await?;
        write_atomic(&staging, &target, b"second").await?;

        assert_eq!(std::fs::read(&target)?, b"second");
        Ok(())
    }
}
