use crate::artifacts::ArtifactStore;
use crate::error::{AppError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One file per key under a directory.
///
/// Every write lands in a temporary file in the same directory first and is
/// renamed over the target, so readers never observe a half-written artifact.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::Artifact(format!(
                "Cannot create artifact directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        tracing::info!(path = %dir.display(), "Opened artifact store");
        Ok(Self { dir })
    }

    /// Open an existing directory without creating it
    pub fn open_existing(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(AppError::Artifact(format!(
                "Artifact directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.artifact", key))
    }

    fn stage(&self, key: &str, bytes: &[u8]) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| {
            AppError::Artifact(format!("Cannot stage artifact '{}': {}", key, e))
        })?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AppError::Artifact(format!("Cannot stage artifact '{}': {}", key, e)))?;
        Ok(tmp)
    }

    fn persist(&self, key: &str, tmp: NamedTempFile) -> Result<()> {
        let target = self.path_for(key);
        tmp.persist(&target).map_err(|e| {
            AppError::Artifact(format!(
                "Cannot write artifact {}: {}",
                target.display(),
                e.error
            ))
        })?;
        tracing::debug!(key, path = %target.display(), "Artifact persisted");
        Ok(())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        std::fs::read(&path).map_err(|e| {
            AppError::Artifact(format!("Cannot read artifact {}: {}", path.display(), e))
        })
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let tmp = self.stage(key, bytes)?;
        self.persist(key, tmp)
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Stage every blob before renaming any of them
    fn save_all(&self, blobs: &[(&str, Vec<u8>)]) -> Result<()> {
        let staged = blobs
            .iter()
            .map(|(key, bytes)| Ok((*key, self.stage(key, bytes)?)))
            .collect::<Result<Vec<_>>>()?;

        for (key, tmp) in staged {
            self.persist(key, tmp)?;
        }
        Ok(())
    }
}
