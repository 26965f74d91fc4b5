//! Thin wrapper over a base directory: flat files keyed by name. Out of
//! scope for the hard part of the system (§1), kept deliberately trivial.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    base: PathBuf,
}

impl LocalStore {
    /// Ensure `base` exists (creating it if necessary) and return a store
    /// rooted there.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        std::fs::create_dir_all(&base)?;
        Ok(LocalStore { base })
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        Ok(std::fs::read(self.path_for(name))?)
    }

    pub fn write(&self, name: &str, content: &[u8]) -> Result<(), StoreError> {
        Ok(std::fs::write(self.path_for(name), content)?)
    }

    /// Create an empty file if it doesn't already exist.
    pub fn create(&self, name: &str) -> Result<(), StoreError> {
        use std::fs::OpenOptions;
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.path_for(name))?;
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        Ok(std::fs::remove_file(self.path_for(name))?)
    }

    /// Top-level file names under the base directory. Subdirectories are
    /// skipped entirely (not recursed into), mirroring the original's
    /// `filepath.WalkDir` that `SkipDir`s on the first nested directory.
    pub fn list_top_level_files(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.base)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}
