//! File-backed store: one file per key under a data directory.
//!
//! Writes go to a temp file that is fsynced and renamed over the target, so a
//! crash never leaves a half-written value behind.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::KeyValueStore;
use super::error::{StoreError, StoreResult};

const VALUE_EXTENSION: &str = "value";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a key to its file. `:` is common in keys but not portable in file
    /// names, so it becomes `_`; anything else outside `[A-Za-z0-9._-]` is
    /// rejected.
    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() || key.starts_with('.') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let mut name = String::with_capacity(key.len());
        for c in key.chars() {
            match c {
                ':' => name.push('_'),
                c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => name.push(c),
                _ => return Err(StoreError::InvalidKey(key.to_string())),
            }
        }

        Ok(self.dir.join(format!("{name}.{VALUE_EXTENSION}")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::file_io(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::file_io(&self.dir, e))?;
        atomic_write_file(&path, value.as_bytes())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::file_io(&path, e)),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::file_io(&self.dir, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::file_io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(VALUE_EXTENSION) {
                fs::remove_file(&path).map_err(|e| StoreError::file_io(&path, e))?;
            }
        }
        Ok(())
    }
}

/// Write data to a temp file, fsync it, then atomically rename to the final path.
///
/// The temp file name carries a ULID so concurrent writers targeting the same
/// key never share a temp file.
fn atomic_write_file(final_path: &Path, data: &[u8]) -> StoreResult<()> {
    let file_name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("value");
    let temp_path = final_path.with_file_name(format!("{}.{}.tmp", file_name, ulid::Ulid::new()));

    let mut file = fs::File::create(&temp_path).map_err(|e| StoreError::file_io(&temp_path, e))?;
    file.write_all(data)
        .map_err(|e| StoreError::file_io(&temp_path, e))?;
    file.sync_all()
        .map_err(|e| StoreError::file_io(&temp_path, e))?;
    fs::rename(&temp_path, final_path).map_err(|e| StoreError::file_io(final_path, e))?;
    Ok(())
}
