use std::path::{Path, PathBuf};

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed for {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
}

impl StoreError {
    pub fn file_io(path: &Path, source: std::io::Error) -> Self {
        StoreError::FileIo {
            path: path.to_path_buf(),
            source,
        }
    }
}
