//! Object storage: where finished files go.
//!
//! Keys follow the upload convention `{unix_millis}-{file_name}`, so two
//! uploads of `dress_cropped.jpg` never collide. A store returns the public
//! URL of what it stored.

use crate::naming;
use crate::package::OutputFile;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid object key {0:?}")]
    InvalidKey(String),
    #[error("could not store {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Upload collaborator.
pub trait ObjectStore: Send + Sync {
    /// Store `file` under `key` and return its public URL.
    fn put(&self, key: &str, file: &OutputFile) -> Result<String, StoreError>;
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Upload `file` under a timestamped key.
pub fn upload(
    store: &dyn ObjectStore,
    file: &OutputFile,
    now: DateTime<Utc>,
) -> Result<StoredObject, StoreError> {
    let key = naming::storage_key(now.timestamp_millis(), file.file_name());
    let url = store.put(&key, file)?;
    info!("Stored {} ({}) at {url}", key, file.formatted_size());
    Ok(StoredObject { key, url })
}

/// Stores objects as plain files in one directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    /// `public_base` is prefixed to keys to form URLs; a trailing slash is
    /// ignored.
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// A store whose URLs are `file://` paths into `root`.
    pub fn file_urls(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let base = format!("file://{}", root.display());
        Self::new(root, base)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
        Err(StoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, file: &OutputFile) -> Result<String, StoreError> {
        validate_key(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(io_err)?;
        std::fs::write(self.root.join(key), file.bytes()).map_err(io_err)?;
        Ok(format!("{}/{key}", self.public_base))
    }
}
