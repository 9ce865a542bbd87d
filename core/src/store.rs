use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Key-value document store backing the client state, one JSON file per key.
///
/// There is no cross-process coordination: two stores pointed at the same
/// root overwrite each other and the last write wins.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: PathBuf) -> Self {
        fs::create_dir_all(&root).ok();
        Self { root }
    }

    pub fn in_memory() -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("deepdesk-{}", Uuid::new_v4()));
        Self::new(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Returns `Ok(None)` when the key was never written or holds a document
    /// that no longer deserializes.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.key_path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(%err, key, "discarding unreadable snapshot");
                Ok(None)
            }
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.key_path(key);
        let staging = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        let serialized = serde_json::to_vec_pretty(value)?;
        fs::write(&staging, serialized)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
