use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::ids::validate_identifier_value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store key `{key}`: {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Keyed whole-object JSON store under a state root. Writes are atomic so a
/// crashed flush never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct BlobStore {
    state_root: PathBuf,
}

impl BlobStore {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        let body = serde_json::to_vec_pretty(value).map_err(|e| json_error(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| io_error(&path, e))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.key_path(key)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| json_error(&path, e))
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_identifier_value("store key", key).map_err(|reason| StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })?;
        Ok(self.state_root.join("state").join(format!("{key}.json")))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> StoreError {
    StoreError::Json {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        name: String,
        count: u64,
    }

    #[test]
    fn save_then_load_round_trips_the_blob() {
        let dir = tempdir().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let snapshot = Snapshot {
            name: "campaigns".to_string(),
            count: 3,
        };
        store.save("campaign-state", &snapshot).expect("save");
        let loaded: Option<Snapshot> = store.load("campaign-state").expect("load");
        assert_eq!(loaded, Some(snapshot));
    }

    #[test]
    fn missing_key_loads_as_none() {
        let dir = tempdir().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let loaded: Option<Snapshot> = store.load("absent").expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn keys_with_path_separators_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let err = store.save("../escape", &1u32).expect_err("invalid key");
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }
}
