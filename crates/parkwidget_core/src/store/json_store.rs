//! JSON-file key/value store used as the read fallback cache.
//!
//! # Invariants
//! - A missing file is an empty store, not a failure.
//! - Writes replace the file through a temp file + rename, so readers see
//!   the old map or the new map and never a partially written one.

use super::{KeyValueStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Flat JSON object (`{"key": "value"}`) persisted in one file.
#[derive(Debug)]
pub struct JsonFileKvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn load(&self) -> StoreResult<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt(err.to_string()))
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> StoreResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Corrupt("fallback write lock poisoned".to_string()))?;

        // A corrupt cache is rebuilt from this write rather than blocking it.
        let mut map = match self.load() {
            Ok(map) => map,
            Err(StoreError::Corrupt(_)) => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        apply(&mut map);

        let payload =
            serde_json::to_string_pretty(&map).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, payload)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileKvStore {
    fn label(&self) -> &'static str {
        "json_file"
    }

    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<String>>> {
        let map = self.load()?;
        Ok(keys.iter().map(|key| map.get(*key).cloned()).collect())
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::JsonFileKvStore;
    use crate::store::{KeyValueStore, StoreError};

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileKvStore::new(dir.path().join("fallback.json"));

        assert_eq!(store.get_many(&["location"]).unwrap(), vec![None]);
    }

    #[test]
    fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fallback.json");
        JsonFileKvStore::new(&path)
            .put_many(&[("location", "지하 2층"), ("locationTimestamp", "42")])
            .unwrap();

        let reopened = JsonFileKvStore::new(&path);
        assert_eq!(
            reopened.get_many(&["locationTimestamp", "location"]).unwrap(),
            vec![Some("42".to_string()), Some("지하 2층".to_string())]
        );
    }

    #[test]
    fn corrupt_file_is_reported_on_read_and_rebuilt_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileKvStore::new(dir.path().join("fallback.json"));
        std::fs::write(store.path(), "{not json").unwrap();

        let err = store.get_many(&["location"]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));

        store.put_many(&[("location", "지상 1층")]).unwrap();
        assert_eq!(
            store.get_many(&["location"]).unwrap(),
            vec![Some("지상 1층".to_string())]
        );
    }
}
