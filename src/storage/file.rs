use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use uuid::Uuid;

use super::{KeyValueStore, StoreKind};
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// A [`KeyValueStore`] kept in a JSON object file.
///
/// Entries are cached in memory and the whole file is rewritten on every
/// mutation, so a write that returns `Ok` is on disk. The file is replaced
/// through a rename, so a crash mid-write leaves the previous contents.
///
/// Each mutation first folds in what is on disk, so two stores sharing a
/// file keep each other's keys. Reads are served from the cache and do not
/// see the other store's writes until the next mutation or reopen.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    kind: StoreKind,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the durable store at `path`.
    pub fn durable(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), StoreKind::Durable)
    }

    /// Open (or create) the store for one session under `dir`.
    ///
    /// The file is named after `session_id` and deleted by [`KeyValueStore::release`].
    pub fn session(dir: impl AsRef<Path>, session_id: &Uuid) -> Result<Self> {
        let path = dir.as_ref().join(format!("session-{session_id}.json"));
        Self::open(path, StoreKind::Session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: PathBuf, kind: StoreKind) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::storage("create dir", parent, e))?;
        }

        let entries = read_entries(&path)?.unwrap_or_default();

        debug!("Opened {} store at {}", kind, path.display());
        Ok(Self {
            path,
            kind,
            entries: Mutex::new(entries),
        })
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick up keys written to the same file by another store.
    fn sync(&self, entries: &mut BTreeMap<String, String>) -> Result<()> {
        if let Some(on_disk) = read_entries(&self.path)? {
            *entries = on_disk;
        }
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let text = serde_json::to_string_pretty(entries).map_err(Error::JsonDump)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, text).map_err(|e| Error::storage("write", &temp, e))?;
        fs::rename(&temp, &self.path).map_err(|e| Error::storage("rename", &self.path, e))
    }
}

/// `None` when the file is missing or unreadable as a JSON object.
fn read_entries(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(entries) => Ok(Some(entries)),
            Err(e) => {
                warn!("Discarding unreadable store {}: {}", path.display(), e);
                Ok(None)
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::storage("read", path, e)),
    }
}

impl KeyValueStore for FileStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries();
        self.sync(&mut entries)?;
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&entries) {
            // keep memory and disk in agreement
            match previous {
                Some(prev) => entries.insert(key.to_string(), prev),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut entries = self.entries();
        self.sync(&mut entries)?;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn release(&self) -> Result<()> {
        if self.kind != StoreKind::Session {
            return Ok(());
        }
        self.entries().clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage("remove", &self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::durable(&path).unwrap();
        store.set_item("k", "{\"V\":1}").unwrap();
        drop(store);

        let reopened = FileStore::durable(&path).unwrap();
        assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("{\"V\":1}"));
        assert_eq!(reopened.kind(), StoreKind::Durable);
    }

    #[test]
    fn test_remove_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::durable(&path).unwrap();
        store.set_item("k", "v").unwrap();
        store.remove_item("k").unwrap();
        store.remove_item("missing").unwrap();

        let reopened = FileStore::durable(&path).unwrap();
        assert_eq!(reopened.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::durable(&path).unwrap();
        assert_eq!(store.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_write_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::durable(&path).unwrap();
        store.set_item("a", "1").unwrap();
        store.set_item("b", "2").unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let on_disk: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[test]
    fn test_stale_temp_file_does_not_affect_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::durable(&path).unwrap();
        store.set_item("k", "v").unwrap();
        drop(store);
        // left behind by a write that never reached the rename
        fs::write(path.with_extension("json.tmp"), "{\"k\": \"trunc").unwrap();

        let reopened = FileStore::durable(&path).unwrap();
        assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("v"));
        reopened.set_item("j", "w").unwrap();
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_shared_file_keeps_both_writers_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = FileStore::durable(&path).unwrap();
        let second = FileStore::durable(&path).unwrap();
        first.set_item("ip", "1").unwrap();
        second.set_item("user", "2").unwrap();
        assert_eq!(first.get_item("user").unwrap(), None);
        first.remove_item("missing").unwrap();
        assert_eq!(first.get_item("user").unwrap().as_deref(), Some("2"));

        let reopened = FileStore::durable(&path).unwrap();
        assert_eq!(reopened.get_item("ip").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get_item("user").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_session_release_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();

        let store = FileStore::session(dir.path(), &id).unwrap();
        store.set_item("k", "v").unwrap();
        assert!(store.path().exists());

        let same_session = FileStore::session(dir.path(), &id).unwrap();
        assert_eq!(same_session.get_item("k").unwrap().as_deref(), Some("v"));

        store.release().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_durable_release_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::durable(dir.path().join("store.json")).unwrap();
        store.set_item("k", "v").unwrap();
        store.release().unwrap();
        assert!(store.path().exists());
    }
}
