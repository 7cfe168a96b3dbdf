//! Filesystem-backed plugin storage.
//!
//! # Layout
//!
//! | Path | Content |
//! |------|---------|
//! | `<root>/plugins/<id>.json` | One [`PluginRecord`] per installed plugin |
//! | `<root>/data/<id>/`        | Private data directory of the plugin |
//!
//! Records are written to a temporary file and renamed into place, so a
//! crash never leaves a half-written record behind.
//!
//! A storage root can be claimed by one framework at a time per process.
//! The claim is released by [`close`](PluginStorage::close) or when the
//! storage is dropped.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use plinth_core::{PluginId, PluginRecord, StorageError, StorageResult};

use super::PluginStorage;

/// Canonical roots currently claimed in this process.
static CLAIMED: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

const RECORDS_DIR: &str = "plugins";
const DATA_DIR: &str = "data";

/// Guard for a claimed root; releases it on drop.
#[derive(Debug)]
struct Claim {
    canonical: PathBuf,
}

impl Claim {
    fn acquire(canonical: PathBuf) -> StorageResult<Self> {
        if CLAIMED.lock().insert(canonical.clone()) {
            Ok(Self { canonical })
        } else {
            Err(StorageError::Locked(canonical))
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        CLAIMED.lock().remove(&self.canonical);
    }
}

/// [`PluginStorage`] that keeps everything below one root directory.
#[derive(Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
    claim: Mutex<Option<Claim>>,
}

impl DirectoryStorage {
    /// Creates a storage rooted at `root`. Nothing touches the disk until
    /// [`open`](PluginStorage::open).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            claim: Mutex::new(None),
        }
    }

    /// The configured root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn records_dir(&self) -> PathBuf {
        self.root.join(RECORDS_DIR)
    }

    fn record_path(&self, id: PluginId) -> PathBuf {
        self.records_dir().join(format!("{}.json", id.0))
    }

    fn data_path(&self, id: PluginId) -> PathBuf {
        self.root.join(DATA_DIR).join(id.0.to_string())
    }

    fn read_record(path: &Path) -> StorageResult<PluginRecord> {
        let bytes = fs::read(path).map_err(|e| StorageError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Serde {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `remove_*` that treats "already gone" as success.
fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl PluginStorage for DirectoryStorage {
    fn open(&self) -> StorageResult<bool> {
        let mut claim = self.claim.lock();
        if claim.is_some() {
            return Ok(false);
        }

        let fresh = !self.root.exists();
        fs::create_dir_all(&self.root).map_err(|e| StorageError::io(&self.root, e))?;
        if !self.root.is_dir() {
            return Err(StorageError::Inaccessible {
                path: self.root.clone(),
                reason: "not a directory".into(),
            });
        }

        let canonical = self
            .root
            .canonicalize()
            .map_err(|e| StorageError::io(&self.root, e))?;
        let acquired = match Claim::acquire(canonical) {
            Ok(c) => c,
            Err(e) => {
                if fresh {
                    // Nobody else can be using what we just created.
                    let _ = fs::remove_dir_all(&self.root);
                }
                return Err(e);
            }
        };

        for dir in [self.records_dir(), self.root.join(DATA_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }

        debug!(root = %self.root.display(), fresh, "Directory storage opened");
        *claim = Some(acquired);
        Ok(fresh)
    }

    fn list_installed(&self) -> StorageResult<Vec<PluginRecord>> {
        let dir = self.records_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StorageError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            records.push(Self::read_record(&path)?);
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn persist(&self, record: &PluginRecord) -> StorageResult<()> {
        let path = self.record_path(record.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record).map_err(|source| StorageError::Serde {
            path: path.clone(),
            source,
        })?;
        fs::write(&tmp, bytes).map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(&path, e))
    }

    fn remove(&self, id: PluginId) -> StorageResult<()> {
        let record = self.record_path(id);
        ignore_missing(fs::remove_file(&record)).map_err(|e| StorageError::io(&record, e))?;
        let data = self.data_path(id);
        ignore_missing(fs::remove_dir_all(&data)).map_err(|e| StorageError::io(&data, e))
    }

    fn data_dir_for(&self, id: PluginId) -> StorageResult<PathBuf> {
        let dir = self.data_path(id);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        Ok(dir)
    }

    fn close(&self, purge: bool) -> StorageResult<()> {
        let released = self.claim.lock().take();
        if released.is_none() {
            warn!(root = %self.root.display(), "Closing storage that was not open");
        }
        if purge {
            debug!(root = %self.root.display(), "Deleting storage directory");
            ignore_missing(fs::remove_dir_all(&self.root))
                .map_err(|e| StorageError::io(&self.root, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::Version;

    fn record(id: u64, name: &str) -> PluginRecord {
        PluginRecord {
            id: PluginId(id),
            name: name.into(),
            version: Version::new(1, 0, 0),
            requirements: Vec::new(),
            location: None,
            auto_start: false,
        }
    }

    #[test]
    fn test_open_reports_fresh_area() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("fw");

        let storage = DirectoryStorage::new(&root);
        assert!(storage.open().unwrap());
        storage.close(false).unwrap();

        let again = DirectoryStorage::new(&root);
        assert!(!again.open().unwrap());
        again.close(false).unwrap();
    }

    #[test]
    fn test_second_claim_is_locked() {
        let tmp = tempfile::tempdir().unwrap();
        let first = DirectoryStorage::new(tmp.path());
        let second = DirectoryStorage::new(tmp.path());

        first.open().unwrap();
        assert!(matches!(second.open(), Err(StorageError::Locked(_))));

        first.close(false).unwrap();
        assert!(second.open().is_ok());
    }

    #[test]
    fn test_claim_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let storage = DirectoryStorage::new(tmp.path());
            storage.open().unwrap();
        }
        let storage = DirectoryStorage::new(tmp.path());
        assert!(storage.open().is_ok());
    }

    #[test]
    fn test_persist_list_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new(tmp.path());
        storage.open().unwrap();

        storage.persist(&record(2, "b")).unwrap();
        storage.persist(&record(1, "a")).unwrap();
        let names: Vec<_> = storage
            .list_installed()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["a", "b"]);

        let data = storage.data_dir_for(PluginId(1)).unwrap();
        fs::write(data.join("state.bin"), b"x").unwrap();
        storage.remove(PluginId(1)).unwrap();
        assert!(!data.exists());
        assert_eq!(storage.list_installed().unwrap().len(), 1);

        // Removing twice is fine.
        storage.remove(PluginId(1)).unwrap();
    }

    #[test]
    fn test_data_dir_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new(tmp.path());
        storage.open().unwrap();
        let a = storage.data_dir_for(PluginId(9)).unwrap();
        let b = storage.data_dir_for(PluginId(9)).unwrap();
        assert_eq!(a, b);
        assert!(a.is_dir());
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new(tmp.path());
        storage.open().unwrap();
        fs::write(tmp.path().join("plugins").join("3.json"), b"{ nope").unwrap();
        assert!(matches!(
            storage.list_installed(),
            Err(StorageError::Serde { .. })
        ));
    }

    #[test]
    fn test_close_with_purge_deletes_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("fw");
        let storage = DirectoryStorage::new(&root);
        storage.open().unwrap();
        storage.persist(&record(1, "a")).unwrap();
        storage.close(true).unwrap();
        assert!(!root.exists());
    }
}
