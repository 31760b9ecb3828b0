//! Key/value stores for the calibration record.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use doorctl_traits::KeyValueStore;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// In-memory store. Clones share the same map, so a test can keep a handle
/// and inspect what the controller saved.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    map: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map.lock().ok().and_then(|m| m.get(key).cloned())
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        if let Ok(mut m) = self.map.lock() {
            m.insert(key.to_owned(), bytes.to_vec());
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&mut self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let m = self
            .map
            .lock()
            .map_err(|_| io::Error::other("memory store poisoned"))?;
        Ok(m.get(key).cloned())
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), BoxError> {
        self.insert(key, bytes);
        Ok(())
    }
}

/// One file per key under a directory: `<dir>/<key>.bin`, replaced atomically.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let ok = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid store key {key:?}"),
            ));
        }
        Ok(self.dir.join(format!("{key}.bin")))
    }
}

/// Readers see either the old record or the new one: the bytes go to a
/// synced `.new` sibling which is then renamed over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staged = path.with_extension("new");
    let mut f = std::fs::File::create(&staged)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    std::fs::rename(staged, path)
}

impl KeyValueStore for FileStore {
    fn load(&mut self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), BoxError> {
        let path = self.path_for(key)?;
        replace_file(&path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("state")).unwrap();
        assert_eq!(store.load("calib").unwrap(), None);
        store.save("calib", &[1, 2, 3]).unwrap();
        assert_eq!(store.load("calib").unwrap(), Some(vec![1, 2, 3]));
        assert!(!dir.path().join("state").join("calib.new").exists());
    }

    #[test]
    fn file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert!(store.save("../escape", &[0]).is_err());
    }

    #[test]
    fn memory_store_clones_share() {
        let a = MemoryStore::new();
        let mut b = a.clone();
        b.save("k", b"v").unwrap();
        assert_eq!(a.get("k"), Some(b"v".to_vec()));
    }
}
