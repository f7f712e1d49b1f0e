//! Storage for the rasters produced and consumed by a run.
//!
//! Rasters are addressed by [`RasterKey`], a relative path such as
//! `intermediate/stocks-soil-2010.bcr`. Once a raster is written it is treated
//! as immutable and may be read concurrently by any number of tasks.

use crate::codec;
use crate::errors::{CarbonError, CarbonResult};
use crate::raster::Raster;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use xxhash_rust::xxh3::xxh3_64;

/// Name of the task graph cache manifest inside a store.
pub const MANIFEST_NAME: &str = "taskgraph_cache/manifest.json";

/// Location of a raster within a [`RasterStore`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RasterKey(String);

impl RasterKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RasterKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RasterKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Persistent storage for encoded rasters and the task cache manifest.
pub trait RasterStore: Debug + Send + Sync {
    /// Read the encoded bytes stored under `key`.
    fn read_bytes(&self, key: &RasterKey) -> CarbonResult<Vec<u8>>;

    /// Store encoded bytes under `key`, replacing anything already there.
    fn write_bytes(&self, key: &RasterKey, bytes: &[u8]) -> CarbonResult<()>;

    fn exists(&self, key: &RasterKey) -> bool;

    fn read(&self, key: &RasterKey) -> CarbonResult<Raster> {
        codec::decode(&self.read_bytes(key)?)
    }

    fn write(&self, key: &RasterKey, raster: &Raster) -> CarbonResult<()> {
        self.write_bytes(key, &codec::encode(raster))
    }

    /// Content fingerprint of the raster stored under `key`.
    fn fingerprint(&self, key: &RasterKey) -> CarbonResult<u64> {
        Ok(xxh3_64(&self.read_bytes(key)?))
    }

    /// The task cache manifest, if one has been written.
    fn read_manifest(&self) -> CarbonResult<Option<String>> {
        let key = RasterKey::new(MANIFEST_NAME);
        if !self.exists(&key) {
            return Ok(None);
        }
        let bytes = self.read_bytes(&key)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| CarbonError::Codec(format!("manifest is not UTF-8: {}", e)))
    }

    fn write_manifest(&self, contents: &str) -> CarbonResult<()> {
        self.write_bytes(&RasterKey::new(MANIFEST_NAME), contents.as_bytes())
    }
}

/// A store held entirely in memory. Useful for tests and small runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<RasterKey, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of every stored item, sorted.
    pub fn keys(&self) -> Vec<RasterKey> {
        let mut keys: Vec<_> = self
            .files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Remove an item, returning true if it existed.
    pub fn remove(&self, key: &RasterKey) -> bool {
        self.files
            .write()
            .map(|mut files| files.remove(key).is_some())
            .unwrap_or(false)
    }
}

impl RasterStore for MemoryStore {
    fn read_bytes(&self, key: &RasterKey) -> CarbonResult<Vec<u8>> {
        let files = self
            .files
            .read()
            .map_err(|_| CarbonError::Error("memory store lock poisoned".to_string()))?;
        files
            .get(key)
            .cloned()
            .ok_or_else(|| CarbonError::RasterNotFound(key.to_string()))
    }

    fn write_bytes(&self, key: &RasterKey, bytes: &[u8]) -> CarbonResult<()> {
        let mut files = self
            .files
            .write()
            .map_err(|_| CarbonError::Error("memory store lock poisoned".to_string()))?;
        files.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, key: &RasterKey) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(key))
            .unwrap_or(false)
    }
}

/// A store rooted at a workspace directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> CarbonResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &RasterKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

/// Write `data` to `path` via a temporary file and a rename, so a crash
/// mid-write never leaves a truncated file at `path`.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)
}

impl RasterStore for DirectoryStore {
    fn read_bytes(&self, key: &RasterKey) -> CarbonResult<Vec<u8>> {
        let path = self.path_of(key);
        if !path.exists() {
            return Err(CarbonError::RasterNotFound(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn write_bytes(&self, key: &RasterKey, bytes: &[u8]) -> CarbonResult<()> {
        Ok(atomic_write(&self.path_of(key), bytes)?)
    }

    fn exists(&self, key: &RasterKey) -> bool {
        self.path_of(key).is_file()
    }
}
