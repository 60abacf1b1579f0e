// src/watch/hash.rs

//! Content-hash cache used by the image optimiser.
//!
//! A source whose content hash matches the stored entry (and whose output
//! still exists) has already been optimised and is skipped. Tasks read the
//! whole table once per run and write it back once at the end.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

use crate::fs::FileSystem;

/// File name of the image cache inside the configured cache directory.
pub const IMAGE_CACHE_FILE: &str = "images";

/// Hash arbitrary bytes.
pub fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

/// Content hashes keyed by root-relative source path.
pub type HashTable = BTreeMap<String, String>;

/// Abstract storage for content hashes keyed by source path.
pub trait HashStore: Send + Sync + fmt::Debug {
    fn load_all(&self) -> Result<HashTable>;
    /// Replace the stored table with `table`.
    fn save_all(&mut self, table: &HashTable) -> Result<()>;
    /// Remove every stored hash.
    fn clear(&mut self) -> Result<()>;

    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_all()?.get(key).cloned())
    }
}

/// Hash store shared between tasks.
pub type SharedHashStore = Arc<Mutex<Box<dyn HashStore>>>;

/// Wrap a store for sharing.
pub fn shared(store: impl HashStore + 'static) -> SharedHashStore {
    Arc::new(Mutex::new(Box::new(store)))
}

/// Stores hashes in `<dir>/images`, one `path hash` pair per line.
pub struct FileHashStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for FileHashStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHashStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileHashStore {
    pub fn new(dir: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: dir.as_ref().join(IMAGE_CACHE_FILE),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HashStore for FileHashStore {
    fn load_all(&self) -> Result<HashTable> {
        if !self.fs.is_file(&self.path) {
            return Ok(HashTable::new());
        }

        let contents = self
            .fs
            .read_to_string(&self.path)
            .with_context(|| format!("reading hash file at {:?}", self.path))?;

        let mut table = HashTable::new();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Keys may contain spaces; the hash never does.
            if let Some((key, hash)) = trimmed.rsplit_once(' ') {
                table.insert(key.to_string(), hash.to_string());
            }
        }
        Ok(table)
    }

    fn save_all(&mut self, table: &HashTable) -> Result<()> {
        let mut out = String::new();
        for (key, hash) in table {
            out.push_str(key);
            out.push(' ');
            out.push_str(hash);
            out.push('\n');
        }
        self.fs
            .write(&self.path, out.as_bytes())
            .with_context(|| format!("writing hash file at {:?}", self.path))?;
        debug!(path = ?self.path, entries = table.len(), "stored content hashes");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.fs.is_file(&self.path) {
            self.save_all(&HashTable::new())?;
            info!(path = ?self.path, "cleared content hash cache");
        }
        Ok(())
    }
}
