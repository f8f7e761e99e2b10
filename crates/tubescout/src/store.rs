//! Append-only, deduplicated key files.
//!
//! Each key file is plain UTF-8 text: an optional header line equal to the
//! key column name, then one key per line. Lines are only ever appended.
//!
//! The store keeps an in-memory mirror of every file it has touched. All
//! reads and appends go through one store-wide mutex, so the
//! check-then-append cycle is atomic with respect to every worker sharing
//! this store. If a file's length differs from what the mirror last saw
//! (another process appended, or the file was replaced), the mirror is
//! rebuilt from disk before the membership check.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::types::{HarvestError, HarvestResult};

/// Mirror of one key file.
struct KeySet {
    keys: HashSet<String>,
    /// File length when `keys` was last known to match the disk.
    synced_len: u64,
}

/// Shared, file-backed set of deduplication keys.
pub struct KeyStore {
    dir: PathBuf,
    files: Mutex<HashMap<PathBuf, KeySet>>,
}

impl KeyStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> HarvestResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the key file `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Scan the key file and return its distinct keys.
    ///
    /// A missing file is an empty set. The scan also seeds the in-memory
    /// mirror used by `append`.
    pub fn load(&self, name: &str, key_column: &str) -> HarvestResult<HashSet<String>> {
        let path = self.path_for(name);
        let mut files = self.lock()?;
        let set = sync_mirror(&mut files, &path, key_column, true)?;

        if !set.keys.is_empty() {
            tracing::info!("Loaded {} existing keys from {}", set.keys.len(), path.display());
        }
        Ok(set.keys.clone())
    }

    /// Number of distinct keys currently in the key file.
    pub fn count(&self, name: &str, key_column: &str) -> HarvestResult<usize> {
        let path = self.path_for(name);
        let mut files = self.lock()?;
        Ok(sync_mirror(&mut files, &path, key_column, false)?.keys.len())
    }

    /// Append keys to the key file, returning how many lines were written.
    ///
    /// With `deduplicate`, keys already present on disk and repeats within
    /// `candidates` are skipped. Without it every valid candidate is written.
    /// Keys are trimmed first, matching how `load` reads them back. Empty
    /// keys, keys containing line breaks, and keys equal to the header token
    /// are never written.
    pub fn append(
        &self,
        candidates: &[String],
        name: &str,
        key_column: &str,
        deduplicate: bool,
    ) -> HarvestResult<usize> {
        let path = self.path_for(name);
        let mut files = self.lock()?;
        let set = sync_mirror(&mut files, &path, key_column, false)?;

        let mut batch = HashSet::new();
        let new_items: Vec<&str> = candidates
            .iter()
            .map(|key| key.trim())
            .filter(|key| is_writable(key, key_column))
            .filter(|key| !deduplicate || (!set.keys.contains(*key) && batch.insert(*key)))
            .collect();

        if new_items.is_empty() {
            return Ok(0);
        }

        let write_header = set.synced_len == 0;
        let mut buf = String::new();
        if set.synced_len > 0 && !ends_with_newline(&path)? {
            // A torn trailing line must not swallow the first new key.
            buf.push('\n');
        }
        if write_header {
            buf.push_str(key_column);
            buf.push('\n');
        }
        for item in &new_items {
            buf.push_str(item);
            buf.push('\n');
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(buf.as_bytes())?;
        file.flush()?;

        set.synced_len += buf.len() as u64;
        set.keys.extend(new_items.iter().map(|k| k.to_string()));

        tracing::debug!("Appended {} keys to {}", new_items.len(), path.display());
        Ok(new_items.len())
    }

    fn lock(&self) -> HarvestResult<MutexGuard<'_, HashMap<PathBuf, KeySet>>> {
        self.files
            .lock()
            .map_err(|_| HarvestError::Storage("key store lock poisoned".to_string()))
    }
}

/// Bring the mirror for `path` in line with the disk and return it.
fn sync_mirror<'a>(
    files: &'a mut HashMap<PathBuf, KeySet>,
    path: &Path,
    key_column: &str,
    force: bool,
) -> HarvestResult<&'a mut KeySet> {
    let disk_len = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };

    let stale = force
        || files
            .get(path)
            .map_or(true, |set| set.synced_len != disk_len);

    if stale {
        let keys = scan_keys(path, key_column)?;
        files.insert(
            path.to_path_buf(),
            KeySet {
                keys,
                synced_len: disk_len,
            },
        );
    }

    files
        .get_mut(path)
        .ok_or_else(|| HarvestError::Storage(format!("no mirror for {}", path.display())))
}

/// Read every key line of `path`, skipping blanks and the header token.
fn scan_keys(path: &Path, key_column: &str) -> HarvestResult<HashSet<String>> {
    let mut keys = HashSet::new();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
        Err(e) => return Err(e.into()),
    };

    for line in BufReader::new(file).lines() {
        let line = line?;
        let value = line.trim();
        if !value.is_empty() && value != key_column {
            keys.insert(value.to_string());
        }
    }
    Ok(keys)
}

fn is_writable(key: &str, key_column: &str) -> bool {
    if key.is_empty() || key == key_column {
        return false;
    }
    if key.contains(['\n', '\r']) {
        tracing::warn!("Skipping key with a line break: {key:?}");
        return false;
    }
    true
}

fn ends_with_newline(path: &Path) -> HarvestResult<bool> {
    let mut file = File::open(path)?;
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
