//! Scratch files used as implicit operator outputs.
//!
//! Files are owned by the store that issued them and live until
//! [`TempFileStore::cleanup`] or [`TempFileStore::clean_temp_dir`] removes
//! them. Dropping the store leaves them on disk. A path is never issued twice
//! by the same store.

use crate::constants::PERSISTENT_NAME_RANGE;
use crate::error::Result;
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Default)]
struct Issued {
    /// Every path handed out, created or not
    all: HashSet<PathBuf>,
    /// Files created on disk and awaiting cleanup
    owned: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct TempFileStore {
    dir: PathBuf,
    prefix: String,
    persist: AtomicBool,
    issued: Mutex<Issued>,
}

impl TempFileStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            persist: AtomicBool::new(false),
            issued: Mutex::new(Issued::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Toggle persistent naming for subsequent allocations
    pub fn set_persist(&self, persist: bool) {
        self.persist.store(persist, Ordering::Relaxed);
    }

    pub fn is_persistent(&self) -> bool {
        self.persist.load(Ordering::Relaxed)
    }

    fn issued(&self) -> MutexGuard<'_, Issued> {
        self.issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocate a fresh output path
    pub fn new_file(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        if self.is_persistent() {
            return Ok(self.persistent_name());
        }

        loop {
            let path = tempfile::Builder::new()
                .prefix(&self.prefix)
                .tempfile_in(&self.dir)?
                .into_temp_path()
                .keep()
                .map_err(|e| e.error)?;

            let mut issued = self.issued();
            if issued.all.insert(path.clone()) {
                issued.owned.push(path.clone());
                debug!("Allocated temp file {}", path.display());
                return Ok(path);
            }
        }
    }

    /// Allocate `count` fresh output paths
    pub fn new_files(&self, count: usize) -> Result<Vec<PathBuf>> {
        (0..count).map(|_| self.new_file()).collect()
    }

    /// Pseudo-random name, neither created nor scheduled for cleanup
    fn persistent_name(&self) -> PathBuf {
        let mut rng = rand::rng();
        let mut issued = self.issued();
        loop {
            let n: u32 = rng.random_range(0..PERSISTENT_NAME_RANGE);
            let path = self.dir.join(format!("{}{}", self.prefix, n));
            if !path.exists() && issued.all.insert(path.clone()) {
                debug!("Issued persistent name {}", path.display());
                return path;
            }
        }
    }

    /// Paths created by this store that have not been cleaned up
    pub fn owned_files(&self) -> Vec<PathBuf> {
        self.issued().owned.clone()
    }

    /// Remove every file this store created; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let owned = std::mem::take(&mut self.issued().owned);
        let mut removed = 0;

        for path in owned {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }

        debug!("Removed {} temp files", removed);
        removed
    }

    /// Remove regular files in the temp directory that carry this store's
    /// prefix and belong to the current user
    pub fn clean_temp_dir(&self) -> Result<usize> {
        self.clean_temp_dir_with(|path| fs::remove_file(path))
    }

    fn clean_temp_dir_with<F>(&self, remove: F) -> Result<usize>
    where
        F: FnMut(&Path) -> std::io::Result<()>,
    {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = Vec::new();
        let outcome = self.remove_tagged(&mut removed, remove);

        self.issued().owned.retain(|path| !removed.contains(path));
        debug!(
            "Cleaned {} files from {}",
            removed.len(),
            self.dir.display()
        );
        outcome.map(|()| removed.len())
    }

    /// Delete tagged files in name order, recording each one removed before
    /// any error
    fn remove_tagged<F>(&self, removed: &mut Vec<PathBuf>, mut remove: F) -> Result<()>
    where
        F: FnMut(&Path) -> std::io::Result<()>,
    {
        let entries = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in entries {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let tagged = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&self.prefix));
            if !tagged {
                continue;
            }
            let metadata = entry.metadata().map_err(std::io::Error::from)?;
            if !is_owned_by_current_user(&metadata) {
                continue;
            }

            remove(entry.path())?;
            removed.push(entry.into_path());
        }
        Ok(())
    }
}

#[cfg(unix)]
fn is_owned_by_current_user(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    metadata.uid() == nix::unistd::getuid().as_raw()
}

#[cfg(not(unix))]
fn is_owned_by_current_user(_metadata: &fs::Metadata) -> bool {
    true
}
