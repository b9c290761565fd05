//! Persistent file manifest: the scanner's memory of the last walk.
//!
//! Maps workspace-relative paths to `(hash, mod_time, size)`. The backing
//! JSON document lives at `<workspace>/.nerd/cache/manifest.json`, is marked
//! dirty on every update, and is written atomically (temp file + rename) when
//! a scan completes cleanly. A missing or corrupt manifest is a cold start,
//! never an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::warn;

/// Directory under the workspace root that holds all engine caches.
pub const CACHE_DIR: &str = ".nerd/cache";

/// One manifest entry: content identity plus the change-detection pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub hash: String,
    pub mod_time: i64,
    pub size: u64,
}

impl ManifestEntry {
    pub fn fingerprint(&self) -> String {
        crate::fingerprint::fingerprint(self.size, self.mod_time)
    }
}

/// The manifest cache. Snapshot reads take the read lock; updates and the
/// final save take the write lock. No lock is held across file I/O on scanned
/// content.
pub struct FileManifest {
    entries: RwLock<HashMap<String, ManifestEntry>>,
    dirty: AtomicBool,
    path: PathBuf,
}

impl FileManifest {
    /// Load the manifest for a workspace, treating missing or corrupt backing
    /// files as empty.
    pub fn load(workspace_root: &Path) -> FileManifest {
        let path = workspace_root.join(CACHE_DIR).join("manifest.json");
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, ManifestEntry>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("corrupt manifest at {} ({e}); starting cold", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        FileManifest { entries: RwLock::new(entries), dirty: AtomicBool::new(false), path }
    }

    /// Build an empty manifest rooted at the given workspace (tests).
    pub fn empty(workspace_root: &Path) -> FileManifest {
        FileManifest {
            entries: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            path: workspace_root.join(CACHE_DIR).join("manifest.json"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn get(&self, rel_path: &str) -> Option<ManifestEntry> {
        self.entries.read().unwrap().get(rel_path).cloned()
    }

    /// Snapshot of the full map, taken under the read lock.
    pub fn snapshot(&self) -> HashMap<String, ManifestEntry> {
        self.entries.read().unwrap().clone()
    }

    pub fn insert(&self, rel_path: &str, entry: ManifestEntry) {
        self.entries.write().unwrap().insert(rel_path.to_string(), entry);
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn remove(&self, rel_path: &str) {
        if self.entries.write().unwrap().remove(rel_path).is_some() {
            self.dirty.store(true, Ordering::Relaxed);
        }
    }

    /// Write the manifest to disk atomically. A no-op when nothing changed
    /// since the last save. Save failures are logged, not propagated: the
    /// manifest is a cache, and the next scan recovers by re-hashing.
    pub fn save(&self) {
        if !self.dirty.load(Ordering::Relaxed) {
            return;
        }

        let entries = self.entries.write().unwrap();
        let json = match serde_json::to_string_pretty(&*entries) {
            Ok(j) => j,
            Err(e) => {
                warn!("failed to serialize manifest: {e}");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("failed to create cache directory {}: {e}", parent.display());
                return;
            }
            set_dir_permissions(parent);
        }

        let pid = std::process::id();
        let tmp_path = self.path.with_extension(format!("json.tmp.{pid}"));

        if let Err(e) = std::fs::write(&tmp_path, &json) {
            warn!("failed to write manifest temp file: {e}");
            return;
        }
        set_file_permissions(&tmp_path);

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            warn!("failed to rename manifest into place: {e}");
            let _ = std::fs::remove_file(&tmp_path);
            return;
        }

        self.dirty.store(false, Ordering::Relaxed);
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644));
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) {}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755));
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) {}
