//! In-process data-flow result cache, keyed by content hash.
//!
//! Data-flow extraction is the most expensive pass, so its results are cached
//! by `(path, content_hash)` and survive restarts: each entry persists as its
//! own JSON file under `<workspace>/.nerd/cache/dataflow/`, named by a hash
//! of the path to sidestep filesystem path-length limits. A format-version
//! bump invalidates stale entries on load.

use crate::facts::{facts_from_json, facts_to_json, Fact};
use crate::fingerprint::{content_hash, now_secs, path_hash};
use crate::manifest::CACHE_DIR;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Bump when the emitted data-flow fact shapes change.
pub const DATAFLOW_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    file_path: String,
    file_hash: String,
    facts: serde_json::Value,
    timestamp: i64,
    version: u32,
}

pub struct DataflowCache {
    entries: DashMap<String, (String, Vec<Fact>)>,
    dirty: DashMap<String, ()>,
    dir: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DataflowCache {
    pub fn new(workspace_root: &Path) -> DataflowCache {
        DataflowCache {
            entries: DashMap::new(),
            dirty: DashMap::new(),
            dir: workspace_root.join(CACHE_DIR).join("dataflow"),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return cached facts when the stored hash matches `bytes`; otherwise run
    /// `compute`, cache its output, and return it.
    pub fn get_or_compute<F>(&self, rel_path: &str, bytes: &[u8], compute: F) -> Vec<Fact>
    where
        F: FnOnce() -> Vec<Fact>,
    {
        let hash = content_hash(bytes);
        if let Some(facts) = self.lookup_hashed(rel_path, &hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return facts;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let facts = compute();
        self.store_hashed(rel_path, hash, facts.clone());
        facts
    }

    /// Cache lookup without compute.
    pub fn lookup(&self, rel_path: &str, bytes: &[u8]) -> Option<Vec<Fact>> {
        self.lookup_hashed(rel_path, &content_hash(bytes))
    }

    /// Store facts for a path directly.
    pub fn store(&self, rel_path: &str, bytes: &[u8], facts: Vec<Fact>) {
        self.store_hashed(rel_path, content_hash(bytes), facts);
    }

    fn lookup_hashed(&self, rel_path: &str, hash: &str) -> Option<Vec<Fact>> {
        if let Some(entry) = self.entries.get(rel_path) {
            let (stored_hash, facts) = entry.value();
            if stored_hash == hash {
                return Some(facts.clone());
            }
            return None;
        }
        // Cold map: try the on-disk copy.
        let loaded = self.load_from_disk(rel_path)?;
        let hit = loaded.0 == hash;
        let facts = loaded.1.clone();
        self.entries.insert(rel_path.to_string(), loaded);
        if hit {
            Some(facts)
        } else {
            None
        }
    }

    fn store_hashed(&self, rel_path: &str, hash: String, facts: Vec<Fact>) {
        self.entries.insert(rel_path.to_string(), (hash, facts));
        self.dirty.insert(rel_path.to_string(), ());
    }

    /// Drop a single entry, including its on-disk copy.
    pub fn invalidate(&self, rel_path: &str) {
        self.entries.remove(rel_path);
        self.dirty.remove(rel_path);
        let _ = std::fs::remove_file(self.entry_path(rel_path));
    }

    /// Drop every entry and the whole on-disk cache directory.
    pub fn invalidate_all(&self) {
        self.entries.clear();
        self.dirty.clear();
        let _ = std::fs::remove_dir_all(&self.dir);
    }

    /// Write all dirty entries to disk. Failures are logged and skipped; the
    /// cache is an optimization, not a source of truth.
    pub fn persist(&self) {
        if self.dirty.is_empty() {
            return;
        }
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("failed to create dataflow cache dir: {e}");
            return;
        }
        let dirty: Vec<String> = self.dirty.iter().map(|e| e.key().clone()).collect();
        for rel_path in dirty {
            let Some(entry) = self.entries.get(&rel_path) else {
                self.dirty.remove(&rel_path);
                continue;
            };
            let (hash, facts) = entry.value();
            let record = CacheEntry {
                file_path: rel_path.clone(),
                file_hash: hash.clone(),
                facts: facts_to_json(facts),
                timestamp: now_secs(),
                version: DATAFLOW_FORMAT_VERSION,
            };
            drop(entry);
            let path = self.entry_path(&rel_path);
            match serde_json::to_string(&record) {
                Ok(json) => {
                    let tmp = path.with_extension(format!("json.tmp.{}", std::process::id()));
                    if std::fs::write(&tmp, json).is_ok()
                        && std::fs::rename(&tmp, &path).is_ok()
                    {
                        self.dirty.remove(&rel_path);
                    } else {
                        let _ = std::fs::remove_file(&tmp);
                        warn!("failed to persist dataflow cache entry for {rel_path}");
                    }
                }
                Err(e) => warn!("failed to serialize dataflow cache entry for {rel_path}: {e}"),
            }
        }
    }

    fn load_from_disk(&self, rel_path: &str) -> Option<(String, Vec<Fact>)> {
        let path = self.entry_path(rel_path);
        let content = std::fs::read_to_string(&path).ok()?;
        let record: CacheEntry = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(e) => {
                debug!("corrupt dataflow cache entry {}: {e}", path.display());
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };
        if record.version != DATAFLOW_FORMAT_VERSION || record.file_path != rel_path {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        let facts = facts_from_json(&record.facts).ok()?;
        Some((record.file_hash, facts))
    }

    fn entry_path(&self, rel_path: &str) -> PathBuf {
        self.dir.join(format!("{}.json", &path_hash(rel_path)[..16]))
    }

    /// `(hits, misses, hit_rate_percent)`.
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let rate = if total == 0 { 0.0 } else { hits as f64 / total as f64 * 100.0 };
        (hits, misses, rate)
    }
}
