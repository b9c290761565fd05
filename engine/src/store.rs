//! Persistent per-file fact store with fast/deep depth separation.
//!
//! Backed by a local SQLite database under the workspace cache directory.
//! Facts are keyed by `(path, depth)` and stamped with the fingerprint they
//! were computed from; replacing one depth never touches the other. All
//! writers serialize on a single connection guarded by a mutex, and each
//! `replace_facts` is one transaction, so per-file updates are atomic even
//! when a scan is cancelled mid-flight.

use crate::error::ScanError;
use crate::facts::{fact_from_json, fact_to_json, Fact};
use crate::manifest::CACHE_DIR;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Scan depth tier. `fast` holds topology and the symbol graph; `deep` holds
/// the second-pass holographic facts. A file may have either without the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Fast,
    Deep,
}

impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Fast => "fast",
            Depth::Deep => "deep",
        }
    }
}

pub struct FactStore {
    conn: Mutex<Connection>,
}

impl FactStore {
    /// Open (or create) the fact store for a workspace.
    pub fn open(workspace_root: &Path) -> Result<FactStore, ScanError> {
        let dir = workspace_root.join(CACHE_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| ScanError::io(&dir, e))?;
        let conn = Connection::open(dir.join("facts.db"))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             CREATE TABLE IF NOT EXISTS files (
                 path        TEXT PRIMARY KEY,
                 lang        TEXT NOT NULL,
                 size        INTEGER NOT NULL,
                 mtime       INTEGER NOT NULL,
                 hash        TEXT NOT NULL,
                 fingerprint TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS facts (
                 path        TEXT NOT NULL,
                 depth       TEXT NOT NULL,
                 fingerprint TEXT NOT NULL,
                 seq         INTEGER NOT NULL,
                 predicate   TEXT NOT NULL,
                 args        TEXT NOT NULL,
                 PRIMARY KEY (path, depth, seq)
             );
             CREATE INDEX IF NOT EXISTS idx_facts_path ON facts (path);",
        )?;
        Ok(FactStore { conn: Mutex::new(conn) })
    }

    /// In-memory store (tests).
    pub fn open_in_memory() -> Result<FactStore, ScanError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE files (
                 path        TEXT PRIMARY KEY,
                 lang        TEXT NOT NULL,
                 size        INTEGER NOT NULL,
                 mtime       INTEGER NOT NULL,
                 hash        TEXT NOT NULL,
                 fingerprint TEXT NOT NULL
             );
             CREATE TABLE facts (
                 path        TEXT NOT NULL,
                 depth       TEXT NOT NULL,
                 fingerprint TEXT NOT NULL,
                 seq         INTEGER NOT NULL,
                 predicate   TEXT NOT NULL,
                 args        TEXT NOT NULL,
                 PRIMARY KEY (path, depth, seq)
             );",
        )?;
        Ok(FactStore { conn: Mutex::new(conn) })
    }

    /// Record or refresh file-level metadata.
    pub fn upsert_file_meta(
        &self,
        path: &str,
        lang: &str,
        size: u64,
        mtime: i64,
        hash: &str,
        fingerprint: &str,
    ) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO files (path, lang, size, mtime, hash, fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path) DO UPDATE SET
                 lang = excluded.lang,
                 size = excluded.size,
                 mtime = excluded.mtime,
                 hash = excluded.hash,
                 fingerprint = excluded.fingerprint",
            params![path, lang, size as i64, mtime, hash, fingerprint],
        )?;
        Ok(())
    }

    /// Atomically replace the facts for `(path, depth)`. Facts stored at the
    /// other depth are untouched.
    pub fn replace_facts(
        &self,
        path: &str,
        depth: Depth,
        fingerprint: &str,
        facts: &[Fact],
    ) -> Result<(), ScanError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM facts WHERE path = ?1 AND depth = ?2",
            params![path, depth.as_str()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO facts (path, depth, fingerprint, seq, predicate, args)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (seq, fact) in facts.iter().enumerate() {
                let args = serde_json::to_string(&fact_to_json(fact))?;
                stmt.execute(params![
                    path,
                    depth.as_str(),
                    fingerprint,
                    seq as i64,
                    fact.predicate,
                    args
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load the stored facts and fingerprint for `(path, depth)`, in original
    /// emission order. Returns `None` when nothing is stored.
    pub fn load_facts(
        &self,
        path: &str,
        depth: Depth,
    ) -> Result<Option<(Vec<Fact>, String)>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT fingerprint, args FROM facts
             WHERE path = ?1 AND depth = ?2 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![path, depth.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut fingerprint = String::new();
        let mut facts = Vec::new();
        for row in rows {
            let (fp, args_json) = row?;
            fingerprint = fp;
            let value: serde_json::Value = serde_json::from_str(&args_json)?;
            facts.push(fact_from_json(&value)?);
        }
        if facts.is_empty() {
            return Ok(None);
        }
        Ok(Some((facts, fingerprint)))
    }

    /// Remove a file's metadata and its facts across all depths.
    pub fn delete_file(&self, path: &str) -> Result<(), ScanError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        tx.execute("DELETE FROM facts WHERE path = ?1", params![path])?;
        tx.commit()?;
        Ok(())
    }

    /// All paths that currently have facts stored at the given depth.
    pub fn paths_at_depth(&self, depth: Depth) -> Result<Vec<String>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT DISTINCT path FROM facts WHERE depth = ?1 ORDER BY path")?;
        let rows = stmt.query_map(params![depth.as_str()], |row| row.get::<_, String>(0))?;
        let mut paths = Vec::new();
        for row in rows {
            paths.push(row?);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Value;

    fn fact(pred: &str, s: &str) -> Fact {
        Fact::new(pred, vec![Value::str(s), Value::atom("go"), Value::Int(7)])
    }

    #[test]
    fn test_replace_and_load_round_trip() {
        let store = FactStore::open_in_memory().unwrap();
        let facts = vec![fact("file_topology", "a.go"), fact("code_element", "go:a.go:main")];
        store.replace_facts("a.go", Depth::Fast, "10:100", &facts).unwrap();

        let (loaded, fp) = store.load_facts("a.go", Depth::Fast).unwrap().unwrap();
        assert_eq!(loaded, facts);
        assert_eq!(fp, "10:100");
        assert!(loaded[0].args[1].is_atom());
    }

    #[test]
    fn test_depth_isolation() {
        let store = FactStore::open_in_memory().unwrap();
        let fast = vec![fact("file_topology", "a.go")];
        let deep = vec![fact("code_calls", "a.go")];
        store.replace_facts("a.go", Depth::Fast, "1:1", &fast).unwrap();
        store.replace_facts("a.go", Depth::Deep, "1:1", &deep).unwrap();

        // Replacing fast facts must not touch deep facts.
        let fast2 = vec![fact("file_topology", "a.go"), fact("symbol_graph", "main")];
        store.replace_facts("a.go", Depth::Fast, "2:2", &fast2).unwrap();

        let (deep_loaded, _) = store.load_facts("a.go", Depth::Deep).unwrap().unwrap();
        assert_eq!(deep_loaded, deep);
        let (fast_loaded, fp) = store.load_facts("a.go", Depth::Fast).unwrap().unwrap();
        assert_eq!(fast_loaded, fast2);
        assert_eq!(fp, "2:2");
    }

    #[test]
    fn test_delete_file_clears_all_depths() {
        let store = FactStore::open_in_memory().unwrap();
        store.replace_facts("a.go", Depth::Fast, "1:1", &[fact("p", "x")]).unwrap();
        store.replace_facts("a.go", Depth::Deep, "1:1", &[fact("q", "y")]).unwrap();
        store.delete_file("a.go").unwrap();
        assert!(store.load_facts("a.go", Depth::Fast).unwrap().is_none());
        assert!(store.load_facts("a.go", Depth::Deep).unwrap().is_none());
    }

    #[test]
    fn test_load_missing_is_none() {
        let store = FactStore::open_in_memory().unwrap();
        assert!(store.load_facts("nope.go", Depth::Fast).unwrap().is_none());
    }

    #[test]
    fn test_persistent_open_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FactStore::open(dir.path()).unwrap();
            store.replace_facts("a.go", Depth::Fast, "5:5", &[fact("p", "x")]).unwrap();
            store.upsert_file_meta("a.go", "go", 5, 5, "h", "5:5").unwrap();
        }
        let store = FactStore::open(dir.path()).unwrap();
        let (facts, fp) = store.load_facts("a.go", Depth::Fast).unwrap().unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(fp, "5:5");
    }
}
