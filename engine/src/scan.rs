//! Incremental scan orchestrator.
//!
//! Diffs the manifest against the filesystem, drives the per-language
//! parsers and data-flow extractors across a bounded worker pool, keeps the
//! manifest / fact store / data-flow cache current, and produces the
//! retract+assert delta the downstream reasoner applies atomically.
//!
//! Fingerprint trust is deliberate: when `(size, mtime)` match the manifest,
//! the stored hash is reused without re-reading the file. Per-file fact-store
//! writes are atomic and survive cancellation; the manifest is saved only on
//! clean completion.

use crate::cancel::CancelToken;
use crate::config::{load_workspace_patterns, ScanOptions};
use crate::dataflow;
use crate::dataflow_cache::DataflowCache;
use crate::deep;
use crate::elements::CodeElement;
use crate::emit::{emit_element_facts, emit_symbol_graph};
use crate::error::ScanError;
use crate::facts::{Fact, Value};
use crate::fingerprint::{content_hash, fingerprint, now_secs};
use crate::imports::{extract_imports, ImportResolver};
use crate::language::{detect_language, is_test_file, Language};
use crate::manifest::{FileManifest, ManifestEntry};
use crate::parsers::ParserRegistry;
use crate::patterns::{emit_http_idiom_facts, emit_pattern_facts, is_entry_point};
use crate::store::{Depth, FactStore};
use crate::walk::{walk_workspace, IgnorePatterns, WalkResult, WalkedFile};
use rayon::prelude::*;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub files_walked: usize,
    pub files_parsed: usize,
    pub dataflow_cache_hits: u64,
    pub dataflow_cache_misses: u64,
    pub elapsed_ms: u64,
}

pub struct ScanResult {
    pub facts: Vec<Fact>,
    pub stats: ScanStats,
}

#[derive(Default)]
pub struct IncrementalResult {
    /// Cold start: the manifest was empty and everything was scanned.
    pub full: bool,
    /// The delta was empty and the caller asked to skip.
    pub unchanged: bool,
    pub new_facts: Vec<Fact>,
    pub retract_facts: Vec<Fact>,
    pub changed_files: Vec<String>,
    pub new_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub stats: ScanStats,
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct Scanner {
    root: PathBuf,
    options: ScanOptions,
    patterns: IgnorePatterns,
    manifest: FileManifest,
    store: FactStore,
    dataflow_cache: DataflowCache,
    registry: ParserRegistry,
    pool: rayon::ThreadPool,
}

impl Scanner {
    pub fn new(root: &Path, mut options: ScanOptions) -> Result<Scanner, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::WorkspaceNotFound(root.to_path_buf()));
        }
        options.ignore_patterns.extend(load_workspace_patterns(root));
        let patterns = IgnorePatterns::new(&options.ignore_patterns);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_concurrency)
            .build()
            .map_err(|e| ScanError::io(root, std::io::Error::other(e)))?;
        Ok(Scanner {
            root: root.to_path_buf(),
            patterns,
            manifest: FileManifest::load(root),
            store: FactStore::open(root)?,
            dataflow_cache: DataflowCache::new(root),
            registry: ParserRegistry::new(),
            options,
            pool,
        })
    }

    pub fn manifest(&self) -> &FileManifest {
        &self.manifest
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Unconditional full scan at `fast` depth.
    pub fn scan_full(&self, cancel: &CancelToken) -> Result<ScanResult, ScanError> {
        let started = Instant::now();
        let walk = walk_workspace(&self.root, &self.patterns, cancel)?;
        let resolver = ImportResolver::new(walk.files.iter().map(|f| f.rel_path.as_str()));

        let outcomes = self.process_files(&walk.files, &resolver, cancel)?;

        let mut facts = Vec::new();
        directory_facts(&walk, &mut facts);

        let mut lang_counts: HashMap<&'static str, usize> = HashMap::new();
        for outcome in &outcomes {
            if !outcome.lang.is_text() && outcome.lang != Language::Unknown {
                *lang_counts.entry(outcome.lang.atom_name()).or_insert(0) += 1;
            }
            if outcome.entry_point {
                facts.push(Fact::new("entry_point", vec![Value::str(&outcome.rel_path)]));
            }
        }
        if let Some((lang, _)) = lang_counts.iter().max_by_key(|(_, count)| **count) {
            facts.push(Fact::new("project_language", vec![Value::atom(lang)]));
        }

        let parsed = outcomes.iter().filter(|o| o.parsed).count();
        for outcome in outcomes {
            facts.extend(outcome.facts);
        }

        self.manifest.save();
        self.dataflow_cache.persist();

        let (hits, misses, _) = self.dataflow_cache.stats();
        let stats = ScanStats {
            files_walked: walk.files.len(),
            files_parsed: parsed,
            dataflow_cache_hits: hits,
            dataflow_cache_misses: misses,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            files = stats.files_walked,
            parsed = stats.files_parsed,
            elapsed_ms = stats.elapsed_ms,
            "full scan complete"
        );
        Ok(ScanResult { facts, stats })
    }

    /// Incremental scan: cold start, unchanged, or a retract+assert delta.
    pub fn scan_incremental(&self, cancel: &CancelToken) -> Result<IncrementalResult, ScanError> {
        if self.manifest.is_empty() {
            let result = self.scan_full(cancel)?;
            let mut new_files: Vec<String> = self.manifest.snapshot().into_keys().collect();
            new_files.sort();
            return Ok(IncrementalResult {
                full: true,
                new_facts: result.facts,
                new_files,
                stats: result.stats,
                ..Default::default()
            });
        }

        let started = Instant::now();
        let walk = walk_workspace(&self.root, &self.patterns, cancel)?;
        let current: HashMap<&str, &WalkedFile> =
            walk.files.iter().map(|f| (f.rel_path.as_str(), f)).collect();
        let prev = self.manifest.snapshot();

        let mut new_files: Vec<String> = Vec::new();
        let mut changed_files: Vec<String> = Vec::new();
        for file in &walk.files {
            match prev.get(&file.rel_path) {
                None => new_files.push(file.rel_path.clone()),
                Some(entry) => {
                    if entry.fingerprint() != fingerprint(file.size, file.mtime) {
                        changed_files.push(file.rel_path.clone());
                    }
                }
            }
        }
        let mut deleted_files: Vec<String> =
            prev.keys().filter(|p| !current.contains_key(p.as_str())).cloned().collect();
        new_files.sort();
        changed_files.sort();
        deleted_files.sort();

        if changed_files.is_empty()
            && new_files.is_empty()
            && deleted_files.is_empty()
            && self.options.skip_when_unchanged
        {
            debug!("workspace unchanged, skipping");
            return Ok(IncrementalResult {
                unchanged: true,
                stats: ScanStats {
                    files_walked: walk.files.len(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    ..Default::default()
                },
                ..Default::default()
            });
        }

        // Collect the prior fast facts before they are overwritten or
        // deleted: retracts logically precede asserts.
        let mut retract_facts = Vec::new();
        for path in changed_files.iter().chain(deleted_files.iter()) {
            if let Some((facts, _)) = self.store.load_facts(path, Depth::Fast)? {
                retract_facts.extend(facts);
            }
        }

        let resolver = ImportResolver::new(walk.files.iter().map(|f| f.rel_path.as_str()));
        let to_parse: Vec<WalkedFile> = walk
            .files
            .iter()
            .filter(|f| {
                changed_files.binary_search(&f.rel_path).is_ok()
                    || new_files.binary_search(&f.rel_path).is_ok()
            })
            .cloned()
            .collect();
        let outcomes = self.process_files(&to_parse, &resolver, cancel)?;

        for path in &deleted_files {
            self.store.delete_file(path)?;
            self.manifest.remove(path);
            self.dataflow_cache.invalidate(path);
        }

        // Directory facts are cheap and always refreshed.
        let mut new_facts = Vec::new();
        directory_facts(&walk, &mut new_facts);
        let parsed = outcomes.iter().filter(|o| o.parsed).count();
        for outcome in outcomes {
            new_facts.extend(outcome.facts);
        }

        self.manifest.save();
        self.dataflow_cache.persist();

        let (hits, misses, _) = self.dataflow_cache.stats();
        let stats = ScanStats {
            files_walked: walk.files.len(),
            files_parsed: parsed,
            dataflow_cache_hits: hits,
            dataflow_cache_misses: misses,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            changed = changed_files.len(),
            new = new_files.len(),
            deleted = deleted_files.len(),
            elapsed_ms = stats.elapsed_ms,
            "incremental scan complete"
        );
        Ok(IncrementalResult {
            full: false,
            unchanged: false,
            new_facts,
            retract_facts,
            changed_files,
            new_files,
            deleted_files,
            stats,
        })
    }

    /// Second-pass deep scan over Go files, stored at `deep` depth.
    pub fn scan_deep(&self, cancel: &CancelToken) -> Result<ScanResult, ScanError> {
        let started = Instant::now();
        let walk = walk_workspace(&self.root, &self.patterns, cancel)?;
        let go_files: Vec<WalkedFile> = walk
            .files
            .iter()
            .filter(|f| {
                detect_language(&f.rel_path) == Language::Go
                    && !is_test_file(&f.rel_path)
                    && f.size <= self.options.max_ast_bytes
            })
            .cloned()
            .collect();

        let facts_per_file: Vec<Vec<Fact>> = self.pool.install(|| {
            go_files
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return Vec::new();
                    }
                    self.deep_scan_file(file)
                })
                .collect()
        });
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let mut facts = Vec::new();
        let parsed = facts_per_file.iter().filter(|f| !f.is_empty()).count();
        for file_facts in facts_per_file {
            facts.extend(file_facts);
        }

        let stats = ScanStats {
            files_walked: walk.files.len(),
            files_parsed: parsed,
            elapsed_ms: started.elapsed().as_millis() as u64,
            ..Default::default()
        };
        info!(go_files = go_files.len(), elapsed_ms = stats.elapsed_ms, "deep scan complete");
        Ok(ScanResult { facts, stats })
    }

    fn deep_scan_file(&self, file: &WalkedFile) -> Vec<Fact> {
        let bytes = match std::fs::read(&file.abs_path) {
            Ok(b) => b,
            Err(e) => {
                warn!("deep scan read failed for {}: {e}", file.rel_path);
                return Vec::new();
            }
        };
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let parser = match self.registry.for_language(Language::Go) {
            Some(p) => p,
            None => return Vec::new(),
        };
        let abs = file.abs_path.to_string_lossy().replace('\\', "/");
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let elements = parser.parse(&file.rel_path, &abs, &content);
            deep::deep_facts(&file.rel_path, &content, &elements)
        }));
        match result {
            Ok(facts) => {
                let fp = fingerprint(file.size, file.mtime);
                if let Err(e) = self.store.replace_facts(&file.rel_path, Depth::Deep, &fp, &facts)
                {
                    warn!("deep fact store write failed for {}: {e}", file.rel_path);
                }
                facts
            }
            Err(_) => {
                warn!("deep parser fault on {}", file.rel_path);
                vec![parse_error_fact(&file.rel_path, "deep parser fault")]
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-file processing
    // -----------------------------------------------------------------------

    /// Parse a batch of files on the bounded pool. Each worker persists its
    /// own file's facts before returning, so cancellation never leaves a
    /// half-written file behind.
    fn process_files(
        &self,
        files: &[WalkedFile],
        resolver: &ImportResolver,
        cancel: &CancelToken,
    ) -> Result<Vec<FileOutcome>, ScanError> {
        let outcomes: Vec<Option<FileOutcome>> = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.process_file(file, resolver))
                })
                .collect()
        });
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        Ok(outcomes.into_iter().flatten().collect())
    }

    fn process_file(&self, file: &WalkedFile, resolver: &ImportResolver) -> FileOutcome {
        let rel_path = file.rel_path.as_str();
        let lang = detect_language(rel_path);
        let is_test = is_test_file(rel_path);
        let current_fp = fingerprint(file.size, file.mtime);

        // Fingerprint trust: an unchanged (size, mtime) pair means the
        // manifest hash is assumed correct and the file is not re-hashed.
        let trusted_hash = self
            .manifest
            .get(rel_path)
            .filter(|entry| entry.fingerprint() == current_fp)
            .map(|entry| entry.hash);

        let oversized = file.size > self.options.max_ast_bytes;
        let wants_parse = lang.is_parseable() && !is_test && !oversized;

        let mut content: Option<String> = None;
        let hash = match trusted_hash {
            Some(hash) if !wants_parse => hash,
            Some(hash) => {
                content = read_lossy(&file.abs_path, rel_path);
                hash
            }
            None => match read_lossy(&file.abs_path, rel_path) {
                Some(text) => {
                    let hash = content_hash(text.as_bytes());
                    content = Some(text);
                    hash
                }
                None => {
                    return FileOutcome {
                        rel_path: rel_path.to_string(),
                        lang,
                        parsed: false,
                        entry_point: false,
                        facts: vec![Fact::new(
                            "file_not_found",
                            vec![Value::str(rel_path)],
                        )],
                    };
                }
            },
        };

        let mut facts = vec![Fact::new(
            "file_topology",
            vec![
                Value::str(rel_path),
                Value::str(&hash),
                Value::atom(lang.atom_name()),
                Value::int(file.mtime),
                Value::bool_atom(is_test),
            ],
        )];

        if oversized {
            facts.push(Fact::new(
                "large_file_warning",
                vec![Value::str(rel_path), Value::int(0), Value::int(file.size as i64)],
            ));
        }

        let mut parsed = false;
        let mut entry_point = false;
        if wants_parse {
            if let Some(content) = content.as_deref() {
                let parse_outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    self.build_file_facts(rel_path, lang, content, resolver)
                }));
                match parse_outcome {
                    Ok((file_facts, is_entry)) => {
                        facts.extend(file_facts);
                        entry_point = is_entry;
                        parsed = true;
                    }
                    Err(_) => {
                        warn!("parser fault on {rel_path}");
                        facts.push(parse_error_fact(rel_path, "parser fault"));
                    }
                }
            }
        }

        // Per-file persistence: manifest entry, file meta, fast facts.
        self.manifest.insert(
            rel_path,
            ManifestEntry { hash: hash.clone(), mod_time: file.mtime, size: file.size },
        );
        if let Err(e) =
            self.store.upsert_file_meta(rel_path, lang.atom_name(), file.size, file.mtime, &hash, &current_fp)
        {
            warn!("file meta write failed for {rel_path}: {e}");
        }
        if let Err(e) = self.store.replace_facts(rel_path, Depth::Fast, &current_fp, &facts) {
            warn!("fact store write failed for {rel_path}: {e}");
        }

        FileOutcome { rel_path: rel_path.to_string(), lang, parsed, entry_point, facts }
    }

    /// Everything derived from one parsed content buffer. The buffer is read
    /// once; parsers and the data-flow extractor share it.
    fn build_file_facts(
        &self,
        rel_path: &str,
        lang: Language,
        content: &str,
        resolver: &ImportResolver,
    ) -> (Vec<Fact>, bool) {
        let mut facts = Vec::new();
        let parser = match self.registry.for_language(lang) {
            Some(p) => p,
            None => return (facts, false),
        };

        let abs = self.root.join(rel_path).to_string_lossy().replace('\\', "/");
        let elements: Vec<CodeElement> = parser.parse(rel_path, &abs, content);

        emit_element_facts(&elements, &mut facts);
        emit_symbol_graph(&elements, rel_path, &mut facts);
        parser.emit_language_facts(&elements, content, &mut facts);
        emit_pattern_facts(rel_path, lang, content, &mut facts);
        emit_http_idiom_facts(&elements, lang, &mut facts);

        for import in extract_imports(rel_path, content) {
            let callee = resolver.resolve(&import).unwrap_or_default();
            facts.push(Fact::new(
                "dependency_link",
                vec![Value::str(rel_path), Value::str(callee), Value::str(&import)],
            ));
        }

        let flow = self.dataflow_cache.get_or_compute(rel_path, content.as_bytes(), || {
            dataflow::extract_file(lang, rel_path, content, &elements)
        });
        facts.extend(flow);

        let entry = is_entry_point(rel_path, &elements);
        (facts, entry)
    }
}

struct FileOutcome {
    rel_path: String,
    lang: Language,
    parsed: bool,
    entry_point: bool,
    facts: Vec<Fact>,
}

fn directory_facts(walk: &WalkResult, facts: &mut Vec<Fact>) {
    for dir in &walk.directories {
        facts.push(Fact::new(
            "directory",
            vec![Value::str(&dir.rel_path), Value::str(&dir.name)],
        ));
    }
}

fn parse_error_fact(rel_path: &str, message: &str) -> Fact {
    Fact::new(
        "parse_error",
        vec![Value::str(rel_path), Value::str(message), Value::int(now_secs())],
    )
}

fn read_lossy(abs_path: &Path, rel_path: &str) -> Option<String> {
    match std::fs::read(abs_path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!("read failed for {rel_path}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn topology_paths(facts: &[Fact]) -> Vec<String> {
        let mut paths: Vec<String> = facts
            .iter()
            .filter(|f| f.predicate == "file_topology")
            .map(|f| f.args[0].as_str().unwrap().to_string())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_full_scan_emits_topology_and_elements() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");
        write(dir.path(), "lib/util.go", "package lib\n\nfunc Helper() {}\n");

        let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
        let result = scanner.scan_full(&CancelToken::new()).unwrap();

        assert_eq!(topology_paths(&result.facts), vec!["lib/util.go", "main.go"]);
        assert!(result.facts.iter().any(|f| f.predicate == "code_element"));
        assert!(result.facts.iter().any(|f| f.predicate == "directory"
            && f.args[0] == Value::str("lib")));
        assert!(result.facts.iter().any(|f| f.predicate == "entry_point"
            && f.args[0] == Value::str("main.go")));
        assert!(result
            .facts
            .iter()
            .any(|f| f.predicate == "project_language" && f.args[0] == Value::atom("go")));
    }

    #[test]
    fn test_test_files_get_topology_only() {
        let dir = tempdir().unwrap();
        write(dir.path(), "utils_test.go", "package main\n\nfunc TestX(t *testing.T) {}\n");

        let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
        let result = scanner.scan_full(&CancelToken::new()).unwrap();

        let topo = result.facts.iter().find(|f| f.predicate == "file_topology").unwrap();
        assert_eq!(topo.args[4], Value::atom("true"));
        assert!(!result.facts.iter().any(|f| f.predicate == "code_element"));
        assert!(!result.facts.iter().any(|f| f.predicate == "symbol_graph"));
    }

    #[test]
    fn test_oversized_files_are_not_parsed() {
        let dir = tempdir().unwrap();
        let big = format!("package main\n// {}\nfunc main() {{}}\n", "x".repeat(4096));
        write(dir.path(), "big.go", &big);

        let mut options = ScanOptions::default();
        options.max_ast_bytes = 1024;
        let scanner = Scanner::new(dir.path(), options).unwrap();
        let result = scanner.scan_full(&CancelToken::new()).unwrap();

        assert!(result.facts.iter().any(|f| f.predicate == "file_topology"));
        assert!(result.facts.iter().any(|f| f.predicate == "large_file_warning"));
        assert!(!result.facts.iter().any(|f| f.predicate == "code_element"));
        assert!(!result.facts.iter().any(|f| f.predicate == "symbol_graph"));
    }

    #[test]
    fn test_incremental_cold_start() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.go", "package main\n");

        let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
        let result = scanner.scan_incremental(&CancelToken::new()).unwrap();
        assert!(result.full);
        assert_eq!(result.new_files, vec!["a.go"]);
        assert!(!result.new_facts.is_empty());
    }

    #[test]
    fn test_incremental_delta() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.go", "package main\n\nfunc A() {}\n");
        write(dir.path(), "b.go", "package main\n\nfunc B() {}\n");
        write(dir.path(), "c.go", "package main\n\nfunc C() {}\n");

        {
            let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
            let cold = scanner.scan_incremental(&CancelToken::new()).unwrap();
            assert!(cold.full);
        }

        // Modify b.go (content and mtime), delete c.go.
        let b_path = dir.path().join("b.go");
        fs::write(&b_path, "package main\n\nfunc B2() {}\n").unwrap();
        bump_mtime(&b_path);
        fs::remove_file(dir.path().join("c.go")).unwrap();

        let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
        let delta = scanner.scan_incremental(&CancelToken::new()).unwrap();

        assert!(!delta.full);
        assert_eq!(delta.changed_files, vec!["b.go"]);
        assert_eq!(delta.deleted_files, vec!["c.go"]);
        assert!(delta.new_files.is_empty());

        // Retracts cover the prior fast facts of both b.go and c.go.
        assert!(delta.retract_facts.iter().any(|f| f.predicate == "file_topology"
            && f.args[0] == Value::str("b.go")));
        assert!(delta.retract_facts.iter().any(|f| f.predicate == "file_topology"
            && f.args[0] == Value::str("c.go")));
        assert!(delta
            .retract_facts
            .iter()
            .any(|f| f.predicate == "code_element"
                && f.args[0].as_str().unwrap().contains(":B")));

        // Asserts: fresh b.go facts plus always-refreshed directory facts,
        // nothing for a.go.
        assert!(delta.new_facts.iter().any(|f| f.predicate == "code_element"
            && f.args[0].as_str().unwrap().contains(":B2")));
        assert!(!delta.new_facts.iter().any(|f| f.predicate == "file_topology"
            && f.args[0] == Value::str("a.go")));

        // The store no longer holds facts for the deleted file.
        assert!(scanner.store().load_facts("c.go", Depth::Fast).unwrap().is_none());
    }

    #[test]
    fn test_unchanged_skip() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.go", "package main\n");
        {
            let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
            scanner.scan_incremental(&CancelToken::new()).unwrap();
        }
        let mut options = ScanOptions::default();
        options.skip_when_unchanged = true;
        let scanner = Scanner::new(dir.path(), options).unwrap();
        let result = scanner.scan_incremental(&CancelToken::new()).unwrap();
        assert!(result.unchanged);
        assert!(result.new_facts.is_empty());
    }

    #[test]
    fn test_hash_reuse_contract() {
        let dir = tempdir().unwrap();
        write(dir.path(), "test.go", "package main\n");
        {
            let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
            scanner.scan_full(&CancelToken::new()).unwrap();
        }

        // Tamper with the stored hash while keeping the fingerprint intact.
        let manifest_path = dir.path().join(".nerd/cache/manifest.json");
        let mut doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
        doc["test.go"]["hash"] = serde_json::json!("HACKED_HASH");
        fs::write(&manifest_path, doc.to_string()).unwrap();

        let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
        let result = scanner.scan_full(&CancelToken::new()).unwrap();
        let topo = result.facts.iter().find(|f| f.predicate == "file_topology").unwrap();
        assert_eq!(topo.args[1], Value::str("HACKED_HASH"));

        // Touching the file invalidates the trusted hash.
        let file_path = dir.path().join("test.go");
        fs::write(&file_path, "package main\n\nfunc main() {}\n").unwrap();
        bump_mtime(&file_path);

        let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
        let result = scanner.scan_full(&CancelToken::new()).unwrap();
        let topo = result.facts.iter().find(|f| f.predicate == "file_topology").unwrap();
        assert_ne!(topo.args[1], Value::str("HACKED_HASH"));
        assert_ne!(topo.args[1], Value::str(content_hash(b"package main\n")));
    }

    #[test]
    fn test_deep_scan_isolated_from_fast() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.go", "package main\n\nfunc main() {\n\thelper()\n}\n\nfunc helper() {}\n");

        let scanner = Scanner::new(dir.path(), ScanOptions::default()).unwrap();
        scanner.scan_full(&CancelToken::new()).unwrap();
        let deep = scanner.scan_deep(&CancelToken::new()).unwrap();

        assert!(deep.facts.iter().any(|f| f.predicate == "code_defines"));
        assert!(deep.facts.iter().any(|f| f.predicate == "code_calls"));

        // Both depths coexist in the store.
        assert!(scanner.store().load_facts("a.go", Depth::Fast).unwrap().is_some());
        assert!(scanner.store().load_facts("a.go", Depth::Deep).unwrap().is_some());
    }

    /// Advance a file's mtime far enough that second-resolution fingerprints
    /// change even on fast filesystems.
    fn bump_mtime(path: &Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        file.set_times(fs::FileTimes::new().set_modified(future)).unwrap();
    }
}
