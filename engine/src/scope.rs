//! File-scope loader: the compact fact set for one active file.
//!
//! Loads the active file plus its 1-hop neighborhood — package siblings,
//! direct imports resolved in-repo, and the files that import it — and emits
//! per-scope facts including encoding and size diagnostics. Scope depth is
//! exactly one hop; transitive closure is never taken, so a file that is its
//! own transitive importer cannot recurse.

use crate::elements::CodeElement;
use crate::emit::emit_element_facts;
use crate::facts::{Fact, Value};
use crate::fingerprint::content_hash;
use crate::imports::{extract_imports, ImportResolver};
use crate::language::{detect_language, is_test_file};
use crate::parsers::ParserRegistry;
use crate::patterns::generated_marker;
use crate::walk::{walk_workspace, IgnorePatterns};
use crate::cancel::CancelToken;
use crate::error::ScanError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Large-file thresholds for scope diagnostics.
const LARGE_FILE_BYTES: u64 = 1024 * 1024;
const LARGE_FILE_LINES: usize = 10_000;

/// I/O retries before `scope_refresh_failed`.
const LOAD_RETRIES: u32 = 3;

pub struct FileScopeLoader {
    root: PathBuf,
    patterns: IgnorePatterns,
    registry: ParserRegistry,
}

/// State captured at load time, used to validate element refs later.
pub struct LoadedScope {
    pub active_file: String,
    pub facts: Vec<Fact>,
    /// Files in scope (active file included).
    pub files_in_scope: Vec<String>,
    elements: Vec<CodeElement>,
    hash_at_load: String,
}

impl FileScopeLoader {
    pub fn new(root: &Path, ignore_patterns: &[String]) -> FileScopeLoader {
        FileScopeLoader {
            root: root.to_path_buf(),
            patterns: IgnorePatterns::new(ignore_patterns),
            registry: ParserRegistry::new(),
        }
    }

    /// Load the active file and its 1-hop neighborhood. Idempotent: a
    /// subsequent load recomputes the same scope and diagnostics from
    /// scratch.
    pub fn load(&self, active_rel: &str) -> Result<LoadedScope, ScanError> {
        let abs = self.root.join(active_rel);
        let mut facts = vec![Fact::new("active_file", vec![Value::str(active_rel)])];

        let bytes = match read_with_retries(&abs) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                facts.push(Fact::new("file_not_found", vec![Value::str(active_rel)]));
                return Ok(LoadedScope {
                    active_file: active_rel.to_string(),
                    facts,
                    files_in_scope: Vec::new(),
                    elements: Vec::new(),
                    hash_at_load: String::new(),
                });
            }
            Err(e) => {
                facts.push(Fact::new(
                    "scope_refresh_failed",
                    vec![Value::str(active_rel), Value::str(e.to_string())],
                ));
                return Ok(LoadedScope {
                    active_file: active_rel.to_string(),
                    facts,
                    files_in_scope: Vec::new(),
                    elements: Vec::new(),
                    hash_at_load: String::new(),
                });
            }
        };

        emit_encoding_facts(active_rel, &bytes, &mut facts);

        let content = String::from_utf8_lossy(&bytes).into_owned();
        let line_count = content.lines().count();
        if bytes.len() as u64 > LARGE_FILE_BYTES || line_count > LARGE_FILE_LINES {
            facts.push(Fact::new(
                "large_file_warning",
                vec![
                    Value::str(active_rel),
                    Value::int(line_count as i64),
                    Value::int(bytes.len() as i64),
                ],
            ));
        }
        if generated_marker(&content).is_some() {
            facts.push(Fact::new(
                "edit_unsafe",
                vec![Value::str(active_rel), Value::str("generated_code_will_be_overwritten")],
            ));
        }

        let hash_at_load = content_hash(&bytes);
        let scope_files = self.resolve_scope(active_rel, &content)?;

        let mut elements = Vec::new();
        for rel_path in &scope_files {
            let is_active = rel_path == active_rel;
            let file_content = if is_active {
                content.clone()
            } else {
                match std::fs::read(self.root.join(rel_path)) {
                    Ok(b) => String::from_utf8_lossy(&b).into_owned(),
                    Err(e) => {
                        warn!("scope read failed for {rel_path}: {e}");
                        facts.push(Fact::new("file_not_found", vec![Value::str(rel_path)]));
                        continue;
                    }
                }
            };
            let lang = detect_language(rel_path);
            facts.push(Fact::new(
                "file_in_scope",
                vec![
                    Value::str(rel_path),
                    Value::str(content_hash(file_content.as_bytes())),
                    Value::atom(lang.atom_name()),
                    Value::int(file_content.lines().count() as i64),
                ],
            ));
            if let Some(parser) = self.registry.for_language(lang) {
                let abs_str =
                    self.root.join(rel_path).to_string_lossy().replace('\\', "/");
                let file_elements = parser.parse(rel_path, &abs_str, &file_content);
                emit_element_facts(&file_elements, &mut facts);
                if is_active {
                    elements = file_elements;
                }
            }
        }

        Ok(LoadedScope {
            active_file: active_rel.to_string(),
            facts,
            files_in_scope: scope_files,
            elements,
            hash_at_load,
        })
    }

    /// Recompute the scope from scratch, clearing prior per-scope
    /// diagnostics by construction.
    pub fn refresh(&self, scope: &LoadedScope) -> Result<LoadedScope, ScanError> {
        self.load(&scope.active_file)
    }

    /// 1-hop neighborhood: package siblings, direct imports, importers.
    fn resolve_scope(&self, active_rel: &str, content: &str) -> Result<Vec<String>, ScanError> {
        let walk = walk_workspace(&self.root, &self.patterns, &CancelToken::new())?;
        let lang = detect_language(active_rel);
        let resolver = ImportResolver::new(walk.files.iter().map(|f| f.rel_path.as_str()));

        let mut scope: BTreeSet<String> = BTreeSet::new();
        scope.insert(active_rel.to_string());

        // Package siblings: same directory, same language, non-test.
        let active_dir = active_rel.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        for file in &walk.files {
            if file.rel_path == active_rel {
                continue;
            }
            let dir = file.rel_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            if dir == active_dir
                && detect_language(&file.rel_path) == lang
                && !is_test_file(&file.rel_path)
            {
                scope.insert(file.rel_path.clone());
            }
        }

        // Direct imports resolved to in-repo files.
        for import in extract_imports(active_rel, content) {
            if let Some(target) = resolver.resolve(&import) {
                scope.insert(target);
            }
        }

        // Importers: any source file whose imports resolve to the active
        // file. One hop only — the importers' own neighborhoods stay out.
        let active_stem = stem_of(active_rel);
        for file in &walk.files {
            if file.rel_path == active_rel || !detect_language(&file.rel_path).is_parseable() {
                continue;
            }
            let other = match std::fs::read(&file.abs_path) {
                Ok(b) => String::from_utf8_lossy(&b).into_owned(),
                Err(_) => continue,
            };
            for import in extract_imports(&file.rel_path, &other) {
                let last = import.rsplit(['.', '/']).next().unwrap_or(&import);
                if last == active_stem
                    && resolver.resolve(&import).as_deref() == Some(active_rel)
                {
                    scope.insert(file.rel_path.clone());
                    break;
                }
            }
        }

        Ok(scope.into_iter().collect())
    }

    /// Return the element iff it is still in the parse output and the file
    /// bytes are unchanged since load; otherwise emit the staleness facts.
    /// An unknown ref against an unchanged file is simply absent.
    pub fn validate_element_ref<'a>(
        &self,
        scope: &'a LoadedScope,
        ref_id: &str,
        diagnostics: &mut Vec<Fact>,
    ) -> Option<&'a CodeElement> {
        let abs = self.root.join(&scope.active_file);
        let current = match std::fs::read(&abs) {
            Ok(bytes) => content_hash(&bytes),
            Err(_) => String::new(),
        };
        if current != scope.hash_at_load {
            diagnostics.push(Fact::new(
                "file_hash_mismatch",
                vec![Value::str(&scope.active_file)],
            ));
            diagnostics.push(Fact::new(
                "element_stale",
                vec![Value::str(ref_id), Value::str("file_modified")],
            ));
            return None;
        }
        scope.elements.iter().find(|e| e.ref_id == ref_id)
    }
}

fn stem_of(rel_path: &str) -> &str {
    let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
    basename.rsplit_once('.').map(|(s, _)| s).unwrap_or(basename)
}

fn read_with_retries(path: &Path) -> Result<Vec<u8>, std::io::Error> {
    let mut last_err = None;
    for _ in 0..LOAD_RETRIES {
        match std::fs::read(path) {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(e),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::other("read failed")))
}

/// BOM, mixed line endings, and invalid UTF-8 checks.
fn emit_encoding_facts(rel_path: &str, bytes: &[u8], facts: &mut Vec<Fact>) {
    let bom = bytes.starts_with(&[0xEF, 0xBB, 0xBF])
        || bytes.starts_with(&[0xFF, 0xFE])
        || bytes.starts_with(&[0xFE, 0xFF]);
    if bom {
        facts.push(Fact::new(
            "encoding_issue",
            vec![Value::str(rel_path), Value::atom("bom_detected")],
        ));
    }

    let mut crlf = 0usize;
    let mut lf = 0usize;
    let mut prev = 0u8;
    for &b in bytes {
        if b == b'\n' {
            lf += 1;
            if prev == b'\r' {
                crlf += 1;
            }
        }
        prev = b;
    }
    if crlf > 0 && lf > crlf {
        facts.push(Fact::new(
            "encoding_issue",
            vec![Value::str(rel_path), Value::atom("crlf_inconsistent")],
        ));
    }

    if !bom && std::str::from_utf8(bytes).is_err() {
        facts.push(Fact::new(
            "encoding_issue",
            vec![Value::str(rel_path), Value::atom("non_utf8")],
        ));
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

    fn scope_paths(scope: &LoadedScope) -> Vec<&str> {
        scope.files_in_scope.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_scope_includes_siblings_imports_importers() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "app/config.py", "import os\n\nclass Config:\n    pass\n");
        write(root, "app/db.py", "class Db:\n    pass\n");
        write(root, "app/db_test.py", "def test_db():\n    pass\n");
        write(root, "web/views.py", "from app.config import Config\n");
        write(root, "web/other.py", "import json\n");

        let loader = FileScopeLoader::new(root, &[]);
        let scope = loader.load("app/config.py").unwrap();

        let paths = scope_paths(&scope);
        assert!(paths.contains(&"app/config.py"));
        assert!(paths.contains(&"app/db.py"), "sibling missing: {paths:?}");
        assert!(paths.contains(&"web/views.py"), "importer missing: {paths:?}");
        assert!(!paths.contains(&"app/db_test.py"), "test sibling leaked: {paths:?}");
        assert!(!paths.contains(&"web/other.py"));

        assert!(scope.facts.iter().any(|f| f.predicate == "active_file"));
        assert_eq!(
            scope.facts.iter().filter(|f| f.predicate == "file_in_scope").count(),
            paths.len()
        );
        assert!(scope.facts.iter().any(|f| f.predicate == "code_element"));
    }

    #[test]
    fn test_missing_active_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "x = 1\n");
        let loader = FileScopeLoader::new(dir.path(), &[]);
        let scope = loader.load("gone.py").unwrap();
        assert!(scope.facts.iter().any(|f| f.predicate == "file_not_found"));
        assert!(scope.files_in_scope.is_empty());
    }

    #[test]
    fn test_encoding_diagnostics() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(b"x = 1\n");
        fs::write(root.join("bom.py"), &bom).unwrap();

        fs::write(root.join("mixed.py"), b"a = 1\r\nb = 2\nc = 3\n").unwrap();
        fs::write(root.join("bad.py"), [0x66, 0x6F, 0x80, 0xFF, 0x6F]).unwrap();

        let loader = FileScopeLoader::new(root, &[]);

        let scope = loader.load("bom.py").unwrap();
        assert!(scope.facts.iter().any(|f| f.predicate == "encoding_issue"
            && f.args[1] == Value::atom("bom_detected")));

        let scope = loader.load("mixed.py").unwrap();
        assert!(scope.facts.iter().any(|f| f.predicate == "encoding_issue"
            && f.args[1] == Value::atom("crlf_inconsistent")));

        let scope = loader.load("bad.py").unwrap();
        assert!(scope.facts.iter().any(|f| f.predicate == "encoding_issue"
            && f.args[1] == Value::atom("non_utf8")));
    }

    #[test]
    fn test_validate_element_ref() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "m.py", "def alpha():\n    pass\n");

        let loader = FileScopeLoader::new(root, &[]);
        let scope = loader.load("m.py").unwrap();
        let mut diags = Vec::new();

        let element = loader.validate_element_ref(&scope, "py:m.py:alpha", &mut diags);
        assert!(element.is_some());
        assert!(diags.is_empty());

        // Unknown refs return nothing without diagnostics.
        assert!(loader.validate_element_ref(&scope, "py:m.py:beta", &mut diags).is_none());
        assert!(diags.is_empty());

        // External modification flags the ref as stale.
        write(root, "m.py", "def alpha():\n    return 1\n");
        let element = loader.validate_element_ref(&scope, "py:m.py:alpha", &mut diags);
        assert!(element.is_none());
        assert!(diags.iter().any(|f| f.predicate == "file_hash_mismatch"));
        assert!(diags.iter().any(|f| f.predicate == "element_stale"
            && f.args[1] == Value::str("file_modified")));
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "def f():\n    pass\n");
        let loader = FileScopeLoader::new(dir.path(), &[]);
        let first = loader.load("a.py").unwrap();
        let second = loader.refresh(&first).unwrap();
        assert_eq!(first.facts, second.facts);
        assert_eq!(first.files_in_scope, second.files_in_scope);
    }
}
