//! Workspace walker with hidden-directory policy and ignore patterns.
//!
//! Hidden directories are skipped except for a small allow-set of tool
//! config directories; a deny-set (VCS metadata and our own cache) is always
//! enforced, children included. Symlinks are never followed, which also keeps
//! the traversal cycle-free. Per-entry I/O errors are logged and skipped; the
//! only terminal condition is a missing workspace root.

use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::fingerprint::mtime_secs;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Hidden directories that are still traversed.
const HIDDEN_ALLOW: &[&str] = &[".github", ".vscode", ".circleci", ".config"];

/// Directories whose whole subtree is always skipped.
const HIDDEN_DENY: &[&str] = &[".git", ".nerd", ".hg", ".svn"];

// ---------------------------------------------------------------------------
// Ignore patterns
// ---------------------------------------------------------------------------

/// Compiled ignore patterns. Three shapes are supported: bare names matched
/// against the entry basename, `prefix/*` directory globs matched against the
/// relative path, and shell globs (`* ? [ ]`) matched against the relative
/// path.
pub struct IgnorePatterns {
    names: HashSet<String>,
    prefixes: Vec<String>,
    globs: Option<GlobSet>,
}

/// Case-fold for pattern matching on case-insensitive filesystems.
#[cfg(any(target_os = "windows", target_os = "macos"))]
fn fold(s: &str) -> String {
    s.to_lowercase()
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn fold(s: &str) -> String {
    s.to_string()
}

impl IgnorePatterns {
    pub fn new(patterns: &[String]) -> IgnorePatterns {
        let mut names = HashSet::new();
        let mut prefixes = Vec::new();
        let mut builder = GlobSetBuilder::new();
        let mut has_globs = false;

        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            if let Some(prefix) = pattern.strip_suffix("/*") {
                prefixes.push(fold(prefix));
            } else if pattern.contains(['*', '?', '[']) {
                match Glob::new(&fold(pattern)) {
                    Ok(glob) => {
                        builder.add(glob);
                        has_globs = true;
                    }
                    Err(e) => warn!("invalid ignore pattern {pattern:?}: {e}"),
                }
            } else {
                names.insert(fold(pattern));
            }
        }

        let globs = if has_globs { builder.build().ok() } else { None };
        IgnorePatterns { names, prefixes, globs }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.prefixes.is_empty() && self.globs.is_none()
    }

    /// Does the entry at `rel_path` (with the given basename) match any
    /// pattern?
    pub fn matches(&self, rel_path: &str, basename: &str) -> bool {
        if self.names.contains(&fold(basename)) {
            return true;
        }
        let folded = fold(rel_path);
        for prefix in &self.prefixes {
            if folded == *prefix || folded.starts_with(&format!("{prefix}/")) {
                return true;
            }
        }
        if let Some(globs) = &self.globs {
            if globs.is_match(&folded) {
                return true;
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Walk output
// ---------------------------------------------------------------------------

/// One discovered regular file.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub abs_path: PathBuf,
    /// Workspace-relative path, forward slashes.
    pub rel_path: String,
    pub size: u64,
    pub mtime: i64,
}

/// One traversed directory, as `(rel_path, basename)`.
#[derive(Debug, Clone)]
pub struct WalkedDir {
    pub rel_path: String,
    pub name: String,
}

#[derive(Debug)]
pub struct WalkResult {
    pub files: Vec<WalkedFile>,
    pub directories: Vec<WalkedDir>,
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Whether a hidden directory name survives the hidden-directory policy.
fn hidden_dir_allowed(name: &str) -> bool {
    HIDDEN_ALLOW.contains(&name)
}

fn hidden_dir_denied(name: &str) -> bool {
    HIDDEN_DENY.contains(&name)
}

/// Walk the workspace rooted at `root`, applying the hidden-directory policy
/// and ignore patterns. Each file appears exactly once; directory order is
/// unspecified.
pub fn walk_workspace(
    root: &Path,
    patterns: &IgnorePatterns,
    cancel: &CancelToken,
) -> Result<WalkResult, ScanError> {
    let root_meta = std::fs::metadata(root)
        .map_err(|_| ScanError::WorkspaceNotFound(root.to_path_buf()))?;
    if !root_meta.is_dir() {
        return Err(ScanError::WorkspaceNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut directories = Vec::new();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .build();

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("walk error: {e}");
                continue;
            }
        };
        let path = entry.path();
        if path == root {
            continue;
        }
        let rel_path = match path.strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        let name = entry.file_name().to_string_lossy().to_string();

        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());

        // The flat iterator does not prune subtrees for us, so reject any
        // entry with a skipped ancestor segment.
        if path_excluded(&rel_path, is_dir, patterns) {
            continue;
        }

        if is_dir {
            directories.push(WalkedDir { rel_path, name });
            continue;
        }
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("stat failed for {}: {e}", path.display());
                continue;
            }
        };
        files.push(WalkedFile {
            abs_path: path.to_path_buf(),
            rel_path,
            size: meta.len(),
            mtime: mtime_secs(&meta),
        });
    }

    Ok(WalkResult { files, directories })
}

/// Apply the hidden-directory policy and ignore patterns to every segment of
/// a relative path. A denied or ignored ancestor excludes the whole subtree.
/// The hidden policy only judges directory segments; dotfiles like
/// `.gitignore` are ordinary files.
fn path_excluded(rel_path: &str, final_is_dir: bool, patterns: &IgnorePatterns) -> bool {
    let segments: Vec<&str> = rel_path.split('/').collect();
    let mut prefix = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == segments.len();
        let is_dir_segment = !is_last || final_is_dir;
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);

        if segment.starts_with('.')
            && is_dir_segment
            && (hidden_dir_denied(segment) || !hidden_dir_allowed(segment))
        {
            return true;
        }

        if patterns.matches(&prefix, segment) {
            return true;
        }
    }
    false
}

/// Exclusion check for a single path outside a full walk (watch mode events).
pub fn event_path_excluded(root: &Path, abs_path: &Path, patterns: &IgnorePatterns) -> bool {
    match abs_path.strip_prefix(root) {
        Ok(rel) => {
            let rel = rel.to_string_lossy().replace('\\', "/");
            !rel.is_empty() && path_excluded(&rel, abs_path.is_dir(), patterns)
        }
        Err(_) => true,
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

    fn rel_paths(result: &WalkResult) -> Vec<String> {
        let mut paths: Vec<String> = result.files.iter().map(|f| f.rel_path.clone()).collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_hidden_directory_policy() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "main.go", "package main");
        write(root, ".github/workflows/ci.yml", "on: push");
        write(root, ".vscode/settings.json", "{}");
        write(root, ".git/config", "[core]");
        write(root, ".nerd/cache/manifest.json", "{}");
        write(root, ".secret/key.pem", "---");

        let patterns = IgnorePatterns::new(&[]);
        let result = walk_workspace(root, &patterns, &CancelToken::new()).unwrap();
        assert_eq!(
            rel_paths(&result),
            vec![".github/workflows/ci.yml", ".vscode/settings.json", "main.go"]
        );
    }

    #[test]
    fn test_dotfiles_are_not_hidden_dirs() {
        let dir = tempdir().unwrap();
        write(dir.path(), ".gitignore", "target\n");
        let result =
            walk_workspace(dir.path(), &IgnorePatterns::new(&[]), &CancelToken::new()).unwrap();
        assert_eq!(rel_paths(&result), vec![".gitignore"]);
    }

    #[test]
    fn test_bare_name_pattern() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/main.go", "package main");
        write(dir.path(), "node_modules/pkg/index.js", "x");
        let patterns = IgnorePatterns::new(&["node_modules".to_string()]);
        let result = walk_workspace(dir.path(), &patterns, &CancelToken::new()).unwrap();
        assert_eq!(rel_paths(&result), vec!["src/main.go"]);
    }

    #[test]
    fn test_prefix_pattern() {
        let dir = tempdir().unwrap();
        write(dir.path(), "vendor/lib/a.go", "package lib");
        write(dir.path(), "src/a.go", "package src");
        let patterns = IgnorePatterns::new(&["vendor/*".to_string()]);
        let result = walk_workspace(dir.path(), &patterns, &CancelToken::new()).unwrap();
        assert_eq!(rel_paths(&result), vec!["src/a.go"]);
    }

    #[test]
    fn test_shell_glob_pattern() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.min.js", "x");
        write(dir.path(), "a.js", "x");
        let patterns = IgnorePatterns::new(&["*.min.js".to_string()]);
        let result = walk_workspace(dir.path(), &patterns, &CancelToken::new()).unwrap();
        assert_eq!(rel_paths(&result), vec!["a.js"]);
    }

    #[test]
    fn test_missing_root_is_terminal() {
        let err = walk_workspace(
            Path::new("/definitely/not/a/workspace"),
            &IgnorePatterns::new(&[]),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::WorkspaceNotFound(_)));
    }

    #[test]
    fn test_cancellation() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.go", "package a");
        let token = CancelToken::new();
        token.cancel();
        let err =
            walk_workspace(dir.path(), &IgnorePatterns::new(&[]), &token).unwrap_err();
        assert!(matches!(err, ScanError::Cancelled));
    }

    #[test]
    fn test_directories_reported() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/auth/user.go", "package auth");
        let result =
            walk_workspace(dir.path(), &IgnorePatterns::new(&[]), &CancelToken::new()).unwrap();
        let mut dirs: Vec<&str> =
            result.directories.iter().map(|d| d.rel_path.as_str()).collect();
        dirs.sort();
        assert_eq!(dirs, vec!["src", "src/auth"]);
    }
}
