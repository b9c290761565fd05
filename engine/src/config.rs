//! Scan configuration: runtime options, environment overrides, and the
//! optional `.codefacts.toml` workspace file.

use std::path::Path;
use tracing::warn;

/// Ceiling for the worker-pool default.
const DEFAULT_CONCURRENCY_CAP: usize = 8;

/// Files above this many bytes get topology facts but are never parsed.
pub const DEFAULT_MAX_AST_BYTES: u64 = 2 * 1024 * 1024;

/// Runtime options for a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on concurrent file workers.
    pub max_concurrency: usize,
    /// AST size cap in bytes.
    pub max_ast_bytes: u64,
    /// Ignore patterns, merged from caller and workspace config.
    pub ignore_patterns: Vec<String>,
    /// Return `unchanged` instead of an empty delta.
    pub skip_when_unchanged: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            max_concurrency: default_concurrency(),
            max_ast_bytes: env_u64("CODEFACTS_MAX_AST_BYTES").unwrap_or(DEFAULT_MAX_AST_BYTES),
            ignore_patterns: Vec::new(),
            skip_when_unchanged: false,
        }
    }
}

/// `min(8, cpus)` with a floor of 2, overridable via
/// `CODEFACTS_MAX_CONCURRENCY`.
fn default_concurrency() -> usize {
    if let Some(n) = env_u64("CODEFACTS_MAX_CONCURRENCY") {
        return (n as usize).max(2);
    }
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    cpus.min(DEFAULT_CONCURRENCY_CAP).max(2)
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("ignoring invalid {name}={raw:?}");
            None
        }
    }
}

/// Load ignore patterns from `<workspace>/.codefacts.toml`:
///
/// ```toml
/// [scan]
/// ignore = ["node_modules", "dist/*", "*.min.js"]
/// ```
///
/// A missing or invalid file yields no patterns.
pub fn load_workspace_patterns(workspace_root: &Path) -> Vec<String> {
    let path = workspace_root.join(".codefacts.toml");
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(e) => {
            warn!("invalid .codefacts.toml: {e}");
            return Vec::new();
        }
    };
    table
        .get("scan")
        .and_then(|v| v.as_table())
        .and_then(|scan| scan.get("ignore"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let options = ScanOptions::default();
        assert!(options.max_concurrency >= 2);
        assert!(options.max_concurrency <= DEFAULT_CONCURRENCY_CAP.max(2));
        assert_eq!(options.max_ast_bytes, DEFAULT_MAX_AST_BYTES);
    }

    #[test]
    fn test_workspace_patterns() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(".codefacts.toml"),
            "[scan]\nignore = [\"node_modules\", \"*.gen.go\"]\n",
        )
        .unwrap();
        let patterns = load_workspace_patterns(dir.path());
        assert_eq!(patterns, vec!["node_modules", "*.gen.go"]);
    }

    #[test]
    fn test_missing_or_invalid_config_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_workspace_patterns(dir.path()).is_empty());
        std::fs::write(dir.path().join(".codefacts.toml"), "not [valid").unwrap();
        assert!(load_workspace_patterns(dir.path()).is_empty());
    }
}
