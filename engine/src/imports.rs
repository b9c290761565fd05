//! Per-language import extraction and in-repo resolution.
//!
//! Feeds two consumers: `dependency_link` facts during scans, and the
//! 1-hop neighborhood of the file-scope loader. Resolution is name-based
//! against the walked file set; imports that do not resolve to a workspace
//! file are still reported with an empty target so the reasoner sees the raw
//! import path.

use crate::language::{detect_language, Language};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn go_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).unwrap())
}

fn py_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:from\s+([\w.]+)\s+import|import\s+([\w.]+))").unwrap()
    })
}

fn js_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:from\s+['"]([^'"]+)['"]|require\s*\(\s*['"]([^'"]+)['"]\s*\)|import\s*\(\s*['"]([^'"]+)['"]\s*\))"#)
            .unwrap()
    })
}

fn rust_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:pub\s+)?(?:use\s+(?:crate|super|self)::(\w+)|mod\s+(\w+)\s*;)")
            .unwrap()
    })
}

/// Raw import strings of one file, in source order, deduplicated.
pub fn extract_imports(rel_path: &str, content: &str) -> Vec<String> {
    let lang = detect_language(rel_path);
    let mut imports = Vec::new();
    let mut push = |s: String| {
        if !s.is_empty() && !imports.contains(&s) {
            imports.push(s);
        }
    };

    match lang {
        Language::Go => {
            let mut in_import_block = false;
            for line in content.lines() {
                let trimmed = line.trim();
                if trimmed.starts_with("import (") {
                    in_import_block = true;
                    continue;
                }
                if in_import_block {
                    if trimmed == ")" {
                        in_import_block = false;
                        continue;
                    }
                    if let Some(cap) = go_import_re().captures(trimmed) {
                        push(cap[1].to_string());
                    }
                } else if trimmed.starts_with("import ") {
                    if let Some(cap) = go_import_re().captures(trimmed) {
                        push(cap[1].to_string());
                    }
                }
            }
        }
        Language::Python => {
            for cap in py_import_re().captures_iter(content) {
                let import = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str()).unwrap_or("");
                push(import.to_string());
            }
        }
        Language::TypeScript | Language::JavaScript => {
            for cap in js_import_re().captures_iter(content) {
                let import = cap
                    .get(1)
                    .or_else(|| cap.get(2))
                    .or_else(|| cap.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                push(import.to_string());
            }
        }
        Language::Rust => {
            for cap in rust_import_re().captures_iter(content) {
                let import = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str()).unwrap_or("");
                push(import.to_string());
            }
        }
        _ => {}
    }

    imports
}

/// Name-based resolver from import strings to workspace-relative paths.
pub struct ImportResolver {
    /// Filename stem → candidate rel_paths.
    stem_index: BTreeMap<String, Vec<String>>,
    /// Full basename (with extension) → candidate rel_paths.
    basename_index: BTreeMap<String, Vec<String>>,
}

impl ImportResolver {
    pub fn new<'a>(rel_paths: impl Iterator<Item = &'a str>) -> ImportResolver {
        let mut stem_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut basename_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rel_path in rel_paths {
            let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
            basename_index.entry(basename.to_string()).or_default().push(rel_path.to_string());
            let stem = basename.rsplit_once('.').map(|(s, _)| s).unwrap_or(basename);
            stem_index.entry(stem.to_string()).or_default().push(rel_path.to_string());
        }
        ImportResolver { stem_index, basename_index }
    }

    /// Resolve an import string to a workspace file, preferring exact
    /// basename matches and then path-suffix disambiguation.
    pub fn resolve(&self, import: &str) -> Option<String> {
        let filename = import.rsplit('/').next().unwrap_or(import);
        if let Some(candidates) = self.basename_index.get(filename) {
            if candidates.len() == 1 {
                return Some(candidates[0].clone());
            }
            return candidates
                .iter()
                .find(|c| c.ends_with(import))
                .or_else(|| candidates.first())
                .cloned();
        }

        let last = import.rsplit(['.', '/']).next().unwrap_or(import);
        if let Some(candidates) = self.stem_index.get(last) {
            if candidates.len() == 1 {
                return Some(candidates[0].clone());
            }
            return candidates.first().cloned();
        }
        None
    }
}
