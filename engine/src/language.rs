//! Language detection and test-file classification.
//!
//! Extension-first mapping with a narrow basename allowlist for
//! extension-less build files. Test-file detection matches whole path
//! segments only, so `src/latest/` never trips the Rust `tests` rule.

/// Detected language of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Go,
    Python,
    TypeScript,
    JavaScript,
    Rust,
    Mangle,
    Markdown,
    Json,
    Yaml,
    Sql,
    Shell,
    Text,
    Unknown,
}

impl Language {
    /// The atom the reasoner sees, e.g. `/go`.
    pub fn atom_name(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Mangle => "mangle",
            Language::Markdown => "markdown",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Sql => "sql",
            Language::Shell => "shell",
            Language::Text => "text",
            Language::Unknown => "unknown",
        }
    }

    /// Short tag used in element refs (`go:path:name`). Only parseable
    /// languages have one.
    pub fn ref_tag(self) -> Option<&'static str> {
        match self {
            Language::Go => Some("go"),
            Language::Python => Some("py"),
            Language::TypeScript => Some("ts"),
            Language::JavaScript => Some("js"),
            Language::Rust => Some("rs"),
            Language::Mangle => Some("mg"),
            _ => None,
        }
    }

    /// Text-only languages get topology facts but are never parsed.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Language::Markdown
                | Language::Json
                | Language::Yaml
                | Language::Sql
                | Language::Shell
                | Language::Text
        )
    }

    pub fn is_parseable(self) -> bool {
        self.ref_tag().is_some()
    }
}

/// Detect the language of a file from its relative path.
pub fn detect_language(rel_path: &str) -> Language {
    let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
    if let Some(ext) = basename.rsplit_once('.').map(|(_, e)| e) {
        return match ext {
            "go" => Language::Go,
            "py" | "pyi" => Language::Python,
            "ts" | "tsx" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "rs" => Language::Rust,
            "mg" | "dl" => Language::Mangle,
            "md" => Language::Markdown,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "sql" => Language::Sql,
            "sh" => Language::Shell,
            _ => Language::Unknown,
        };
    }
    // Basename fallback is a narrow allowlist, nothing more.
    match basename {
        "Dockerfile" | "Makefile" => Language::Text,
        _ => Language::Unknown,
    }
}

/// Test-file detection by naming convention. Directory checks match whole
/// segments only.
pub fn is_test_file(rel_path: &str) -> bool {
    let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let dir_segments: Vec<&str> = {
        let mut segs: Vec<&str> = rel_path.split('/').collect();
        segs.pop();
        segs
    };

    // Go
    if basename.ends_with("_test.go") {
        return true;
    }
    // Python
    if basename.ends_with(".py")
        && (basename.starts_with("test_") || basename.ends_with("_test.py"))
    {
        return true;
    }
    if basename.ends_with(".py") && dir_segments.iter().any(|s| *s == "tests") {
        return true;
    }
    // JS/TS
    let is_js_ts = [".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"]
        .iter()
        .any(|ext| basename.ends_with(ext));
    if is_js_ts && (basename.contains(".test.") || basename.contains(".spec.")) {
        return true;
    }
    if is_js_ts && dir_segments.iter().any(|s| *s == "__tests__") {
        return true;
    }
    // Rust
    if basename.ends_with(".rs") && dir_segments.iter().any(|s| *s == "tests") {
        return true;
    }
    // Java
    if basename.ends_with("Test.java") || basename.ends_with("Tests.java") {
        return true;
    }
    false
}
