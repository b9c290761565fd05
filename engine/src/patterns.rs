//! Architectural code-pattern detection.
//!
//! File-level scans for generated-code markers, CGo, build tags, embed
//! directives, and HTTP client/handler idioms, plus the entry-point
//! heuristics used during full scans.

use crate::elements::{CodeElement, ElementKind};
use crate::facts::{Fact, Value};
use crate::language::Language;

/// Marker substring → generator tag. First match wins.
const GENERATED_MARKERS: &[(&str, &str)] = &[
    ("protoc-gen-go-grpc", "grpc"),
    ("protoc-gen-go", "protobuf"),
    ("Code generated by protoc", "protobuf"),
    ("Code generated by ent", "ent"),
    ("Code generated by sqlc", "sqlc"),
    ("Code generated by Wire", "wire"),
    ("gqlgen", "gqlgen"),
    ("OpenAPI Generator", "openapi"),
    ("openapi-generator", "openapi"),
    ("swaggo/swag", "swagger"),
    ("GENERATED BY SWAGGER", "swagger"),
];

/// Generator tag for a file, if its head carries a generated-code marker.
/// Only the first 20 lines are inspected; real markers sit at the top.
pub fn generated_marker(content: &str) -> Option<&'static str> {
    for line in content.lines().take(20) {
        for (marker, tag) in GENERATED_MARKERS {
            if line.contains(marker) {
                return Some(tag);
            }
        }
    }
    None
}

/// Emit the file-level architectural facts for one parsed file.
pub fn emit_pattern_facts(rel_path: &str, lang: Language, content: &str, facts: &mut Vec<Fact>) {
    if let Some(tag) = generated_marker(content) {
        facts.push(Fact::new("generated_code", vec![Value::str(rel_path), Value::atom(tag)]));
    }

    if lang == Language::Go {
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed == "import \"C\"" || trimmed.starts_with("import \"C\"") {
                facts.push(Fact::new("cgo_code", vec![Value::str(rel_path)]));
            }
            if let Some(tag) = trimmed.strip_prefix("//go:build ") {
                facts.push(Fact::new(
                    "build_tag",
                    vec![Value::str(rel_path), Value::str(tag.trim())],
                ));
            }
            if let Some(tag) = trimmed.strip_prefix("// +build ") {
                facts.push(Fact::new(
                    "build_tag",
                    vec![Value::str(rel_path), Value::str(tag.trim())],
                ));
            }
            if let Some(target) = trimmed.strip_prefix("//go:embed ") {
                facts.push(Fact::new(
                    "embed_directive",
                    vec![Value::str(rel_path), Value::str(target.trim())],
                ));
            }
        }
    }
}

/// HTTP client idioms per language, matched against function bodies.
const CLIENT_IDIOMS: &[(Language, &[&str])] = &[
    (Language::Go, &["http.Get(", "http.Post(", "http.NewRequest(", "client.Do("]),
    (Language::Python, &["requests.get", "requests.post", "urllib.request", "httpx."]),
    (Language::TypeScript, &["fetch(", "axios."]),
    (Language::JavaScript, &["fetch(", "axios.", "http.request("]),
    (Language::Rust, &["reqwest::", ".get(\"http", "Client::new("]),
];

/// HTTP handler idioms per language, matched against signatures and bodies.
const HANDLER_IDIOMS: &[(Language, &[&str])] = &[
    (Language::Go, &["http.ResponseWriter", "gin.Context", "echo.Context"]),
    (Language::Python, &["@app.route", "@router.", "@api.route"]),
    (Language::TypeScript, &["app.get(", "app.post(", "router.get(", "router.post("]),
    (Language::JavaScript, &["app.get(", "app.post(", "router.get(", "router.post("]),
    (Language::Rust, &["HttpResponse", "axum::", "warp::"]),
];

fn idioms_for(
    table: &'static [(Language, &'static [&'static str])],
    lang: Language,
) -> &'static [&'static str] {
    for (l, idioms) in table {
        if *l == lang {
            return idioms;
        }
    }
    &[]
}

/// Emit `api_client_function` / `api_handler_function` facts for elements
/// whose bodies use HTTP idioms.
pub fn emit_http_idiom_facts(elements: &[CodeElement], lang: Language, facts: &mut Vec<Fact>) {
    let client = idioms_for(CLIENT_IDIOMS, lang);
    let handler = idioms_for(HANDLER_IDIOMS, lang);
    for element in elements {
        if !matches!(element.kind, ElementKind::Function | ElementKind::Method) {
            continue;
        }
        if client.iter().any(|p| element.body.contains(p)) {
            facts.push(Fact::new("api_client_function", vec![Value::str(&element.ref_id)]));
        }
        if handler.iter().any(|p| element.signature.contains(p) || element.body.contains(p)) {
            facts.push(Fact::new("api_handler_function", vec![Value::str(&element.ref_id)]));
        }
    }
}

/// Entry-point detection: a well-known basename, a `main` package symbol, or
/// a top-level `main` function.
pub fn is_entry_point(rel_path: &str, elements: &[CodeElement]) -> bool {
    let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
    if matches!(basename, "main.go" | "__main__.py" | "index.js" | "index.ts") {
        return true;
    }
    elements.iter().any(|e| {
        (e.kind == ElementKind::Package && e.name == "main")
            || (e.kind == ElementKind::Function && e.name == "main" && e.parent.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{GoParser, LanguageParser};

    #[test]
    fn test_generated_markers() {
        assert_eq!(
            generated_marker("// Code generated by protoc-gen-go. DO NOT EDIT.\npackage pb\n"),
            Some("protobuf")
        );
        assert_eq!(
            generated_marker("// Code generated by protoc-gen-go-grpc. DO NOT EDIT.\n"),
            Some("grpc")
        );
        assert_eq!(generated_marker("package main\n"), None);
    }

    #[test]
    fn test_marker_must_be_near_top() {
        let mut content = String::new();
        for _ in 0..30 {
            content.push_str("// filler\n");
        }
        content.push_str("// Code generated by sqlc\n");
        assert_eq!(generated_marker(&content), None);
    }

    #[test]
    fn test_go_directives() {
        let source = "//go:build linux\n// +build linux\n\npackage main\n\nimport \"C\"\n\n//go:embed static/*\nvar assets embed.FS\n";
        let mut facts = Vec::new();
        emit_pattern_facts("main.go", Language::Go, source, &mut facts);
        let preds: Vec<&str> = facts.iter().map(|f| f.predicate.as_str()).collect();
        assert_eq!(preds.iter().filter(|p| **p == "build_tag").count(), 2);
        assert!(preds.contains(&"cgo_code"));
        let embed = facts.iter().find(|f| f.predicate == "embed_directive").unwrap();
        assert_eq!(embed.args[1], Value::str("static/*"));
    }

    #[test]
    fn test_http_idioms() {
        let source = "package api\n\nfunc FetchUser(id string) error {\n\tresp, err := http.Get(\"https://x/\" + id)\n\t_ = resp\n\treturn err\n}\n\nfunc HandleUser(w http.ResponseWriter, r *http.Request) {\n}\n";
        let elements = GoParser.parse("api/user.go", "/ws/api/user.go", source);
        let mut facts = Vec::new();
        emit_http_idiom_facts(&elements, Language::Go, &mut facts);
        assert!(facts.iter().any(|f| f.predicate == "api_client_function"
            && f.args[0] == Value::str("go:api/user.go:FetchUser")));
        assert!(facts.iter().any(|f| f.predicate == "api_handler_function"
            && f.args[0] == Value::str("go:api/user.go:HandleUser")));
    }

    #[test]
    fn test_entry_points() {
        assert!(is_entry_point("cmd/server/main.go", &[]));
        assert!(is_entry_point("app/__main__.py", &[]));
        assert!(is_entry_point("index.ts", &[]));
        assert!(!is_entry_point("lib/util.go", &[]));

        let elements = GoParser.parse("tool.go", "/ws/tool.go", "package main\n\nfunc main() {}\n");
        assert!(is_entry_point("tool.go", &elements));
    }
}
