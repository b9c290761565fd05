//! Python code-element parser.
//!
//! Indentation-based extraction of classes, functions, and methods, with
//! decorator capture. Triple-quoted string state is tracked so that nothing
//! inside a docstring (braces, fake `def` lines, dedented text) can end an
//! element early.

use super::LanguageParser;
use crate::elements::{make_ref, Action, CodeElement, ElementKind, Visibility};
use crate::facts::{Fact, Value};
use regex::Regex;
use std::sync::OnceLock;

pub struct PythonParser;

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap())
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^class\s+([A-Za-z_]\w*)").unwrap())
}

fn decorator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@([\w.]+)").unwrap())
}

fn module_const_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z][A-Z0-9_]*)\s*(?::[^=]+)?=").unwrap())
}

/// Leading `__` (not dunder) or a single leading `_` is private.
fn py_visibility(name: &str) -> Visibility {
    if name.starts_with("__") && !name.ends_with("__") {
        return Visibility::Private;
    }
    if name.starts_with('_') && !name.starts_with("__") {
        return Visibility::Private;
    }
    Visibility::Public
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Update triple-quote state for one line; returns whether any part of the
/// line was inside a string.
fn advance_string_state(line: &str, in_string: &mut Option<&'static str>) {
    let mut rest = line;
    loop {
        match in_string {
            Some(delim) => match rest.find(*delim) {
                Some(pos) => {
                    rest = &rest[pos + delim.len()..];
                    *in_string = None;
                }
                None => return,
            },
            None => {
                let dq = rest.find("\"\"\"");
                let sq = rest.find("'''");
                let (pos, delim) = match (dq, sq) {
                    (Some(d), Some(s)) if s < d => (s, "'''"),
                    (Some(d), _) => (d, "\"\"\""),
                    (None, Some(s)) => (s, "'''"),
                    (None, None) => return,
                };
                rest = &rest[pos + 3..];
                *in_string = Some(delim);
            }
        }
    }
}

/// Find the last line of a block opened by a `def`/`class` header at
/// `start_idx` with the given indentation.
fn find_block_end_indent(lines: &[&str], start_idx: usize, header_indent: usize) -> usize {
    let mut last_content = start_idx;
    let mut in_string: Option<&'static str> = None;
    // Consume the header's own string state (docstring openers live below).
    advance_string_state(lines[start_idx], &mut in_string);

    for (i, line) in lines.iter().enumerate().skip(start_idx + 1) {
        let was_in_string = in_string.is_some();
        advance_string_state(line, &mut in_string);
        if was_in_string {
            last_content = i;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= header_indent {
            break;
        }
        last_content = i;
    }
    last_content
}

impl LanguageParser for PythonParser {
    fn language_tag(&self) -> &'static str {
        "py"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn parse(&self, rel_path: &str, file: &str, content: &str) -> Vec<CodeElement> {
        let lines: Vec<&str> = content.lines().collect();
        let mut elements: Vec<CodeElement> = Vec::new();
        // Enclosing (indent, name, ref, is_class) scopes, innermost last.
        let mut scope: Vec<(usize, String, String, bool)> = Vec::new();
        let mut pending_decorators: Vec<String> = Vec::new();
        let mut decorator_start: Option<usize> = None;
        let mut in_string: Option<&'static str> = None;

        let mut i = 0usize;
        while i < lines.len() {
            let line = lines[i];
            let was_in_string = in_string.is_some();
            advance_string_state(line, &mut in_string);
            if was_in_string {
                i += 1;
                continue;
            }

            let trimmed = line.trim_start();
            let indent = indent_of(line);

            if trimmed.is_empty() || trimmed.starts_with('#') {
                i += 1;
                continue;
            }

            while scope.last().is_some_and(|s| indent <= s.0) {
                scope.pop();
            }

            if let Some(cap) = decorator_re().captures(trimmed) {
                if pending_decorators.is_empty() {
                    decorator_start = Some(i);
                }
                pending_decorators.push(cap[1].to_string());
                i += 1;
                continue;
            }

            let (kind, name) = if let Some(cap) = class_re().captures(trimmed) {
                (ElementKind::Struct, cap[1].to_string())
            } else if let Some(cap) = def_re().captures(trimmed) {
                let inside_class = scope.last().map(|s| s.3).unwrap_or(false);
                let kind = if inside_class { ElementKind::Method } else { ElementKind::Function };
                (kind, cap[2].to_string())
            } else {
                if indent == 0 {
                    if let Some(cap) = module_const_re().captures(trimmed) {
                        elements.push(CodeElement {
                            ref_id: make_ref("py", rel_path, "", &cap[1]),
                            kind: ElementKind::Const,
                            file: file.to_string(),
                            start_line: i + 1,
                            end_line: i + 1,
                            signature: trimmed.trim_end().to_string(),
                            body: line.to_string(),
                            parent: String::new(),
                            visibility: py_visibility(&cap[1]),
                            actions: Action::ALL.to_vec(),
                            package: String::new(),
                            name: cap[1].to_string(),
                        });
                    }
                }
                pending_decorators.clear();
                decorator_start = None;
                i += 1;
                continue;
            };

            let start = decorator_start.unwrap_or(i);
            let end = find_block_end_indent(&lines, i, indent);
            let parent_name =
                scope.last().map(|(_, name, _, _)| name.clone()).unwrap_or_default();
            let parent_ref = scope.last().map(|(_, _, r, _)| r.clone()).unwrap_or_default();
            let ref_id = make_ref("py", rel_path, &parent_name, &name);

            pending_decorators.clear();
            decorator_start = None;

            elements.push(CodeElement {
                ref_id: ref_id.clone(),
                kind,
                file: file.to_string(),
                start_line: start + 1,
                end_line: end + 1,
                signature: lines[i].trim().trim_end_matches(':').to_string(),
                body: super::slice_lines(&lines, start, end),
                parent: parent_ref,
                visibility: py_visibility(&name),
                actions: Action::ALL.to_vec(),
                package: String::new(),
                name: name.clone(),
            });

            scope.push((indent, name, ref_id, kind == ElementKind::Struct));
            i += 1;
        }

        elements
    }

    fn emit_language_facts(&self, elements: &[CodeElement], _content: &str, facts: &mut Vec<Fact>) {
        // Decorators and async markers are re-derived from element bodies;
        // the parse is deterministic so this stays aligned with `parse`.
        for element in elements {
            match element.kind {
                ElementKind::Struct => {
                    facts.push(Fact::new("py_class", vec![Value::str(&element.ref_id)]));
                }
                ElementKind::Function | ElementKind::Method => {
                    let header = element
                        .body
                        .lines()
                        .find(|l| {
                            let t = l.trim_start();
                            t.starts_with("def ") || t.starts_with("async def ")
                        })
                        .unwrap_or("");
                    if header.trim_start().starts_with("async def ") {
                        facts.push(Fact::new("py_async_def", vec![Value::str(&element.ref_id)]));
                    }
                }
                _ => {}
            }
            for line in element.body.lines() {
                let trimmed = line.trim_start();
                if let Some(cap) = decorator_re().captures(trimmed) {
                    let name = cap[1].rsplit('.').next().unwrap_or(&cap[1]).to_string();
                    facts.push(Fact::new(
                        "py_decorator",
                        vec![Value::str(&element.ref_id), Value::str(&name)],
                    ));
                } else if trimmed.starts_with("def ")
                    || trimmed.starts_with("async def ")
                    || trimmed.starts_with("class ")
                {
                    // Decorators attach to the first declaration only.
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"import os

MAX_SIZE = 1024

@dataclass
class Config:
    """Holds settings.

def not_a_function(self):
    """

    def load(self, path):
        return os.path.exists(path)

    async def refresh(self):
        pass

    def _internal(self):
        pass

def make_config():
    return Config()

def __secret():
    pass
"#;

    fn parse() -> Vec<CodeElement> {
        PythonParser.parse("app/config.py", "/ws/app/config.py", SOURCE)
    }

    #[test]
    fn test_element_extraction() {
        let elements = parse();
        let names: Vec<&str> = elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["MAX_SIZE", "Config", "load", "refresh", "_internal", "make_config", "__secret"]
        );
    }

    #[test]
    fn test_docstring_does_not_end_class() {
        let elements = parse();
        let config = elements.iter().find(|e| e.name == "Config").unwrap();
        // The fake `def` inside the docstring is not an element, and the class
        // extends past it.
        assert!(config.end_line >= 18);
        assert!(!elements.iter().any(|e| e.name == "not_a_function"));
    }

    #[test]
    fn test_methods_have_class_parent() {
        let elements = parse();
        let config_ref = elements.iter().find(|e| e.name == "Config").unwrap().ref_id.clone();
        let load = elements.iter().find(|e| e.name == "load").unwrap();
        assert_eq!(load.kind, ElementKind::Method);
        assert_eq!(load.parent, config_ref);
        assert_eq!(load.ref_id, "py:app/config.py:Config.load");

        let make = elements.iter().find(|e| e.name == "make_config").unwrap();
        assert_eq!(make.kind, ElementKind::Function);
        assert!(make.parent.is_empty());
    }

    #[test]
    fn test_visibility_rules() {
        let elements = parse();
        assert_eq!(
            elements.iter().find(|e| e.name == "_internal").unwrap().visibility,
            Visibility::Private
        );
        assert_eq!(
            elements.iter().find(|e| e.name == "__secret").unwrap().visibility,
            Visibility::Private
        );
        assert_eq!(
            elements.iter().find(|e| e.name == "load").unwrap().visibility,
            Visibility::Public
        );
    }

    #[test]
    fn test_decorator_starts_element() {
        let elements = parse();
        let config = elements.iter().find(|e| e.name == "Config").unwrap();
        // The @dataclass line is part of the element.
        assert_eq!(config.start_line, 5);
        assert!(config.body.starts_with("@dataclass"));
    }

    #[test]
    fn test_language_facts() {
        let elements = parse();
        let mut facts = Vec::new();
        PythonParser.emit_language_facts(&elements, SOURCE, &mut facts);
        let preds: Vec<&str> = facts.iter().map(|f| f.predicate.as_str()).collect();
        assert!(preds.contains(&"py_class"));
        assert!(preds.contains(&"py_async_def"));
        let dec = facts.iter().find(|f| f.predicate == "py_decorator").unwrap();
        assert_eq!(dec.args[1], Value::str("dataclass"));
    }
}
