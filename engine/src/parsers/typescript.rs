//! TypeScript / JavaScript code-element parser.
//!
//! One scanning core serves both languages; the TypeScript-only constructs
//! (interfaces, type aliases, enums) simply never match in JavaScript source.
//! Visibility is export-driven at the top level and keyword-driven for class
//! members.

use super::{find_block_end, signature_of, slice_lines, LanguageParser, JS_SYNTAX};
use crate::elements::{make_ref, Action, CodeElement, ElementKind, Visibility};
use crate::facts::{Fact, Value};
use regex::Regex;
use std::sync::OnceLock;

pub struct TypeScriptParser;
pub struct JavaScriptParser;

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)")
            .unwrap()
    })
}

fn interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)").unwrap())
}

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)")
            .unwrap()
    })
}

fn arrow_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:export\s+)?const\s+([A-Za-z_$][\w$]*)(?:\s*:[^=]+)?\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>",
        )
        .unwrap()
    })
}

fn type_alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:export\s+)?type\s+([A-Za-z_$][\w$]*)").unwrap())
}

fn enum_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:export\s+)?(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)").unwrap())
}

fn value_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:export\s+)?(const|let|var)\s+([A-Za-z_$][\w$]*)").unwrap()
    })
}

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(public|private|protected)\s+)?(?:static\s+)?(?:async\s+)?(?:get\s+|set\s+)?([A-Za-z_$][\w$]*)\s*\([^;]*$",
        )
        .unwrap()
    })
}

fn interface_prop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:readonly\s+)?([A-Za-z_$][\w$]*)\??\s*[:(]").unwrap())
}

fn hook_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(use[A-Z]\w*)\s*\(").unwrap())
}

const MEMBER_KEYWORDS: &[&str] =
    &["if", "for", "while", "switch", "catch", "return", "new", "function", "else", "do", "typeof"];

fn top_visibility(line: &str) -> Visibility {
    if line.starts_with("export ") || line.starts_with("export default ") {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

struct TsScan<'a> {
    tag: &'static str,
    rel_path: &'a str,
    file: &'a str,
}

impl<'a> TsScan<'a> {
    fn element(
        &self,
        kind: ElementKind,
        name: &str,
        parent_name: &str,
        parent_ref: &str,
        visibility: Visibility,
        start: usize,
        end: usize,
        lines: &[&str],
    ) -> CodeElement {
        CodeElement {
            ref_id: make_ref(self.tag, self.rel_path, parent_name, name),
            kind,
            file: self.file.to_string(),
            start_line: start + 1,
            end_line: end + 1,
            signature: signature_of(lines[start]),
            body: slice_lines(lines, start, end),
            parent: parent_ref.to_string(),
            visibility,
            actions: Action::ALL.to_vec(),
            package: String::new(),
            name: name.to_string(),
        }
    }

    fn parse(&self, content: &str) -> Vec<CodeElement> {
        let lines: Vec<&str> = content.lines().collect();
        let mut elements = Vec::new();
        let mut i = 0usize;

        while i < lines.len() {
            let trimmed = lines[i].trim();
            if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('*') {
                i += 1;
                continue;
            }

            if let Some(cap) = interface_re().captures(trimmed) {
                let end = find_block_end(&lines, i, JS_SYNTAX);
                elements.push(self.element(
                    ElementKind::Interface,
                    &cap[1],
                    "",
                    "",
                    top_visibility(trimmed),
                    i,
                    end,
                    &lines,
                ));
                i = end + 1;
                continue;
            }

            if let Some(cap) = class_re().captures(trimmed) {
                let class_name = cap[1].to_string();
                let end = find_block_end(&lines, i, JS_SYNTAX);
                let class_vis = top_visibility(trimmed);
                elements.push(self.element(
                    ElementKind::Struct,
                    &class_name,
                    "",
                    "",
                    class_vis,
                    i,
                    end,
                    &lines,
                ));
                let class_ref = elements.last().unwrap().ref_id.clone();
                self.parse_class_members(&lines, i, end, &class_name, &class_ref, &mut elements);
                i = end + 1;
                continue;
            }

            if let Some(cap) = enum_re().captures(trimmed) {
                let end = find_block_end(&lines, i, JS_SYNTAX);
                elements.push(self.element(
                    ElementKind::Type,
                    &cap[1],
                    "",
                    "",
                    top_visibility(trimmed),
                    i,
                    end,
                    &lines,
                ));
                i = end + 1;
                continue;
            }

            if let Some(cap) = function_re().captures(trimmed) {
                let end = if trimmed.contains('{') || lines[i..].iter().take(4).any(|l| l.contains('{')) {
                    find_block_end(&lines, i, JS_SYNTAX)
                } else {
                    i
                };
                elements.push(self.element(
                    ElementKind::Function,
                    &cap[1],
                    "",
                    "",
                    top_visibility(trimmed),
                    i,
                    end,
                    &lines,
                ));
                i = end + 1;
                continue;
            }

            if let Some(cap) = arrow_fn_re().captures(trimmed) {
                let end = if trimmed.contains('{') {
                    find_block_end(&lines, i, JS_SYNTAX)
                } else {
                    i
                };
                elements.push(self.element(
                    ElementKind::Function,
                    &cap[1],
                    "",
                    "",
                    top_visibility(trimmed),
                    i,
                    end,
                    &lines,
                ));
                i = end + 1;
                continue;
            }

            if let Some(cap) = type_alias_re().captures(trimmed) {
                elements.push(self.element(
                    ElementKind::Type,
                    &cap[1],
                    "",
                    "",
                    top_visibility(trimmed),
                    i,
                    i,
                    &lines,
                ));
                i += 1;
                continue;
            }

            if let Some(cap) = value_decl_re().captures(trimmed) {
                let kind = if &cap[1] == "const" { ElementKind::Const } else { ElementKind::Var };
                elements.push(self.element(
                    kind,
                    &cap[2],
                    "",
                    "",
                    top_visibility(trimmed),
                    i,
                    i,
                    &lines,
                ));
                i += 1;
                continue;
            }

            i += 1;
        }

        elements
    }

    /// Extract methods declared in a class body. Default member visibility is
    /// public; `private`/`protected` keywords override.
    #[allow(clippy::too_many_arguments)]
    fn parse_class_members(
        &self,
        lines: &[&str],
        class_start: usize,
        class_end: usize,
        class_name: &str,
        class_ref: &str,
        elements: &mut Vec<CodeElement>,
    ) {
        let mut i = class_start + 1;
        while i < class_end {
            let trimmed = lines[i].trim();
            if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('*') {
                i += 1;
                continue;
            }
            if let Some(cap) = method_re().captures(trimmed) {
                let name = cap[2].to_string();
                if MEMBER_KEYWORDS.contains(&name.as_str()) || !trimmed.contains('(') {
                    i += 1;
                    continue;
                }
                // Field initializers and signatures without bodies stay out.
                let opens_body = lines[i..=class_end.min(lines.len() - 1)]
                    .iter()
                    .take(3)
                    .any(|l| l.contains('{'));
                if !opens_body {
                    i += 1;
                    continue;
                }
                let end = find_block_end(lines, i, JS_SYNTAX).min(class_end);
                let visibility = match cap.get(1).map(|m| m.as_str()) {
                    Some("private") => Visibility::Private,
                    Some("protected") => Visibility::Protected,
                    _ => Visibility::Public,
                };
                elements.push(self.element(
                    ElementKind::Method,
                    &name,
                    class_name,
                    class_ref,
                    visibility,
                    i,
                    end,
                    lines,
                ));
                i = end + 1;
                continue;
            }
            i += 1;
        }
    }

    fn language_facts(&self, elements: &[CodeElement], facts: &mut Vec<Fact>) {
        for element in elements {
            match element.kind {
                ElementKind::Struct => {
                    facts.push(Fact::new("ts_class", vec![Value::str(&element.ref_id)]));
                }
                ElementKind::Interface => {
                    facts.push(Fact::new("ts_interface", vec![Value::str(&element.ref_id)]));
                    for line in element.body.lines().skip(1) {
                        let trimmed = line.trim();
                        if trimmed == "}" || trimmed.is_empty() {
                            continue;
                        }
                        if let Some(cap) = interface_prop_re().captures(line) {
                            facts.push(Fact::new(
                                "ts_interface_prop",
                                vec![Value::str(&element.ref_id), Value::str(&cap[1])],
                            ));
                        }
                    }
                }
                ElementKind::Function | ElementKind::Method => {
                    if is_react_component(element) {
                        facts.push(Fact::new("ts_component", vec![Value::str(&element.ref_id)]));
                    }
                    let mut seen = Vec::new();
                    for cap in hook_re().captures_iter(&element.body) {
                        let hook = cap[1].to_string();
                        if !seen.contains(&hook) {
                            facts.push(Fact::new(
                                "ts_hook",
                                vec![Value::str(&element.ref_id), Value::str(&hook)],
                            ));
                            seen.push(hook);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Capitalized function whose body returns JSX.
fn is_react_component(element: &CodeElement) -> bool {
    if !element.name.chars().next().is_some_and(|c| c.is_uppercase()) {
        return false;
    }
    element.body.contains("return <")
        || element.body.contains("return (")
            && element.body.lines().any(|l| l.trim_start().starts_with('<'))
        || element.body.contains("=> <")
}

impl LanguageParser for TypeScriptParser {
    fn language_tag(&self) -> &'static str {
        "ts"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx"]
    }

    fn parse(&self, rel_path: &str, file: &str, content: &str) -> Vec<CodeElement> {
        TsScan { tag: "ts", rel_path, file }.parse(content)
    }

    fn emit_language_facts(&self, elements: &[CodeElement], _content: &str, facts: &mut Vec<Fact>) {
        TsScan { tag: "ts", rel_path: "", file: "" }.language_facts(elements, facts);
    }
}

impl LanguageParser for JavaScriptParser {
    fn language_tag(&self) -> &'static str {
        "js"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn parse(&self, rel_path: &str, file: &str, content: &str) -> Vec<CodeElement> {
        TsScan { tag: "js", rel_path, file }.parse(content)
    }

    fn emit_language_facts(&self, elements: &[CodeElement], _content: &str, facts: &mut Vec<Fact>) {
        TsScan { tag: "js", rel_path: "", file: "" }.language_facts(elements, facts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"import React from "react";

export interface Foo {
  id: string;
  name?: string;
}

class Hidden {
  private secret(): void {
    this.x = 1;
  }
  render() {
    return this.x;
  }
}

export function useCounter() {
  const [count, setCount] = useState(0);
  return count;
}

export const Widget = (props: Props) => {
  const theme = useTheme();
  return <div>{props.label}</div>;
};

export type Alias = string;

const internal = 42;
"#;

    fn parse() -> Vec<CodeElement> {
        TypeScriptParser.parse("ui/widget.tsx", "/ws/ui/widget.tsx", SOURCE)
    }

    #[test]
    fn test_element_extraction() {
        let elements = parse();
        let names: Vec<&str> = elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Foo", "Hidden", "secret", "render", "useCounter", "Widget", "Alias", "internal"]
        );
    }

    #[test]
    fn test_export_visibility() {
        let elements = parse();
        let foo = elements.iter().find(|e| e.name == "Foo").unwrap();
        assert_eq!(foo.kind, ElementKind::Interface);
        assert_eq!(foo.visibility, Visibility::Public);
        assert_eq!(foo.ref_id, "ts:ui/widget.tsx:Foo");

        let hidden = elements.iter().find(|e| e.name == "Hidden").unwrap();
        assert_eq!(hidden.visibility, Visibility::Private);
    }

    #[test]
    fn test_member_visibility() {
        let elements = parse();
        let secret = elements.iter().find(|e| e.name == "secret").unwrap();
        assert_eq!(secret.visibility, Visibility::Private);
        assert_eq!(secret.kind, ElementKind::Method);
        assert_eq!(secret.ref_id, "ts:ui/widget.tsx:Hidden.secret");
        let render = elements.iter().find(|e| e.name == "render").unwrap();
        assert_eq!(render.visibility, Visibility::Public);
    }

    #[test]
    fn test_interface_props() {
        let elements = parse();
        let mut facts = Vec::new();
        TypeScriptParser.emit_language_facts(&elements, SOURCE, &mut facts);
        let props: Vec<&str> = facts
            .iter()
            .filter(|f| f.predicate == "ts_interface_prop")
            .map(|f| f.args[1].as_str().unwrap())
            .collect();
        assert_eq!(props, vec!["id", "name"]);
    }

    #[test]
    fn test_component_and_hooks() {
        let elements = parse();
        let mut facts = Vec::new();
        TypeScriptParser.emit_language_facts(&elements, SOURCE, &mut facts);

        let widget_ref = "ts:ui/widget.tsx:Widget";
        assert!(facts
            .iter()
            .any(|f| f.predicate == "ts_component" && f.args[0] == Value::str(widget_ref)));
        let hooks: Vec<&str> = facts
            .iter()
            .filter(|f| f.predicate == "ts_hook" && f.args[0] == Value::str(widget_ref))
            .map(|f| f.args[1].as_str().unwrap())
            .collect();
        assert_eq!(hooks, vec!["useTheme"]);
    }

    #[test]
    fn test_js_tag() {
        let elements = JavaScriptParser.parse("lib/a.js", "/ws/lib/a.js", "function go() {}\n");
        assert_eq!(elements[0].ref_id, "js:lib/a.js:go");
    }
}
