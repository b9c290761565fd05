//! Go code-element parser.
//!
//! Line-oriented extraction of packages, functions, methods, types, and
//! const/var declarations. Method elements link to their receiver type when
//! that type is declared in the same file.

use super::{find_block_end, signature_of, slice_lines, LanguageParser, GO_SYNTAX};
use crate::elements::{make_ref, Action, CodeElement, ElementKind, Visibility};
use crate::facts::{Fact, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct GoParser;

fn func_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^func\s+([A-Za-z_]\w*)\s*\(").unwrap())
}

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^func\s+\(\s*\w+\s+\*?([A-Za-z_]\w*)\s*\)\s+([A-Za-z_]\w*)\s*\(").unwrap()
    })
}

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^type\s+([A-Za-z_]\w*)\s+(struct|interface)?").unwrap())
}

fn value_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(const|var)\s+([A-Za-z_]\w*)").unwrap())
}

fn group_member_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z_]\w*)(?:\s|=|$)").unwrap())
}

fn go_visibility(name: &str) -> Visibility {
    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

impl LanguageParser for GoParser {
    fn language_tag(&self) -> &'static str {
        "go"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn parse(&self, rel_path: &str, file: &str, content: &str) -> Vec<CodeElement> {
        let lines: Vec<&str> = content.lines().collect();
        let mut elements: Vec<CodeElement> = Vec::new();
        let mut package = String::new();
        // Receiver type name -> index of the type element, for parent links.
        let mut type_index: HashMap<String, usize> = HashMap::new();
        // (element index, receiver type) for the parent fix-up pass.
        let mut pending_methods: Vec<(usize, String)> = Vec::new();

        let element = |elements: &mut Vec<CodeElement>,
                           kind: ElementKind,
                           name: &str,
                           parent_name: &str,
                           start: usize,
                           end: usize,
                           lines: &[&str],
                           pkg: &str| {
            elements.push(CodeElement {
                ref_id: make_ref("go", rel_path, parent_name, name),
                kind,
                file: file.to_string(),
                start_line: start + 1,
                end_line: end + 1,
                signature: signature_of(lines[start]),
                body: slice_lines(lines, start, end),
                parent: String::new(),
                visibility: go_visibility(name),
                actions: Action::ALL.to_vec(),
                package: pkg.to_string(),
                name: name.to_string(),
            });
        };

        let mut i = 0usize;
        let mut in_block_comment = false;
        while i < lines.len() {
            let trimmed = lines[i].trim();

            if in_block_comment {
                if trimmed.contains("*/") {
                    in_block_comment = false;
                }
                i += 1;
                continue;
            }
            if trimmed.starts_with("/*") && !trimmed.contains("*/") {
                in_block_comment = true;
                i += 1;
                continue;
            }
            if trimmed.is_empty() || trimmed.starts_with("//") {
                i += 1;
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("package ") {
                let name = rest.split_whitespace().next().unwrap_or("").to_string();
                if !name.is_empty() && package.is_empty() {
                    package = name.clone();
                    element(
                        &mut elements,
                        ElementKind::Package,
                        &name,
                        "",
                        i,
                        i,
                        &lines,
                        &name,
                    );
                }
                i += 1;
                continue;
            }

            if let Some(cap) = method_re().captures(trimmed) {
                let recv = cap[1].to_string();
                let name = cap[2].to_string();
                let end = find_block_end(&lines, i, GO_SYNTAX);
                element(&mut elements, ElementKind::Method, &name, &recv, i, end, &lines, &package);
                pending_methods.push((elements.len() - 1, recv));
                i = end + 1;
                continue;
            }

            if let Some(cap) = func_re().captures(trimmed) {
                let name = cap[1].to_string();
                let end = find_block_end(&lines, i, GO_SYNTAX);
                element(&mut elements, ElementKind::Function, &name, "", i, end, &lines, &package);
                i = end + 1;
                continue;
            }

            if let Some(cap) = type_re().captures(trimmed) {
                let name = cap[1].to_string();
                let kind = match cap.get(2).map(|m| m.as_str()) {
                    Some("struct") => ElementKind::Struct,
                    Some("interface") => ElementKind::Interface,
                    _ => ElementKind::Type,
                };
                let end = if trimmed.contains('{') {
                    find_block_end(&lines, i, GO_SYNTAX)
                } else {
                    i
                };
                element(&mut elements, kind, &name, "", i, end, &lines, &package);
                type_index.insert(name, elements.len() - 1);
                i = end + 1;
                continue;
            }

            // const ( ... ) / var ( ... ) groups.
            if trimmed == "const (" || trimmed == "var (" {
                let kind = if trimmed.starts_with("const") {
                    ElementKind::Const
                } else {
                    ElementKind::Var
                };
                let mut j = i + 1;
                while j < lines.len() && lines[j].trim() != ")" {
                    let member = lines[j].trim();
                    if !member.is_empty() && !member.starts_with("//") {
                        if let Some(cap) = group_member_re().captures(member) {
                            let name = cap[1].to_string();
                            if name != "iota" {
                                element(&mut elements, kind, &name, "", j, j, &lines, &package);
                            }
                        }
                    }
                    j += 1;
                }
                i = j + 1;
                continue;
            }

            if let Some(cap) = value_decl_re().captures(trimmed) {
                let kind = if &cap[1] == "const" { ElementKind::Const } else { ElementKind::Var };
                element(&mut elements, kind, &cap[2], "", i, i, &lines, &package);
                i += 1;
                continue;
            }

            i += 1;
        }

        // Parent links only point at elements in the same parse output.
        for (idx, recv) in pending_methods {
            if let Some(&type_idx) = type_index.get(&recv) {
                let parent_ref = elements[type_idx].ref_id.clone();
                elements[idx].parent = parent_ref;
            }
        }

        elements
    }

    fn emit_language_facts(&self, elements: &[CodeElement], _content: &str, facts: &mut Vec<Fact>) {
        for element in elements {
            match element.kind {
                ElementKind::Struct => {
                    facts.push(Fact::new("go_struct", vec![Value::str(&element.ref_id)]));
                    for line in element.body.lines().skip(1) {
                        // Struct-field tags are backtick strings on field lines.
                        if let Some(start) = line.find('`') {
                            if let Some(len) = line[start + 1..].find('`') {
                                let tag = &line[start + 1..start + 1 + len];
                                facts.push(Fact::new(
                                    "go_tag",
                                    vec![Value::str(&element.ref_id), Value::str(tag)],
                                ));
                            }
                        }
                    }
                }
                ElementKind::Function | ElementKind::Method => {
                    if launches_goroutine(&element.body) {
                        facts.push(Fact::new("go_goroutine", vec![Value::str(&element.ref_id)]));
                    }
                }
                _ => {}
            }
        }
    }
}

/// Does a function body start a goroutine?
fn launches_goroutine(body: &str) -> bool {
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("go ") || trimmed.contains(" go func(") || trimmed.contains("\tgo ")
        {
            return true;
        }
    }
    false
}
