//! Rust code-element parser.
//!
//! Extracts functions, types, traits, consts, and impl-block methods.
//! Methods link to their self type when it is declared in the same file.

use super::{find_block_end, signature_of, slice_lines, LanguageParser, RUST_SYNTAX};
use crate::elements::{make_ref, Action, CodeElement, ElementKind, Visibility};
use crate::facts::Fact;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct RustParser;

fn fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+([A-Za-z_]\w*)")
            .unwrap()
    })
}

fn type_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(struct|enum|trait|union)\s+([A-Za-z_]\w*)").unwrap()
    })
}

fn type_alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?type\s+([A-Za-z_]\w*)").unwrap())
}

fn const_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(const|static)\s+([A-Za-z_]\w*)").unwrap()
    })
}

fn mod_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)").unwrap())
}

fn impl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:unsafe\s+)?impl(?:<[^>]*>)?\s+(?:(?:[\w:]+)(?:<[^>]*>)?\s+for\s+)?([A-Za-z_]\w*)")
            .unwrap()
    })
}

fn rust_visibility(line: &str) -> Visibility {
    if line.starts_with("pub ") || line.starts_with("pub(") {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

impl LanguageParser for RustParser {
    fn language_tag(&self) -> &'static str {
        "rs"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn parse(&self, rel_path: &str, file: &str, content: &str) -> Vec<CodeElement> {
        let lines: Vec<&str> = content.lines().collect();
        let mut elements: Vec<CodeElement> = Vec::new();
        let mut type_index: HashMap<String, usize> = HashMap::new();
        let mut pending_methods: Vec<(usize, String)> = Vec::new();

        let push = |elements: &mut Vec<CodeElement>,
                        kind: ElementKind,
                        name: &str,
                        parent_name: &str,
                        visibility: Visibility,
                        start: usize,
                        end: usize,
                        lines: &[&str]| {
            elements.push(CodeElement {
                ref_id: make_ref("rs", rel_path, parent_name, name),
                kind,
                file: file.to_string(),
                start_line: start + 1,
                end_line: end + 1,
                signature: signature_of(lines[start]),
                body: slice_lines(lines, start, end),
                parent: String::new(),
                visibility,
                actions: Action::ALL.to_vec(),
                package: String::new(),
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
            if trimmed.is_empty()
                || trimmed.starts_with("//")
                || trimmed.starts_with("#[")
                || trimmed.starts_with("#![")
                || trimmed.starts_with("use ")
                || trimmed.starts_with("pub use ")
            {
                i += 1;
                continue;
            }

            // Impl blocks: the block itself is not an element, its methods
            // are.
            if trimmed.starts_with("impl ") || trimmed.starts_with("impl<") || trimmed.starts_with("unsafe impl")
            {
                if let Some(cap) = impl_re().captures(trimmed) {
                    let self_type = cap[1].to_string();
                    let end = find_block_end(&lines, i, RUST_SYNTAX);
                    let mut j = i + 1;
                    while j < end {
                        let member = lines[j].trim();
                        if let Some(fcap) = fn_re().captures(member) {
                            let name = fcap[1].to_string();
                            let fn_end = if member.ends_with(';') {
                                j
                            } else {
                                find_block_end(&lines, j, RUST_SYNTAX).min(end)
                            };
                            push(
                                &mut elements,
                                ElementKind::Method,
                                &name,
                                &self_type,
                                rust_visibility(member),
                                j,
                                fn_end,
                                &lines,
                            );
                            pending_methods.push((elements.len() - 1, self_type.clone()));
                            j = fn_end + 1;
                            continue;
                        }
                        j += 1;
                    }
                    i = end + 1;
                    continue;
                }
            }

            if let Some(cap) = type_decl_re().captures(trimmed) {
                let kind = match &cap[1] {
                    "struct" => ElementKind::Struct,
                    "trait" => ElementKind::Interface,
                    _ => ElementKind::Type,
                };
                let name = cap[2].to_string();
                let end = if trimmed.ends_with(';') || !block_opens_nearby(&lines, i) {
                    i
                } else {
                    find_block_end(&lines, i, RUST_SYNTAX)
                };
                push(&mut elements, kind, &name, "", rust_visibility(trimmed), i, end, &lines);
                type_index.insert(name, elements.len() - 1);
                i = end + 1;
                continue;
            }

            if let Some(cap) = fn_re().captures(trimmed) {
                let name = cap[1].to_string();
                let end = find_block_end(&lines, i, RUST_SYNTAX);
                push(
                    &mut elements,
                    ElementKind::Function,
                    &name,
                    "",
                    rust_visibility(trimmed),
                    i,
                    end,
                    &lines,
                );
                i = end + 1;
                continue;
            }

            if let Some(cap) = type_alias_re().captures(trimmed) {
                push(
                    &mut elements,
                    ElementKind::Type,
                    &cap[1],
                    "",
                    rust_visibility(trimmed),
                    i,
                    i,
                    &lines,
                );
                i += 1;
                continue;
            }

            if let Some(cap) = const_re().captures(trimmed) {
                let kind = if &cap[1] == "const" { ElementKind::Const } else { ElementKind::Var };
                push(&mut elements, kind, &cap[2], "", rust_visibility(trimmed), i, i, &lines);
                i += 1;
                continue;
            }

            if let Some(cap) = mod_re().captures(trimmed) {
                let end = if trimmed.ends_with(';') {
                    i
                } else {
                    find_block_end(&lines, i, RUST_SYNTAX)
                };
                push(
                    &mut elements,
                    ElementKind::Package,
                    &cap[1],
                    "",
                    rust_visibility(trimmed),
                    i,
                    end,
                    &lines,
                );
                // Do not descend into inline modules; their items are rare at
                // this granularity and keep top-level refs unambiguous.
                i = end + 1;
                continue;
            }

            i += 1;
        }

        for (idx, self_type) in pending_methods {
            if let Some(&type_idx) = type_index.get(&self_type) {
                let parent_ref = elements[type_idx].ref_id.clone();
                elements[idx].parent = parent_ref;
            }
        }

        elements
    }

    fn emit_language_facts(
        &self,
        _elements: &[CodeElement],
        _content: &str,
        _facts: &mut Vec<Fact>,
    ) {
        // Rust has no Stratum-0 facts beyond the shared element companions.
    }
}

/// `struct Foo;` / `struct Foo(u32);` end on their own line; `struct Foo {`
/// and multi-line generic headers open a block within a couple of lines.
fn block_opens_nearby(lines: &[&str], idx: usize) -> bool {
    lines[idx..].iter().take(3).any(|l| l.contains('{'))
}
