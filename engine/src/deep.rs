//! Deep (second-pass) pipeline for Go.
//!
//! Heavier traversal of an already-parsed file producing the holographic
//! tier: what each file defines, which names its functions call, and the
//! full data-flow fact set. Stored at `deep` depth, independent of the fast
//! tier. Callee names are unresolved intra-file identifiers; cross-file
//! resolution belongs to the reasoner.

use crate::dataflow;
use crate::elements::{CodeElement, ElementKind};
use crate::facts::{Fact, Value};
use crate::language::Language;
use regex::Regex;
use std::sync::OnceLock;

fn call_site_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_][\w.]*)\s*\(").unwrap())
}

/// Go keywords and builtins that look like calls in a line scan.
const NON_CALLEES: &[&str] = &[
    "if", "for", "switch", "select", "return", "defer", "go", "func", "range", "make", "new",
    "len", "cap", "append", "copy", "delete", "panic", "recover", "print", "println",
];

/// Facts for one Go file at `deep` depth.
pub fn deep_facts(rel_path: &str, content: &str, elements: &[CodeElement]) -> Vec<Fact> {
    let mut facts = Vec::new();

    for element in elements {
        facts.push(Fact::new(
            "code_defines",
            vec![
                Value::str(rel_path),
                Value::str(&element.ref_id),
                Value::atom(element.kind.atom_name()),
            ],
        ));
    }

    for element in elements {
        if !matches!(element.kind, ElementKind::Function | ElementKind::Method) {
            continue;
        }
        let mut line_no = element.start_line;
        for line in element.body.lines() {
            // Skip the declaration line itself; its parameter list is not a
            // call site.
            if line_no > element.start_line {
                let trimmed = line.trim();
                if !trimmed.starts_with("//") {
                    for cap in call_site_re().captures_iter(line) {
                        let callee = cap[1].to_string();
                        let base = callee.rsplit('.').next().unwrap_or(&callee);
                        if NON_CALLEES.contains(&base) || NON_CALLEES.contains(&callee.as_str()) {
                            continue;
                        }
                        facts.push(Fact::new(
                            "code_calls",
                            vec![
                                Value::str(rel_path),
                                Value::str(&element.ref_id),
                                Value::str(&callee),
                                Value::int(line_no as i64),
                            ],
                        ));
                    }
                }
            }
            line_no += 1;
        }
    }

    facts.extend(dataflow::extract_file(Language::Go, rel_path, content, elements));
    facts
}
