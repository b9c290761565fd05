//! Intra-function data-flow extraction.
//!
//! One pass per function body, per language. The emitted facts are
//! program-slicing heuristics, sound only locally to the matched pattern;
//! downstream rules treat them as evidence, not proof. Classification,
//! guard, and safe-access patterns are the contract here — the extractors
//! match exactly these shapes and nothing subtler.

mod go;
mod python;
mod rust;
mod typescript;

use crate::elements::{CodeElement, ElementKind};
use crate::facts::{Fact, Value};
use crate::language::Language;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Extract all data-flow facts for one file.
pub fn extract_file(
    lang: Language,
    rel_path: &str,
    content: &str,
    elements: &[CodeElement],
) -> Vec<Fact> {
    let lines: Vec<&str> = content.lines().collect();
    let mut facts = Vec::new();

    for element in elements {
        if !matches!(element.kind, ElementKind::Function | ElementKind::Method) {
            continue;
        }
        if element.start_line == 0 || element.end_line > lines.len() {
            continue;
        }
        let ctx = FnCtx {
            rel_path,
            func: &element.name,
            start_line: element.start_line,
            end_line: element.end_line,
            lines: &lines,
        };
        facts.push(Fact::new(
            "function_scope",
            vec![
                Value::str(rel_path),
                Value::atom(&element.name),
                Value::int(element.start_line as i64),
                Value::int(element.end_line as i64),
            ],
        ));
        match lang {
            Language::Go => go::extract(&ctx, element, &mut facts),
            Language::Python => python::extract(&ctx, element, &mut facts),
            Language::Rust => rust::extract(&ctx, element, &mut facts),
            Language::TypeScript | Language::JavaScript => {
                typescript::extract(&ctx, element, &mut facts)
            }
            _ => {}
        }
    }

    facts
}

/// Shared view of one function body during extraction. Line numbers are
/// 1-indexed throughout, matching the element model.
pub(crate) struct FnCtx<'a> {
    pub rel_path: &'a str,
    pub func: &'a str,
    pub start_line: usize,
    pub end_line: usize,
    pub lines: &'a [&'a str],
}

impl<'a> FnCtx<'a> {
    /// Iterate `(line_number, text)` over the body, signature line included.
    pub fn body_lines(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        (self.start_line..=self.end_line.min(self.lines.len()))
            .map(move |n| (n, self.lines[n - 1]))
    }
}

// ---------------------------------------------------------------------------
// Shared fact constructors
// ---------------------------------------------------------------------------

pub(crate) fn assigns(ctx: &FnCtx, var: &str, class: &str, line: usize) -> Fact {
    Fact::new(
        "assigns",
        vec![
            Value::atom(var),
            Value::atom(class),
            Value::str(ctx.rel_path),
            Value::int(line as i64),
        ],
    )
}

pub(crate) fn guards_return(ctx: &FnCtx, var: &str, check: &str, line: usize) -> Fact {
    Fact::new(
        "guards_return",
        vec![
            Value::atom(var),
            Value::atom(check),
            Value::str(ctx.rel_path),
            Value::int(line as i64),
        ],
    )
}

pub(crate) fn guard_dominates(ctx: &FnCtx, guard_line: usize) -> Fact {
    Fact::new(
        "guard_dominates",
        vec![
            Value::str(ctx.rel_path),
            Value::atom(ctx.func),
            Value::int(guard_line as i64),
            Value::int(ctx.end_line as i64),
        ],
    )
}

pub(crate) fn guards_block(ctx: &FnCtx, var: &str, check: &str, start: usize, end: usize) -> Fact {
    Fact::new(
        "guards_block",
        vec![
            Value::atom(var),
            Value::atom(check),
            Value::str(ctx.rel_path),
            Value::int(start as i64),
            Value::int(end as i64),
        ],
    )
}

pub(crate) fn error_checked_return(ctx: &FnCtx, var: &str, line: usize) -> Fact {
    Fact::new(
        "error_checked_return",
        vec![Value::atom(var), Value::str(ctx.rel_path), Value::int(line as i64)],
    )
}

pub(crate) fn error_checked_block(ctx: &FnCtx, var: &str, start: usize, end: usize) -> Fact {
    Fact::new(
        "error_checked_block",
        vec![
            Value::atom(var),
            Value::str(ctx.rel_path),
            Value::int(start as i64),
            Value::int(end as i64),
        ],
    )
}

pub(crate) fn safe_access(ctx: &FnCtx, var: &str, kind: &str, line: usize) -> Fact {
    Fact::new(
        "safe_access",
        vec![
            Value::atom(var),
            Value::atom(kind),
            Value::str(ctx.rel_path),
            Value::int(line as i64),
        ],
    )
}

// ---------------------------------------------------------------------------
// Shared uses / call_arg emission
// ---------------------------------------------------------------------------

fn access_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\*([A-Za-z_]\w*))|([A-Za-z_]\w*)\s*(?:\.|\[)").unwrap())
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_][\w.]*)\s*\(([^()]*)\)").unwrap())
}

/// Emit `uses` facts for field/method access and dereference of tracked
/// variables, plus `call_arg` facts for tracked variables passed as bare
/// call arguments. `excluded` filters receiver words like `self`/`this`.
pub(crate) fn emit_uses_and_call_args(
    ctx: &FnCtx,
    vars: &BTreeSet<String>,
    excluded: &[&str],
    facts: &mut Vec<Fact>,
) {
    for (line_no, line) in ctx.body_lines() {
        if line_no == ctx.start_line {
            continue;
        }
        let mut seen_on_line: Vec<&str> = Vec::new();
        for cap in access_re().captures_iter(line) {
            let var = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str()).unwrap_or("");
            if var.is_empty()
                || var == "_"
                || excluded.contains(&var)
                || !vars.contains(var)
                || seen_on_line.contains(&var)
            {
                continue;
            }
            seen_on_line.push(var);
            facts.push(Fact::new(
                "uses",
                vec![
                    Value::str(ctx.rel_path),
                    Value::atom(ctx.func),
                    Value::atom(var),
                    Value::int(line_no as i64),
                ],
            ));
        }

        for cap in call_re().captures_iter(line) {
            let callee = &cap[1];
            if callee == "if" || callee == "for" || callee == "while" || callee == "switch" {
                continue;
            }
            for (position, raw_arg) in cap[2].split(',').enumerate() {
                let arg = raw_arg.trim();
                if !arg.is_empty()
                    && arg.chars().all(|c| c.is_alphanumeric() || c == '_')
                    && !arg.chars().next().unwrap().is_ascii_digit()
                    && vars.contains(arg)
                    && !excluded.contains(&arg)
                {
                    let callsite = format!("{}:{}:{}", ctx.func, callee, line_no);
                    facts.push(Fact::new(
                        "call_arg",
                        vec![
                            Value::atom(&callsite),
                            Value::int(position as i64),
                            Value::atom(arg),
                            Value::str(ctx.rel_path),
                            Value::int(line_no as i64),
                        ],
                    ));
                }
            }
        }
    }
}

/// Is the right-hand side a pure primitive literal? Those locals are dropped
/// from `uses` tracking.
pub(crate) fn is_primitive_literal(rhs: &str) -> bool {
    let rhs = rhs.trim().trim_end_matches([';', ',']);
    if rhs.is_empty() {
        return false;
    }
    if rhs.starts_with('"') || rhs.starts_with('\'') {
        return true;
    }
    if rhs == "true" || rhs == "false" {
        return true;
    }
    rhs.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '_' || c == '-')
}

/// Find the 1-indexed line closing the brace block that opens on
/// `open_line` (1-indexed), bounded by the function end.
pub(crate) fn brace_block_end(ctx: &FnCtx, open_line: usize) -> usize {
    let mut depth = 0i32;
    let mut opened = false;
    for n in open_line..=ctx.end_line.min(ctx.lines.len()) {
        let mut in_string = false;
        for c in ctx.lines[n - 1].chars() {
            if in_string {
                if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if opened && depth <= 0 {
                        return n;
                    }
                }
                _ => {}
            }
        }
    }
    ctx.end_line
}

/// Does the block starting at `open_line` end in a control-flow exit? Used to
/// decide guard-return versus plain guard shapes.
pub(crate) fn block_exits(ctx: &FnCtx, open_line: usize, exit_words: &[&str]) -> bool {
    let end = brace_block_end(ctx, open_line);
    // Single-line guard: `if x == nil { return 0 }`.
    if end == open_line {
        let line = ctx.lines[open_line - 1];
        return exit_words.iter().any(|w| line.contains(w));
    }
    for n in (open_line..end).rev() {
        let trimmed = ctx.lines[n - 1].trim();
        if trimmed.is_empty() || trimmed == "}" || trimmed == "{" {
            continue;
        }
        return exit_words.iter().any(|w| trimmed.starts_with(w) || trimmed.contains(w));
    }
    false
}
