//! Python data-flow patterns: None guards, getter-shaped assignments,
//! try/except coverage.

use super::{
    assigns, emit_uses_and_call_args, error_checked_block, guard_dominates, guards_block,
    guards_return, is_primitive_literal, FnCtx,
};
use crate::elements::CodeElement;
use crate::facts::Fact;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z_]\w*)\s*(?::[^=]+)?=\s*(.+)$").unwrap())
}

fn is_none_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*if\s+([A-Za-z_]\w*)\s+is\s+None\s*:").unwrap())
}

fn is_not_none_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*if\s+([A-Za-z_]\w*)\s+is\s+not\s+None\s*:").unwrap())
}

fn getter_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\b(?:get|find|load|read|open|parse)\w*\s*\(|\.(?:get|find|pop)\s*\()")
            .unwrap()
    })
}

fn param_names(signature: &str) -> Vec<String> {
    let Some(open) = signature.find('(') else {
        return Vec::new();
    };
    let params = signature[open + 1..].split(')').next().unwrap_or("");
    params
        .split(',')
        .filter_map(|group| {
            let name = group.trim().trim_start_matches(['*', '&']);
            let name = name.split([':', '=']).next().unwrap_or("").trim();
            if name.is_empty() || name == "self" || name == "cls" {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

fn classify_rhs(rhs: &str) -> &'static str {
    let rhs = rhs.trim();
    if rhs == "None" || rhs.starts_with("None ") {
        return "nullable";
    }
    if getter_call_re().is_match(rhs) {
        return "nullable";
    }
    "other"
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Last line of the suite introduced by the header at `header_line`
/// (1-indexed), by indentation.
fn suite_end(ctx: &FnCtx, header_line: usize) -> usize {
    let header_indent = indent_of(ctx.lines[header_line - 1]);
    let mut last = header_line;
    for n in header_line + 1..=ctx.end_line.min(ctx.lines.len()) {
        let line = ctx.lines[n - 1];
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= header_indent {
            break;
        }
        last = n;
    }
    last
}

/// Does the suite of the header exit (return/raise/continue/break)?
fn suite_exits(ctx: &FnCtx, header_line: usize) -> bool {
    // Inline suite: `if x is None: return None`.
    let header = ctx.lines[header_line - 1];
    if let Some(after) = header.split(':').nth(1) {
        let after = after.trim();
        if after.starts_with("return") || after.starts_with("raise") {
            return true;
        }
    }
    let end = suite_end(ctx, header_line);
    for n in (header_line + 1..=end).rev() {
        let trimmed = ctx.lines[n - 1].trim();
        if trimmed.is_empty() {
            continue;
        }
        return trimmed.starts_with("return")
            || trimmed.starts_with("raise")
            || trimmed.starts_with("continue")
            || trimmed.starts_with("break");
    }
    false
}

pub(crate) fn extract(ctx: &FnCtx, element: &CodeElement, facts: &mut Vec<Fact>) {
    let mut vars: BTreeSet<String> = param_names(&element.signature).into_iter().collect();

    for (line_no, line) in ctx.body_lines() {
        if line_no == ctx.start_line {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            continue;
        }

        if !trimmed.starts_with("if ")
            && !trimmed.starts_with("elif ")
            && !trimmed.starts_with("while ")
            && !trimmed.starts_with("for ")
        {
            if let Some(cap) = assign_re().captures(line) {
                let var = cap[1].to_string();
                let rhs = cap[2].trim();
                // Comparison operators are not assignments.
                if !rhs.starts_with('=') && var != "self" {
                    facts.push(assigns(ctx, &var, classify_rhs(rhs), line_no));
                    if !is_primitive_literal(rhs) {
                        vars.insert(var);
                    }
                }
            }
        }

        if let Some(cap) = is_none_re().captures(line) {
            let var = cap[1].to_string();
            if suite_exits(ctx, line_no) {
                facts.push(guards_return(ctx, &var, "none_check", line_no));
                facts.push(guard_dominates(ctx, line_no));
            }
        }

        if let Some(cap) = is_not_none_re().captures(line) {
            let var = cap[1].to_string();
            let end = suite_end(ctx, line_no);
            facts.push(guards_block(ctx, &var, "none_check", line_no, end));
        }

        // A try suite error-checks every variable assigned at its top level.
        if trimmed == "try:" {
            let end = suite_end(ctx, line_no);
            let try_indent = indent_of(line);
            for n in line_no + 1..=end {
                let inner = ctx.lines[n - 1];
                if indent_of(inner) != try_indent + 4 && indent_of(inner) != try_indent + 2 {
                    continue;
                }
                if let Some(cap) = assign_re().captures(inner) {
                    facts.push(error_checked_block(ctx, &cap[1], line_no, end));
                }
            }
        }
    }

    emit_uses_and_call_args(ctx, &vars, &["self", "cls"], facts);
}
