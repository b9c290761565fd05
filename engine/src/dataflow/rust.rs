//! Rust data-flow patterns: Option/Result classification, `if let` and
//! `match` safe access, `?` propagation.

use super::{
    assigns, brace_block_end, block_exits, emit_uses_and_call_args, error_checked_return,
    guard_dominates, guards_block, guards_return, is_primitive_literal, safe_access, FnCtx,
};
use crate::elements::CodeElement;
use crate::facts::Fact;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn let_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*let\s+(?:mut\s+)?([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=\s*(.+)$").unwrap()
    })
}

fn if_let_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:}\s*else\s+)?if\s+let\s+(Some|Ok|Err)\s*\([^)]*\)\s*=\s*([A-Za-z_]\w*)")
            .unwrap()
    })
}

fn is_none_err_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*if\s+([A-Za-z_]\w*)\s*\.\s*(is_none|is_err)\s*\(\)").unwrap()
    })
}

fn match_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*match\s+([A-Za-z_]\w*)\s*\{").unwrap())
}

fn question_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*let\s+(?:mut\s+)?([A-Za-z_]\w*)(?:\s*:[^=]+)?\s*=\s*.+\?\s*;").unwrap()
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
            let group = group.trim().trim_start_matches("mut ").trim();
            if group.contains("self") {
                return None;
            }
            let name = group.split(':').next().unwrap_or("").trim();
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

fn classify(type_ann: Option<&str>, rhs: &str) -> &'static str {
    if let Some(ty) = type_ann {
        let ty = ty.trim();
        if ty.starts_with("Option") {
            return "option";
        }
        if ty.starts_with("Result") {
            return "result";
        }
    }
    let rhs = rhs.trim();
    if rhs.starts_with("Some(") || rhs == "None" || rhs.starts_with("None;") {
        return "option";
    }
    if rhs.starts_with("Ok(") || rhs.starts_with("Err(") {
        return "result";
    }
    "other"
}

const EXIT_WORDS: &[&str] = &["return", "panic!", "unreachable!", "continue", "break"];

pub(crate) fn extract(ctx: &FnCtx, element: &CodeElement, facts: &mut Vec<Fact>) {
    let mut vars: BTreeSet<String> = param_names(&element.signature).into_iter().collect();

    for (line_no, line) in ctx.body_lines() {
        if line_no == ctx.start_line {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.starts_with("//") {
            continue;
        }

        // `let x = expr?;` — the error branch propagates out right here.
        if let Some(cap) = question_re().captures(line) {
            facts.push(error_checked_return(ctx, &cap[1], line_no));
        }

        if let Some(cap) = let_re().captures(line) {
            let var = cap[1].to_string();
            let class = classify(cap.get(2).map(|m| m.as_str()), &cap[3]);
            facts.push(assigns(ctx, &var, class, line_no));
            if !is_primitive_literal(&cap[3]) {
                vars.insert(var);
            }
        }

        // `if let Some(u) = user { ... }` — user is safe inside the block.
        if let Some(cap) = if_let_re().captures(line) {
            let pattern = &cap[1];
            let var = cap[2].to_string();
            let check = if pattern == "Some" { "option_check" } else { "result_check" };
            let end = brace_block_end(ctx, line_no);
            facts.push(guards_block(ctx, &var, check, line_no, end));
            facts.push(safe_access(ctx, &var, "if_let", line_no));
        }

        // `if x.is_none() { return ... }` / `if x.is_err() { ... }`.
        if let Some(cap) = is_none_err_re().captures(line) {
            let var = cap[1].to_string();
            let check = if &cap[2] == "is_none" { "option_check" } else { "result_check" };
            if block_exits(ctx, line_no, EXIT_WORDS) {
                facts.push(guards_return(ctx, &var, check, line_no));
                facts.push(guard_dominates(ctx, line_no));
            }
        }

        // A match on the variable covers every variant.
        if let Some(cap) = match_re().captures(line) {
            facts.push(safe_access(ctx, &cap[1], "match", line_no));
        }
    }

    emit_uses_and_call_args(ctx, &vars, &["self"], facts);
}
