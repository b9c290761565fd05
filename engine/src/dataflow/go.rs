//! Go data-flow patterns: nil guards, error checks, constructor-shaped
//! assignments, goroutine-safe use tracking.

use super::{
    assigns, brace_block_end, block_exits, emit_uses_and_call_args, error_checked_block,
    error_checked_return, guard_dominates, guards_block, guards_return, is_primitive_literal,
    FnCtx,
};
use crate::elements::CodeElement;
use crate::facts::Fact;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*(?::=|=)\s*(.+)$").unwrap()
    })
}

fn nil_eq_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*if\s+([A-Za-z_]\w*)\s*==\s*nil\b").unwrap())
}

fn nil_ne_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*if\s+([A-Za-z_]\w*)\s*!=\s*nil\b").unwrap())
}

fn constructor_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:New|Create|Make|Open|Get|Find|Load|Parse|Read)\w*\s*\(").unwrap()
    })
}

fn param_names(signature: &str) -> Vec<String> {
    let mut names = Vec::new();
    let Some(open) = signature.find('(') else {
        return names;
    };
    // For methods, skip the receiver list and take the parameter list.
    let after = &signature[open + 1..];
    let params = if signature.trim_start().starts_with("func (") {
        match after.find('(') {
            Some(second) => &after[second + 1..],
            None => after,
        }
    } else {
        after
    };
    let params = params.split(')').next().unwrap_or("");
    for group in params.split(',') {
        // Go spells parameters `name Type`; grouped params share the type.
        if let Some(name) = group.trim().split_whitespace().next() {
            if name.chars().all(|c| c.is_alphanumeric() || c == '_') && !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn classify_rhs(rhs: &str) -> &'static str {
    let rhs = rhs.trim();
    if rhs == "nil" || rhs.starts_with("nil ") {
        return "nullable";
    }
    if rhs.starts_with('&') {
        return "nullable";
    }
    if constructor_call_re().is_match(rhs) {
        return "nullable";
    }
    "other"
}

/// Is the variable error-shaped by name? Go convention keeps this reliable.
fn is_error_var(var: &str) -> bool {
    var == "err" || var.ends_with("Err") || var.ends_with("Error")
}

const EXIT_WORDS: &[&str] = &["return", "panic(", "os.Exit(", "continue", "break"];

pub(crate) fn extract(ctx: &FnCtx, element: &CodeElement, facts: &mut Vec<Fact>) {
    let mut vars: BTreeSet<String> = param_names(&element.signature).into_iter().collect();
    let mut error_vars: BTreeSet<String> = BTreeSet::new();

    for (line_no, line) in ctx.body_lines() {
        if line_no == ctx.start_line {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.starts_with("//") {
            continue;
        }

        // Assignments, including `v, err := call()` multi-returns.
        if !trimmed.starts_with("if ") && !trimmed.starts_with("for ") {
            if let Some(cap) = assign_re().captures(line) {
                let lhs: Vec<&str> = cap[1].split(',').map(|s| s.trim()).collect();
                let rhs = cap[2].trim();
                // `x == y` is a comparison, not an assignment.
                if rhs.starts_with('=') {
                    continue;
                }
                if lhs.len() > 1 {
                    // Last return value in a multi-return defaults to error.
                    for (idx, var) in lhs.iter().enumerate() {
                        if *var == "_" {
                            continue;
                        }
                        let class = if idx + 1 == lhs.len() {
                            error_vars.insert(var.to_string());
                            "error"
                        } else {
                            classify_rhs(rhs)
                        };
                        facts.push(assigns(ctx, var, class, line_no));
                        vars.insert(var.to_string());
                    }
                } else if lhs.len() == 1 && lhs[0] != "_" {
                    let var = lhs[0];
                    let class = if is_error_var(var) {
                        error_vars.insert(var.to_string());
                        "error"
                    } else {
                        classify_rhs(rhs)
                    };
                    facts.push(assigns(ctx, var, class, line_no));
                    if !is_primitive_literal(rhs) {
                        vars.insert(var.to_string());
                    }
                }
            }
        }

        // `if x == nil { ... }` with an exiting body dominates the rest of
        // the function.
        if let Some(cap) = nil_eq_re().captures(line) {
            let var = cap[1].to_string();
            if block_exits(ctx, line_no, EXIT_WORDS) {
                facts.push(guards_return(ctx, &var, "nil_check", line_no));
                facts.push(guard_dominates(ctx, line_no));
            }
        }

        // `if x != nil { ... }`: x is safe inside the block. Error-shaped
        // variables get the error-check facts instead.
        if let Some(cap) = nil_ne_re().captures(line) {
            let var = cap[1].to_string();
            let block_end = brace_block_end(ctx, line_no);
            if error_vars.contains(&var) || is_error_var(&var) {
                if block_exits(ctx, line_no, EXIT_WORDS) {
                    facts.push(error_checked_return(ctx, &var, line_no));
                } else {
                    facts.push(error_checked_block(ctx, &var, line_no, block_end));
                }
            } else {
                facts.push(guards_block(ctx, &var, "nil_check", line_no, block_end));
            }
        }
    }

    emit_uses_and_call_args(ctx, &vars, &[], facts);
}
