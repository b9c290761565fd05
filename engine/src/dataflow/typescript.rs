//! TypeScript / JavaScript data-flow patterns: null/undefined guards,
//! optional chaining, fetcher-shaped assignments, try/catch coverage.

use super::{
    assigns, brace_block_end, block_exits, emit_uses_and_call_args, error_checked_block,
    guard_dominates, guards_block, guards_return, is_primitive_literal, safe_access, FnCtx,
};
use crate::elements::CodeElement;
use crate::facts::Fact;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:const|let|var)\s+([A-Za-z_$][\w$]*)(?:\s*:[^=]+)?\s*=\s*(.+)$")
            .unwrap()
    })
}

fn null_eq_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*if\s*\(\s*([A-Za-z_$][\w$]*)\s*===?\s*(?:null|undefined)\b").unwrap()
    })
}

fn null_ne_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*if\s*\(\s*([A-Za-z_$][\w$]*)\s*!==?\s*(?:null|undefined)\b").unwrap()
    })
}

fn optional_chain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_$][\w$]*)\?\.").unwrap())
}

fn fetcher_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:get|find|fetch)\w*\s*\(|\bquerySelector\s*\(|\bgetElementById\s*\(")
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
            let name = group.trim().trim_start_matches("...").split([':', '=']).next()?.trim();
            if name.is_empty()
                || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

fn classify_rhs(rhs: &str) -> &'static str {
    let rhs = rhs.trim().trim_end_matches(';');
    if rhs == "null" || rhs == "undefined" {
        return "nullable";
    }
    if fetcher_call_re().is_match(rhs) {
        return "nullable";
    }
    "other"
}

const EXIT_WORDS: &[&str] = &["return", "throw ", "continue", "break"];

pub(crate) fn extract(ctx: &FnCtx, element: &CodeElement, facts: &mut Vec<Fact>) {
    let mut vars: BTreeSet<String> = param_names(&element.signature).into_iter().collect();

    for (line_no, line) in ctx.body_lines() {
        if line_no == ctx.start_line {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.starts_with("//") || trimmed.starts_with('*') {
            continue;
        }

        if let Some(cap) = assign_re().captures(line) {
            let var = cap[1].to_string();
            let rhs = cap[2].trim();
            facts.push(assigns(ctx, &var, classify_rhs(rhs), line_no));
            if !is_primitive_literal(rhs) {
                vars.insert(var);
            }
        }

        if let Some(cap) = null_eq_re().captures(line) {
            let var = cap[1].to_string();
            if block_exits(ctx, line_no, EXIT_WORDS) {
                facts.push(guards_return(ctx, &var, "null_check", line_no));
                facts.push(guard_dominates(ctx, line_no));
            }
        }

        if let Some(cap) = null_ne_re().captures(line) {
            let var = cap[1].to_string();
            let end = brace_block_end(ctx, line_no);
            facts.push(guards_block(ctx, &var, "null_check", line_no, end));
        }

        for cap in optional_chain_re().captures_iter(line) {
            facts.push(safe_access(ctx, &cap[1], "optional_chaining", line_no));
        }

        // A try block error-checks the variables assigned at its top level.
        if trimmed == "try {" || trimmed.starts_with("try {") {
            let end = brace_block_end(ctx, line_no);
            for n in line_no + 1..end {
                if let Some(cap) = assign_re().captures(ctx.lines[n - 1]) {
                    facts.push(error_checked_block(ctx, &cap[1], line_no, end));
                }
            }
        }
    }

    emit_uses_and_call_args(ctx, &vars, &["this"], facts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::extract_file;
    use crate::facts::Value;
    use crate::language::Language;
    use crate::parsers::{LanguageParser, TypeScriptParser};

    fn extract(source: &str) -> Vec<Fact> {
        let elements = TypeScriptParser.parse("a.ts", "/ws/a.ts", source);
        extract_file(Language::TypeScript, "a.ts", source, &elements)
    }

    #[test]
    fn test_null_guard_return() {
        let source = "function pick(node) {\n  const el = document.querySelector(node);\n  if (el === null) {\n    return null;\n  }\n  return el.id;\n}\n";
        let facts = extract(source);

        let assign = facts.iter().find(|f| f.predicate == "assigns").unwrap();
        assert_eq!(assign.args[0], Value::atom("el"));
        assert_eq!(assign.args[1], Value::atom("nullable"));

        assert!(facts.contains(&Fact::new(
            "guards_return",
            vec![Value::atom("el"), Value::atom("null_check"), Value::str("a.ts"), Value::Int(3)],
        )));
        assert!(facts.iter().any(|f| f.predicate == "guard_dominates"));
    }

    #[test]
    fn test_null_block_guard() {
        let source =
            "function show(user) {\n  if (user !== null) {\n    render(user.name);\n  }\n}\n";
        let facts = extract(source);
        assert!(facts.contains(&Fact::new(
            "guards_block",
            vec![
                Value::atom("user"),
                Value::atom("null_check"),
                Value::str("a.ts"),
                Value::Int(2),
                Value::Int(4),
            ],
        )));
    }

    #[test]
    fn test_optional_chaining() {
        let source = "function label(item) {\n  return item?.name ?? \"\";\n}\n";
        let facts = extract(source);
        assert!(facts.contains(&Fact::new(
            "safe_access",
            vec![
                Value::atom("item"),
                Value::atom("optional_chaining"),
                Value::str("a.ts"),
                Value::Int(2),
            ],
        )));
    }

    #[test]
    fn test_try_catch() {
        let source = "function load(path) {\n  try {\n    const data = readFile(path);\n    use(data);\n  } catch (e) {\n    report(e);\n  }\n}\n";
        let facts = extract(source);
        assert!(facts.iter().any(|f| f.predicate == "error_checked_block"
            && f.args[0] == Value::atom("data")
            && f.args[2] == Value::Int(2)));
    }

    #[test]
    fn test_fetcher_classification() {
        let source = "function f() {\n  const a = fetchUsers();\n  const b = compute();\n  const c = undefined;\n}\n";
        let facts = extract(source);
        let class_of = |name: &str| {
            facts
                .iter()
                .find(|f| f.predicate == "assigns" && f.args[0] == Value::atom(name))
                .map(|f| f.args[1].clone())
        };
        assert_eq!(class_of("a").unwrap(), Value::atom("nullable"));
        assert_eq!(class_of("b").unwrap(), Value::atom("other"));
        assert_eq!(class_of("c").unwrap(), Value::atom("nullable"));
    }
}
