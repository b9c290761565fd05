//! Mangle rule-language parser.
//!
//! Mangle files are sequences of statements terminated by `.`. The splitter
//! honors string literals, balanced brackets, and decimal points; the
//! classifier sorts statement heads into declarations, queries, rules, and
//! plain facts. Refs carry the predicate name and arity plus a stable
//! per-kind ordinal, e.g. `mg:policy/rules.mg:rule:reachable/2#0`.

use super::LanguageParser;
use crate::elements::{make_ref, Action, CodeElement, ElementKind, Visibility};
use crate::facts::{Fact, Value};

pub struct MangleParser;

/// One raw statement with its byte span.
struct Statement {
    text: String,
    start_line: usize,
    end_line: usize,
}

/// Split source text into `.`-terminated statements. The terminator must be
/// outside strings, outside `()[]{}`, and not between digits (so `3.14`
/// survives).
fn split_statements(content: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let chars: Vec<char> = content.chars().collect();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut line = 1usize;
    let mut start_line = 1usize;
    let mut current = String::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
        }

        if in_string {
            current.push(c);
            if c == '\\' && i + 1 < chars.len() {
                current.push(chars[i + 1]);
                if chars[i + 1] == '\n' {
                    line += 1;
                }
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        // Line comments run to end of line.
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '.' if depth == 0 => {
                let prev_digit =
                    i > 0 && chars[i - 1].is_ascii_digit();
                let next_digit = i + 1 < chars.len() && chars[i + 1].is_ascii_digit();
                if !(prev_digit && next_digit) {
                    let text = current.trim().to_string();
                    if !text.is_empty() {
                        statements.push(Statement { text, start_line, end_line: line });
                    }
                    current.clear();
                    start_line = line;
                    i += 1;
                    continue;
                }
            }
            _ => {}
        }

        if current.trim().is_empty() && !c.is_whitespace() {
            start_line = line;
        }
        current.push(c);
        i += 1;
    }

    statements
}

#[derive(Clone, Copy, PartialEq)]
enum StatementKind {
    Decl,
    Query,
    Rule,
    Fact,
}

impl StatementKind {
    fn label(self) -> &'static str {
        match self {
            StatementKind::Decl => "decl",
            StatementKind::Query => "query",
            StatementKind::Rule => "rule",
            StatementKind::Fact => "fact",
        }
    }

    fn element_kind(self) -> ElementKind {
        match self {
            StatementKind::Decl => ElementKind::Decl,
            StatementKind::Query => ElementKind::Query,
            StatementKind::Rule => ElementKind::Rule,
            StatementKind::Fact => ElementKind::Fact,
        }
    }
}

fn classify(text: &str) -> StatementKind {
    if text.starts_with("Decl ") || text.starts_with("Decl\t") {
        return StatementKind::Decl;
    }
    if text.starts_with('?') {
        return StatementKind::Query;
    }
    if contains_rule_operator(text) {
        return StatementKind::Rule;
    }
    StatementKind::Fact
}

/// Is `:-` present outside brackets and strings?
fn contains_rule_operator(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 0i32;
    let mut in_string = false;
    for i in 0..chars.len() {
        let c = chars[i];
        if in_string {
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ':' if depth == 0 && i + 1 < chars.len() && chars[i + 1] == '-' => return true,
            _ => {}
        }
    }
    false
}

/// `(predicate, arity)` of a statement head.
fn head_signature(text: &str, kind: StatementKind) -> (String, usize) {
    let head = match kind {
        StatementKind::Decl => text.trim_start_matches("Decl").trim_start(),
        StatementKind::Query => text.trim_start_matches('?').trim_start(),
        _ => text,
    };
    let head = match find_rule_operator(head) {
        Some(pos) => &head[..pos],
        None => head,
    };
    let head = head.trim();

    let name_end = head.find('(').unwrap_or(head.len());
    let name = head[..name_end]
        .trim()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect::<String>();

    let arity = if name_end < head.len() {
        match top_level_commas(&head[name_end..]) {
            Some(commas) => commas + 1,
            None => 0,
        }
    } else {
        0
    };
    (name, arity)
}

fn find_rule_operator(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    for i in 0..bytes.len() {
        let c = bytes[i];
        if in_string {
            if c == b'"' {
                in_string = false;
            }
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b':' if depth == 0 && i + 1 < bytes.len() && bytes[i + 1] == b'-' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Commas at parenthesis depth 1 inside the head's argument list, or `None`
/// for an empty `()` argument list.
fn top_level_commas(args: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut commas = 0usize;
    let mut empty = true;
    for c in args.chars() {
        if in_string {
            if c == '"' {
                in_string = false;
            }
            empty = false;
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => commas += 1,
            c if depth >= 1 && !c.is_whitespace() => empty = false,
            _ => {}
        }
    }
    if empty && commas == 0 {
        return None;
    }
    Some(commas)
}

impl LanguageParser for MangleParser {
    fn language_tag(&self) -> &'static str {
        "mg"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["mg", "dl"]
    }

    fn parse(&self, rel_path: &str, file: &str, content: &str) -> Vec<CodeElement> {
        let statements = split_statements(content);
        let mut elements = Vec::new();
        let mut ordinals: std::collections::HashMap<&'static str, usize> =
            std::collections::HashMap::new();

        for statement in statements {
            let kind = classify(&statement.text);
            let (name, arity) = head_signature(&statement.text, kind);
            if name.is_empty() {
                continue;
            }
            let ordinal = ordinals.entry(kind.label()).or_insert(0);
            let qualified = match kind {
                StatementKind::Decl => format!("decl:{name}/{arity}"),
                _ => format!("{}:{name}/{arity}#{ordinal}", kind.label()),
            };
            *ordinal += 1;

            let signature = statement.text.lines().next().unwrap_or("").trim().to_string();
            elements.push(CodeElement {
                ref_id: make_ref("mg", rel_path, "", &qualified),
                kind: kind.element_kind(),
                file: file.to_string(),
                start_line: statement.start_line,
                end_line: statement.end_line,
                signature,
                body: statement.text,
                parent: String::new(),
                visibility: Visibility::Public,
                actions: Action::ALL.to_vec(),
                package: String::new(),
                name: format!("{name}/{arity}"),
            });
        }

        elements
    }

    fn emit_language_facts(&self, elements: &[CodeElement], _content: &str, facts: &mut Vec<Fact>) {
        for element in elements {
            match element.kind {
                ElementKind::Decl => {
                    facts.push(Fact::new("mg_decl", vec![Value::str(&element.ref_id)]));
                }
                ElementKind::Rule => {
                    facts.push(Fact::new("mg_rule", vec![Value::str(&element.ref_id)]));
                }
                _ => {}
            }
        }
    }
}
