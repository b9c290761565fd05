//! Per-language code-element parsers.
//!
//! Every parser implements the same contract: deterministic, source-order
//! element extraction from a single content buffer, with nested elements
//! following their container. A syntax problem yields an empty element list,
//! never an error — the scan degrades per file.

mod go;
mod mangle;
mod python;
mod rust;
mod typescript;

pub use go::GoParser;
pub use mangle::MangleParser;
pub use python::PythonParser;
pub use rust::RustParser;
pub use typescript::{JavaScriptParser, TypeScriptParser};

use crate::elements::CodeElement;
use crate::facts::Fact;
use crate::language::Language;

pub trait LanguageParser: Send + Sync {
    fn language_tag(&self) -> &'static str;

    fn supported_extensions(&self) -> &'static [&'static str];

    /// Parse one file into its ordered element list. `file` is the absolute
    /// path recorded on each element; `rel_path` feeds ref construction.
    fn parse(&self, rel_path: &str, file: &str, content: &str) -> Vec<CodeElement>;

    /// Emit the language's Stratum-0 facts for an already-parsed file.
    fn emit_language_facts(&self, elements: &[CodeElement], content: &str, facts: &mut Vec<Fact>);
}

/// Fixed parser registry, constructed once at startup. No global state: the
/// orchestrator owns its registry.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn LanguageParser>>,
}

impl ParserRegistry {
    pub fn new() -> ParserRegistry {
        ParserRegistry {
            parsers: vec![
                Box::new(GoParser),
                Box::new(PythonParser),
                Box::new(TypeScriptParser),
                Box::new(JavaScriptParser),
                Box::new(RustParser),
                Box::new(MangleParser),
            ],
        }
    }

    pub fn for_language(&self, lang: Language) -> Option<&dyn LanguageParser> {
        let tag = lang.ref_tag()?;
        self.parsers.iter().find(|p| p.language_tag() == tag).map(|p| p.as_ref())
    }

    pub fn for_extension(&self, ext: &str) -> Option<&dyn LanguageParser> {
        self.parsers
            .iter()
            .find(|p| p.supported_extensions().contains(&ext))
            .map(|p| p.as_ref())
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Shared line-scanning helpers
// ---------------------------------------------------------------------------

/// Quote characters that open a string in a given language's surface syntax.
#[derive(Clone, Copy)]
pub(crate) struct ScanSyntax {
    pub double_quote: bool,
    pub single_quote: bool,
    pub backtick: bool,
    pub line_comment: &'static str,
}

pub(crate) const GO_SYNTAX: ScanSyntax =
    ScanSyntax { double_quote: true, single_quote: true, backtick: true, line_comment: "//" };

pub(crate) const JS_SYNTAX: ScanSyntax =
    ScanSyntax { double_quote: true, single_quote: true, backtick: true, line_comment: "//" };

/// Rust: `'` is a lifetime marker far more often than a char literal, so it is
/// not treated as a string opener; char literals are short enough that a brace
/// inside one never spans a line boundary.
pub(crate) const RUST_SYNTAX: ScanSyntax =
    ScanSyntax { double_quote: true, single_quote: false, backtick: false, line_comment: "//" };

/// Net brace delta and open count of one line, ignoring braces inside strings
/// and comments. `in_block_comment` carries `/* ... */` state across lines;
/// quoted strings are treated as line-local (raw/multiline strings are rare
/// enough at declaration boundaries that this keeps the counter honest in
/// practice).
pub(crate) fn brace_counts(
    line: &str,
    syntax: ScanSyntax,
    in_block_comment: &mut bool,
) -> (i32, u32) {
    let mut delta = 0i32;
    let mut opens = 0u32;
    let bytes = line.as_bytes();
    let mut i = 0usize;
    let mut in_string: Option<u8> = None;

    while i < bytes.len() {
        let c = bytes[i];

        if *in_block_comment {
            if c == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                *in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }

        if let Some(quote) = in_string {
            if c == b'\\' && quote != b'`' {
                i += 2;
                continue;
            }
            if c == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }

        // Line comment ends scanning.
        if !syntax.line_comment.is_empty()
            && bytes[i..].starts_with(syntax.line_comment.as_bytes())
        {
            break;
        }
        if c == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            *in_block_comment = true;
            i += 2;
            continue;
        }

        match c {
            b'"' if syntax.double_quote => in_string = Some(b'"'),
            b'\'' if syntax.single_quote => in_string = Some(b'\''),
            b'`' if syntax.backtick => in_string = Some(b'`'),
            b'{' => {
                delta += 1;
                opens += 1;
            }
            b'}' => delta -= 1,
            _ => {}
        }
        i += 1;
    }
    (delta, opens)
}

/// Find the 0-based index of the line that closes the brace block opened at
/// (or after) `start_idx`. Falls back to the last line when the block never
/// closes.
pub(crate) fn find_block_end(lines: &[&str], start_idx: usize, syntax: ScanSyntax) -> usize {
    let mut depth = 0i32;
    let mut opened = false;
    let mut in_block_comment = false;
    for (i, line) in lines.iter().enumerate().skip(start_idx) {
        let (delta, opens) = brace_counts(line, syntax, &mut in_block_comment);
        if opens > 0 {
            opened = true;
        }
        depth += delta;
        if opened && depth <= 0 {
            return i;
        }
    }
    lines.len().saturating_sub(1)
}

/// Join a 0-based inclusive line range back into source text.
pub(crate) fn slice_lines(lines: &[&str], start_idx: usize, end_idx: usize) -> String {
    lines[start_idx..=end_idx.min(lines.len().saturating_sub(1))].join("\n")
}

/// A declaration signature: the first line, trimmed, without the opening
/// brace.
pub(crate) fn signature_of(line: &str) -> String {
    line.trim().trim_end_matches('{').trim_end().to_string()
}
