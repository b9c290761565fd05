//! The uniform code-element model shared by every language parser.
//!
//! A `CodeElement` is one declaration: its stable ref, kind, line range,
//! first-line signature, body text, parent link, and visibility. Elements are
//! constructed by a parser, flow through the fact emitter once, and are then
//! dropped; callers must not retain element slices across scans.

/// Element kind, spelled as an atom on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Function,
    Method,
    Struct,
    Interface,
    Type,
    Const,
    Var,
    Package,
    Decl,
    Rule,
    Fact,
    Query,
}

impl ElementKind {
    pub fn atom_name(self) -> &'static str {
        match self {
            ElementKind::Function => "function",
            ElementKind::Method => "method",
            ElementKind::Struct => "struct",
            ElementKind::Interface => "interface",
            ElementKind::Type => "type",
            ElementKind::Const => "const",
            ElementKind::Var => "var",
            ElementKind::Package => "package",
            ElementKind::Decl => "decl",
            ElementKind::Rule => "rule",
            ElementKind::Fact => "fact",
            ElementKind::Query => "query",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn atom_name(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }
}

/// Mutations an editor integration may apply to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Replace,
    InsertBefore,
    InsertAfter,
    Delete,
}

impl Action {
    pub fn atom_name(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Replace => "replace",
            Action::InsertBefore => "insert_before",
            Action::InsertAfter => "insert_after",
            Action::Delete => "delete",
        }
    }

    pub const ALL: [Action; 5] =
        [Action::View, Action::Replace, Action::InsertBefore, Action::InsertAfter, Action::Delete];
}

/// One source declaration in the uniform model.
#[derive(Debug, Clone)]
pub struct CodeElement {
    /// `lang:repo-relative-path:qualified-name`, stable across scans of
    /// unchanged content.
    pub ref_id: String,
    pub kind: ElementKind,
    /// Absolute filesystem path.
    pub file: String,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    /// First declaration line, trimmed.
    pub signature: String,
    /// Full element source text.
    pub body: String,
    /// Ref of the enclosing element, or empty. Always refers to an element in
    /// the same parse output.
    pub parent: String,
    pub visibility: Visibility,
    pub actions: Vec<Action>,
    /// Language-level namespace label.
    pub package: String,
    /// Unqualified name.
    pub name: String,
}

/// Build a stable element ref. Members pass their parent's unqualified name.
pub fn make_ref(lang_tag: &str, rel_path: &str, parent_name: &str, name: &str) -> String {
    if parent_name.is_empty() {
        format!("{lang_tag}:{rel_path}:{name}")
    } else {
        format!("{lang_tag}:{rel_path}:{parent_name}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_scheme() {
        assert_eq!(make_ref("go", "internal/auth/user.go", "", "Login"), "go:internal/auth/user.go:Login");
        assert_eq!(
            make_ref("go", "internal/auth/user.go", "User", "Login"),
            "go:internal/auth/user.go:User.Login"
        );
    }
}
