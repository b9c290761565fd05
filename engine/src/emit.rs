//! Conversion of code elements into their companion facts.
//!
//! Every element produces `code_element` plus signature, visibility, parent,
//! and interactability companions, and a legacy flat `symbol_graph` tuple for
//! rules that predate the element model.

use crate::elements::CodeElement;
use crate::facts::{Fact, Value};

/// Emit the per-element fact set in element order.
pub fn emit_element_facts(elements: &[CodeElement], facts: &mut Vec<Fact>) {
    for element in elements {
        facts.push(Fact::new(
            "code_element",
            vec![
                Value::str(&element.ref_id),
                Value::atom(element.kind.atom_name()),
                Value::str(&element.file),
                Value::int(element.start_line as i64),
                Value::int(element.end_line as i64),
            ],
        ));
        facts.push(Fact::new(
            "element_signature",
            vec![Value::str(&element.ref_id), Value::str(&element.signature)],
        ));
        facts.push(Fact::new(
            "element_visibility",
            vec![Value::str(&element.ref_id), Value::atom(element.visibility.atom_name())],
        ));
        if !element.parent.is_empty() {
            facts.push(Fact::new(
                "element_parent",
                vec![Value::str(&element.ref_id), Value::str(&element.parent)],
            ));
        }
        for action in &element.actions {
            facts.push(Fact::new(
                "code_interactable",
                vec![Value::str(&element.ref_id), Value::atom(action.atom_name())],
            ));
        }
    }
}

/// Emit the legacy flat symbol tuples. Kind and visibility travel as bare
/// strings here; this is the one pre-atom shape the kernel still accepts.
pub fn emit_symbol_graph(elements: &[CodeElement], rel_path: &str, facts: &mut Vec<Fact>) {
    for element in elements {
        let id = format!("{}:{}", element.kind.atom_name(), element.name);
        facts.push(Fact::new(
            "symbol_graph",
            vec![
                Value::str(id),
                Value::str(element.kind.atom_name()),
                Value::str(element.visibility.atom_name()),
                Value::str(rel_path),
                Value::str(&element.signature),
            ],
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Action, ElementKind, Visibility};

    fn element() -> CodeElement {
        CodeElement {
            ref_id: "go:a.go:User".into(),
            kind: ElementKind::Struct,
            file: "/ws/a.go".into(),
            start_line: 3,
            end_line: 9,
            signature: "type User struct".into(),
            body: String::new(),
            parent: String::new(),
            visibility: Visibility::Public,
            actions: Action::ALL.to_vec(),
            package: "main".into(),
            name: "User".into(),
        }
    }

    #[test]
    fn test_companion_facts() {
        let mut facts = Vec::new();
        emit_element_facts(&[element()], &mut facts);

        let code_element = &facts[0];
        assert_eq!(code_element.predicate, "code_element");
        assert_eq!(code_element.args[1], Value::atom("struct"));
        assert_eq!(code_element.args[3], Value::Int(3));

        assert!(facts.iter().all(|f| f.predicate != "element_parent"));
        assert_eq!(facts.iter().filter(|f| f.predicate == "code_interactable").count(), 5);
    }

    #[test]
    fn test_parent_emitted_when_present() {
        let mut child = element();
        child.parent = "go:a.go:Outer".into();
        let mut facts = Vec::new();
        emit_element_facts(&[child], &mut facts);
        assert!(facts.iter().any(|f| f.predicate == "element_parent"));
    }

    #[test]
    fn test_symbol_graph_is_flat_strings() {
        let mut facts = Vec::new();
        emit_symbol_graph(&[element()], "a.go", &mut facts);
        let sg = &facts[0];
        assert_eq!(sg.args[0], Value::str("struct:User"));
        // Legacy shape: bare strings, not atoms.
        assert_eq!(sg.args[1], Value::str("struct"));
        assert_eq!(sg.args[2], Value::str("public"));
    }
}
