//! End-to-end scan scenarios over real temp workspaces.
//!
//! Each test builds a workspace under a tempdir, runs the scanner, and
//! validates the emitted fact stream.

use codefacts_engine::cancel::CancelToken;
use codefacts_engine::config::ScanOptions;
use codefacts_engine::facts::{facts_from_json, facts_to_json, Fact, Value};
use codefacts_engine::scan::Scanner;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scan(root: &Path) -> Vec<Fact> {
    let scanner = Scanner::new(root, ScanOptions::default()).unwrap();
    scanner.scan_full(&CancelToken::new()).unwrap().facts
}

fn topology_paths(facts: &[Fact]) -> Vec<String> {
    let mut paths: Vec<String> = facts
        .iter()
        .filter(|f| f.predicate == "file_topology")
        .map(|f| f.args[0].as_str().unwrap().to_string())
        .collect();
    paths.sort();
    paths
}

// ---------------------------------------------------------------------------
// Scenario: hidden-directory policy
// ---------------------------------------------------------------------------

#[test]
fn test_hidden_directory_blind_spots() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "main.go", "package main\n\nfunc main() {}\n");
    write(root, ".github/workflows/ci.yml", "on: push\n");
    write(root, ".vscode/settings.json", "{}\n");
    write(root, ".git/config", "[core]\n");
    write(root, ".nerd/cache/manifest.json", "{}\n");
    write(root, ".secret/key.pem", "----\n");

    let facts = scan(root);
    assert_eq!(
        topology_paths(&facts),
        vec![".github/workflows/ci.yml", ".vscode/settings.json", "main.go"]
    );
}

// ---------------------------------------------------------------------------
// Scenario: test-file and segment discipline
// ---------------------------------------------------------------------------

#[test]
fn test_test_files_and_segment_traps() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "utils_test.go", "package main\n\nfunc TestA(t *T) {}\n");
    write(root, "src/latest/widget.go", "package latest\n\nfunc Widget() {}\n");

    let facts = scan(root);

    let test_topo = facts
        .iter()
        .find(|f| {
            f.predicate == "file_topology" && f.args[0] == Value::str("utils_test.go")
        })
        .unwrap();
    assert_eq!(test_topo.args[4], Value::atom("true"));
    // Test files contribute no symbol facts.
    assert!(!facts
        .iter()
        .any(|f| f.predicate == "code_element"
            && f.args[2].as_str().unwrap().ends_with("utils_test.go")));

    let latest_topo = facts
        .iter()
        .find(|f| {
            f.predicate == "file_topology" && f.args[0] == Value::str("src/latest/widget.go")
        })
        .unwrap();
    assert_eq!(latest_topo.args[4], Value::atom("false"));
}

// ---------------------------------------------------------------------------
// Scenario: TypeScript interface and export visibility
// ---------------------------------------------------------------------------

#[test]
fn test_typescript_interface_scenario() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "src/types.ts",
        "export interface Foo {\n  id: string;\n  name?: string;\n}\nclass Hidden {}\n",
    );

    let facts = scan(root);

    let foo = facts
        .iter()
        .find(|f| f.predicate == "code_element" && f.args[0] == Value::str("ts:src/types.ts:Foo"))
        .expect("Foo element missing");
    assert_eq!(foo.args[1], Value::atom("interface"));

    let foo_vis = facts
        .iter()
        .find(|f| {
            f.predicate == "element_visibility" && f.args[0] == Value::str("ts:src/types.ts:Foo")
        })
        .unwrap();
    assert_eq!(foo_vis.args[1], Value::atom("public"));

    let hidden_vis = facts
        .iter()
        .find(|f| {
            f.predicate == "element_visibility"
                && f.args[0] == Value::str("ts:src/types.ts:Hidden")
        })
        .unwrap();
    assert_eq!(hidden_vis.args[1], Value::atom("private"));

    assert!(facts
        .iter()
        .any(|f| f.predicate == "ts_interface" && f.args[0] == Value::str("ts:src/types.ts:Foo")));
    let props: Vec<&str> = facts
        .iter()
        .filter(|f| f.predicate == "ts_interface_prop")
        .map(|f| f.args[1].as_str().unwrap())
        .collect();
    assert_eq!(props, vec!["id", "name"]);
}

// ---------------------------------------------------------------------------
// Scenario: Go nil-guard dataflow through a full scan
// ---------------------------------------------------------------------------

#[test]
fn test_go_nil_guard_dataflow() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "guard.go",
        "package main\n\nfunc withNilGuard(x *int) int {\n\tif x == nil {\n\t\treturn 0\n\t}\n\treturn *x\n}\n",
    );

    let facts = scan(root);

    assert!(facts.contains(&Fact::new(
        "function_scope",
        vec![Value::str("guard.go"), Value::atom("withNilGuard"), Value::Int(3), Value::Int(8)],
    )));
    assert!(facts.contains(&Fact::new(
        "guards_return",
        vec![
            Value::atom("x"),
            Value::atom("nil_check"),
            Value::str("guard.go"),
            Value::Int(4)
        ],
    )));
    assert!(facts.contains(&Fact::new(
        "guard_dominates",
        vec![
            Value::str("guard.go"),
            Value::atom("withNilGuard"),
            Value::Int(4),
            Value::Int(8)
        ],
    )));
    assert!(facts.contains(&Fact::new(
        "uses",
        vec![
            Value::str("guard.go"),
            Value::atom("withNilGuard"),
            Value::atom("x"),
            Value::Int(7)
        ],
    )));
}

// ---------------------------------------------------------------------------
// Scenario: Mangle files parse structurally
// ---------------------------------------------------------------------------

#[test]
fn test_mangle_scan() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "policy/deps.mg",
        "Decl depends(A, B).\n\ndepends(X, Z) :- depends(X, Y), depends(Y, Z).\n",
    );

    let facts = scan(root);
    assert!(facts.iter().any(|f| f.predicate == "mg_decl"));
    assert!(facts.iter().any(|f| f.predicate == "mg_rule"));
    let topo = facts.iter().find(|f| f.predicate == "file_topology").unwrap();
    assert_eq!(topo.args[2], Value::atom("mangle"));
}

// ---------------------------------------------------------------------------
// Property: atom hygiene and round-trip over a real fact stream
// ---------------------------------------------------------------------------

#[test]
fn test_atom_hygiene_and_round_trip() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "app.py", "class App:\n    def run(self):\n        data = self.load()\n        if data is None:\n            return None\n        return data.items\n");
    write(root, "main.go", "package main\n\nfunc main() {}\n");

    let facts = scan(root);
    assert!(!facts.is_empty());

    // Enumerated slots are atoms; paths and signatures are strings that
    // never start with '/'.
    for fact in &facts {
        if fact.predicate == "file_topology" {
            assert!(!fact.args[0].is_atom());
            assert!(!fact.args[0].as_str().unwrap().starts_with('/'));
            assert!(fact.args[2].is_atom());
            assert!(fact.args[2].as_str().unwrap().starts_with('/'));
            assert!(fact.args[4].is_atom());
        }
        if fact.predicate == "code_element" {
            assert!(fact.args[1].is_atom());
        }
        if fact.predicate == "element_visibility" || fact.predicate == "code_interactable" {
            assert!(fact.args[1].is_atom());
        }
        if fact.predicate == "assigns" {
            assert!(fact.args[0].is_atom());
            assert!(fact.args[1].is_atom());
        }
    }

    // Serialization round-trips component-wise.
    let json = facts_to_json(&facts);
    let back = facts_from_json(&json).unwrap();
    assert_eq!(facts, back);
}

// ---------------------------------------------------------------------------
// Property: ref stability across identical content
// ---------------------------------------------------------------------------

#[test]
fn test_ref_stability_across_scans() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "stable.go", "package main\n\ntype A struct {}\n\nfunc (a *A) Go() {}\n\nfunc free() {}\n");

    let refs = |facts: &[Fact]| -> Vec<String> {
        facts
            .iter()
            .filter(|f| f.predicate == "code_element")
            .map(|f| f.args[0].as_str().unwrap().to_string())
            .collect()
    };

    let first = scan(root);
    let second = scan(root);
    assert_eq!(refs(&first), refs(&second));
}

// ---------------------------------------------------------------------------
// Scenario: full incremental delta (§8 scenario 6)
// ---------------------------------------------------------------------------

#[test]
fn test_incremental_delta_scenario() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "a.go", "package main\n\nfunc A() {}\n");
    write(root, "b.go", "package main\n\nfunc B() {}\n");
    write(root, "c.go", "package main\n\nfunc C() {}\n");

    {
        let scanner = Scanner::new(root, ScanOptions::default()).unwrap();
        let cold = scanner.scan_incremental(&CancelToken::new()).unwrap();
        assert!(cold.full);
        assert_eq!(cold.new_files, vec!["a.go", "b.go", "c.go"]);
    }

    let b_path = root.join("b.go");
    fs::write(&b_path, "package main\n\nfunc BChanged() {}\n").unwrap();
    let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    let file = fs::File::options().write(true).open(&b_path).unwrap();
    file.set_times(fs::FileTimes::new().set_modified(future)).unwrap();
    fs::remove_file(root.join("c.go")).unwrap();

    let scanner = Scanner::new(root, ScanOptions::default()).unwrap();
    let delta = scanner.scan_incremental(&CancelToken::new()).unwrap();

    assert_eq!(delta.changed_files, vec!["b.go"]);
    assert_eq!(delta.deleted_files, vec!["c.go"]);
    assert!(delta.new_files.is_empty());

    // Retract set covers prior fast facts for b.go and c.go; a.go untouched.
    for path in ["b.go", "c.go"] {
        assert!(
            delta
                .retract_facts
                .iter()
                .any(|f| f.predicate == "file_topology" && f.args[0] == Value::str(path)),
            "missing retract for {path}"
        );
    }
    assert!(!delta
        .retract_facts
        .iter()
        .any(|f| f.predicate == "file_topology" && f.args[0] == Value::str("a.go")));

    // Assert set: fresh facts for b.go only, plus always-refreshed
    // directory facts.
    assert!(delta
        .new_facts
        .iter()
        .any(|f| f.predicate == "code_element"
            && f.args[0].as_str().unwrap().contains(":BChanged")));
    assert!(!delta
        .new_facts
        .iter()
        .any(|f| f.predicate == "file_topology" && f.args[0] == Value::str("a.go")));
    assert!(!delta
        .new_facts
        .iter()
        .any(|f| f.predicate == "file_topology" && f.args[0] == Value::str("c.go")));

    // Retracted tuples do not reappear in the assert set.
    for retracted in &delta.retract_facts {
        assert!(
            !delta.new_facts.contains(retracted),
            "retracted fact re-asserted: {retracted}"
        );
    }
}

// ---------------------------------------------------------------------------
// Scenario: dependency links between workspace files
// ---------------------------------------------------------------------------

#[test]
fn test_dependency_links() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "app/config.py", "class Config:\n    pass\n");
    write(root, "app/main.py", "from app.config import Config\n\ndef run():\n    return Config()\n");

    let facts = scan(root);
    let link = facts
        .iter()
        .find(|f| f.predicate == "dependency_link" && f.args[0] == Value::str("app/main.py"))
        .expect("dependency_link missing");
    assert_eq!(link.args[1], Value::str("app/config.py"));
    assert_eq!(link.args[2], Value::str("app.config"));
}

// ---------------------------------------------------------------------------
// Failure policy: one bad file never fails the scan
// ---------------------------------------------------------------------------

#[test]
fn test_unreadable_content_does_not_abort() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "good.go", "package main\n\nfunc Fine() {}\n");
    // Invalid UTF-8 bytes in a parseable extension.
    fs::write(root.join("weird.go"), [0x70, 0x61, 0x80, 0xFF, 0x0A]).unwrap();

    let facts = scan(root);
    assert!(facts
        .iter()
        .any(|f| f.predicate == "code_element"
            && f.args[0].as_str().unwrap().contains(":Fine")));
    // Both files still have topology.
    assert_eq!(topology_paths(&facts), vec!["good.go", "weird.go"]);
}
