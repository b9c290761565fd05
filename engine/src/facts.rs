//! The relational fact model consumed by the downstream reasoner.
//!
//! A fact is a `(predicate, args)` tuple. Arguments are a closed tagged union:
//! free strings (paths, signatures), atoms (enumerated constants, always
//! spelled with a leading `/`), 64-bit integers, floats, and booleans.
//! Serialization carries an explicit type discriminator so that atoms survive
//! a round-trip as atoms and never collapse into strings.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A single fact argument. Equality is discriminator-strict: `Atom("/go")`
/// and `Str("/go")` are different values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Atom(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    /// Build an atom, normalizing to a leading `/`.
    pub fn atom(name: &str) -> Value {
        if name.starts_with('/') {
            Value::Atom(name.to_string())
        } else {
            Value::Atom(format!("/{name}"))
        }
    }

    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(s.as_ref().to_string())
    }

    pub fn int(n: i64) -> Value {
        Value::Int(n)
    }

    /// The atom for a boolean slot that the reasoner matches structurally
    /// (`/true` or `/false`).
    pub fn bool_atom(b: bool) -> Value {
        Value::atom(if b { "true" } else { "false" })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Value::Atom(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Atom(a) => write!(f, "{a}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

/// A relational tuple `(predicate, args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<Value>,
}

impl Fact {
    pub fn new(predicate: &str, args: Vec<Value>) -> Fact {
        Fact { predicate: predicate.to_string(), args }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// The closed set of predicates the kernel retracts on a world refresh.
/// Stale facts from deleted files cannot linger because every world predicate
/// is wiped before a fresh assert set is applied.
pub const WORLD_PREDICATES: &[&str] = &[
    "file_topology",
    "directory",
    "symbol_graph",
    "dependency_link",
    "code_defines",
    "code_calls",
    "assigns",
    "guards_return",
    "guards_block",
    "guard_dominates",
    "safe_access",
    "uses",
    "call_arg",
    "error_checked_return",
    "error_checked_block",
    "function_scope",
    "symbol_defined",
    "symbol_referenced",
    "code_diagnostic",
    "symbol_completion",
    // Stratum-0, per language
    "go_struct",
    "go_tag",
    "go_goroutine",
    "py_class",
    "py_async_def",
    "py_decorator",
    "ts_class",
    "ts_interface",
    "ts_interface_prop",
    "ts_component",
    "ts_hook",
    "mg_decl",
    "mg_rule",
    // Element companions
    "code_element",
    "element_signature",
    "element_visibility",
    "element_parent",
    "code_interactable",
    // Architectural
    "generated_code",
    "cgo_code",
    "build_tag",
    "embed_directive",
    "api_client_function",
    "api_handler_function",
    "entry_point",
    "project_language",
    "active_file",
    "file_in_scope",
    "encoding_issue",
    "large_file_warning",
    "file_not_found",
    "parse_error",
    "file_hash_mismatch",
    "element_stale",
    "edit_unsafe",
    "scope_refresh_failed",
];

// ---------------------------------------------------------------------------
// Tagged serialization
// ---------------------------------------------------------------------------

/// Wire form of a single argument: `{"type": ..., "value": ...}`.
#[derive(Serialize, Deserialize)]
struct TaggedValue {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

/// Wire form of a fact.
#[derive(Serialize, Deserialize)]
struct TaggedFact {
    predicate: String,
    args: Vec<TaggedValue>,
}

fn tag_value(value: &Value) -> TaggedValue {
    match value {
        Value::Str(s) => TaggedValue { kind: "string".into(), value: serde_json::json!(s) },
        Value::Atom(a) => TaggedValue { kind: "atom".into(), value: serde_json::json!(a) },
        Value::Int(n) => TaggedValue { kind: "int64".into(), value: serde_json::json!(n) },
        Value::Float(x) => TaggedValue { kind: "float64".into(), value: serde_json::json!(x) },
        Value::Bool(b) => TaggedValue { kind: "bool".into(), value: serde_json::json!(b) },
    }
}

fn untag_value(tagged: &TaggedValue) -> Value {
    match tagged.kind.as_str() {
        "atom" => match tagged.value.as_str() {
            Some(s) => Value::Atom(s.to_string()),
            None => Value::Str(tagged.value.to_string()),
        },
        "string" => match tagged.value.as_str() {
            Some(s) => Value::Str(s.to_string()),
            None => Value::Str(tagged.value.to_string()),
        },
        "int64" => match tagged.value.as_i64() {
            Some(n) => Value::Int(n),
            None => Value::Str(tagged.value.to_string()),
        },
        "float64" => match tagged.value.as_f64() {
            Some(x) => Value::Float(x),
            None => Value::Str(tagged.value.to_string()),
        },
        "bool" => match tagged.value.as_bool() {
            Some(b) => Value::Bool(b),
            None => Value::Str(tagged.value.to_string()),
        },
        // Unknown discriminator from a future format: degrade to string.
        _ => match tagged.value.as_str() {
            Some(s) => Value::Str(s.to_string()),
            None => Value::Str(tagged.value.to_string()),
        },
    }
}

/// Serialize a fact to its tagged JSON representation.
pub fn fact_to_json(fact: &Fact) -> serde_json::Value {
    let tagged = TaggedFact {
        predicate: fact.predicate.clone(),
        args: fact.args.iter().map(tag_value).collect(),
    };
    serde_json::to_value(tagged).expect("tagged fact serialization is infallible")
}

/// Deserialize a fact from its tagged JSON representation.
pub fn fact_from_json(value: &serde_json::Value) -> Result<Fact, serde_json::Error> {
    let tagged: TaggedFact = serde_json::from_value(value.clone())?;
    Ok(Fact {
        predicate: tagged.predicate,
        args: tagged.args.iter().map(untag_value).collect(),
    })
}

/// Serialize a fact list to a JSON array.
pub fn facts_to_json(facts: &[Fact]) -> serde_json::Value {
    serde_json::Value::Array(facts.iter().map(fact_to_json).collect())
}

/// Deserialize a fact list from a JSON array.
pub fn facts_from_json(value: &serde_json::Value) -> Result<Vec<Fact>, serde_json::Error> {
    let arr = match value.as_array() {
        Some(a) => a,
        None => return Ok(Vec::new()),
    };
    arr.iter().map(fact_from_json).collect()
}
