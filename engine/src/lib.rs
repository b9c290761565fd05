//! codefacts — workspace code-intelligence engine.
//!
//! Ingests a source workspace and produces a stream of relational facts
//! (file topology, symbol definitions, dependencies, control/data-flow
//! patterns, architectural roles) for a downstream deductive reasoner.
//! Unchanged files are never reparsed: a content-keyed manifest drives
//! incremental deltas, and a two-tier cache keeps data-flow results and
//! per-file facts across runs.

pub mod cancel;
pub mod config;
pub mod dataflow;
pub mod dataflow_cache;
pub mod deep;
pub mod elements;
pub mod emit;
pub mod error;
pub mod facts;
pub mod fingerprint;
pub mod imports;
pub mod language;
pub mod manifest;
pub mod parsers;
pub mod patterns;
pub mod scan;
pub mod scope;
pub mod store;
pub mod walk;
pub mod watch;

pub use cancel::CancelToken;
pub use config::ScanOptions;
pub use error::ScanError;
pub use facts::{Fact, Value};
pub use scan::{IncrementalResult, ScanResult, Scanner};
pub use scope::FileScopeLoader;
