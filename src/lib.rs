//! Manuscript: a dual-mode instruction IR for procedurally generated content.
//!
//! Scripts ("manuals") attached to generated assets are stored as JSON
//! instruction trees. One tree serves two environments: it is interpreted
//! live inside the generation server, and compiled ahead-of-time into C++
//! source lines shipped to the native client. This facade re-exports the
//! three workspace crates:
//!
//! - [`core`]: type model, values, errors, contexts, the node contract.
//! - [`registry`]: string-keyed registers and `{type, data}` decoding.
//! - [`instructions`]: the builtin instruction set and [`Manual`].
//!
//! # Example
//!
//! ```
//! use manuscript::{Manual, Registries};
//! use rustc_hash::FxHashMap;
//! use serde_json::json;
//!
//! let regs = Registries::with_builtins();
//! let manual = Manual::from_json(&json!({
//!     "instructions": [
//!         { "type": "return", "data": { "type": "int", "data": 7 } },
//!     ]
//! }), &regs).unwrap();
//!
//! let result = manual.execute(FxHashMap::default()).unwrap();
//! assert_eq!(result, Some(manuscript::Value::Int(7)));
//!
//! let compiled = manual.compile(FxHashMap::default()).unwrap();
//! assert_eq!(compiled.lines, vec!["return 7"]);
//! ```

pub use manuscript_core as core;
pub use manuscript_instructions as instructions;
pub use manuscript_registry as registry;

pub use manuscript_core::{
    EvalContext, ExecContext, Expression, Flow, FoldContext, ManualError, Node, Result,
    RuntimeVariable, Statement, StaticVariable, TypeEntry, TypeRef, Value, VarType, Vec2,
    primitives,
};
pub use manuscript_instructions::{CompiledManual, Manual, Registries};
pub use manuscript_registry::{DecodeFn, DecodeRegister, Register};
