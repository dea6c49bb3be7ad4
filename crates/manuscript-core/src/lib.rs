//! Core of the dual-mode manual IR.
//!
//! A manual is an ordered statement tree that runs in two environments from
//! one definition: interpreted against live values inside the generation
//! server, and compiled ahead-of-time into C++ source text for the native
//! client. This crate holds everything both modes share: the type model,
//! values, errors, the scoped evaluation context, the node contract, and
//! accessor descriptors. The concrete instruction set lives in
//! `manuscript-instructions`.

pub mod accessor;
pub mod context;
pub mod error;
pub mod node;
pub mod types;
pub mod value;

pub use accessor::{GetAccessor, MethodAccessor, SetAccessor};
pub use context::{
    EvalContext, ExecContext, FoldContext, RuntimeVariable, StaticVariable, TypeLookup, VarSlot,
};
pub use error::{ManualError, Result};
pub use node::{
    Expression, Flow, Node, Statement, block_children, block_to_json, execute_block,
    execute_scoped_block, invalidate_block_mutations, invalidate_mutated, write_conditional_block,
    write_scoped_block,
};
pub use types::{TypeEntry, TypeRef, VarType, primitives};
pub use value::{Value, Vec2};
