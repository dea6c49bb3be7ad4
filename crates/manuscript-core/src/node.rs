//! The instruction node contract.
//!
//! Every node owns its inputs exclusively (a tree, never a graph) and knows
//! how to serialize itself, execute against live bindings, and compile to
//! C++ source text. Nodes split into two families:
//!
//! - [`Expression`]: produces a typed value, may constant-fold, compiles to a
//!   single expression string.
//! - [`Statement`]: no output type, may own nested blocks, may early-return,
//!   compiles to a list of source lines.

use std::collections::BTreeSet;

use serde_json::{Value as Json, json};

use crate::context::{ExecContext, FoldContext, TypeLookup};
use crate::error::Result;
use crate::types::VarType;
use crate::value::Value;

/// Result of executing a statement.
///
/// `Return` unwinds through every enclosing block up to the manual boundary;
/// there is no break/continue at this layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue,
    Return(Value),
}

// ============================================================================
// Node
// ============================================================================

/// Contract shared by both node families.
pub trait Node {
    /// Registry tag this node serializes under.
    fn tag(&self) -> &'static str;

    /// Tag-specific payload for the `{type, data}` wire form.
    fn to_data(&self) -> Json;

    /// Headers this node itself requires in compiled output.
    fn self_includes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Direct sub-nodes: inputs first, then nested block statements.
    fn children(&self) -> Vec<&dyn Node> {
        Vec::new()
    }

    /// Full `{type, data}` wire form.
    fn to_json(&self) -> Json {
        json!({ "type": self.tag(), "data": self.to_data() })
    }

    /// Deduplicated union of includes over the whole subtree.
    fn includes(&self) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = self.self_includes().into_iter().collect();
        for child in self.children() {
            set.extend(child.includes());
        }
        set
    }

    /// Append the names of pre-existing variables this subtree may write to.
    /// Mutating nodes override; everything else recurses.
    fn mutated_vars(&self, out: &mut Vec<String>) {
        for child in self.children() {
            child.mutated_vars(out);
        }
    }
}

/// A value-producing node.
pub trait Expression: Node {
    /// Static output type; context is consulted for variable reads.
    fn output_type(&self, types: &dyn TypeLookup) -> Result<VarType>;

    /// The variable this expression is a direct read of, if any. Mutating
    /// instructions use it to render their target as an lvalue instead of a
    /// folded literal.
    fn variable_name(&self) -> Option<&str> {
        None
    }

    /// Evaluate against live bindings.
    fn execute(&self, ctx: &mut ExecContext) -> Result<Value>;

    /// Fold to a constant, if every input folds under the current context.
    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>>;

    /// Render a single C++ expression.
    fn write_cpp(&self, ctx: &FoldContext) -> Result<String>;
}

/// A control-flow or side-effect node.
pub trait Statement: Node {
    /// Run the statement; `Flow::Return` aborts every enclosing block.
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow>;

    /// Render zero or more C++ source lines. Callers join and indent.
    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>>;
}

// ============================================================================
// Block helpers
// ============================================================================

/// Run statements in order, stopping at the first early return.
pub fn execute_block(ctx: &mut ExecContext, block: &[Box<dyn Statement>]) -> Result<Flow> {
    for statement in block {
        if let Flow::Return(value) = statement.execute(ctx)? {
            return Ok(Flow::Return(value));
        }
    }
    Ok(Flow::Continue)
}

/// Run a block inside a fresh scope, so its declarations do not leak.
pub fn execute_scoped_block(ctx: &mut ExecContext, block: &[Box<dyn Statement>]) -> Result<Flow> {
    ctx.scoped(|ctx| execute_block(ctx, block))
}

fn write_block(ctx: &mut FoldContext, block: &[Box<dyn Statement>]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for statement in block {
        lines.extend(statement.write_cpp(ctx)?);
    }
    Ok(lines)
}

/// Compile a block's statements to lines inside a fresh scope.
pub fn write_scoped_block(ctx: &mut FoldContext, block: &[Box<dyn Statement>]) -> Result<Vec<String>> {
    ctx.scoped(|ctx| write_block(ctx, block))
}

/// Compile a block that may be skipped or repeated at runtime. Constants its
/// assignments establish must not survive past the block.
pub fn write_conditional_block(
    ctx: &mut FoldContext,
    block: &[Box<dyn Statement>],
) -> Result<Vec<String>> {
    ctx.conditional_scoped(|ctx| write_block(ctx, block))
}

/// Clear fold-time knowledge for every pre-existing variable a subtree may
/// write to.
pub fn invalidate_mutated<N: Node + ?Sized>(ctx: &mut FoldContext, node: &N) {
    let mut names = Vec::new();
    node.mutated_vars(&mut names);
    for name in names {
        if let Ok(var) = ctx.get_mut(&name) {
            var.set_unknown();
        }
    }
}

/// Block-level [`invalidate_mutated`]. Loops call this before rendering
/// their condition, so reads there never see pre-loop constants the body
/// overwrites.
pub fn invalidate_block_mutations(ctx: &mut FoldContext, block: &[Box<dyn Statement>]) {
    for statement in block {
        invalidate_mutated(ctx, &**statement);
    }
}

/// Serialize a block to its JSON array form.
pub fn block_to_json(block: &[Box<dyn Statement>]) -> Json {
    Json::Array(block.iter().map(|statement| statement.to_json()).collect())
}

/// Borrow a block's statements as plain nodes, for include collection.
pub fn block_children(block: &[Box<dyn Statement>]) -> impl Iterator<Item = &dyn Node> {
    block.iter().map(|statement| &**statement as &dyn Node)
}
