//! The manual: a named script attached to generated content.
//!
//! A manual is an ordered statement list with no inherent parameters; its
//! inputs are whatever variables the caller seeds the context with. The same
//! tree executes live on the server and compiles to C++ lines for the native
//! client.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use serde_json::{Value as Json, json};
use tracing::debug;

use manuscript_core::{
    EvalContext, Flow, ManualError, Result, RuntimeVariable, Statement, StaticVariable, Value,
    block_to_json, execute_block,
};

use crate::registries::Registries;

/// Output of compiling one manual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledManual {
    /// Unindented C++ source lines; the exporter nests and indents them.
    pub lines: Vec<String>,
    /// Headers the emitted code needs, deduplicated and ordered.
    pub includes: BTreeSet<String>,
}

pub struct Manual {
    pub instructions: Vec<Box<dyn Statement>>,
}

impl Manual {
    pub fn new(instructions: Vec<Box<dyn Statement>>) -> Self {
        Self { instructions }
    }

    pub fn from_json(json: &Json, regs: &Registries) -> Result<Manual> {
        let instructions = json
            .get("instructions")
            .ok_or_else(|| ManualError::invalid_payload("manual is missing 'instructions'"))?;
        Ok(Manual::new(regs.decode_block(instructions)?))
    }

    pub fn to_json(&self) -> Json {
        json!({ "instructions": block_to_json(&self.instructions) })
    }

    /// Interpret against live bindings. Returns the early-return value, if
    /// the manual produced one.
    pub fn execute(
        &self,
        initial: FxHashMap<String, RuntimeVariable>,
    ) -> Result<Option<Value>> {
        let mut ctx = EvalContext::new(initial);
        match execute_block(&mut ctx, &self.instructions)? {
            Flow::Return(value) => Ok(Some(value)),
            Flow::Continue => Ok(None),
        }
    }

    /// Compile to C++ source lines, folding constants against whatever the
    /// caller could prove about the seeded variables.
    pub fn compile(
        &self,
        initial: FxHashMap<String, StaticVariable>,
    ) -> Result<CompiledManual> {
        let mut ctx = EvalContext::new(initial);
        let mut lines = Vec::new();
        let mut includes = BTreeSet::new();
        for instruction in &self.instructions {
            lines.extend(instruction.write_cpp(&mut ctx)?);
            includes.extend(instruction.includes());
        }
        debug!(lines = lines.len(), includes = includes.len(), "compiled manual");
        Ok(CompiledManual { lines, includes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn int(value: i32) -> Json {
        json!({ "type": "int", "data": value })
    }

    fn scenario() -> Json {
        // x = 2; x = 5; return x
        json!({
            "instructions": [
                { "type": "new_var", "data": { "name": "x", "init": int(2) } },
                { "type": "set_var", "data": { "name": "x", "value": int(5) } },
                { "type": "return", "data": { "type": "get_var", "data": "x" } },
            ]
        })
    }

    #[test]
    fn execute_returns_the_final_value() {
        let regs = Registries::with_builtins();
        let manual = Manual::from_json(&scenario(), &regs).unwrap();
        let result = manual.execute(FxHashMap::default()).unwrap();
        assert_eq!(result, Some(Value::Int(5)));
    }

    #[test]
    fn compile_folds_variable_reads() {
        let regs = Registries::with_builtins();
        let manual = Manual::from_json(&scenario(), &regs).unwrap();
        let compiled = manual.compile(FxHashMap::default()).unwrap();
        assert_eq!(compiled.lines, vec!["int x = 2", "x = 5", "return 5"]);
        assert!(compiled.includes.is_empty());
    }

    #[test]
    fn wire_round_trip_is_stable() {
        let regs = Registries::with_builtins();
        let manual = Manual::from_json(&scenario(), &regs).unwrap();
        assert_eq!(manual.to_json(), scenario());
    }
}
