//! Scoped evaluation contexts.
//!
//! One [`EvalContext`] is threaded through a whole execute or compile pass.
//! It is an explicit scope stack: `declare` inserts into the innermost scope,
//! lookup walks outward, and exiting a scope drops everything declared inside
//! it, so leakage to an outer scope is structurally impossible. Mutating a
//! pre-existing binding from inside a nested block stays visible to the
//! caller, which loop bodies rely on.

use rustc_hash::FxHashMap;

use crate::error::{ManualError, Result};
use crate::types::VarType;
use crate::value::Value;

// ============================================================================
// Variable flavors
// ============================================================================

/// A live variable during interpretation: always has a concrete value.
#[derive(Debug, Clone)]
pub struct RuntimeVariable {
    var_type: VarType,
    value: Value,
}

impl RuntimeVariable {
    pub fn new(var_type: VarType, value: Value) -> Self {
        Self { var_type, value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Overwrite the value after a compatibility check against the
    /// incoming expression's type.
    pub fn set(&mut self, incoming: &VarType, value: Value) -> Result<()> {
        if !self.var_type.is_compatible(incoming) {
            return Err(ManualError::IncompatibleTypes {
                expected: self.var_type.entry.id.clone(),
                found: incoming.entry.id.clone(),
            });
        }
        self.value = value;
        Ok(())
    }
}

/// A compile-time variable: its value may or may not be provable.
///
/// The known-constant flag is not monotonic. A non-constant write clears it
/// and a later constant assignment re-establishes it.
#[derive(Debug, Clone)]
pub struct StaticVariable {
    var_type: VarType,
    known: Option<Value>,
}

impl StaticVariable {
    pub fn new(var_type: VarType, known: Option<Value>) -> Self {
        Self { var_type, known }
    }

    pub fn known_value(&self) -> Option<&Value> {
        self.known.as_ref()
    }

    pub fn is_constant(&self) -> bool {
        self.known.is_some()
    }

    /// Record a provable constant value, checking type compatibility.
    pub fn set_constant(&mut self, incoming: &VarType, value: Value) -> Result<()> {
        if !self.var_type.is_compatible(incoming) {
            return Err(ManualError::IncompatibleTypes {
                expected: self.var_type.entry.id.clone(),
                found: incoming.entry.id.clone(),
            });
        }
        self.known = Some(value);
        Ok(())
    }

    /// Discard any known constant value.
    pub fn set_unknown(&mut self) {
        self.known = None;
    }
}

/// Common access to a variable's declared type, shared by both flavors.
pub trait VarSlot {
    fn var_type(&self) -> &VarType;
}

impl VarSlot for RuntimeVariable {
    fn var_type(&self) -> &VarType {
        &self.var_type
    }
}

impl VarSlot for StaticVariable {
    fn var_type(&self) -> &VarType {
        &self.var_type
    }
}

// ============================================================================
// EvalContext
// ============================================================================

/// Object-safe view used by `Expression::output_type` in either mode.
pub trait TypeLookup {
    fn var_type_of(&self, name: &str) -> Result<VarType>;
}

/// The scoped symbol table for one pass, parameterized over variable flavor.
#[derive(Debug)]
pub struct EvalContext<V> {
    scopes: Vec<FxHashMap<String, V>>,
    conditional_depth: usize,
}

/// Context flavor used by interpretation.
pub type ExecContext = EvalContext<RuntimeVariable>;

/// Context flavor used by compilation and constant folding.
pub type FoldContext = EvalContext<StaticVariable>;

impl<V> EvalContext<V> {
    /// Create a context seeded with the caller-supplied bindings.
    pub fn new(initial: FxHashMap<String, V>) -> Self {
        Self {
            scopes: vec![initial],
            conditional_depth: 0,
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn exit_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot exit the root scope");
        self.scopes.pop();
    }

    /// Run `f` inside a fresh scope, always restoring the previous one.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.enter_scope();
        let out = f(self);
        self.exit_scope();
        out
    }

    /// Run `f` inside a fresh scope whose statements are not certain to run
    /// exactly once (an undecided branch, a loop body).
    pub fn conditional_scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.conditional_depth += 1;
        let out = self.scoped(f);
        self.conditional_depth -= 1;
        out
    }

    /// Whether the current position may be skipped or repeated at runtime.
    /// A fold pass must not record constants established here past the
    /// enclosing block.
    pub fn in_conditional_branch(&self) -> bool {
        self.conditional_depth > 0
    }

    /// Bind a name in the innermost scope, shadowing any outer binding.
    pub fn declare(&mut self, name: impl Into<String>, variable: V) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), variable);
        }
    }

    pub fn get(&self, name: &str) -> Result<&V> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .ok_or_else(|| ManualError::VarNotExists(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut V> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .ok_or_else(|| ManualError::VarNotExists(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains_key(name))
    }
}

impl<V> Default for EvalContext<V> {
    fn default() -> Self {
        Self::new(FxHashMap::default())
    }
}

impl<V: VarSlot> TypeLookup for EvalContext<V> {
    fn var_type_of(&self, name: &str) -> Result<VarType> {
        Ok(self.get(name)?.var_type().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_int(value: i32) -> RuntimeVariable {
        RuntimeVariable::new(VarType::int(), Value::Int(value))
    }

    #[test]
    fn inner_declarations_die_with_their_scope() {
        let mut ctx: ExecContext = EvalContext::default();
        ctx.declare("outer", runtime_int(1));
        ctx.scoped(|ctx| {
            ctx.declare("inner", runtime_int(2));
            assert!(ctx.get("inner").is_ok());
            assert!(ctx.get("outer").is_ok());
        });
        assert!(matches!(
            ctx.get("inner"),
            Err(ManualError::VarNotExists(_))
        ));
        assert!(ctx.get("outer").is_ok());
    }

    #[test]
    fn outer_mutation_survives_scope_exit() {
        let mut ctx: ExecContext = EvalContext::default();
        ctx.declare("x", runtime_int(1));
        ctx.scoped(|ctx| {
            ctx.get_mut("x")
                .unwrap()
                .set(&VarType::int(), Value::Int(7))
                .unwrap();
        });
        assert_eq!(ctx.get("x").unwrap().value(), &Value::Int(7));
    }

    #[test]
    fn shadowing_restores_on_exit() {
        let mut ctx: ExecContext = EvalContext::default();
        ctx.declare("x", runtime_int(1));
        ctx.scoped(|ctx| {
            ctx.declare("x", runtime_int(5));
            assert_eq!(ctx.get("x").unwrap().value(), &Value::Int(5));
        });
        assert_eq!(ctx.get("x").unwrap().value(), &Value::Int(1));
    }

    #[test]
    fn runtime_set_checks_compatibility() {
        let mut var = runtime_int(1);
        assert!(var.set(&VarType::double(), Value::Double(2.0)).is_ok());
        assert!(matches!(
            var.set(&VarType::boolean(), Value::Bool(true)),
            Err(ManualError::IncompatibleTypes { .. })
        ));
    }

    #[test]
    fn static_constancy_is_not_monotonic() {
        let mut var = StaticVariable::new(VarType::int(), Some(Value::Int(2)));
        assert!(var.is_constant());
        var.set_unknown();
        assert!(!var.is_constant());
        var.set_constant(&VarType::int(), Value::Int(9)).unwrap();
        assert_eq!(var.known_value(), Some(&Value::Int(9)));
    }
}
