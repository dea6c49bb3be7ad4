//! Variable declaration, assignment, and reads.

use serde_json::{Value as Json, json};

use manuscript_core::{
    ExecContext, Expression, Flow, FoldContext, ManualError, Node, Result, RuntimeVariable,
    Statement, StaticVariable, TypeLookup, Value, VarType, invalidate_mutated,
};

use crate::registries::Registries;

// ============================================================================
// new_var
// ============================================================================

/// Declare a variable in the current scope, bound to its initializer.
pub struct VarDeclStmt {
    pub name: String,
    pub init: Box<dyn Expression>,
}

impl VarDeclStmt {
    pub fn new(name: impl Into<String>, init: Box<dyn Expression>) -> Self {
        Self {
            name: name.into(),
            init,
        }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        let name = field_str(data, "name")?;
        let init = regs.decode_expression(field(data, "init")?)?;
        Ok(Box::new(VarDeclStmt::new(name, init)))
    }
}

impl Node for VarDeclStmt {
    fn tag(&self) -> &'static str {
        "new_var"
    }

    fn to_data(&self) -> Json {
        json!({ "name": self.name, "init": self.init.to_json() })
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.init.as_ref()]
    }
}

impl Statement for VarDeclStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        let var_type = self.init.output_type(ctx)?;
        let value = self.init.execute(ctx)?;
        ctx.declare(self.name.clone(), RuntimeVariable::new(var_type, value));
        Ok(Flow::Continue)
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        let var_type = self.init.output_type(ctx)?;
        let seed = self.init.constant_value(ctx)?;
        // Render before binding so the initializer can still see a shadowed
        // outer variable of the same name.
        let rendered = self.init.write_cpp(ctx)?;
        invalidate_mutated(ctx, self.init.as_ref());
        ctx.declare(self.name.clone(), StaticVariable::new(var_type.clone(), seed));
        Ok(vec![format!("{} {} = {}", var_type.cpp(), self.name, rendered)])
    }
}

// ============================================================================
// set_var
// ============================================================================

/// Assign a new value to an existing binding.
pub struct AssignStmt {
    pub name: String,
    pub value: Box<dyn Expression>,
}

impl AssignStmt {
    pub fn new(name: impl Into<String>, value: Box<dyn Expression>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        let name = field_str(data, "name")?;
        let value = regs.decode_expression(field(data, "value")?)?;
        Ok(Box::new(AssignStmt::new(name, value)))
    }
}

impl Node for AssignStmt {
    fn tag(&self) -> &'static str {
        "set_var"
    }

    fn to_data(&self) -> Json {
        json!({ "name": self.name, "value": self.value.to_json() })
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.value.as_ref()]
    }

    fn mutated_vars(&self, out: &mut Vec<String>) {
        out.push(self.name.clone());
        self.value.mutated_vars(out);
    }
}

impl Statement for AssignStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        let incoming = self.value.output_type(ctx)?;
        let value = self.value.execute(ctx)?;
        ctx.get_mut(&self.name)?.set(&incoming, value)?;
        Ok(Flow::Continue)
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        let incoming = self.value.output_type(ctx)?;
        let folded = self.value.constant_value(ctx)?;
        // Render against the pre-assignment knowledge, then update the flag:
        // `x = x + 3` must fold the right-hand side with the old value of x.
        let rendered = self.value.write_cpp(ctx)?;
        invalidate_mutated(ctx, self.value.as_ref());
        match folded {
            // A write that may be skipped or repeated proves nothing about
            // the binding after the enclosing block.
            Some(value) if !ctx.in_conditional_branch() => {
                ctx.get_mut(&self.name)?.set_constant(&incoming, value)?
            }
            _ => ctx.get_mut(&self.name)?.set_unknown(),
        }
        Ok(vec![format!("{} = {}", self.name, rendered)])
    }
}

// ============================================================================
// get_var
// ============================================================================

/// Read a variable. Folding is flow-sensitive: it sees the binding's current
/// known-constant state, not its declaration.
pub struct VarExpr {
    pub name: String,
}

impl VarExpr {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn decode(_tag: &str, data: &Json, _regs: &Registries) -> Result<Box<dyn Expression>> {
        let name = data
            .as_str()
            .ok_or_else(|| ManualError::invalid_payload("get_var data must be a name"))?;
        Ok(Box::new(VarExpr::new(name)))
    }
}

impl Node for VarExpr {
    fn tag(&self) -> &'static str {
        "get_var"
    }

    fn to_data(&self) -> Json {
        json!(self.name)
    }
}

impl Expression for VarExpr {
    fn output_type(&self, types: &dyn TypeLookup) -> Result<VarType> {
        types.var_type_of(&self.name)
    }

    fn variable_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        Ok(ctx.get(&self.name)?.value().clone())
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        Ok(ctx.get(&self.name)?.known_value().cloned())
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        // Constant propagation: a provably-known binding renders as its value.
        match ctx.get(&self.name)?.known_value() {
            Some(value) => Ok(value.to_cpp()),
            None => Ok(self.name.clone()),
        }
    }
}

// ============================================================================
// Payload helpers
// ============================================================================

pub(crate) fn field<'a>(data: &'a Json, key: &str) -> Result<&'a Json> {
    data.get(key)
        .ok_or_else(|| ManualError::invalid_payload(format!("missing field '{key}'")))
}

pub(crate) fn field_str<'a>(data: &'a Json, key: &str) -> Result<&'a str> {
    field(data, key)?
        .as_str()
        .ok_or_else(|| ManualError::invalid_payload(format!("field '{key}' must be a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::NumberExpr;
    use manuscript_core::EvalContext;

    #[test]
    fn declare_then_read() {
        let mut ctx = EvalContext::default();
        let decl = VarDeclStmt::new("x", Box::new(NumberExpr::int(2)));
        assert_eq!(decl.execute(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(
            VarExpr::new("x").execute(&mut ctx).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn assign_to_unbound_name_fails() {
        let mut ctx = EvalContext::default();
        let assign = AssignStmt::new("ghost", Box::new(NumberExpr::int(1)));
        assert!(matches!(
            assign.execute(&mut ctx),
            Err(ManualError::VarNotExists(_))
        ));
    }

    #[test]
    fn declaration_compiles_with_seeded_constant() {
        let mut ctx = EvalContext::default();
        let decl = VarDeclStmt::new("x", Box::new(NumberExpr::int(2)));
        assert_eq!(decl.write_cpp(&mut ctx).unwrap(), vec!["int x = 2"]);
        assert_eq!(ctx.get("x").unwrap().known_value(), Some(&Value::Int(2)));
    }

    #[test]
    fn conditional_write_never_records_a_constant() {
        let mut ctx = EvalContext::default();
        VarDeclStmt::new("x", Box::new(NumberExpr::int(0)))
            .write_cpp(&mut ctx)
            .unwrap();
        ctx.conditional_scoped(|ctx| {
            AssignStmt::new("x", Box::new(NumberExpr::int(1)))
                .write_cpp(ctx)
                .unwrap();
        });
        assert_eq!(VarExpr::new("x").write_cpp(&ctx).unwrap(), "x");
    }

    #[test]
    fn read_of_known_constant_renders_literal() {
        let mut ctx = EvalContext::default();
        VarDeclStmt::new("x", Box::new(NumberExpr::int(2)))
            .write_cpp(&mut ctx)
            .unwrap();
        assert_eq!(VarExpr::new("x").write_cpp(&ctx).unwrap(), "2");
        ctx.get_mut("x").unwrap().set_unknown();
        assert_eq!(VarExpr::new("x").write_cpp(&ctx).unwrap(), "x");
    }
}
