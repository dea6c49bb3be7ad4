//! The registry bundle the whole instruction set decodes through.
//!
//! One [`Registries`] value is built at startup, extended by plugins, and
//! then shared read-only. Decoding recurses through it, so every nested
//! payload sees the same tag space.

use std::sync::Arc;

use serde_json::Value as Json;

use manuscript_core::{
    Expression, GetAccessor, ManualError, MethodAccessor, Result, SetAccessor, Statement, TypeRef,
    VarType, primitives,
};
use manuscript_registry::{DecodeRegister, Register};

use crate::accessor::{
    CallStmt, FieldExpr, MethodExpr, SetFieldStmt, builtin_get_accessors, builtin_method_accessors,
    builtin_set_accessors,
};
use crate::flow::{ForStmt, IfStmt, ReturnStmt, TernaryExpr, WhileStmt};
use crate::literal::{BoolExpr, ListExpr, NewVec2Expr, NumberExpr, StringExpr, Vec2Expr};
use crate::logic::{NotExpr, decode_equality, decode_logic};
use crate::math::{PowExpr, SqrtExpr, decode_arith, decode_compare};
use crate::variables::{AssignStmt, VarDeclStmt, VarExpr};

/// Every register the instruction set dispatches through.
pub struct Registries {
    pub var_types: Register<TypeRef>,
    pub statements: DecodeRegister<Box<dyn Statement>, Registries>,
    pub expressions: DecodeRegister<Box<dyn Expression>, Registries>,
    pub get_accessors: Register<Arc<GetAccessor>>,
    pub set_accessors: Register<Arc<SetAccessor>>,
    pub method_accessors: Register<Arc<MethodAccessor>>,
}

impl Registries {
    /// Empty registers; callers register everything themselves.
    pub fn new() -> Self {
        Self {
            var_types: Register::new("var_types"),
            statements: DecodeRegister::new("statements"),
            expressions: DecodeRegister::new("expressions"),
            get_accessors: Register::new("get_accessors"),
            set_accessors: Register::new("set_accessors"),
            method_accessors: Register::new("method_accessors"),
        }
    }

    /// Registers with the full builtin instruction set installed.
    pub fn with_builtins() -> Self {
        let mut regs = Self::new();

        for entry in primitives::all() {
            regs.register_var_type(entry);
        }

        regs.statements.register("new_var", VarDeclStmt::decode);
        regs.statements.register("set_var", AssignStmt::decode);
        regs.statements.register("if", IfStmt::decode);
        regs.statements.register("for", ForStmt::decode);
        regs.statements.register("while", WhileStmt::decode);
        regs.statements.register("return", ReturnStmt::decode);
        regs.statements.register("set_accessor", SetFieldStmt::decode);
        regs.statements.register("method_accessor", CallStmt::decode);

        regs.expressions.register("get_var", VarExpr::decode);
        regs.expressions.register("boolean", BoolExpr::decode);
        for tag in ["byte", "short", "int", "long", "float", "double"] {
            regs.expressions.register(tag, NumberExpr::decode);
        }
        regs.expressions.register("string", StringExpr::decode);
        regs.expressions.register("vec2", Vec2Expr::decode);
        regs.expressions.register("new_vec2", NewVec2Expr::decode);
        regs.expressions.register("list", ListExpr::decode);
        for tag in ["addition", "subtraction", "multiplication", "division"] {
            regs.expressions.register(tag, decode_arith);
        }
        regs.expressions.register("pow", PowExpr::decode);
        regs.expressions.register("sqrt", SqrtExpr::decode);
        for tag in ["less", "less_equal", "greater", "greater_equal"] {
            regs.expressions.register(tag, decode_compare);
        }
        for tag in ["and", "or"] {
            regs.expressions.register(tag, decode_logic);
        }
        regs.expressions.register("not", NotExpr::decode);
        for tag in ["equals", "not_equals"] {
            regs.expressions.register(tag, decode_equality);
        }
        regs.expressions
            .register("ternary_operator", TernaryExpr::decode);
        regs.expressions.register("get_accessor", FieldExpr::decode);
        regs.expressions
            .register("method_accessor", MethodExpr::decode);

        for accessor in builtin_get_accessors() {
            regs.register_get_accessor(accessor);
        }
        for accessor in builtin_set_accessors() {
            regs.register_set_accessor(accessor);
        }
        for accessor in builtin_method_accessors() {
            regs.register_method_accessor(accessor);
        }

        regs
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    pub fn register_var_type(&mut self, entry: TypeRef) {
        self.var_types.register(entry.id.clone(), entry);
    }

    pub fn register_get_accessor(&mut self, accessor: GetAccessor) {
        self.get_accessors
            .register(accessor.id.clone(), Arc::new(accessor));
    }

    pub fn register_set_accessor(&mut self, accessor: SetAccessor) {
        self.set_accessors
            .register(accessor.id.clone(), Arc::new(accessor));
    }

    pub fn register_method_accessor(&mut self, accessor: MethodAccessor) {
        self.method_accessors
            .register(accessor.id.clone(), Arc::new(accessor));
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    pub fn decode_statement(&self, json: &Json) -> Result<Box<dyn Statement>> {
        self.statements.decode(json, self)
    }

    pub fn decode_expression(&self, json: &Json) -> Result<Box<dyn Expression>> {
        self.expressions.decode(json, self)
    }

    /// Decode a JSON array of statements.
    pub fn decode_block(&self, json: &Json) -> Result<Vec<Box<dyn Statement>>> {
        json.as_array()
            .ok_or_else(|| ManualError::invalid_payload("block must be an array"))?
            .iter()
            .map(|statement| self.decode_statement(statement))
            .collect()
    }

    pub fn decode_var_type(&self, json: &Json) -> Result<VarType> {
        VarType::from_json(json, &|id| self.var_types.get(id).map(TypeRef::clone))
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::TypeEntry;
    use serde_json::json;

    #[test]
    fn builtins_cover_the_wire_tags() {
        let regs = Registries::with_builtins();
        for tag in ["new_var", "set_var", "if", "for", "while", "return"] {
            assert!(regs.statements.contains(tag), "missing statement '{tag}'");
        }
        for tag in ["boolean", "int", "addition", "ternary_operator", "list"] {
            assert!(regs.expressions.contains(tag), "missing expression '{tag}'");
        }
        assert!(regs.var_types.contains("double"));
        assert!(regs.get_accessors.contains("vec2.x"));
        assert!(regs.method_accessors.contains("vector.push"));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let regs = Registries::with_builtins();
        let result = regs.decode_expression(&json!({ "type": "no_such_op", "data": [] }));
        assert!(matches!(result, Err(ManualError::NotRegistered { .. })));
    }

    #[test]
    fn plugin_var_types_resolve_in_payloads() {
        let mut regs = Registries::with_builtins();
        regs.register_var_type(Arc::new(TypeEntry::new("biome", "Biome")));
        let decoded = regs
            .decode_var_type(&json!({ "type": "biome", "generics": [], "arrayLength": -1 }))
            .unwrap();
        assert_eq!(decoded.entry.id, "biome");
    }

    #[test]
    fn nested_payload_decodes_through_one_bundle() {
        let regs = Registries::with_builtins();
        let payload = json!({
            "type": "addition",
            "data": [
                { "type": "int", "data": 2 },
                { "type": "int", "data": 3 },
            ],
        });
        let expr = regs.decode_expression(&payload).unwrap();
        let mut ctx = manuscript_core::EvalContext::default();
        assert_eq!(
            expr.execute(&mut ctx).unwrap(),
            manuscript_core::Value::Int(5)
        );
    }
}
