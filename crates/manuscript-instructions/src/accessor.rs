//! Accessor-dispatching instructions and the builtin descriptors.
//!
//! The nodes here carry an `Arc` to a descriptor looked up by id at decode
//! time, so plugin-registered accessors flow through the same four node
//! shapes as the builtins.

use std::sync::Arc;

use serde_json::{Value as Json, json};

use manuscript_core::{
    ExecContext, Expression, Flow, FoldContext, GetAccessor, ManualError, MethodAccessor, Node,
    Result, SetAccessor, Statement, TypeLookup, Value, VarType, invalidate_mutated,
};

use crate::registries::Registries;
use crate::variables::field;

// ============================================================================
// get_accessor
// ============================================================================

/// Reads a field off a structured value, e.g. `vec2.x`.
pub struct FieldExpr {
    pub accessor: Arc<GetAccessor>,
    pub object: Box<dyn Expression>,
}

impl FieldExpr {
    pub fn new(accessor: Arc<GetAccessor>, object: Box<dyn Expression>) -> Self {
        Self { accessor, object }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        let accessor = regs.get_accessors.get(field_accessor_id(data)?)?.clone();
        let object = regs.decode_expression(field(data, "object")?)?;
        Ok(Box::new(FieldExpr::new(accessor, object)))
    }
}

impl Node for FieldExpr {
    fn tag(&self) -> &'static str {
        "get_accessor"
    }

    fn to_data(&self) -> Json {
        json!({ "accessor": self.accessor.id, "object": self.object.to_json() })
    }

    fn self_includes(&self) -> Vec<String> {
        self.accessor.includes.clone()
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.object.as_ref()]
    }
}

impl Expression for FieldExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(self.accessor.value_type.clone())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        let object = self.object.execute(ctx)?;
        (self.accessor.get)(&object)
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match self.object.constant_value(ctx)? {
            Some(object) => Ok(Some((self.accessor.get)(&object)?)),
            None => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        if let Some(folded) = self.constant_value(ctx)? {
            return Ok(folded.to_cpp());
        }
        Ok(self.accessor.write_cpp(&self.object.write_cpp(ctx)?))
    }
}

// ============================================================================
// set_accessor
// ============================================================================

pub struct SetFieldStmt {
    pub accessor: Arc<SetAccessor>,
    pub object: Box<dyn Expression>,
    pub value: Box<dyn Expression>,
}

impl SetFieldStmt {
    pub fn new(
        accessor: Arc<SetAccessor>,
        object: Box<dyn Expression>,
        value: Box<dyn Expression>,
    ) -> Self {
        Self {
            accessor,
            object,
            value,
        }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        let accessor = regs.set_accessors.get(field_accessor_id(data)?)?.clone();
        let object = regs.decode_expression(field(data, "object")?)?;
        let value = regs.decode_expression(field(data, "value")?)?;
        Ok(Box::new(SetFieldStmt::new(accessor, object, value)))
    }
}

impl Node for SetFieldStmt {
    fn tag(&self) -> &'static str {
        "set_accessor"
    }

    fn to_data(&self) -> Json {
        json!({
            "accessor": self.accessor.id,
            "object": self.object.to_json(),
            "value": self.value.to_json(),
        })
    }

    fn self_includes(&self) -> Vec<String> {
        self.accessor.includes.clone()
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.object.as_ref(), self.value.as_ref()]
    }

    fn mutated_vars(&self, out: &mut Vec<String>) {
        if let Some(name) = self.object.variable_name() {
            out.push(name.to_string());
        }
        self.object.mutated_vars(out);
        self.value.mutated_vars(out);
    }
}

impl Statement for SetFieldStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        let object = self.object.execute(ctx)?;
        let value = self.value.execute(ctx)?;
        (self.accessor.set)(&object, value)?;
        Ok(Flow::Continue)
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        let value = self.value.write_cpp(ctx)?;
        // The target is an lvalue: name the variable, never its folded
        // value, and the write makes that value unknowable.
        let object = match self.object.variable_name() {
            Some(name) => name.to_string(),
            None => self.object.write_cpp(ctx)?,
        };
        let lines = self.accessor.write_cpp(&object, &value);
        invalidate_mutated(ctx, self);
        Ok(lines)
    }
}

// ============================================================================
// method_accessor
// ============================================================================

/// Invokes a method for its result, e.g. `vec2.distance`.
pub struct MethodExpr {
    pub accessor: Arc<MethodAccessor>,
    pub object: Box<dyn Expression>,
    pub args: Vec<Box<dyn Expression>>,
}

impl MethodExpr {
    pub fn new(
        accessor: Arc<MethodAccessor>,
        object: Box<dyn Expression>,
        args: Vec<Box<dyn Expression>>,
    ) -> Self {
        Self {
            accessor,
            object,
            args,
        }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        let (accessor, object, args) = decode_method_parts(data, regs)?;
        Ok(Box::new(MethodExpr::new(accessor, object, args)))
    }

    fn evaluate(&self, ctx: &mut ExecContext) -> Result<Value> {
        let object = self.object.execute(ctx)?;
        let args = self
            .args
            .iter()
            .map(|arg| arg.execute(ctx))
            .collect::<Result<Vec<_>>>()?;
        (self.accessor.call)(&object, &args)
    }

    fn fold(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        // An impure method's effect belongs in the emitted source, not in
        // the compile pass.
        if !self.accessor.pure {
            return Ok(None);
        }
        let Some(object) = self.object.constant_value(ctx)? else {
            return Ok(None);
        };
        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            match arg.constant_value(ctx)? {
                Some(value) => args.push(value.deep_clone()),
                None => return Ok(None),
            }
        }
        Ok(Some((self.accessor.call)(&object.deep_clone(), &args)?))
    }

    fn render(&self, ctx: &FoldContext) -> Result<String> {
        // A mutating call needs its receiver as an lvalue, never a folded
        // literal.
        let object = match self.object.variable_name() {
            Some(name) if !self.accessor.pure => name.to_string(),
            _ => self.object.write_cpp(ctx)?,
        };
        let args = self
            .args
            .iter()
            .map(|arg| arg.write_cpp(ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.accessor.write_cpp(&object, &args))
    }
}

impl Node for MethodExpr {
    fn tag(&self) -> &'static str {
        "method_accessor"
    }

    fn to_data(&self) -> Json {
        method_to_data(&self.accessor, &self.object, &self.args)
    }

    fn self_includes(&self) -> Vec<String> {
        self.accessor.includes.clone()
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut out: Vec<&dyn Node> = vec![self.object.as_ref()];
        out.extend(self.args.iter().map(|arg| &**arg as &dyn Node));
        out
    }

    fn mutated_vars(&self, out: &mut Vec<String>) {
        if !self.accessor.pure
            && let Some(name) = self.object.variable_name()
        {
            out.push(name.to_string());
        }
        self.object.mutated_vars(out);
        for arg in &self.args {
            arg.mutated_vars(out);
        }
    }
}

impl Expression for MethodExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(self.accessor.return_type.clone())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        self.evaluate(ctx)
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        self.fold(ctx)
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        if let Some(folded) = self.fold(ctx)? {
            return Ok(folded.to_cpp());
        }
        self.render(ctx)
    }
}

/// Invokes a method for its side effect, discarding the result.
pub struct CallStmt {
    pub inner: MethodExpr,
}

impl CallStmt {
    pub fn new(
        accessor: Arc<MethodAccessor>,
        object: Box<dyn Expression>,
        args: Vec<Box<dyn Expression>>,
    ) -> Self {
        Self {
            inner: MethodExpr::new(accessor, object, args),
        }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        let (accessor, object, args) = decode_method_parts(data, regs)?;
        Ok(Box::new(CallStmt::new(accessor, object, args)))
    }
}

impl Node for CallStmt {
    fn tag(&self) -> &'static str {
        "method_accessor"
    }

    fn to_data(&self) -> Json {
        self.inner.to_data()
    }

    fn self_includes(&self) -> Vec<String> {
        self.inner.self_includes()
    }

    fn children(&self) -> Vec<&dyn Node> {
        self.inner.children()
    }

    fn mutated_vars(&self, out: &mut Vec<String>) {
        self.inner.mutated_vars(out);
    }
}

impl Statement for CallStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        self.inner.evaluate(ctx)?;
        Ok(Flow::Continue)
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        let line = self.inner.render(ctx)?;
        invalidate_mutated(ctx, &self.inner);
        Ok(vec![line])
    }
}

// ============================================================================
// Decode plumbing
// ============================================================================

fn field_accessor_id(data: &Json) -> Result<&str> {
    field(data, "accessor")?
        .as_str()
        .ok_or_else(|| ManualError::invalid_payload("field 'accessor' must be a string"))
}

fn decode_method_parts(
    data: &Json,
    regs: &Registries,
) -> Result<(Arc<MethodAccessor>, Box<dyn Expression>, Vec<Box<dyn Expression>>)> {
    let accessor = regs.method_accessors.get(field_accessor_id(data)?)?.clone();
    let object = regs.decode_expression(field(data, "object")?)?;
    let args = field(data, "args")?
        .as_array()
        .ok_or_else(|| ManualError::invalid_payload("field 'args' must be an array"))?
        .iter()
        .map(|arg| regs.decode_expression(arg))
        .collect::<Result<Vec<_>>>()?;
    if args.len() != accessor.arg_types.len() {
        return Err(ManualError::invalid_payload(format!(
            "accessor '{}' takes {} argument(s), got {}",
            accessor.id,
            accessor.arg_types.len(),
            args.len()
        )));
    }
    Ok((accessor, object, args))
}

fn method_to_data(
    accessor: &MethodAccessor,
    object: &Box<dyn Expression>,
    args: &[Box<dyn Expression>],
) -> Json {
    json!({
        "accessor": accessor.id,
        "object": object.to_json(),
        "args": args.iter().map(|arg| arg.to_json()).collect::<Vec<_>>(),
    })
}

// ============================================================================
// Builtin descriptors
// ============================================================================

pub fn builtin_get_accessors() -> Vec<GetAccessor> {
    vec![
        GetAccessor::new(
            "vec2.x",
            VarType::double(),
            |object| Ok(Value::Double(object.as_vec2()?.borrow().x)),
            "$0[0]",
        ),
        GetAccessor::new(
            "vec2.y",
            VarType::double(),
            |object| Ok(Value::Double(object.as_vec2()?.borrow().y)),
            "$0[1]",
        ),
    ]
}

pub fn builtin_set_accessors() -> Vec<SetAccessor> {
    vec![
        SetAccessor::new(
            "vec2.x",
            VarType::double(),
            |object, value| {
                object.as_vec2()?.borrow_mut().x = value.as_f64()?;
                Ok(())
            },
            vec!["$0[0] = $1".to_string()],
        ),
        SetAccessor::new(
            "vec2.y",
            VarType::double(),
            |object, value| {
                object.as_vec2()?.borrow_mut().y = value.as_f64()?;
                Ok(())
            },
            vec!["$0[1] = $1".to_string()],
        ),
    ]
}

pub fn builtin_method_accessors() -> Vec<MethodAccessor> {
    vec![
        MethodAccessor::new(
            "vec2.add",
            VarType::vec2(),
            vec![VarType::vec2()],
            |object, args| {
                let result = object.as_vec2()?.borrow().add(&args[0].as_vec2()?.borrow());
                Ok(Value::vec2(result))
            },
            "{$0[0] + $1[0], $0[1] + $1[1]}",
        ),
        MethodAccessor::new(
            "vec2.subtract",
            VarType::vec2(),
            vec![VarType::vec2()],
            |object, args| {
                let result = object
                    .as_vec2()?
                    .borrow()
                    .subtract(&args[0].as_vec2()?.borrow());
                Ok(Value::vec2(result))
            },
            "{$0[0] - $1[0], $0[1] - $1[1]}",
        ),
        MethodAccessor::new(
            "vec2.scale",
            VarType::vec2(),
            vec![VarType::double()],
            |object, args| {
                let result = object.as_vec2()?.borrow().scale(args[0].as_f64()?);
                Ok(Value::vec2(result))
            },
            "{$0[0] * $1, $0[1] * $1}",
        ),
        MethodAccessor::new(
            "vec2.distance",
            VarType::double(),
            vec![VarType::vec2()],
            |object, args| {
                let distance = object
                    .as_vec2()?
                    .borrow()
                    .distance(&args[0].as_vec2()?.borrow());
                Ok(Value::Double(distance))
            },
            "std::sqrt(std::pow($0[0] - $1[0], 2) + std::pow($0[1] - $1[1], 2))",
        )
        .with_includes(vec!["<cmath>".to_string()]),
        MethodAccessor::new(
            "vec2.length",
            VarType::double(),
            vec![],
            |object, _args| Ok(Value::Double(object.as_vec2()?.borrow().length())),
            "std::sqrt(std::pow($0[0], 2) + std::pow($0[1], 2))",
        )
        .with_includes(vec!["<cmath>".to_string()]),
        MethodAccessor::new(
            "vector.push",
            VarType::vector_of(VarType::double()),
            vec![VarType::double()],
            |object, args| {
                let list = object.as_list()?;
                list.borrow_mut().push(args[0].clone());
                Ok(Value::List(list.clone()))
            },
            "$0.push_back($1)",
        )
        .mutating()
        .with_includes(vec!["<vector>".to_string()]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::{ListExpr, NumberExpr, Vec2Expr};
    use crate::registries::Registries;
    use crate::variables::{VarDeclStmt, VarExpr};
    use manuscript_core::{EvalContext, StaticVariable, Vec2, execute_block};

    fn regs() -> Registries {
        Registries::with_builtins()
    }

    fn vec2_literal(x: f64, y: f64) -> Box<dyn Expression> {
        Box::new(Vec2Expr::new(Vec2::new(x, y)))
    }

    #[test]
    fn getter_reads_a_live_variable() {
        let regs = regs();
        let mut ctx = EvalContext::default();
        VarDeclStmt::new("pos", vec2_literal(3.0, 4.0))
            .execute(&mut ctx)
            .unwrap();
        let expr = FieldExpr::new(
            regs.get_accessors.get("vec2.x").unwrap().clone(),
            Box::new(VarExpr::new("pos")),
        );
        assert_eq!(expr.execute(&mut ctx).unwrap(), Value::Double(3.0));
    }

    #[test]
    fn setter_mutates_through_the_stored_handle() {
        let regs = regs();
        let mut ctx = EvalContext::default();
        let block: Vec<Box<dyn Statement>> = vec![
            Box::new(VarDeclStmt::new("pos", vec2_literal(1.0, 2.0))),
            Box::new(SetFieldStmt::new(
                regs.set_accessors.get("vec2.y").unwrap().clone(),
                Box::new(VarExpr::new("pos")),
                Box::new(NumberExpr::double(9.0)),
            )),
        ];
        execute_block(&mut ctx, &block).unwrap();
        let value = ctx.get("pos").unwrap().value().clone();
        assert_eq!(value.as_vec2().unwrap().borrow().y, 9.0);
    }

    #[test]
    fn method_folds_when_all_inputs_fold() {
        let regs = regs();
        let ctx = EvalContext::default();
        let expr = MethodExpr::new(
            regs.method_accessors.get("vec2.length").unwrap().clone(),
            vec2_literal(3.0, 4.0),
            vec![],
        );
        assert_eq!(
            expr.constant_value(&ctx).unwrap(),
            Some(Value::Double(5.0))
        );
        assert_eq!(expr.write_cpp(&ctx).unwrap(), "5");
    }

    #[test]
    fn method_renders_template_on_unknown_object() {
        let regs = regs();
        let mut ctx: FoldContext = EvalContext::default();
        ctx.declare("pos", StaticVariable::new(VarType::vec2(), None));
        let expr = MethodExpr::new(
            regs.method_accessors.get("vec2.scale").unwrap().clone(),
            Box::new(VarExpr::new("pos")),
            vec![Box::new(NumberExpr::double(2.0))],
        );
        assert_eq!(expr.write_cpp(&ctx).unwrap(), "{pos[0] * 2, pos[1] * 2}");
        assert_eq!(
            expr.includes().into_iter().collect::<Vec<_>>(),
            Vec::<String>::new()
        );
    }

    #[test]
    fn distance_carries_cmath() {
        let regs = regs();
        let expr = MethodExpr::new(
            regs.method_accessors.get("vec2.distance").unwrap().clone(),
            vec2_literal(0.0, 0.0),
            vec![vec2_literal(3.0, 4.0)],
        );
        assert!(expr.includes().contains("<cmath>"));
    }

    #[test]
    fn push_appends_to_the_stored_list() {
        let regs = regs();
        let mut ctx = EvalContext::default();
        let block: Vec<Box<dyn Statement>> = vec![
            Box::new(VarDeclStmt::new(
                "values",
                Box::new(ListExpr::new(vec![Value::Double(1.0)], VarType::double())),
            )),
            Box::new(CallStmt::new(
                regs.method_accessors.get("vector.push").unwrap().clone(),
                Box::new(VarExpr::new("values")),
                vec![Box::new(NumberExpr::double(2.0))],
            )),
        ];
        execute_block(&mut ctx, &block).unwrap();
        let value = ctx.get("values").unwrap().value().clone();
        assert_eq!(value.as_list().unwrap().borrow().len(), 2);
    }

    #[test]
    fn compiled_setter_names_its_target_and_forgets_it() {
        let regs = regs();
        let mut ctx: FoldContext = EvalContext::default();
        VarDeclStmt::new("pos", vec2_literal(1.0, 2.0))
            .write_cpp(&mut ctx)
            .unwrap();
        let stmt = SetFieldStmt::new(
            regs.set_accessors.get("vec2.y").unwrap().clone(),
            Box::new(VarExpr::new("pos")),
            Box::new(NumberExpr::double(9.0)),
        );
        assert_eq!(stmt.write_cpp(&mut ctx).unwrap(), vec!["pos[1] = 9"]);
        assert!(!ctx.get("pos").unwrap().is_constant());
        let read = FieldExpr::new(
            regs.get_accessors.get("vec2.y").unwrap().clone(),
            Box::new(VarExpr::new("pos")),
        );
        assert_eq!(read.write_cpp(&ctx).unwrap(), "pos[1]");
    }

    #[test]
    fn compiled_push_keeps_the_call_and_forgets_the_list() {
        let regs = regs();
        let mut ctx: FoldContext = EvalContext::default();
        VarDeclStmt::new(
            "values",
            Box::new(ListExpr::new(vec![Value::Double(1.0)], VarType::double())),
        )
        .write_cpp(&mut ctx)
        .unwrap();
        let seeded = ctx.get("values").unwrap().known_value().cloned().unwrap();
        let stmt = CallStmt::new(
            regs.method_accessors.get("vector.push").unwrap().clone(),
            Box::new(VarExpr::new("values")),
            vec![Box::new(NumberExpr::double(2.0))],
        );
        assert_eq!(
            stmt.write_cpp(&mut ctx).unwrap(),
            vec!["values.push_back(2)"]
        );
        assert!(!ctx.get("values").unwrap().is_constant());
        // Compiling never ran the callback against the recorded constant.
        assert_eq!(seeded.as_list().unwrap().borrow().len(), 1);
    }

    #[test]
    fn impure_methods_do_not_fold() {
        let regs = regs();
        let mut ctx: FoldContext = EvalContext::default();
        VarDeclStmt::new(
            "values",
            Box::new(ListExpr::new(vec![Value::Double(1.0)], VarType::double())),
        )
        .write_cpp(&mut ctx)
        .unwrap();
        let expr = MethodExpr::new(
            regs.method_accessors.get("vector.push").unwrap().clone(),
            Box::new(VarExpr::new("values")),
            vec![Box::new(NumberExpr::double(2.0))],
        );
        assert_eq!(expr.constant_value(&ctx).unwrap(), None);
        assert_eq!(expr.write_cpp(&ctx).unwrap(), "values.push_back(2)");
    }

    #[test]
    fn folding_hands_callbacks_detached_values() {
        // A misdeclared accessor that mutates its receiver must not reach
        // the binding's recorded constant.
        let accessor = Arc::new(MethodAccessor::new(
            "vector.take",
            VarType::double(),
            vec![],
            |object, _args| {
                object
                    .as_list()?
                    .borrow_mut()
                    .pop()
                    .ok_or_else(|| ManualError::invalid_payload("empty vector"))
            },
            "$0.back()",
        ));
        let mut ctx: FoldContext = EvalContext::default();
        ctx.declare(
            "values",
            StaticVariable::new(
                VarType::vector_of(VarType::double()),
                Some(Value::list(vec![Value::Double(1.0)])),
            ),
        );
        let expr = MethodExpr::new(accessor, Box::new(VarExpr::new("values")), vec![]);
        assert_eq!(expr.constant_value(&ctx).unwrap(), Some(Value::Double(1.0)));
        let known = ctx.get("values").unwrap().known_value().unwrap();
        assert_eq!(known.as_list().unwrap().borrow().len(), 1);
    }
}
