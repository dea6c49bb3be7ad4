//! Boolean operators and equality.

use serde_json::{Value as Json, json};

use manuscript_core::{
    ExecContext, Expression, FoldContext, ManualError, Node, Result, TypeLookup, Value, VarType,
};

use crate::math::pair;
use crate::registries::Registries;

// ============================================================================
// and / or
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn tag(self) -> &'static str {
        match self {
            LogicOp::And => "and",
            LogicOp::Or => "or",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "and" => Some(LogicOp::And),
            "or" => Some(LogicOp::Or),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LogicOp::And => "&&",
            LogicOp::Or => "||",
        }
    }

    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value> {
        let a = lhs.as_bool()?;
        let b = rhs.as_bool()?;
        Ok(Value::Bool(match self {
            LogicOp::And => a && b,
            LogicOp::Or => a || b,
        }))
    }
}

/// Binary boolean operator. Both operands are evaluated; emitted C++ keeps
/// the target language's own short-circuit behavior.
pub struct LogicExpr {
    pub op: LogicOp,
    pub lhs: Box<dyn Expression>,
    pub rhs: Box<dyn Expression>,
}

impl LogicExpr {
    pub fn new(op: LogicOp, lhs: Box<dyn Expression>, rhs: Box<dyn Expression>) -> Self {
        Self { op, lhs, rhs }
    }
}

impl Node for LogicExpr {
    fn tag(&self) -> &'static str {
        self.op.tag()
    }

    fn to_data(&self) -> Json {
        json!([self.lhs.to_json(), self.rhs.to_json()])
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.lhs.as_ref(), self.rhs.as_ref()]
    }
}

impl Expression for LogicExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::boolean())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        let lhs = self.lhs.execute(ctx)?;
        let rhs = self.rhs.execute(ctx)?;
        self.op.apply(&lhs, &rhs)
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match (self.lhs.constant_value(ctx)?, self.rhs.constant_value(ctx)?) {
            (Some(lhs), Some(rhs)) => Ok(Some(self.op.apply(&lhs, &rhs)?)),
            _ => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        if let Some(folded) = self.constant_value(ctx)? {
            return Ok(folded.to_cpp());
        }
        Ok(format!(
            "({} {} {})",
            self.lhs.write_cpp(ctx)?,
            self.op.symbol(),
            self.rhs.write_cpp(ctx)?
        ))
    }
}

// ============================================================================
// not
// ============================================================================

pub struct NotExpr {
    pub value: Box<dyn Expression>,
}

impl NotExpr {
    pub fn new(value: Box<dyn Expression>) -> Self {
        Self { value }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        Ok(Box::new(NotExpr::new(regs.decode_expression(data)?)))
    }
}

impl Node for NotExpr {
    fn tag(&self) -> &'static str {
        "not"
    }

    fn to_data(&self) -> Json {
        self.value.to_json()
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.value.as_ref()]
    }
}

impl Expression for NotExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::boolean())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        Ok(Value::Bool(!self.value.execute(ctx)?.as_bool()?))
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match self.value.constant_value(ctx)? {
            Some(value) => Ok(Some(Value::Bool(!value.as_bool()?))),
            None => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        if let Some(folded) = self.constant_value(ctx)? {
            return Ok(folded.to_cpp());
        }
        Ok(format!("!{}", self.value.write_cpp(ctx)?))
    }
}

// ============================================================================
// equals / not_equals
// ============================================================================

/// Structural equality over any value pair, boolean-typed.
pub struct EqualityExpr {
    pub negated: bool,
    pub lhs: Box<dyn Expression>,
    pub rhs: Box<dyn Expression>,
}

impl EqualityExpr {
    pub fn new(negated: bool, lhs: Box<dyn Expression>, rhs: Box<dyn Expression>) -> Self {
        Self { negated, lhs, rhs }
    }

    fn apply(&self, lhs: &Value, rhs: &Value) -> Value {
        Value::Bool((lhs == rhs) != self.negated)
    }
}

impl Node for EqualityExpr {
    fn tag(&self) -> &'static str {
        if self.negated { "not_equals" } else { "equals" }
    }

    fn to_data(&self) -> Json {
        json!([self.lhs.to_json(), self.rhs.to_json()])
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.lhs.as_ref(), self.rhs.as_ref()]
    }
}

impl Expression for EqualityExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::boolean())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        let lhs = self.lhs.execute(ctx)?;
        let rhs = self.rhs.execute(ctx)?;
        Ok(self.apply(&lhs, &rhs))
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match (self.lhs.constant_value(ctx)?, self.rhs.constant_value(ctx)?) {
            (Some(lhs), Some(rhs)) => Ok(Some(self.apply(&lhs, &rhs))),
            _ => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        if let Some(folded) = self.constant_value(ctx)? {
            return Ok(folded.to_cpp());
        }
        let symbol = if self.negated { "!=" } else { "==" };
        Ok(format!(
            "({} {} {})",
            self.lhs.write_cpp(ctx)?,
            symbol,
            self.rhs.write_cpp(ctx)?
        ))
    }
}

// ============================================================================
// Decode helpers
// ============================================================================

pub(crate) fn decode_logic(tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
    let op = LogicOp::from_tag(tag)
        .ok_or_else(|| ManualError::invalid_payload(format!("unknown logic tag '{tag}'")))?;
    let (lhs, rhs) = pair(data, regs)?;
    Ok(Box::new(LogicExpr::new(op, lhs, rhs)))
}

pub(crate) fn decode_equality(
    tag: &str,
    data: &Json,
    regs: &Registries,
) -> Result<Box<dyn Expression>> {
    let (lhs, rhs) = pair(data, regs)?;
    Ok(Box::new(EqualityExpr::new(tag == "not_equals", lhs, rhs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::{BoolExpr, NumberExpr};
    use manuscript_core::EvalContext;

    fn boolean(value: bool) -> Box<dyn Expression> {
        Box::new(BoolExpr::new(value))
    }

    #[test]
    fn and_or_not() {
        let mut ctx = EvalContext::default();
        let and = LogicExpr::new(LogicOp::And, boolean(true), boolean(false));
        assert_eq!(and.execute(&mut ctx).unwrap(), Value::Bool(false));
        let or = LogicExpr::new(LogicOp::Or, boolean(true), boolean(false));
        assert_eq!(or.execute(&mut ctx).unwrap(), Value::Bool(true));
        let not = NotExpr::new(boolean(false));
        assert_eq!(not.execute(&mut ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn equality_crosses_numeric_widths() {
        let mut ctx = EvalContext::default();
        let eq = EqualityExpr::new(
            false,
            Box::new(NumberExpr::int(2)),
            Box::new(NumberExpr::double(2.0)),
        );
        assert_eq!(eq.execute(&mut ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn folded_logic_renders_literal() {
        let ctx = EvalContext::default();
        let and = LogicExpr::new(LogicOp::And, boolean(true), boolean(true));
        assert_eq!(and.write_cpp(&ctx).unwrap(), "true");
    }

    #[test]
    fn logic_on_non_bool_fails() {
        let mut ctx = EvalContext::default();
        let and = LogicExpr::new(LogicOp::And, boolean(true), Box::new(NumberExpr::int(1)));
        assert!(matches!(
            and.execute(&mut ctx),
            Err(ManualError::WrongValueKind { .. })
        ));
    }
}
