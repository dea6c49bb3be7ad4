//! Arithmetic and comparison expressions.
//!
//! Binary operators share one folding pattern: if both operands fold, apply
//! the operator and render the result as a literal; otherwise render the
//! textual operator expression over the operand renderings. Arithmetic types
//! come from numeric `join`; comparisons always yield bool.

use serde_json::{Value as Json, json};

use manuscript_core::{
    ExecContext, Expression, FoldContext, ManualError, Node, Result, TypeLookup, Value, VarType,
};

use crate::registries::Registries;

// ============================================================================
// Arithmetic
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn tag(self) -> &'static str {
        match self {
            ArithOp::Add => "addition",
            ArithOp::Sub => "subtraction",
            ArithOp::Mul => "multiplication",
            ArithOp::Div => "division",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "addition" => Some(ArithOp::Add),
            "subtraction" => Some(ArithOp::Sub),
            "multiplication" => Some(ArithOp::Mul),
            "division" => Some(ArithOp::Div),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }

    /// Apply the operator at the joined rank of the two values.
    ///
    /// Integer-ranked results run in `i64` and truncate to the result width;
    /// float-ranked results run in `f64`.
    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value> {
        let left_rank = lhs
            .numeric_rank()
            .ok_or_else(|| ManualError::wrong_kind("numeric", lhs.kind()))?;
        let right_rank = rhs
            .numeric_rank()
            .ok_or_else(|| ManualError::wrong_kind("numeric", rhs.kind()))?;
        let rank = left_rank.max(right_rank);
        if rank <= 3 {
            let a = lhs.as_i64()?;
            let b = rhs.as_i64()?;
            let out = match self {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Sub => a.wrapping_sub(b),
                ArithOp::Mul => a.wrapping_mul(b),
                ArithOp::Div => {
                    if b == 0 {
                        return Err(ManualError::DivisionByZero);
                    }
                    a.wrapping_div(b)
                }
            };
            Ok(Value::integer_of_rank(rank, out))
        } else {
            let a = lhs.as_f64()?;
            let b = rhs.as_f64()?;
            let out = match self {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
            };
            Ok(Value::float_of_rank(rank, out))
        }
    }
}

/// A binary arithmetic expression.
pub struct BinaryExpr {
    pub op: ArithOp,
    pub lhs: Box<dyn Expression>,
    pub rhs: Box<dyn Expression>,
}

impl BinaryExpr {
    pub fn new(op: ArithOp, lhs: Box<dyn Expression>, rhs: Box<dyn Expression>) -> Self {
        Self { op, lhs, rhs }
    }

    pub fn add(lhs: Box<dyn Expression>, rhs: Box<dyn Expression>) -> Self {
        Self::new(ArithOp::Add, lhs, rhs)
    }
}

impl Node for BinaryExpr {
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

impl Expression for BinaryExpr {
    fn output_type(&self, types: &dyn TypeLookup) -> Result<VarType> {
        let joined = self
            .lhs
            .output_type(types)?
            .join(&self.rhs.output_type(types)?)?;
        if !joined.is_numeric() {
            return Err(ManualError::wrong_kind("numeric", joined.entry.id.clone()));
        }
        Ok(joined)
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
// Comparisons
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    pub fn tag(self) -> &'static str {
        match self {
            CompareOp::Less => "less",
            CompareOp::LessEqual => "less_equal",
            CompareOp::Greater => "greater",
            CompareOp::GreaterEqual => "greater_equal",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "less" => Some(CompareOp::Less),
            "less_equal" => Some(CompareOp::LessEqual),
            "greater" => Some(CompareOp::Greater),
            "greater_equal" => Some(CompareOp::GreaterEqual),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
        }
    }

    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value> {
        // Integer-only comparisons stay in i64; f64 loses precision for
        // long values past 2^53.
        let integral = matches!(
            (lhs.numeric_rank(), rhs.numeric_rank()),
            (Some(a), Some(b)) if a <= 3 && b <= 3
        );
        let out = if integral {
            self.compare(lhs.as_i64()?, rhs.as_i64()?)
        } else {
            self.compare(lhs.as_f64()?, rhs.as_f64()?)
        };
        Ok(Value::Bool(out))
    }

    fn compare<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            CompareOp::Less => a < b,
            CompareOp::LessEqual => a <= b,
            CompareOp::Greater => a > b,
            CompareOp::GreaterEqual => a >= b,
        }
    }
}

/// A numeric comparison, always boolean-typed.
pub struct CompareExpr {
    pub op: CompareOp,
    pub lhs: Box<dyn Expression>,
    pub rhs: Box<dyn Expression>,
}

impl CompareExpr {
    pub fn new(op: CompareOp, lhs: Box<dyn Expression>, rhs: Box<dyn Expression>) -> Self {
        Self { op, lhs, rhs }
    }

    pub fn less(lhs: Box<dyn Expression>, rhs: Box<dyn Expression>) -> Self {
        Self::new(CompareOp::Less, lhs, rhs)
    }
}

impl Node for CompareExpr {
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

impl Expression for CompareExpr {
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
// pow / sqrt
// ============================================================================

/// `std::pow`, always double-typed, contributing `<cmath>`.
pub struct PowExpr {
    pub base: Box<dyn Expression>,
    pub exponent: Box<dyn Expression>,
}

impl PowExpr {
    pub fn new(base: Box<dyn Expression>, exponent: Box<dyn Expression>) -> Self {
        Self { base, exponent }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        let (lhs, rhs) = pair(data, regs)?;
        Ok(Box::new(PowExpr::new(lhs, rhs)))
    }
}

impl Node for PowExpr {
    fn tag(&self) -> &'static str {
        "pow"
    }

    fn to_data(&self) -> Json {
        json!([self.base.to_json(), self.exponent.to_json()])
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.base.as_ref(), self.exponent.as_ref()]
    }

    fn self_includes(&self) -> Vec<String> {
        vec!["<cmath>".to_string()]
    }
}

impl Expression for PowExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::double())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        let base = self.base.execute(ctx)?.as_f64()?;
        let exponent = self.exponent.execute(ctx)?.as_f64()?;
        Ok(Value::Double(base.powf(exponent)))
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match (
            self.base.constant_value(ctx)?,
            self.exponent.constant_value(ctx)?,
        ) {
            (Some(base), Some(exponent)) => Ok(Some(Value::Double(
                base.as_f64()?.powf(exponent.as_f64()?),
            ))),
            _ => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        if let Some(folded) = self.constant_value(ctx)? {
            return Ok(folded.to_cpp());
        }
        Ok(format!(
            "std::pow({}, {})",
            self.base.write_cpp(ctx)?,
            self.exponent.write_cpp(ctx)?
        ))
    }
}

/// `std::sqrt`, always double-typed, contributing `<cmath>`.
pub struct SqrtExpr {
    pub value: Box<dyn Expression>,
}

impl SqrtExpr {
    pub fn new(value: Box<dyn Expression>) -> Self {
        Self { value }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        Ok(Box::new(SqrtExpr::new(regs.decode_expression(data)?)))
    }
}

impl Node for SqrtExpr {
    fn tag(&self) -> &'static str {
        "sqrt"
    }

    fn to_data(&self) -> Json {
        self.value.to_json()
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.value.as_ref()]
    }

    fn self_includes(&self) -> Vec<String> {
        vec!["<cmath>".to_string()]
    }
}

impl Expression for SqrtExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::double())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        Ok(Value::Double(self.value.execute(ctx)?.as_f64()?.sqrt()))
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match self.value.constant_value(ctx)? {
            Some(value) => Ok(Some(Value::Double(value.as_f64()?.sqrt()))),
            None => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        if let Some(folded) = self.constant_value(ctx)? {
            return Ok(folded.to_cpp());
        }
        Ok(format!("std::sqrt({})", self.value.write_cpp(ctx)?))
    }
}

// ============================================================================
// Decode helpers
// ============================================================================

/// Decode a two-element operand array.
pub(crate) fn pair(
    data: &Json,
    regs: &Registries,
) -> Result<(Box<dyn Expression>, Box<dyn Expression>)> {
    let items = data
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| ManualError::invalid_payload("operator data must be a pair"))?;
    Ok((
        regs.decode_expression(&items[0])?,
        regs.decode_expression(&items[1])?,
    ))
}

pub(crate) fn decode_arith(tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
    let op = ArithOp::from_tag(tag)
        .ok_or_else(|| ManualError::invalid_payload(format!("unknown arithmetic tag '{tag}'")))?;
    let (lhs, rhs) = pair(data, regs)?;
    Ok(Box::new(BinaryExpr::new(op, lhs, rhs)))
}

pub(crate) fn decode_compare(
    tag: &str,
    data: &Json,
    regs: &Registries,
) -> Result<Box<dyn Expression>> {
    let op = CompareOp::from_tag(tag)
        .ok_or_else(|| ManualError::invalid_payload(format!("unknown comparison tag '{tag}'")))?;
    let (lhs, rhs) = pair(data, regs)?;
    Ok(Box::new(CompareExpr::new(op, lhs, rhs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::NumberExpr;
    use manuscript_core::EvalContext;

    fn int(value: i32) -> Box<dyn Expression> {
        Box::new(NumberExpr::int(value))
    }

    #[test]
    fn addition_folds_and_renders_literal() {
        let ctx = EvalContext::default();
        let sum = BinaryExpr::add(int(2), int(3));
        assert_eq!(sum.constant_value(&ctx).unwrap(), Some(Value::Int(5)));
        assert_eq!(sum.write_cpp(&ctx).unwrap(), "5");
    }

    #[test]
    fn mixed_width_arithmetic_widens() {
        let mut ctx = EvalContext::default();
        let sum = BinaryExpr::add(int(1), Box::new(NumberExpr::double(0.5)));
        assert_eq!(sum.execute(&mut ctx).unwrap(), Value::Double(1.5));
        assert_eq!(sum.output_type(&ctx).unwrap(), VarType::double());
    }

    #[test]
    fn integer_division_by_zero_fails() {
        let mut ctx = EvalContext::default();
        let div = BinaryExpr::new(ArithOp::Div, int(1), int(0));
        assert_eq!(div.execute(&mut ctx), Err(ManualError::DivisionByZero));
    }

    #[test]
    fn comparison_is_boolean() {
        let mut ctx = EvalContext::default();
        let less = CompareExpr::less(int(1), int(2));
        assert_eq!(less.execute(&mut ctx).unwrap(), Value::Bool(true));
        assert_eq!(less.output_type(&ctx).unwrap(), VarType::boolean());
    }

    #[test]
    fn long_comparisons_keep_full_precision() {
        // Adjacent values near i64::MAX collapse to the same f64.
        let big = i64::MAX;
        assert_eq!(
            CompareOp::Less
                .apply(&Value::Long(big - 1), &Value::Long(big))
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            CompareOp::GreaterEqual
                .apply(&Value::Long(big - 1), &Value::Long(big))
                .unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn pow_and_sqrt_carry_cmath() {
        let pow = PowExpr::new(int(2), int(8));
        assert!(pow.includes().contains("<cmath>"));
        let sqrt = SqrtExpr::new(int(9));
        assert!(sqrt.includes().contains("<cmath>"));
    }

    #[test]
    fn unfolded_operands_render_textually() {
        let mut ctx = EvalContext::default();
        ctx.declare(
            "x",
            manuscript_core::StaticVariable::new(VarType::int(), None),
        );
        let sum = BinaryExpr::add(Box::new(crate::variables::VarExpr::new("x")), int(3));
        assert_eq!(sum.constant_value(&ctx).unwrap(), None);
        assert_eq!(sum.write_cpp(&ctx).unwrap(), "(x + 3)");
    }
}
