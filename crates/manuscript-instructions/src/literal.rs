//! Literal expressions.
//!
//! Literals are trivially constant: their output type is fixed by kind and
//! folding always succeeds. Numeric literals share one node registered under
//! the six numeric tags; the tag picks the width.

use serde_json::{Value as Json, json};

use manuscript_core::{
    ExecContext, Expression, FoldContext, ManualError, Node, Result, TypeLookup, Value, VarType,
    Vec2,
};

use crate::registries::Registries;

// ============================================================================
// Boolean
// ============================================================================

pub struct BoolExpr {
    pub value: bool,
}

impl BoolExpr {
    pub fn new(value: bool) -> Self {
        Self { value }
    }

    pub fn decode(_tag: &str, data: &Json, _regs: &Registries) -> Result<Box<dyn Expression>> {
        let value = data
            .as_bool()
            .ok_or_else(|| ManualError::invalid_payload("boolean literal must be a bool"))?;
        Ok(Box::new(BoolExpr::new(value)))
    }
}

impl Node for BoolExpr {
    fn tag(&self) -> &'static str {
        "boolean"
    }

    fn to_data(&self) -> Json {
        json!(self.value)
    }
}

impl Expression for BoolExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::boolean())
    }

    fn execute(&self, _ctx: &mut ExecContext) -> Result<Value> {
        Ok(Value::Bool(self.value))
    }

    fn constant_value(&self, _ctx: &FoldContext) -> Result<Option<Value>> {
        Ok(Some(Value::Bool(self.value)))
    }

    fn write_cpp(&self, _ctx: &FoldContext) -> Result<String> {
        Ok(self.value.to_string())
    }
}

// ============================================================================
// Numbers
// ============================================================================

/// A numeric literal of any width. The wire tag is the width's type id.
pub struct NumberExpr {
    value: Value,
}

impl NumberExpr {
    pub fn byte(value: i8) -> Self {
        Self { value: Value::Byte(value) }
    }

    pub fn short(value: i16) -> Self {
        Self { value: Value::Short(value) }
    }

    pub fn int(value: i32) -> Self {
        Self { value: Value::Int(value) }
    }

    pub fn long(value: i64) -> Self {
        Self { value: Value::Long(value) }
    }

    pub fn float(value: f32) -> Self {
        Self { value: Value::Float(value) }
    }

    pub fn double(value: f64) -> Self {
        Self { value: Value::Double(value) }
    }

    pub fn decode(tag: &str, data: &Json, _regs: &Registries) -> Result<Box<dyn Expression>> {
        let raw = data
            .as_f64()
            .ok_or_else(|| ManualError::invalid_payload("numeric literal must be a number"))?;
        let rank = match tag {
            "byte" => 0,
            "short" => 1,
            "int" => 2,
            "long" => 3,
            "float" => 4,
            "double" => 5,
            other => {
                return Err(ManualError::invalid_payload(format!(
                    "unknown numeric tag '{other}'"
                )));
            }
        };
        Ok(Box::new(NumberExpr {
            value: Value::numeric_of_rank(rank, raw),
        }))
    }
}

impl Node for NumberExpr {
    fn tag(&self) -> &'static str {
        match self.value {
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            _ => "double",
        }
    }

    fn to_data(&self) -> Json {
        self.value.to_json()
    }
}

impl Expression for NumberExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        self.value
            .numeric_type()
            .ok_or_else(|| ManualError::wrong_kind("numeric", self.value.kind()))
    }

    fn execute(&self, _ctx: &mut ExecContext) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn constant_value(&self, _ctx: &FoldContext) -> Result<Option<Value>> {
        Ok(Some(self.value.clone()))
    }

    fn write_cpp(&self, _ctx: &FoldContext) -> Result<String> {
        Ok(self.value.to_cpp())
    }
}

// ============================================================================
// Strings
// ============================================================================

pub struct StringExpr {
    pub value: String,
}

impl StringExpr {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    pub fn decode(_tag: &str, data: &Json, _regs: &Registries) -> Result<Box<dyn Expression>> {
        let value = data
            .as_str()
            .ok_or_else(|| ManualError::invalid_payload("string literal must be a string"))?;
        Ok(Box::new(StringExpr::new(value)))
    }
}

impl Node for StringExpr {
    fn tag(&self) -> &'static str {
        "string"
    }

    fn to_data(&self) -> Json {
        json!(self.value)
    }

    fn self_includes(&self) -> Vec<String> {
        vec!["<string>".to_string()]
    }
}

impl Expression for StringExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::string())
    }

    fn execute(&self, _ctx: &mut ExecContext) -> Result<Value> {
        Ok(Value::Str(self.value.clone()))
    }

    fn constant_value(&self, _ctx: &FoldContext) -> Result<Option<Value>> {
        Ok(Some(Value::Str(self.value.clone())))
    }

    fn write_cpp(&self, _ctx: &FoldContext) -> Result<String> {
        Ok(format!("{:?}", self.value))
    }
}

// ============================================================================
// Vec2
// ============================================================================

/// A constant 2D vector, rendered as an aggregate initializer.
pub struct Vec2Expr {
    pub value: Vec2,
}

impl Vec2Expr {
    pub fn new(value: Vec2) -> Self {
        Self { value }
    }

    pub fn decode(_tag: &str, data: &Json, _regs: &Registries) -> Result<Box<dyn Expression>> {
        let value: Vec2 = serde_json::from_value(data.clone())
            .map_err(|err| ManualError::invalid_payload(err.to_string()))?;
        Ok(Box::new(Vec2Expr::new(value)))
    }
}

impl Node for Vec2Expr {
    fn tag(&self) -> &'static str {
        "vec2"
    }

    fn to_data(&self) -> Json {
        json!({ "x": self.value.x, "y": self.value.y })
    }
}

impl Expression for Vec2Expr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::vec2())
    }

    fn execute(&self, _ctx: &mut ExecContext) -> Result<Value> {
        Ok(Value::vec2(self.value))
    }

    fn constant_value(&self, _ctx: &FoldContext) -> Result<Option<Value>> {
        Ok(Some(Value::vec2(self.value)))
    }

    fn write_cpp(&self, _ctx: &FoldContext) -> Result<String> {
        Ok(Value::vec2(self.value).to_cpp())
    }
}

/// Builds a vec2 from two number expressions, compiling to an aggregate
/// initializer.
pub struct NewVec2Expr {
    pub x: Box<dyn Expression>,
    pub y: Box<dyn Expression>,
}

impl NewVec2Expr {
    pub fn new(x: Box<dyn Expression>, y: Box<dyn Expression>) -> Self {
        Self { x, y }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        let parts = data.as_array().filter(|parts| parts.len() == 2).ok_or_else(|| {
            ManualError::invalid_payload("new_vec2 data must be a 2-element array")
        })?;
        Ok(Box::new(NewVec2Expr::new(
            regs.decode_expression(&parts[0])?,
            regs.decode_expression(&parts[1])?,
        )))
    }
}

impl Node for NewVec2Expr {
    fn tag(&self) -> &'static str {
        "new_vec2"
    }

    fn to_data(&self) -> Json {
        json!([self.x.to_json(), self.y.to_json()])
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.x.as_ref(), self.y.as_ref()]
    }
}

impl Expression for NewVec2Expr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::vec2())
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        let x = self.x.execute(ctx)?.as_f64()?;
        let y = self.y.execute(ctx)?.as_f64()?;
        Ok(Value::vec2(Vec2::new(x, y)))
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match (self.x.constant_value(ctx)?, self.y.constant_value(ctx)?) {
            (Some(x), Some(y)) => Ok(Some(Value::vec2(Vec2::new(x.as_f64()?, y.as_f64()?)))),
            _ => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        Ok(format!(
            "{{{}, {}}}",
            self.x.write_cpp(ctx)?,
            self.y.write_cpp(ctx)?
        ))
    }
}

// ============================================================================
// Lists
// ============================================================================

/// A constant homogeneous list, typed `vector<element>`.
pub struct ListExpr {
    pub items: Vec<Value>,
    pub element: VarType,
}

impl ListExpr {
    pub fn new(items: Vec<Value>, element: VarType) -> Self {
        Self { items, element }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        let obj = data
            .as_object()
            .ok_or_else(|| ManualError::invalid_payload("list literal must be an object"))?;
        let element = regs.decode_var_type(
            obj.get("generic")
                .ok_or_else(|| ManualError::invalid_payload("list literal is missing 'generic'"))?,
        )?;
        let items = obj
            .get("list")
            .and_then(Json::as_array)
            .ok_or_else(|| ManualError::invalid_payload("list literal is missing 'list'"))?
            .iter()
            .map(|item| Value::from_json_typed(item, &element))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(ListExpr::new(items, element)))
    }
}

impl Node for ListExpr {
    fn tag(&self) -> &'static str {
        "list"
    }

    fn to_data(&self) -> Json {
        json!({
            "list": self.items.iter().map(Value::to_json).collect::<Vec<_>>(),
            "generic": self.element.to_json(),
        })
    }

    fn self_includes(&self) -> Vec<String> {
        vec!["<vector>".to_string()]
    }
}

impl Expression for ListExpr {
    fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
        Ok(VarType::vector_of(self.element.clone()))
    }

    fn execute(&self, _ctx: &mut ExecContext) -> Result<Value> {
        Ok(Value::list(self.items.clone()))
    }

    fn constant_value(&self, _ctx: &FoldContext) -> Result<Option<Value>> {
        Ok(Some(Value::list(self.items.clone())))
    }

    fn write_cpp(&self, _ctx: &FoldContext) -> Result<String> {
        Ok(Value::list(self.items.clone()).to_cpp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::EvalContext;

    #[test]
    fn literals_fold_to_themselves() {
        let ctx = EvalContext::default();
        assert_eq!(
            NumberExpr::int(7).constant_value(&ctx).unwrap(),
            Some(Value::Int(7))
        );
        assert_eq!(
            BoolExpr::new(true).constant_value(&ctx).unwrap(),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn number_tag_tracks_width() {
        assert_eq!(NumberExpr::byte(1).tag(), "byte");
        assert_eq!(NumberExpr::double(1.0).tag(), "double");
    }

    #[test]
    fn string_literal_renders_quoted() {
        let ctx = EvalContext::default();
        assert_eq!(
            StringExpr::new("a\"b").write_cpp(&ctx).unwrap(),
            "\"a\\\"b\""
        );
    }

    #[test]
    fn list_collects_vector_include() {
        let list = ListExpr::new(vec![Value::Double(1.0)], VarType::double());
        assert!(list.includes().contains("<vector>"));
    }
}
