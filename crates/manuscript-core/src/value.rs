//! Runtime and fold-time values.
//!
//! One [`Value`] enum backs both execution and constant folding, so the two
//! modes cannot disagree about what a literal means. Structured values are
//! shared (`Rc<RefCell<_>>`): cloning a `Value` preserves object identity,
//! which is what lets a set-field or method accessor mutate the same vector a
//! variable binding refers to.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};

use crate::error::{ManualError, Result};
use crate::types::{VarType, primitives};

// ============================================================================
// Vec2
// ============================================================================

/// A 2D vector, emitted as `double[2]` in compiled source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(&self, factor: f64) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn distance(&self, other: &Vec2) -> f64 {
        self.subtract(other).length()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

// ============================================================================
// Value
// ============================================================================

/// A concrete value flowing through execution or folding.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Vec2(Rc<RefCell<Vec2>>),
    List(Rc<RefCell<Vec<Value>>>),
}

impl Value {
    pub fn vec2(value: Vec2) -> Self {
        Value::Vec2(Rc::new(RefCell::new(value)))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Clone without sharing: structured values get fresh backing storage.
    ///
    /// Fold passes hand accessor callbacks detached copies, so a callback
    /// can never write through to a binding's recorded constant.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Vec2(v) => Value::vec2(*v.borrow()),
            Value::List(items) => {
                Value::list(items.borrow().iter().map(Value::deep_clone).collect())
            }
            other => other.clone(),
        }
    }

    /// Short name of the value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Vec2(_) => "vec2",
            Value::List(_) => "vector",
        }
    }

    // ==========================================================================
    // Numeric helpers
    // ==========================================================================

    /// Rank in the numeric widening order, if this value is numeric.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            Value::Byte(_) => Some(0),
            Value::Short(_) => Some(1),
            Value::Int(_) => Some(2),
            Value::Long(_) => Some(3),
            Value::Float(_) => Some(4),
            Value::Double(_) => Some(5),
            _ => None,
        }
    }

    /// The `VarType` of a numeric value.
    pub fn numeric_type(&self) -> Option<VarType> {
        let rank = self.numeric_rank()?;
        primitives::numeric_by_rank(rank).map(|entry| VarType::simple(&entry))
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Byte(v) => Ok(f64::from(*v)),
            Value::Short(v) => Ok(f64::from(*v)),
            Value::Int(v) => Ok(f64::from(*v)),
            Value::Long(v) => Ok(*v as f64),
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Double(v) => Ok(*v),
            other => Err(ManualError::wrong_kind("numeric", other.kind())),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Byte(v) => Ok(i64::from(*v)),
            Value::Short(v) => Ok(i64::from(*v)),
            Value::Int(v) => Ok(i64::from(*v)),
            Value::Long(v) => Ok(*v),
            Value::Float(v) => Ok(*v as i64),
            Value::Double(v) => Ok(*v as i64),
            other => Err(ManualError::wrong_kind("numeric", other.kind())),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(ManualError::wrong_kind("bool", other.kind())),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(v) => Ok(v),
            other => Err(ManualError::wrong_kind("string", other.kind())),
        }
    }

    pub fn as_vec2(&self) -> Result<&Rc<RefCell<Vec2>>> {
        match self {
            Value::Vec2(v) => Ok(v),
            other => Err(ManualError::wrong_kind("vec2", other.kind())),
        }
    }

    pub fn as_list(&self) -> Result<&Rc<RefCell<Vec<Value>>>> {
        match self {
            Value::List(v) => Ok(v),
            other => Err(ManualError::wrong_kind("vector", other.kind())),
        }
    }

    /// Build an integer-ranked value, truncating to the rank's width.
    pub fn integer_of_rank(rank: u8, value: i64) -> Value {
        match rank {
            0 => Value::Byte(value as i8),
            1 => Value::Short(value as i16),
            2 => Value::Int(value as i32),
            _ => Value::Long(value),
        }
    }

    /// Build a float-ranked value.
    pub fn float_of_rank(rank: u8, value: f64) -> Value {
        if rank <= 4 {
            Value::Float(value as f32)
        } else {
            Value::Double(value)
        }
    }

    /// Build a numeric value at an arbitrary rank from an `f64`.
    pub fn numeric_of_rank(rank: u8, value: f64) -> Value {
        if rank <= 3 {
            Value::integer_of_rank(rank, value as i64)
        } else {
            Value::float_of_rank(rank, value)
        }
    }

    // ==========================================================================
    // Rendering and serialization
    // ==========================================================================

    /// Render the value as a C++ literal.
    pub fn to_cpp(&self) -> String {
        match self {
            Value::Bool(v) => v.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Str(v) => format!("{v:?}"),
            Value::Vec2(v) => {
                let v = v.borrow();
                format!("{{{}, {}}}", v.x, v.y)
            }
            Value::List(items) => {
                let items: Vec<String> = items.borrow().iter().map(Value::to_cpp).collect();
                format!("{{{}}}", items.join(", "))
            }
        }
    }

    /// Encode the bare value as authoring JSON.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Bool(v) => json!(v),
            Value::Byte(v) => json!(v),
            Value::Short(v) => json!(v),
            Value::Int(v) => json!(v),
            Value::Long(v) => json!(v),
            Value::Float(v) => json!(v),
            Value::Double(v) => json!(v),
            Value::Str(v) => json!(v),
            Value::Vec2(v) => {
                let v = v.borrow();
                json!({ "x": v.x, "y": v.y })
            }
            Value::List(items) => {
                Json::Array(items.borrow().iter().map(Value::to_json).collect())
            }
        }
    }

    /// Decode a bare JSON value against a declared type.
    ///
    /// Used for literal payloads whose element shape is implied by the
    /// surrounding type (list elements, vec2 components).
    pub fn from_json_typed(json: &Json, ty: &VarType) -> Result<Value> {
        if ty.is(&VarType::vec2()) {
            let vec2: Vec2 = serde_json::from_value(json.clone())
                .map_err(|err| ManualError::invalid_payload(err.to_string()))?;
            return Ok(Value::vec2(vec2));
        }
        if ty.entry.id == primitives::VECTOR.id {
            let element = ty
                .generics
                .first()
                .ok_or_else(|| ManualError::invalid_payload("vector type without element"))?;
            let items = json
                .as_array()
                .ok_or_else(|| ManualError::invalid_payload("vector literal must be an array"))?
                .iter()
                .map(|item| Value::from_json_typed(item, element))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Value::list(items));
        }
        if ty.entry.id == primitives::BOOL.id {
            let v = json
                .as_bool()
                .ok_or_else(|| ManualError::invalid_payload("expected a boolean"))?;
            return Ok(Value::Bool(v));
        }
        if ty.entry.id == primitives::STRING.id {
            let v = json
                .as_str()
                .ok_or_else(|| ManualError::invalid_payload("expected a string"))?;
            return Ok(Value::Str(v.to_string()));
        }
        if let Some(rank) = ty.entry.numeric_rank {
            let v = json
                .as_f64()
                .ok_or_else(|| ManualError::invalid_payload("expected a number"))?;
            return Ok(Value::numeric_of_rank(rank, v));
        }
        Err(ManualError::invalid_payload(format!(
            "no literal form for type '{}'",
            ty.entry.id
        )))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.numeric_rank().is_some() && other.numeric_rank().is_some() {
            // Numeric equality ignores width, matching promotion semantics.
            return self.as_f64().ok() == other.as_f64().ok();
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Vec2(a), Value::Vec2(b)) => *a.borrow() == *b.borrow(),
            (Value::List(a), Value::List(b)) => *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}
