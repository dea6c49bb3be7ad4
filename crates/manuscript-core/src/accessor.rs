//! Accessor descriptors.
//!
//! An accessor binds a string id to a live function plus a C++ template with
//! positional `$n` placeholders (`$0` = receiver, `$1..` = arguments). Both
//! execution and compilation dispatch through the same descriptor, so the two
//! modes cannot drift apart. Builtin descriptors live in the instruction set;
//! plugins register more through the accessor registers.

use crate::error::Result;
use crate::types::VarType;
use crate::value::Value;

/// Substitute `$0..$n` placeholders in a template.
///
/// Replacement runs from the highest index down so `$1` never clobbers `$10`.
fn substitute(template: &str, parts: &[&str]) -> String {
    let mut out = template.to_string();
    for (index, part) in parts.iter().enumerate().rev() {
        out = out.replace(&format!("${index}"), part);
    }
    out
}

// ============================================================================
// Descriptors
// ============================================================================

/// Reads a field from a structured value.
pub struct GetAccessor {
    pub id: String,
    pub value_type: VarType,
    pub get: fn(&Value) -> Result<Value>,
    pub cpp_template: String,
    pub includes: Vec<String>,
}

impl GetAccessor {
    pub fn new(
        id: impl Into<String>,
        value_type: VarType,
        get: fn(&Value) -> Result<Value>,
        cpp_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            value_type,
            get,
            cpp_template: cpp_template.into(),
            includes: Vec::new(),
        }
    }

    pub fn write_cpp(&self, object: &str) -> String {
        substitute(&self.cpp_template, &[object])
    }
}

/// Mutates a field on a structured value. The template may span lines.
pub struct SetAccessor {
    pub id: String,
    pub value_type: VarType,
    pub set: fn(&Value, Value) -> Result<()>,
    pub cpp_template: Vec<String>,
    pub includes: Vec<String>,
}

impl SetAccessor {
    pub fn new(
        id: impl Into<String>,
        value_type: VarType,
        set: fn(&Value, Value) -> Result<()>,
        cpp_template: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            value_type,
            set,
            cpp_template,
            includes: Vec::new(),
        }
    }

    pub fn write_cpp(&self, object: &str, value: &str) -> Vec<String> {
        self.cpp_template
            .iter()
            .map(|line| substitute(line, &[object, value]))
            .collect()
    }
}

/// Invokes a method on a structured value.
pub struct MethodAccessor {
    pub id: String,
    pub return_type: VarType,
    pub arg_types: Vec<VarType>,
    pub call: fn(&Value, &[Value]) -> Result<Value>,
    pub cpp_template: String,
    pub includes: Vec<String>,
    /// A pure method only reads its receiver and arguments. Impure methods
    /// never constant-fold and compile with their receiver as an lvalue.
    pub pure: bool,
}

impl MethodAccessor {
    pub fn new(
        id: impl Into<String>,
        return_type: VarType,
        arg_types: Vec<VarType>,
        call: fn(&Value, &[Value]) -> Result<Value>,
        cpp_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            return_type,
            arg_types,
            call,
            cpp_template: cpp_template.into(),
            includes: Vec::new(),
            pure: true,
        }
    }

    pub fn with_includes(mut self, includes: Vec<String>) -> Self {
        self.includes = includes;
        self
    }

    /// Mark the method as mutating its receiver.
    pub fn mutating(mut self) -> Self {
        self.pure = false;
        self
    }

    pub fn write_cpp(&self, object: &str, args: &[String]) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(args.len() + 1);
        parts.push(object);
        parts.extend(args.iter().map(String::as_str));
        substitute(&self.cpp_template, &parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Vec2;

    #[test]
    fn substitution_is_positional() {
        assert_eq!(substitute("$0.add($1, $2)", &["a", "b", "c"]), "a.add(b, c)");
    }

    #[test]
    fn high_indices_do_not_collide() {
        let parts: Vec<String> = (0..11).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        assert_eq!(substitute("$10 $1", &refs), "p10 p1");
    }

    #[test]
    fn getter_descriptor_round_trip() {
        let accessor = GetAccessor::new(
            "vec2.x",
            VarType::double(),
            |object| Ok(Value::Double(object.as_vec2()?.borrow().x)),
            "$0[0]",
        );
        let value = Value::vec2(Vec2::new(3.0, 4.0));
        assert_eq!((accessor.get)(&value).unwrap(), Value::Double(3.0));
        assert_eq!(accessor.write_cpp("pos"), "pos[0]");
    }
}
