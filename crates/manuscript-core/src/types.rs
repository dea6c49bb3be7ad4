//! The variable type model.
//!
//! A [`VarType`] is a registered tag plus generic arguments and an optional
//! fixed array length. The numeric tags form a total widening order
//! (`byte < short < int < long < float < double`) used by [`VarType::join`]
//! for operator result types and implicit promotion.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value as Json, json};

use crate::error::{ManualError, Result};

// ============================================================================
// Type entries
// ============================================================================

/// A registered type tag.
///
/// Entries are shared behind [`TypeRef`]; plugins register additional entries
/// at startup without touching this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    /// Registry id, unique within the var-type register.
    pub id: String,
    /// Spelling of the type in emitted C++ source.
    pub cpp_name: String,
    /// Position in the numeric widening order, if this tag is numeric.
    pub numeric_rank: Option<u8>,
}

impl TypeEntry {
    pub fn new(id: impl Into<String>, cpp_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cpp_name: cpp_name.into(),
            numeric_rank: None,
        }
    }

    pub fn numeric(id: impl Into<String>, cpp_name: impl Into<String>, rank: u8) -> Self {
        Self {
            id: id.into(),
            cpp_name: cpp_name.into(),
            numeric_rank: Some(rank),
        }
    }
}

/// Shared handle to a registered type entry.
pub type TypeRef = Arc<TypeEntry>;

/// The builtin type entries, pre-registered by the instruction set.
pub mod primitives {
    use std::sync::LazyLock;

    use super::{TypeEntry, TypeRef};

    macro_rules! entries {
        ($($name:ident = $make:expr;)*) => {
            $(pub static $name: LazyLock<TypeRef> =
                LazyLock::new(|| std::sync::Arc::new($make));)*
        };
    }

    entries! {
        BOOL = TypeEntry::new("bool", "bool");
        BYTE = TypeEntry::numeric("byte", "byte", 0);
        SHORT = TypeEntry::numeric("short", "short", 1);
        INT = TypeEntry::numeric("int", "int", 2);
        LONG = TypeEntry::numeric("long", "long", 3);
        FLOAT = TypeEntry::numeric("float", "float", 4);
        DOUBLE = TypeEntry::numeric("double", "double", 5);
        STRING = TypeEntry::new("string", "std::string");
        VECTOR = TypeEntry::new("vector", "std::vector");
    }

    /// All builtin entries, in registration order.
    pub fn all() -> Vec<TypeRef> {
        vec![
            BOOL.clone(),
            BYTE.clone(),
            SHORT.clone(),
            INT.clone(),
            LONG.clone(),
            FLOAT.clone(),
            DOUBLE.clone(),
            STRING.clone(),
            VECTOR.clone(),
        ]
    }

    /// Look up the numeric entry at a widening-order rank.
    pub fn numeric_by_rank(rank: u8) -> Option<TypeRef> {
        match rank {
            0 => Some(BYTE.clone()),
            1 => Some(SHORT.clone()),
            2 => Some(INT.clone()),
            3 => Some(LONG.clone()),
            4 => Some(FLOAT.clone()),
            5 => Some(DOUBLE.clone()),
            _ => None,
        }
    }
}

// ============================================================================
// VarType
// ============================================================================

/// A concrete variable type: entry + generics + optional array length.
#[derive(Debug, Clone)]
pub struct VarType {
    pub entry: TypeRef,
    pub generics: Vec<VarType>,
    pub array_length: Option<u32>,
}

impl VarType {
    pub fn simple(entry: &TypeRef) -> Self {
        Self {
            entry: entry.clone(),
            generics: Vec::new(),
            array_length: None,
        }
    }

    pub fn generic(entry: &TypeRef, generics: Vec<VarType>) -> Self {
        Self {
            entry: entry.clone(),
            generics,
            array_length: None,
        }
    }

    pub fn array(entry: &TypeRef, length: u32) -> Self {
        Self {
            entry: entry.clone(),
            generics: Vec::new(),
            array_length: Some(length),
        }
    }

    pub fn boolean() -> Self {
        Self::simple(&primitives::BOOL)
    }

    pub fn int() -> Self {
        Self::simple(&primitives::INT)
    }

    pub fn double() -> Self {
        Self::simple(&primitives::DOUBLE)
    }

    pub fn string() -> Self {
        Self::simple(&primitives::STRING)
    }

    /// The 2D vector type: a fixed `double[2]`.
    pub fn vec2() -> Self {
        Self::array(&primitives::DOUBLE, 2)
    }

    /// `std::vector<element>`.
    pub fn vector_of(element: VarType) -> Self {
        Self::generic(&primitives::VECTOR, vec![element])
    }

    // ==========================================================================
    // Compatibility
    // ==========================================================================

    /// Exact structural equality: same tag, same generics, same array length.
    pub fn is(&self, other: &VarType) -> bool {
        self.entry.id == other.entry.id
            && self.array_length == other.array_length
            && self.generics.len() == other.generics.len()
            && self
                .generics
                .iter()
                .zip(&other.generics)
                .all(|(a, b)| a.is(b))
    }

    /// Numeric tags without an array length take part in promotion.
    pub fn is_numeric(&self) -> bool {
        self.entry.numeric_rank.is_some() && self.array_length.is_none()
    }

    /// Looser relation used for assignment and declaration checks:
    /// exact match, or both numeric.
    pub fn is_compatible(&self, other: &VarType) -> bool {
        self.is(other) || (self.is_numeric() && other.is_numeric())
    }

    /// Join two types: identity, numeric widening, or failure.
    pub fn join(&self, other: &VarType) -> Result<VarType> {
        if self.is(other) {
            return Ok(self.clone());
        }
        if self.is_numeric() && other.is_numeric() {
            return Ok(self.join_numeric(other));
        }
        Err(ManualError::IncompatibleTypes {
            expected: self.entry.id.clone(),
            found: other.entry.id.clone(),
        })
    }

    /// The wider of two numeric types. Callers must check `is_numeric` first.
    pub fn join_numeric(&self, other: &VarType) -> VarType {
        let a = self.entry.numeric_rank.unwrap_or(0);
        let b = other.entry.numeric_rank.unwrap_or(0);
        if a >= b { self.clone() } else { other.clone() }
    }

    // ==========================================================================
    // Rendering and serialization
    // ==========================================================================

    /// Render the type in C++ syntax: `Tag<G1, G2>` plus `[N]` for arrays.
    pub fn cpp(&self) -> String {
        let mut out = self.entry.cpp_name.clone();
        if !self.generics.is_empty() {
            let generics: Vec<String> = self.generics.iter().map(VarType::cpp).collect();
            out = format!("{}<{}>", out, generics.join(", "));
        }
        if let Some(length) = self.array_length {
            out.push_str(&format!("[{length}]"));
        }
        out
    }

    /// Wire form: `{ type, generics, arrayLength }` with `-1` for no array.
    pub fn to_json(&self) -> Json {
        json!({
            "type": self.entry.id,
            "generics": self.generics.iter().map(VarType::to_json).collect::<Vec<_>>(),
            "arrayLength": self.array_length.map(|l| l as i64).unwrap_or(-1),
        })
    }

    /// Decode the wire form, resolving tags through the var-type register.
    pub fn from_json(json: &Json, resolve: &dyn Fn(&str) -> Result<TypeRef>) -> Result<VarType> {
        let obj = json
            .as_object()
            .ok_or_else(|| ManualError::invalid_payload("var type must be an object"))?;
        let id = obj
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| ManualError::invalid_payload("var type is missing 'type'"))?;
        let entry = resolve(id)?;
        let generics = match obj.get("generics") {
            Some(Json::Array(items)) => items
                .iter()
                .map(|item| VarType::from_json(item, resolve))
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };
        let array_length = match obj.get("arrayLength").and_then(Json::as_i64) {
            Some(-1) | None => None,
            Some(length) if length >= 0 => Some(length as u32),
            Some(length) => {
                return Err(ManualError::invalid_payload(format!(
                    "invalid array length {length}"
                )));
            }
        };
        Ok(VarType {
            entry,
            generics,
            array_length,
        })
    }
}

impl PartialEq for VarType {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entry.id)?;
        if !self.generics.is_empty() {
            let generics: Vec<String> = self.generics.iter().map(|g| g.to_string()).collect();
            write!(f, "<{}>", generics.join(", "))?;
        }
        if let Some(length) = self.array_length {
            write!(f, "[{length}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_widens_numeric_types() {
        let int = VarType::int();
        let double = VarType::double();
        assert_eq!(int.join(&double).unwrap(), double);
        assert_eq!(double.join(&int).unwrap(), double);

        let byte = VarType::simple(&primitives::BYTE);
        let short = VarType::simple(&primitives::SHORT);
        assert_eq!(byte.join(&short).unwrap(), short);
    }

    #[test]
    fn join_rejects_incompatible_types() {
        let boolean = VarType::boolean();
        let int = VarType::int();
        assert!(matches!(
            boolean.join(&int),
            Err(ManualError::IncompatibleTypes { .. })
        ));
    }

    #[test]
    fn arrays_are_not_numeric() {
        assert!(!VarType::vec2().is_numeric());
        assert!(VarType::double().is_numeric());
        assert!(!VarType::vec2().is_compatible(&VarType::double()));
    }

    #[test]
    fn compatibility_is_looser_than_identity() {
        let int = VarType::int();
        let double = VarType::double();
        assert!(!int.is(&double));
        assert!(int.is_compatible(&double));
    }

    #[test]
    fn cpp_rendering() {
        assert_eq!(VarType::int().cpp(), "int");
        assert_eq!(VarType::vec2().cpp(), "double[2]");
        assert_eq!(
            VarType::vector_of(VarType::double()).cpp(),
            "std::vector<double>"
        );
    }

    #[test]
    fn json_round_trip() {
        let ty = VarType::vector_of(VarType::vec2());
        let resolve = |id: &str| {
            primitives::all()
                .into_iter()
                .find(|entry| entry.id == id)
                .ok_or_else(|| ManualError::NotRegistered {
                    key: id.to_string(),
                    register: "var_types".to_string(),
                })
        };
        let decoded = VarType::from_json(&ty.to_json(), &resolve).unwrap();
        assert_eq!(decoded, ty);
        assert_eq!(decoded.to_json(), ty.to_json());
    }
}
