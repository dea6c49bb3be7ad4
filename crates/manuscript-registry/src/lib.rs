//! String-keyed registers: the extension surface of the manual IR.
//!
//! External collaborators register additional var types, accessors, and
//! instruction decoders at startup, before any manual referencing them is
//! deserialized. Re-registering a tag overwrites the old entry with a warning
//! rather than failing, to tolerate hot-reload of plugin content.
//!
//! [`DecodeRegister`] adds the single JSON dispatch mechanism every node uses:
//! a payload `{ "type": tag, "data": ... }` is routed to the decode function
//! registered under `tag`, which also receives the tag itself so one function
//! can serve a whole family of tags (numeric literals, operator kinds).

use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use tracing::warn;

use manuscript_core::{ManualError, Result};

// ============================================================================
// Register
// ============================================================================

/// A named map of string tags to entries.
pub struct Register<T> {
    name: &'static str,
    entries: FxHashMap<String, T>,
}

impl<T> Register<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert an entry. Collisions overwrite and warn; hot-reloaded plugin
    /// content re-registers its tags.
    pub fn register(&mut self, id: impl Into<String>, entry: T) {
        let id = id.into();
        if self.entries.insert(id.clone(), entry).is_some() {
            warn!(register = self.name, id = %id, "overwrote existing registry entry");
        }
    }

    pub fn get(&self, id: &str) -> Result<&T> {
        self.entries.get(id).ok_or_else(|| ManualError::NotRegistered {
            key: id.to_string(),
            register: self.name.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// DecodeRegister
// ============================================================================

/// Decode function: `(tag, data, context) -> node`.
///
/// `C` is whatever bundle of registers decoding needs to recurse with; plain
/// function pointers keep registration data-only, the same way native
/// callbacks are registered elsewhere in the workspace.
pub type DecodeFn<N, C> = fn(&str, &Json, &C) -> Result<N>;

/// A register of decode functions driving `{type, data}` dispatch.
pub struct DecodeRegister<N, C> {
    inner: Register<DecodeFn<N, C>>,
}

impl<N, C> DecodeRegister<N, C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Register::new(name),
        }
    }

    pub fn register(&mut self, id: impl Into<String>, decode: DecodeFn<N, C>) {
        self.inner.register(id, decode);
    }

    /// Decode a full `{type, data}` payload.
    pub fn decode(&self, json: &Json, ctx: &C) -> Result<N> {
        let (tag, data) = tagged_parts(json)?;
        let decode = self.inner.get(tag)?;
        decode(tag, data, ctx)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.inner.ids()
    }
}

/// Split a `{ "type": tag, "data": payload }` object.
pub fn tagged_parts(json: &Json) -> Result<(&str, &Json)> {
    let obj = json
        .as_object()
        .ok_or_else(|| ManualError::invalid_payload("instruction must be an object"))?;
    let tag = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| ManualError::invalid_payload("instruction is missing 'type'"))?;
    let data = obj.get("data").unwrap_or(&Json::Null);
    Ok((tag, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_of_missing_tag_fails() {
        let register: Register<u32> = Register::new("numbers");
        assert!(matches!(
            register.get("missing"),
            Err(ManualError::NotRegistered { .. })
        ));
    }

    #[test]
    fn register_overwrites_on_collision() {
        let mut register = Register::new("numbers");
        register.register("x", 1u32);
        register.register("x", 2u32);
        assert_eq!(*register.get("x").unwrap(), 2);
        assert_eq!(register.len(), 1);
    }

    #[test]
    fn decode_dispatches_by_tag() {
        fn decode_double(_tag: &str, data: &Json, _ctx: &()) -> Result<i64> {
            Ok(data.as_i64().unwrap_or(0) * 2)
        }

        let mut register: DecodeRegister<i64, ()> = DecodeRegister::new("ops");
        register.register("double", decode_double);
        let decoded = register
            .decode(&json!({ "type": "double", "data": 21 }), &())
            .unwrap();
        assert_eq!(decoded, 42);
    }

    #[test]
    fn decode_of_unknown_tag_fails() {
        let register: DecodeRegister<i64, ()> = DecodeRegister::new("ops");
        assert!(matches!(
            register.decode(&json!({ "type": "nope", "data": 1 }), &()),
            Err(ManualError::NotRegistered { .. })
        ));
    }

    #[test]
    fn malformed_payload_fails() {
        assert!(matches!(
            tagged_parts(&json!([1, 2])),
            Err(ManualError::InvalidPayload(_))
        ));
        assert!(matches!(
            tagged_parts(&json!({ "data": 1 })),
            Err(ManualError::InvalidPayload(_))
        ));
    }
}
