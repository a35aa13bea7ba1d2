//! Polymorphic type resolver
//!
//! Determines which logical type id to emit for a runtime instance
//! (serialization) and which concrete class a type id maps to
//! (deserialization). The subtype table is static, assembled from the base
//! class's declared subtype records; a per-base custom resolver callback is
//! consulted when the table has no entry.

use crate::engine::context::{DeContext, SerOptions};
use crate::engine::features::Feature;
use crate::json::JsonValue;
use crate::meta::{ClassMeta, TypeInfoMode};
use crate::value::Instance;
use crate::{BindError, BindResult};
use rustc_hash::FxHashMap;

/// Bidirectional logical-name/class-name table for one base class
pub(crate) struct SubtypeTable {
    by_name: FxHashMap<String, String>,
    by_class: FxHashMap<String, String>,
}

impl SubtypeTable {
    /// Build the table from a base class's subtype records
    pub fn from_class(base: &ClassMeta) -> Self {
        let mut by_name = FxHashMap::default();
        let mut by_class = FxHashMap::default();
        for (name, class) in base.subtypes() {
            by_name.insert(name.to_string(), class.to_string());
            by_class.insert(class.to_string(), name.to_string());
        }
        Self { by_name, by_class }
    }

    fn class_for(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|s| s.as_str())
    }

    fn name_for(&self, class: &str) -> Option<&str> {
        self.by_class.get(class).map(|s| s.as_str())
    }
}

/// The logical type id to emit for an instance serialized through a base
/// class slot: subtype table, then custom resolver, then the runtime class
/// name itself
pub(crate) fn serialization_type_id(
    opts: &SerOptions,
    base: &ClassMeta,
    inst: &Instance,
) -> String {
    let table = SubtypeTable::from_class(base);
    if let Some(name) = table.name_for(&inst.class) {
        return name.to_string();
    }
    if let Some(resolver) = opts.type_id_resolvers.get(&base.name) {
        if let Some(name) = resolver(inst) {
            return name;
        }
    }
    inst.class.clone()
}

/// Resolve an incoming type id to a concrete class name. Unresolvable ids
/// are fatal under `FailOnInvalidSubtype`, else fall back to the declared
/// class.
pub(crate) fn resolve_subtype(
    ctx: &DeContext<'_>,
    base: &ClassMeta,
    id: &str,
) -> BindResult<String> {
    let table = SubtypeTable::from_class(base);
    if let Some(class) = table.class_for(id) {
        return Ok(class.to_string());
    }
    if let Some(resolver) = ctx.opts.type_name_resolvers.get(&base.name) {
        if let Some(class) = resolver(id) {
            return Ok(class);
        }
    }
    // The id may simply be a registered class name
    if ctx.store.contains(id) {
        return Ok(id.to_string());
    }
    if ctx.feature(Feature::FailOnInvalidSubtype) {
        return Err(BindError::Shape(format!(
            "Unresolvable type id '{}' for class '{}'",
            id, base.name
        )));
    }
    Ok(base.name.clone())
}

/// Split an incoming value into its type id (if present, per the inclusion
/// mode) and the payload to bind. A value that does not carry an id in the
/// expected shape yields `(None, value)`.
pub(crate) fn split_type_id(
    json: &JsonValue,
    mode: &TypeInfoMode,
) -> BindResult<(Option<String>, JsonValue)> {
    match mode {
        TypeInfoMode::Property(name) => {
            if let JsonValue::Object(entries) = json {
                if let Some(tag) = entries.get(name) {
                    let id = tag.as_str().ok_or_else(|| {
                        BindError::Shape(format!(
                            "Type id property '{}' must be a string, got {}",
                            name,
                            tag.type_name()
                        ))
                    })?;
                    let mut payload = entries.clone();
                    payload.shift_remove(name);
                    return Ok((Some(id.to_string()), JsonValue::Object(payload)));
                }
            }
            Ok((None, json.clone()))
        }
        TypeInfoMode::WrapperObject => {
            if let JsonValue::Object(entries) = json {
                if entries.len() == 1 {
                    let (id, payload) = entries.iter().next().unwrap();
                    return Ok((Some(id.clone()), payload.clone()));
                }
            }
            Ok((None, json.clone()))
        }
        TypeInfoMode::WrapperArray => {
            if let JsonValue::Array(items) = json {
                if items.len() == 2 {
                    if let Some(id) = items[0].as_str() {
                        return Ok((Some(id.to_string()), items[1].clone()));
                    }
                }
            }
            Ok((None, json.clone()))
        }
    }
}

/// Embed a type id into a serialized body per the inclusion mode
pub(crate) fn embed_type_id(body: JsonValue, id: &str, mode: &TypeInfoMode) -> JsonValue {
    match mode {
        TypeInfoMode::Property(name) => {
            if let JsonValue::Object(mut entries) = body {
                entries.insert(name.clone(), JsonValue::string(id));
                JsonValue::Object(entries)
            } else {
                body
            }
        }
        TypeInfoMode::WrapperObject => {
            let mut wrapper = indexmap::IndexMap::new();
            wrapper.insert(id.to_string(), body);
            JsonValue::Object(wrapper)
        }
        TypeInfoMode::WrapperArray => JsonValue::Array(vec![JsonValue::string(id), body]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::parser;
    use crate::meta::Annotation;

    fn animal_meta() -> ClassMeta {
        ClassMeta::new("Animal")
            .with(Annotation::Subtype {
                name: "dog".to_string(),
                class: "Dog".to_string(),
            })
            .with(Annotation::Subtype {
                name: "cat".to_string(),
                class: "Cat".to_string(),
            })
    }

    #[test]
    fn test_subtype_table_lookup() {
        let table = SubtypeTable::from_class(&animal_meta());
        assert_eq!(table.class_for("dog"), Some("Dog"));
        assert_eq!(table.name_for("Cat"), Some("cat"));
        assert!(table.class_for("bird").is_none());
    }

    #[test]
    fn test_split_property_mode() {
        let json = parser::parse(r#"{"@type":"dog","name":"Rex"}"#).unwrap();
        let (id, payload) = split_type_id(&json, &TypeInfoMode::Property("@type".to_string()))
            .unwrap();
        assert_eq!(id.as_deref(), Some("dog"));
        assert!(payload.get_property("@type").is_none());
        assert_eq!(
            payload.get_property("name").and_then(|v| v.as_str()),
            Some("Rex")
        );
    }

    #[test]
    fn test_split_wrapper_object_mode() {
        let json = parser::parse(r#"{"dog":{"name":"Rex"}}"#).unwrap();
        let (id, payload) = split_type_id(&json, &TypeInfoMode::WrapperObject).unwrap();
        assert_eq!(id.as_deref(), Some("dog"));
        assert!(payload.is_object());
    }

    #[test]
    fn test_split_wrapper_array_mode() {
        let json = parser::parse(r#"["dog",{"name":"Rex"}]"#).unwrap();
        let (id, payload) = split_type_id(&json, &TypeInfoMode::WrapperArray).unwrap();
        assert_eq!(id.as_deref(), Some("dog"));
        assert!(payload.is_object());
    }

    #[test]
    fn test_split_missing_id() {
        let json = parser::parse(r#"{"name":"Rex"}"#).unwrap();
        let (id, payload) = split_type_id(&json, &TypeInfoMode::Property("@type".to_string()))
            .unwrap();
        assert!(id.is_none());
        assert_eq!(payload, json);
    }

    #[test]
    fn test_embed_round_trips_with_split() {
        let body = parser::parse(r#"{"name":"Rex"}"#).unwrap();
        for mode in [
            TypeInfoMode::Property("@type".to_string()),
            TypeInfoMode::WrapperObject,
            TypeInfoMode::WrapperArray,
        ] {
            let tagged = embed_type_id(body.clone(), "dog", &mode);
            let (id, payload) = split_type_id(&tagged, &mode).unwrap();
            assert_eq!(id.as_deref(), Some("dog"));
            assert_eq!(payload, body);
        }
    }
}
