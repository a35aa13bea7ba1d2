//! Serialization transformer
//!
//! Recursively walks an object graph and produces a JSON value tree,
//! consulting the metadata store at every node to decide how to name,
//! include, order, reference and type-tag values.

use crate::engine::context::SerContext;
use crate::engine::features::Feature;
use crate::engine::types;
use crate::json::{writer, JsonValue};
use crate::meta::{Format, Include, MemberMeta, MetaStore, TypeDesc};
use crate::value::{ObjRef, Value};
use crate::{BindError, BindResult, MAX_BIND_DEPTH};
use indexmap::IndexMap;
use std::rc::Rc;

use super::context::SerOptions;

/// Largest integer losslessly representable in an f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Serialize an object graph to JSON text
pub fn stringify(value: &Value, store: &MetaStore, opts: &SerOptions) -> BindResult<String> {
    Ok(writer::write(&serialize(value, store, opts)?))
}

/// Serialize an object graph to a JSON value tree
pub fn serialize(value: &Value, store: &MetaStore, opts: &SerOptions) -> BindResult<JsonValue> {
    let mut ctx = SerContext::new(store, opts);
    let json = ser_value(value, None, &mut ctx, 0)?;

    if ctx.feature(Feature::WrapRootValue) {
        if let Value::Object(obj) = value {
            let class = obj.borrow().class.clone();
            let meta = store.require(&class)?;
            let mut wrapper = IndexMap::new();
            wrapper.insert(meta.root_name().to_string(), json);
            return Ok(JsonValue::Object(wrapper));
        }
    }
    Ok(json)
}

/// Serialize one node
fn ser_value(
    value: &Value,
    declared: Option<&TypeDesc>,
    ctx: &mut SerContext<'_>,
    depth: usize,
) -> BindResult<JsonValue> {
    if depth > MAX_BIND_DEPTH {
        return Err(BindError::DepthExceeded);
    }

    match value {
        Value::Null => {
            if ctx.feature(Feature::WriteNullAsDefault) {
                if let Some(ty) = declared {
                    let zero = ty.zero_value();
                    if !zero.is_null() {
                        return ser_value(&zero, declared, ctx, depth);
                    }
                }
            }
            Ok(JsonValue::Null)
        }

        Value::Bool(b) => Ok(JsonValue::Bool(*b)),

        Value::Number(n) => Ok(sanitize_number(ctx, *n)),

        Value::String(s) => Ok(JsonValue::String(s.clone())),

        Value::Array(items) => {
            let elem_ty = declared.and_then(|t| match t {
                TypeDesc::Array(elem) => Some(elem.as_ref()),
                _ => None,
            });
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(ser_value(item, elem_ty, ctx, depth + 1)?);
            }
            Ok(JsonValue::Array(out))
        }

        Value::Map(entries) => {
            let val_ty = declared.and_then(|t| match t {
                TypeDesc::Map(v) => Some(v.as_ref()),
                _ => None,
            });
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                out.insert(key.clone(), ser_value(item, val_ty, ctx, depth + 1)?);
            }
            Ok(JsonValue::Object(out))
        }

        Value::Object(obj) => {
            let declared_class = declared.and_then(|t| t.class_name());
            ser_instance(obj, declared_class, ctx, depth)
        }
    }
}

/// Serialize a class instance
fn ser_instance(
    obj: &ObjRef,
    declared_class: Option<&str>,
    ctx: &mut SerContext<'_>,
    depth: usize,
) -> BindResult<JsonValue> {
    let inst = obj.borrow();
    let meta = ctx.store.require(&inst.class)?;

    // Ad-hoc serializers with class affinity take precedence, in order
    for (class, custom) in &ctx.opts.class_serializers {
        if class == &inst.class {
            return custom(&Value::Object(obj.clone()));
        }
    }
    if let Some(id) = meta.serialize_with() {
        let custom = ctx.opts.serializers.get(id).ok_or_else(|| {
            BindError::Config(format!("No serializer registered for id '{}'", id))
        })?;
        return custom(&Value::Object(obj.clone()));
    }

    // Eager configuration checks for this class
    meta.any_getter()?;
    for member in &meta.members {
        if let Some(relation) = member.back_ref() {
            meta.back_ref_member(relation)?;
        }
    }

    // Identity: a revisited object collapses to its reference id
    let identity = meta.identity().cloned();
    let mut assigned_id = None;
    if let Some(info) = &identity {
        if let Some(id) = ctx.identity.lookup(&info.scope, obj) {
            return Ok(if info.as_wrapper {
                let mut wrapper = IndexMap::new();
                wrapper.insert("id".to_string(), id);
                JsonValue::Object(wrapper)
            } else {
                id
            });
        }
        assigned_id = Some(ctx.identity.assign(info, obj, &inst)?);
    }

    let naming = meta.naming();
    let mut body: IndexMap<String, JsonValue> = IndexMap::new();

    // Prepended append virtuals
    for (name, attr, prepend) in meta.appends() {
        if prepend {
            if let Some(v) = ctx.opts.attributes.get(attr) {
                body.insert(name.to_string(), v.clone());
            }
        }
    }

    for member in ordered_members(&meta, naming, ctx) {
        if member.is_ignored() || member.back_ref().is_some() || member.is_any_getter() {
            continue;
        }
        if let Some(over) = ctx.opts.overrides.get(&meta.name) {
            if over.ignored.contains(&member.name) {
                continue;
            }
        }

        let json_name = member.json_name(naming);

        // View partitioning (active only when the caller supplied views)
        if !ctx.opts.views.is_empty() {
            match member.views() {
                Some(views) => {
                    if !views.iter().any(|v| ctx.opts.views.contains(v)) {
                        continue;
                    }
                }
                None => {
                    if !ctx.feature(Feature::DefaultViewInclusion) {
                        continue;
                    }
                }
            }
        }

        // Named filter
        if let Some(filter_id) = meta.filter_id() {
            let rule = ctx.opts.filters.get(filter_id).ok_or_else(|| {
                BindError::Config(format!("No filter registered for id '{}'", filter_id))
            })?;
            if !rule.allows(&json_name) {
                continue;
            }
        }

        let mut value = inst.get(&member.name);
        if value.is_null() && ctx.feature(Feature::WriteNullAsDefault) {
            value = member.ty.zero_value();
        }

        if !include_allows(member, &meta.name, &value, ctx)? {
            continue;
        }

        // Member-level custom serializer
        if let Some(id) = member.serialize_with() {
            let custom = ctx.opts.serializers.get(id).ok_or_else(|| {
                BindError::Config(format!("No serializer registered for id '{}'", id))
            })?;
            body.insert(json_name, custom(&value)?);
            continue;
        }

        // Unwrapped members splice their own properties into this object
        if let Some((prefix, suffix)) = member.unwrapped() {
            splice_unwrapped(&mut body, member, &value, prefix, suffix, ctx, depth)?;
            continue;
        }

        // Raw values bypass encoding entirely
        if member.is_raw() {
            match value {
                Value::String(text) => {
                    body.insert(json_name, JsonValue::Raw(text));
                }
                Value::Null => {
                    body.insert(json_name, JsonValue::Null);
                }
                other => {
                    return Err(BindError::Config(format!(
                        "Raw-value member '{}' of class '{}' must hold a string, got {}",
                        member.name,
                        meta.name,
                        other.type_name()
                    )));
                }
            }
            continue;
        }

        // Self-reference mitigation (identity-carrying classes are handled
        // by the reference mechanism instead)
        match self_reference(&value, obj, ctx)? {
            SelfRef::Fail => {
                return Err(BindError::Shape(format!(
                    "Direct self-reference through member '{}' of class '{}'",
                    member.name, meta.name
                )));
            }
            SelfRef::WriteNull => {
                body.insert(json_name, JsonValue::Null);
                continue;
            }
            SelfRef::None => {}
        }

        let json = ser_member_value(&value, member, ctx, depth)?;
        body.insert(json_name, json);
    }

    // Any-getter entries become additional sibling properties
    if let Some(any) = meta.any_getter()? {
        match inst.get(&any.name) {
            Value::Map(entries) => {
                for (key, item) in &entries {
                    if let Some(filter_id) = meta.filter_id() {
                        if let Some(rule) = ctx.opts.filters.get(filter_id) {
                            if !rule.allows(key) {
                                continue;
                            }
                        }
                    }
                    if !include_allows(any, &meta.name, item, ctx)? {
                        continue;
                    }
                    body.insert(key.clone(), ser_value(item, None, ctx, depth + 1)?);
                }
            }
            Value::Null => {}
            other => {
                return Err(BindError::Config(format!(
                    "Any-getter member '{}' of class '{}' must hold a map, got {}",
                    any.name,
                    meta.name,
                    other.type_name()
                )));
            }
        }
    }

    // Appended virtuals
    for (name, attr, prepend) in meta.appends() {
        if !prepend {
            if let Some(v) = ctx.opts.attributes.get(attr) {
                body.insert(name.to_string(), v.clone());
            }
        }
    }

    // Embed the freshly assigned identity
    let mut result = if let (Some(info), Some(id)) = (&identity, assigned_id) {
        if info.as_wrapper {
            let mut wrapper = IndexMap::new();
            wrapper.insert("id".to_string(), id);
            wrapper.insert("item".to_string(), JsonValue::Object(body));
            JsonValue::Object(wrapper)
        } else if matches!(info.scheme, crate::meta::IdScheme::Property(_)) {
            // The id is a regular member, already in place
            JsonValue::Object(body)
        } else {
            let mut with_id = IndexMap::with_capacity(body.len() + 1);
            with_id.insert(info.property.clone(), id);
            with_id.extend(body);
            JsonValue::Object(with_id)
        }
    } else {
        JsonValue::Object(body)
    };

    // Polymorphic type tagging
    let declared_meta = match declared_class {
        Some(class) if class != inst.class => Some(ctx.store.require(class)?),
        _ => None,
    };
    let tag_cfg = declared_meta
        .as_ref()
        .and_then(|m| m.type_info().cloned())
        .or_else(|| meta.type_info().cloned());
    if let Some(cfg) = tag_cfg {
        let base = declared_meta.as_ref().unwrap_or(&meta);
        let id = types::serialization_type_id(ctx.opts, base, &inst);
        result = types::embed_type_id(result, &id, &cfg.mode);
    }

    Ok(result)
}

/// Member value serialization with format overrides
fn ser_member_value(
    value: &Value,
    member: &MemberMeta,
    ctx: &mut SerContext<'_>,
    depth: usize,
) -> BindResult<JsonValue> {
    match (member.format(), value) {
        (Some(Format::NumberAsString), Value::Number(n)) => {
            Ok(JsonValue::String(format!("{}", n)))
        }
        (Some(Format::BoolAsNumber), Value::Bool(b)) => {
            Ok(JsonValue::Number(if *b { 1.0 } else { 0.0 }))
        }
        (Some(Format::MapAsEntries), Value::Map(entries)) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, item) in entries {
                out.push(JsonValue::Array(vec![
                    JsonValue::string(key.clone()),
                    ser_value(item, None, ctx, depth + 1)?,
                ]));
            }
            Ok(JsonValue::Array(out))
        }
        _ => ser_value(value, Some(&member.ty), ctx, depth + 1),
    }
}

/// Splice an unwrapped member's properties into the parent body
fn splice_unwrapped(
    body: &mut IndexMap<String, JsonValue>,
    member: &MemberMeta,
    value: &Value,
    prefix: &str,
    suffix: &str,
    ctx: &mut SerContext<'_>,
    depth: usize,
) -> BindResult<()> {
    match value {
        Value::Null => Ok(()),
        Value::Object(nested) => {
            let nested_class = nested.borrow().class.clone();
            let nested_meta = ctx.store.require(&nested_class)?;
            if nested_meta.type_info().is_some() {
                return Err(BindError::Config(format!(
                    "Cannot unwrap member '{}': class '{}' carries polymorphic type info",
                    member.name, nested_class
                )));
            }
            match ser_instance(nested, member.ty.class_name(), ctx, depth + 1)? {
                JsonValue::Object(props) => {
                    for (key, item) in props {
                        body.insert(format!("{}{}{}", prefix, key, suffix), item);
                    }
                    Ok(())
                }
                _ => Err(BindError::Config(format!(
                    "Cannot unwrap member '{}': class '{}' does not serialize to an object",
                    member.name, nested_class
                ))),
            }
        }
        other => Err(BindError::Config(format!(
            "Cannot unwrap member '{}': value is {}",
            member.name,
            other.type_name()
        ))),
    }
}

enum SelfRef {
    None,
    Fail,
    WriteNull,
}

/// Detect a direct self-reference: the member value (or one of its
/// immediate elements) is the instance being serialized, and its class has
/// no identity info to break the cycle
fn self_reference(value: &Value, container: &ObjRef, ctx: &SerContext<'_>) -> BindResult<SelfRef> {
    let hit = match value {
        Value::Object(child) => Rc::ptr_eq(child, container),
        Value::Array(items) => items.iter().any(|v| {
            matches!(v, Value::Object(child) if Rc::ptr_eq(child, container))
        }),
        Value::Map(entries) => entries.values().any(|v| {
            matches!(v, Value::Object(child) if Rc::ptr_eq(child, container))
        }),
        _ => false,
    };
    if !hit {
        return Ok(SelfRef::None);
    }
    let class = container.borrow().class.clone();
    let has_identity = ctx
        .store
        .require(&class)?
        .identity()
        .is_some();
    if has_identity {
        return Ok(SelfRef::None);
    }
    if ctx.feature(Feature::FailOnSelfReferences) {
        Ok(SelfRef::Fail)
    } else if ctx.feature(Feature::WriteSelfReferencesAsNull) {
        Ok(SelfRef::WriteNull)
    } else {
        // Proceeding is bounded by the depth guard
        Ok(SelfRef::None)
    }
}

/// Effective member ordering: explicit property order first, then the rest
/// alphabetically (if enabled) or in declaration order
fn ordered_members<'m>(
    meta: &'m crate::meta::ClassMeta,
    naming: Option<crate::meta::NameTransform>,
    ctx: &SerContext<'_>,
) -> Vec<&'m MemberMeta> {
    let explicit: &[String] = meta.property_order().unwrap_or(&[]);
    let mut ordered: Vec<&MemberMeta> = Vec::with_capacity(meta.members.len());
    for name in explicit {
        if let Some(member) = meta.member_meta(name) {
            ordered.push(member);
        }
    }
    let mut rest: Vec<&MemberMeta> = meta
        .members
        .iter()
        .filter(|m| !explicit.contains(&m.name))
        .collect();
    if ctx.feature(Feature::SortPropertiesAlphabetically) {
        rest.sort_by_key(|m| m.json_name(naming));
    }
    ordered.extend(rest);
    ordered
}

/// Apply the effective inclusion policy for a member value
fn include_allows(
    member: &MemberMeta,
    class: &str,
    value: &Value,
    ctx: &SerContext<'_>,
) -> BindResult<bool> {
    let override_policy = ctx
        .opts
        .overrides
        .get(class)
        .and_then(|o| o.include.as_ref());
    let class_default = ctx.store.require(class)?.include_default().cloned();
    let policy = member
        .include()
        .cloned()
        .or_else(|| override_policy.cloned())
        .or(class_default)
        .unwrap_or(Include::Always);

    Ok(match policy {
        Include::Always => true,
        Include::NonNull => !value.is_null(),
        Include::NonEmpty => !value.is_empty(),
        Include::NonDefault => *value != member.ty.zero_value(),
        Include::Custom(id) => {
            let predicate = ctx.opts.include_predicates.get(&id).ok_or_else(|| {
                BindError::Config(format!("No inclusion predicate registered for id '{}'", id))
            })?;
            !predicate(value)
        }
    })
}

/// Non-finite substitution per feature flags; the default keeps output
/// valid by degrading to null in the writer
fn sanitize_number(ctx: &SerContext<'_>, n: f64) -> JsonValue {
    if n.is_finite() {
        return JsonValue::Number(n);
    }
    if ctx.feature(Feature::NonFiniteAsZero) {
        JsonValue::Number(0.0)
    } else if ctx.feature(Feature::NonFiniteClampSafeInt) {
        if n.is_nan() {
            JsonValue::Number(0.0)
        } else if n > 0.0 {
            JsonValue::Number(MAX_SAFE_INTEGER)
        } else {
            JsonValue::Number(-MAX_SAFE_INTEGER)
        }
    } else if ctx.feature(Feature::NonFiniteClampMax) {
        if n.is_nan() {
            JsonValue::Number(0.0)
        } else if n > 0.0 {
            JsonValue::Number(f64::MAX)
        } else {
            JsonValue::Number(f64::MIN)
        }
    } else {
        JsonValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::SerOptions;
    use crate::meta::{ClassMeta, MemberMeta};

    fn scalar_store() -> MetaStore {
        let mut store = MetaStore::new();
        store.register(
            ClassMeta::new("Point")
                .member(MemberMeta::new("x", TypeDesc::Number))
                .member(MemberMeta::new("y", TypeDesc::Number)),
        );
        store
    }

    #[test]
    fn test_scalars_and_collections() {
        let store = MetaStore::new();
        let opts = SerOptions::new();
        assert_eq!(serialize(&Value::Null, &store, &opts).unwrap(), JsonValue::Null);
        assert_eq!(
            serialize(&Value::Bool(true), &store, &opts).unwrap(),
            JsonValue::Bool(true)
        );
        assert_eq!(
            serialize(
                &Value::Array(vec![Value::Number(1.0), Value::string("a")]),
                &store,
                &opts
            )
            .unwrap(),
            JsonValue::Array(vec![JsonValue::Number(1.0), JsonValue::string("a")])
        );
    }

    #[test]
    fn test_instance_to_object() {
        let store = scalar_store();
        let value = Value::object(
            "Point",
            vec![("x", Value::Number(1.0)), ("y", Value::Number(2.0))],
        );
        let json = stringify(&value, &store, &SerOptions::new()).unwrap();
        assert_eq!(json, r#"{"x":1,"y":2}"#);
    }

    #[test]
    fn test_non_finite_default_is_null() {
        let store = MetaStore::new();
        let json = stringify(&Value::Number(f64::NAN), &store, &SerOptions::new()).unwrap();
        assert_eq!(json, "null");
    }

    #[test]
    fn test_non_finite_feature_substitutions() {
        let store = MetaStore::new();

        let zero = SerOptions::new().enable(Feature::NonFiniteAsZero);
        assert_eq!(
            stringify(&Value::Number(f64::INFINITY), &store, &zero).unwrap(),
            "0"
        );

        let clamp = SerOptions::new().enable(Feature::NonFiniteClampSafeInt);
        assert_eq!(
            stringify(&Value::Number(f64::INFINITY), &store, &clamp).unwrap(),
            "9007199254740991"
        );
        assert_eq!(
            stringify(&Value::Number(f64::NEG_INFINITY), &store, &clamp).unwrap(),
            "-9007199254740991"
        );
        assert_eq!(
            stringify(&Value::Number(f64::NAN), &store, &clamp).unwrap(),
            "0"
        );
    }

    #[test]
    fn test_deep_chain_hits_depth_guard_before_the_stack() {
        let mut store = MetaStore::new();
        store.register(
            ClassMeta::new("Node").member(MemberMeta::new("next", TypeDesc::class("Node"))),
        );

        let chain = |len: usize| {
            let mut tail = Value::Null;
            for _ in 0..len {
                let node = crate::value::Instance::new("Node").into_ref();
                node.borrow_mut().set("next", tail);
                tail = Value::Object(node);
            }
            tail
        };

        assert!(serialize(&chain(MAX_BIND_DEPTH / 2), &store, &SerOptions::new()).is_ok());
        assert!(matches!(
            serialize(&chain(MAX_BIND_DEPTH * 2), &store, &SerOptions::new()),
            Err(BindError::DepthExceeded)
        ));
    }

    #[test]
    fn test_depth_guard_trips_on_unmitigated_cycle() {
        let mut store = MetaStore::new();
        store.register(
            ClassMeta::new("Node").member(MemberMeta::new("next", TypeDesc::class("Node"))),
        );
        let node = crate::value::Instance::new("Node").into_ref();
        node.borrow_mut().set("next", Value::Object(node.clone()));

        let result = serialize(&Value::Object(node), &store, &SerOptions::new());
        assert!(matches!(result, Err(BindError::DepthExceeded)));
    }
}
