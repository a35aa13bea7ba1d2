//! Deserialization transformer
//!
//! Walks a JSON value tree against a declared target type and materializes
//! an object graph, consulting the metadata store for member binding,
//! creators, identity resolution and polymorphic type resolution.

use crate::engine::context::DeContext;
use crate::engine::features::Feature;
use crate::engine::identity::IdKey;
use crate::engine::{creator, types};
use crate::json::{parser, writer, JsonValue};
use crate::meta::{
    CreatorMode, Format, IdScheme, MemberMeta, MetaStore, NameTransform, TypeDesc,
};
use crate::value::{Instance, ObjRef, Value};
use crate::{BindError, BindResult, MAX_BIND_DEPTH};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::rc::Rc;

use super::context::DeOptions;

/// Parse JSON text and bind it to the target type
pub fn parse(
    input: &str,
    target: &TypeDesc,
    store: &MetaStore,
    opts: &DeOptions,
) -> BindResult<Value> {
    let json = parser::parse(input)?;
    deserialize(&json, target, store, opts)
}

/// Bind an already-parsed JSON value tree to the target type
pub fn deserialize(
    json: &JsonValue,
    target: &TypeDesc,
    store: &MetaStore,
    opts: &DeOptions,
) -> BindResult<Value> {
    let mut ctx = DeContext::new(store, opts);

    let unwrapped;
    let mut root = json;
    if ctx.feature(Feature::UnwrapRootValue) {
        if let Some(class) = target.class_name() {
            let name = store.require(class)?.root_name().to_string();
            match json {
                JsonValue::Object(entries) => {
                    if entries.len() != 1 {
                        return Err(BindError::Shape(format!(
                            "Expected a single root wrapper property '{}', got {} properties",
                            name,
                            entries.len()
                        )));
                    }
                    unwrapped = entries.get(&name).cloned().ok_or_else(|| {
                        BindError::Shape(format!(
                            "Expected root wrapper property '{}' for class '{}'",
                            name, class
                        ))
                    })?;
                    root = &unwrapped;
                }
                other => {
                    return Err(BindError::Shape(format!(
                        "Expected root wrapper object, got {}",
                        other.type_name()
                    )));
                }
            }
        }
    }

    let mut value = de_value(root, target, &mut ctx, 0)?;

    // Forward references that never saw a definition
    if ctx.identity.has_pending() {
        if ctx.feature(Feature::FailOnUnresolvedObjectIds) {
            return Err(BindError::Shape(format!(
                "Unresolved object ids: {}",
                ctx.identity.pending_ids().join(", ")
            )));
        }
        let unresolved = ctx.identity.unresolved_ptrs();
        let mut visited = FxHashSet::default();
        patch_unresolved(&mut value, &unresolved, &mut visited);
    }
    Ok(value)
}

/// Replace references to never-defined placeholder cells with null
fn patch_unresolved(
    value: &mut Value,
    unresolved: &FxHashSet<usize>,
    visited: &mut FxHashSet<usize>,
) {
    match value {
        Value::Object(obj) => {
            let ptr = Rc::as_ptr(obj) as usize;
            if unresolved.contains(&ptr) {
                *value = Value::Null;
                return;
            }
            if !visited.insert(ptr) {
                return;
            }
            let mut inst = obj.borrow_mut();
            for (_, field) in inst.fields.iter_mut() {
                patch_unresolved(field, unresolved, visited);
            }
        }
        Value::Array(items) => {
            for item in items {
                patch_unresolved(item, unresolved, visited);
            }
        }
        Value::Map(entries) => {
            for (_, item) in entries.iter_mut() {
                patch_unresolved(item, unresolved, visited);
            }
        }
        _ => {}
    }
}

/// Bind one JSON node against a declared type
fn de_value(
    json: &JsonValue,
    target: &TypeDesc,
    ctx: &mut DeContext<'_>,
    depth: usize,
) -> BindResult<Value> {
    if depth > MAX_BIND_DEPTH {
        return Err(BindError::DepthExceeded);
    }
    let coerce = ctx.feature(Feature::AllowCoercionOfScalars);

    match target {
        TypeDesc::Any => de_any(json, ctx, depth),

        TypeDesc::Bool => match json {
            JsonValue::Null => null_for_primitive(ctx, target),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::Number(n) if coerce => Ok(Value::Bool(*n != 0.0)),
            JsonValue::String(s) if coerce => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(BindError::Shape(format!(
                    "Cannot coerce string \"{}\" to boolean",
                    s
                ))),
            },
            other => Err(BindError::Shape(format!(
                "Expected boolean, got {}",
                other.type_name()
            ))),
        },

        TypeDesc::Number => match json {
            JsonValue::Null => null_for_primitive(ctx, target),
            JsonValue::Number(n) => Ok(Value::Number(*n)),
            JsonValue::String(s) if coerce => s.parse::<f64>().map(Value::Number).map_err(|_| {
                BindError::Shape(format!("Cannot coerce string \"{}\" to number", s))
            }),
            JsonValue::Bool(b) if coerce => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
            other => Err(BindError::Shape(format!(
                "Expected number, got {}",
                other.type_name()
            ))),
        },

        TypeDesc::String => match json {
            JsonValue::Null => null_for_primitive(ctx, target),
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            JsonValue::Number(n) if coerce => Ok(Value::String(format!("{}", n))),
            JsonValue::Bool(b) if coerce => Ok(Value::String(b.to_string())),
            other => Err(BindError::Shape(format!(
                "Expected string, got {}",
                other.type_name()
            ))),
        },

        TypeDesc::Array(elem) => match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(de_value(item, elem, ctx, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            other => Err(BindError::Shape(format!(
                "Expected array, got {}",
                other.type_name()
            ))),
        },

        TypeDesc::Map(val) => match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Object(entries) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(key.clone(), de_value(item, val, ctx, depth + 1)?);
                }
                Ok(Value::Map(out))
            }
            other => Err(BindError::Shape(format!(
                "Expected object, got {}",
                other.type_name()
            ))),
        },

        TypeDesc::Class(class) => de_class(json, class, ctx, depth),
    }
}

/// Untyped binding: objects become maps, everything else maps directly
fn de_any(json: &JsonValue, ctx: &mut DeContext<'_>, depth: usize) -> BindResult<Value> {
    if depth > MAX_BIND_DEPTH {
        return Err(BindError::DepthExceeded);
    }
    Ok(match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => Value::Number(*n),
        JsonValue::String(s) | JsonValue::Raw(s) => Value::String(s.clone()),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(de_any(item, ctx, depth + 1)?);
            }
            Value::Array(out)
        }
        JsonValue::Object(entries) => {
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                out.insert(key.clone(), de_any(item, ctx, depth + 1)?);
            }
            Value::Map(out)
        }
    })
}

fn null_for_primitive(ctx: &DeContext<'_>, target: &TypeDesc) -> BindResult<Value> {
    if ctx.feature(Feature::FailOnNullForPrimitives) {
        Err(BindError::Shape(format!(
            "Null is not a valid {} value",
            match target {
                TypeDesc::Bool => "boolean",
                TypeDesc::String => "string",
                _ => "number",
            }
        )))
    } else if ctx.feature(Feature::SetDefaultValueForPrimitivesOnNull) {
        Ok(target.zero_value())
    } else {
        Ok(Value::Null)
    }
}

/// Bind a JSON node to a class, resolving the concrete subtype first
fn de_class(
    json: &JsonValue,
    class: &str,
    ctx: &mut DeContext<'_>,
    depth: usize,
) -> BindResult<Value> {
    let meta = ctx.store.require(class)?;

    // Ad-hoc deserializers with class affinity take precedence, in order
    for (target, custom) in &ctx.opts.class_deserializers {
        if target == class {
            return custom(json);
        }
    }
    if let Some(id) = meta.deserialize_with() {
        let custom = ctx.opts.deserializers.get(id).ok_or_else(|| {
            BindError::Config(format!("No deserializer registered for id '{}'", id))
        })?;
        return custom(json);
    }

    if json.is_null() {
        return Ok(Value::Null);
    }

    if let Some(cfg) = meta.type_info().cloned() {
        let (id, payload) = types::split_type_id(json, &cfg.mode)?;
        if let Some(id) = id {
            let concrete = types::resolve_subtype(ctx, &meta, &id)?;
            return de_concrete(&payload, &concrete, ctx, depth);
        }
        // A bare scalar is an identity reference and legitimately untagged;
        // anything else without a tag binds as the declared class only when
        // the fail-fast feature is off
        let reference = json.is_scalar() && meta.identity().is_some();
        if !reference && ctx.feature(Feature::FailOnInvalidSubtype) {
            return Err(BindError::Shape(format!(
                "Missing type id for class '{}'",
                class
            )));
        }
        return de_concrete(&payload, class, ctx, depth);
    }
    de_concrete(json, class, ctx, depth)
}

/// Bind a JSON node to a concrete class: identity, creator, then members
fn de_concrete(
    json: &JsonValue,
    class: &str,
    ctx: &mut DeContext<'_>,
    depth: usize,
) -> BindResult<Value> {
    let meta = ctx.store.require(class)?;
    let opts = ctx.opts;
    let identity = meta.identity().cloned();
    let naming = meta.naming();

    // A bare scalar where an identity-carrying object is expected is a
    // reference to an instance defined elsewhere in the document
    if let Some(info) = &identity {
        if json.is_scalar() && !json.is_null() {
            let key = IdKey::from_json(json).ok_or_else(|| {
                BindError::Shape(format!(
                    "Invalid object id {} for class '{}'",
                    json.type_name(),
                    class
                ))
            })?;
            return Ok(Value::Object(ctx.identity.reference(&info.scope, key, class)));
        }
    }

    // Delegating creators consume the whole payload through a factory
    let creator_spec = creator::select(&meta, opts.creator.as_deref())?.cloned();
    if let Some(spec) = &creator_spec {
        if let CreatorMode::Delegating(ty) = &spec.mode {
            let factory = opts.creators.get(class).ok_or_else(|| {
                BindError::Config(format!(
                    "Delegating creator for class '{}' requires a registered factory",
                    class
                ))
            })?;
            let arg = de_value(json, ty, ctx, depth + 1)?;
            return factory(vec![arg]);
        }
    }

    let mut body: IndexMap<String, JsonValue> = match json {
        JsonValue::Object(entries) => entries.clone(),
        other => {
            return Err(BindError::Shape(format!(
                "Expected object for class '{}', got {}",
                class,
                other.type_name()
            )));
        }
    };

    // Identity extraction; wrapper form may itself be a pure reference
    let mut id_key = None;
    if let Some(info) = &identity {
        if info.as_wrapper {
            let id_json = body.shift_remove("id").ok_or_else(|| {
                BindError::Shape(format!(
                    "Expected 'id' property in identity wrapper for class '{}'",
                    class
                ))
            })?;
            let key = IdKey::from_json(&id_json).ok_or_else(|| {
                BindError::Shape(format!("Invalid object id for class '{}'", class))
            })?;
            match body.shift_remove("item") {
                None => {
                    return Ok(Value::Object(ctx.identity.reference(
                        &info.scope,
                        key,
                        class,
                    )));
                }
                Some(JsonValue::Object(inner)) => {
                    body = inner;
                    id_key = Some(key);
                }
                Some(other) => {
                    return Err(BindError::Shape(format!(
                        "Expected object in identity wrapper 'item', got {}",
                        other.type_name()
                    )));
                }
            }
        } else if let IdScheme::Property(member) = &info.scheme {
            // The id doubles as a regular member; peek without consuming
            let json_name = meta
                .member_meta(member)
                .map(|m| m.json_name(naming))
                .unwrap_or_else(|| member.clone());
            id_key = body.get(&json_name).and_then(IdKey::from_json);
        } else if let Some(id_json) = body.shift_remove(&info.property) {
            id_key = Some(IdKey::from_json(&id_json).ok_or_else(|| {
                BindError::Shape(format!("Invalid object id for class '{}'", class))
            })?);
        }
    }

    // The cell every reference to this id resolves to
    let cell: Option<ObjRef> = match (&identity, id_key) {
        (Some(info), Some(key)) => Some(ctx.identity.define(&info.scope, key, class)),
        _ => None,
    };

    // Properties-mode creator
    let obj: ObjRef = if let Some(spec) = &creator_spec {
        let params = match &spec.mode {
            CreatorMode::Properties(params) => params,
            CreatorMode::Delegating(_) => unreachable!(),
        };
        let fail = ctx.feature(Feature::FailOnMissingCreatorProperties);
        let mut convert =
            |raw: &JsonValue, ty: &TypeDesc| de_value(raw, ty, ctx, depth + 1);
        let args = creator::bind_properties(
            class,
            params,
            &mut body,
            naming,
            &opts.injectables,
            fail,
            &mut convert,
        )?;
        match creator::construct(class, args, opts.creators.get(class))? {
            Value::Object(fresh) => match cell {
                Some(cell) => {
                    {
                        let fields = std::mem::take(&mut fresh.borrow_mut().fields);
                        let mut target = cell.borrow_mut();
                        target.class = class.to_string();
                        target.fields.extend(fields);
                    }
                    cell
                }
                None => fresh,
            },
            // A factory may build something other than an instance; members
            // cannot be bound onto it
            other => return Ok(other),
        }
    } else {
        cell.unwrap_or_else(|| Instance::new(class).into_ref())
    };

    let case_insensitive = ctx.feature(Feature::AcceptCaseInsensitiveProperties);
    let override_ignored = opts.overrides.get(class).map(|o| &o.ignored);

    // Plain members first; unwrapped members consume what remains after
    for member in &meta.members {
        if member.is_ignored()
            || member.is_any_getter()
            || member.is_any_setter()
            || member.back_ref().is_some()
            || member.unwrapped().is_some()
        {
            continue;
        }
        if let Some(ignored) = override_ignored {
            if ignored.contains(&member.name) {
                take_property(&mut body, member, naming, case_insensitive);
                continue;
            }
        }

        // Injected members take their value from the injectables, not the
        // document; a matching document property is still consumed
        if let Some(key) = member.inject() {
            take_property(&mut body, member, naming, case_insensitive);
            if let Some(v) = opts.injectables.get(key) {
                obj.borrow_mut().set(member.name.clone(), v.clone());
            }
            continue;
        }

        let value = match take_property(&mut body, member, naming, case_insensitive) {
            Some(raw) => de_member_value(&raw, member, ctx, depth)?,
            None => continue,
        };
        obj.borrow_mut().set(member.name.clone(), value);
    }

    for member in &meta.members {
        if let Some((prefix, suffix)) = member.unwrapped() {
            if member.is_ignored() {
                continue;
            }
            // Without affixes, only the nested class's own property names
            // are pulled in; the rest stays for the any-setter and
            // unknown-property handling
            let nested = if prefix.is_empty() && suffix.is_empty() {
                let allowed = nested_property_names(ctx, &member.ty)?;
                let keys: Vec<String> = body
                    .keys()
                    .filter(|k| allowed.contains(k.as_str()))
                    .cloned()
                    .collect();
                let mut nested = IndexMap::with_capacity(keys.len());
                for key in keys {
                    if let Some(value) = body.shift_remove(&key) {
                        nested.insert(key, value);
                    }
                }
                nested
            } else {
                gather_unwrapped(&mut body, prefix, suffix)
            };
            if nested.is_empty() {
                continue;
            }
            let value = de_value(&JsonValue::Object(nested), &member.ty, ctx, depth + 1)?;
            obj.borrow_mut().set(member.name.clone(), value);
        }
    }

    // Leftover properties: any-setter catch-all, else fail or drop
    if !body.is_empty() {
        if let Some(any) = meta.any_setter()? {
            let any_name = any.name.clone();
            let mut extras = IndexMap::with_capacity(body.len());
            for (key, item) in std::mem::take(&mut body) {
                extras.insert(key, de_any(&item, ctx, depth + 1)?);
            }
            obj.borrow_mut().set(any_name, Value::Map(extras));
        } else if ctx.feature(Feature::FailOnUnknownProperties) {
            let names: Vec<&str> = body.keys().map(|k| k.as_str()).collect();
            return Err(BindError::Shape(format!(
                "Unknown properties for class '{}': {}",
                class,
                names.join(", ")
            )));
        }
    }

    // Managed references point their children back at this instance
    for member in &meta.members {
        if let Some(relation) = member.managed_ref() {
            let child_value = obj.borrow().get(&member.name);
            match child_value {
                Value::Object(child) => {
                    patch_back_ref(&child, relation, &obj, ctx)?;
                }
                Value::Array(items) => {
                    for item in &items {
                        if let Value::Object(child) = item {
                            patch_back_ref(child, relation, &obj, ctx)?;
                        }
                    }
                }
                Value::Map(entries) => {
                    for (_, item) in &entries {
                        if let Value::Object(child) = item {
                            patch_back_ref(child, relation, &obj, ctx)?;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(Value::Object(obj))
}

/// Fill the child's back-reference member for a managed relation
fn patch_back_ref(
    child: &ObjRef,
    relation: &str,
    parent: &ObjRef,
    ctx: &DeContext<'_>,
) -> BindResult<()> {
    let child_class = child.borrow().class.clone();
    let child_meta = ctx.store.require(&child_class)?;
    if let Some(back) = child_meta.back_ref_member(relation)? {
        child
            .borrow_mut()
            .set(back.name.clone(), Value::Object(parent.clone()));
    }
    Ok(())
}

/// Member value binding with format overrides, custom codecs and raw values
fn de_member_value(
    raw: &JsonValue,
    member: &MemberMeta,
    ctx: &mut DeContext<'_>,
    depth: usize,
) -> BindResult<Value> {
    if let Some(id) = member.deserialize_with() {
        let custom = ctx.opts.deserializers.get(id).ok_or_else(|| {
            BindError::Config(format!("No deserializer registered for id '{}'", id))
        })?;
        return custom(raw);
    }
    if member.is_raw() {
        // Preserve the incoming fragment as JSON text
        return Ok(match raw {
            JsonValue::Null => Value::Null,
            other => Value::String(writer::write(other)),
        });
    }
    match (member.format(), raw) {
        (Some(Format::NumberAsString), JsonValue::String(s)) => {
            s.parse::<f64>().map(Value::Number).map_err(|_| {
                BindError::Shape(format!(
                    "Cannot parse \"{}\" as a number for member '{}'",
                    s, member.name
                ))
            })
        }
        (Some(Format::BoolAsNumber), JsonValue::Number(n)) => Ok(Value::Bool(*n != 0.0)),
        (Some(Format::MapAsEntries), JsonValue::Array(items)) => {
            let val_ty = match &member.ty {
                TypeDesc::Map(v) => (**v).clone(),
                _ => TypeDesc::Any,
            };
            let mut out = IndexMap::with_capacity(items.len());
            for item in items {
                match item {
                    JsonValue::Array(pair) if pair.len() == 2 => {
                        let key = pair[0].as_str().ok_or_else(|| {
                            BindError::Shape(format!(
                                "Map entry key for member '{}' must be a string",
                                member.name
                            ))
                        })?;
                        out.insert(
                            key.to_string(),
                            de_value(&pair[1], &val_ty, ctx, depth + 1)?,
                        );
                    }
                    other => {
                        return Err(BindError::Shape(format!(
                            "Expected [key, value] pair for member '{}', got {}",
                            member.name,
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Map(out))
        }
        _ => de_value(raw, &member.ty, ctx, depth + 1),
    }
}

/// Locate and consume a member's incoming property: canonical name, then
/// aliases, then a case-insensitive scan if enabled
fn take_property(
    body: &mut IndexMap<String, JsonValue>,
    member: &MemberMeta,
    naming: Option<NameTransform>,
    case_insensitive: bool,
) -> Option<JsonValue> {
    let json_name = member.json_name(naming);
    if let Some(v) = body.shift_remove(&json_name) {
        return Some(v);
    }
    for alias in member.aliases() {
        if let Some(v) = body.shift_remove(alias) {
            return Some(v);
        }
    }
    if case_insensitive {
        let lower = json_name.to_lowercase();
        let key = body.keys().find(|k| k.to_lowercase() == lower).cloned();
        if let Some(key) = key {
            return body.shift_remove(&key);
        }
    }
    None
}

/// Pull the properties belonging to an unwrapped member back out of the
/// parent body, stripping the affixes
fn gather_unwrapped(
    body: &mut IndexMap<String, JsonValue>,
    prefix: &str,
    suffix: &str,
) -> IndexMap<String, JsonValue> {
    let keys: Vec<String> = body
        .keys()
        .filter(|k| {
            k.len() > prefix.len() + suffix.len()
                && k.starts_with(prefix)
                && k.ends_with(suffix)
        })
        .cloned()
        .collect();
    let mut nested = IndexMap::with_capacity(keys.len());
    for key in keys {
        if let Some(value) = body.shift_remove(&key) {
            let inner = key[prefix.len()..key.len() - suffix.len()].to_string();
            nested.insert(inner, value);
        }
    }
    nested
}

/// Property names an unwrapped member can claim when it has no affixes to
/// match against: the nested class's member json-names and aliases
fn nested_property_names(
    ctx: &DeContext<'_>,
    ty: &TypeDesc,
) -> BindResult<FxHashSet<String>> {
    let mut names = FxHashSet::default();
    let Some(class) = ty.class_name() else {
        return Ok(names);
    };
    let meta = ctx.store.require(class)?;
    let naming = meta.naming();
    for member in &meta.members {
        if member.is_ignored() {
            continue;
        }
        names.insert(member.json_name(naming));
        for alias in member.aliases() {
            names.insert(alias.clone());
        }
    }
    Ok(names)
}
