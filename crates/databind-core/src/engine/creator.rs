//! Creator resolver
//!
//! Selects the constructor/factory used to build a deserialized instance
//! and binds its arguments. In "properties" mode injected parameters draw
//! from the configured injectables, the rest are matched by name against
//! incoming JSON properties and fall back to declared defaults; in
//! "delegating" mode the entire incoming
//! value becomes the single argument (handled by the caller, which owns the
//! conversion recursion).

use crate::engine::context::CreatorFn;
use crate::json::JsonValue;
use crate::meta::{ClassMeta, CreatorParam, CreatorSpec, NameTransform, TypeDesc};
use crate::value::{Instance, Value};
use crate::{BindError, BindResult};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Select the creator for a class, honoring the per-call name override
pub(crate) fn select<'a>(
    meta: &'a ClassMeta,
    override_name: Option<&str>,
) -> BindResult<Option<&'a CreatorSpec>> {
    let mut creators = meta.creators();
    match override_name {
        Some(name) => meta
            .creators()
            .find(|c| c.name.as_deref() == Some(name))
            .map(Some)
            .ok_or_else(|| {
                BindError::Config(format!(
                    "Class '{}' has no creator named '{}'",
                    meta.name, name
                ))
            }),
        None => Ok(creators.next()),
    }
}

/// Bind "properties"-mode parameters, consuming matched incoming
/// properties from `body`. The conversion of each raw property is delegated
/// to the caller-supplied closure so the transformer owns the recursion.
pub(crate) fn bind_properties(
    class: &str,
    params: &[CreatorParam],
    body: &mut IndexMap<String, JsonValue>,
    naming: Option<NameTransform>,
    injectables: &FxHashMap<String, Value>,
    fail_on_missing: bool,
    convert: &mut dyn FnMut(&JsonValue, &TypeDesc) -> BindResult<Value>,
) -> BindResult<Vec<(String, Value)>> {
    let mut args = Vec::with_capacity(params.len());
    for param in params {
        let incoming_name = match naming {
            Some(transform) => transform.apply(&param.name),
            None => param.name.clone(),
        };

        let value = if let Some(key) = &param.inject {
            // Injected parameters ignore the document value, which is still
            // consumed so it does not count as an unknown property
            body.shift_remove(&incoming_name);
            injectables.get(key).cloned().ok_or_else(|| {
                BindError::Shape(format!(
                    "No injectable value '{}' for creator parameter '{}' of class '{}'",
                    key, param.name, class
                ))
            })?
        } else if let Some(raw) = body.shift_remove(&incoming_name) {
            convert(&raw, &param.ty)?
        } else if let Some(default) = &param.default {
            default.clone()
        } else if param.required && fail_on_missing {
            return Err(BindError::Shape(format!(
                "Missing required creator property '{}' for class '{}'",
                param.name, class
            )));
        } else {
            Value::Null
        };

        args.push((param.name.clone(), value));
    }
    Ok(args)
}

/// Invoke the creator: a registered factory if one exists for the class,
/// else the default construction (an instance whose fields are the bound
/// parameters)
pub(crate) fn construct(
    class: &str,
    args: Vec<(String, Value)>,
    factory: Option<&CreatorFn>,
) -> BindResult<Value> {
    match factory {
        Some(f) => f(args.into_iter().map(|(_, v)| v).collect()),
        None => {
            let mut inst = Instance::new(class);
            for (name, value) in args {
                inst.set(name, value);
            }
            Ok(Value::Object(inst.into_ref()))
        }
    }
}
