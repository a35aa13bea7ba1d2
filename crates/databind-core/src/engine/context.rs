//! Per-call options and traversal contexts
//!
//! Options are supplied by the caller at each top-level entry point; the
//! traversal context wraps them together with the per-call identity tables
//! and is threaded through the recursion. Nothing here survives the call.

use crate::engine::features::{Feature, FeatureSet};
use crate::engine::identity::{IdentityScopes, ObjectIdTable};
use crate::json::JsonValue;
use crate::meta::{Include, MetaStore};
use crate::value::{Instance, Value};
use crate::BindResult;
use rustc_hash::{FxHashMap, FxHashSet};

/// Custom serializer callback: value in, JSON contribution out
pub type SerFn = Box<dyn Fn(&Value) -> BindResult<JsonValue>>;

/// Custom deserializer callback: JSON in, value out
pub type DeFn = Box<dyn Fn(&JsonValue) -> BindResult<Value>>;

/// Custom inclusion predicate; `true` means suppress the member
pub type IncludeFn = Box<dyn Fn(&Value) -> bool>;

/// Custom type-id resolver for serialization: instance to logical id
pub type TypeIdFn = Box<dyn Fn(&Instance) -> Option<String>>;

/// Custom type-id resolver for deserialization: logical id to class name
pub type TypeNameFn = Box<dyn Fn(&str) -> Option<String>>;

/// Registered creator factory: bound arguments in, constructed value out
pub type CreatorFn = Box<dyn Fn(Vec<Value>) -> BindResult<Value>>;

/// Named serialization filter rule
#[derive(Debug, Clone)]
pub enum FilterRule {
    /// Keep every property
    SerializeAll,
    /// Keep every property except the named ones
    SerializeAllExcept(FxHashSet<String>),
    /// Keep only the named properties
    FilterOutAllExcept(FxHashSet<String>),
}

impl FilterRule {
    /// Whether the rule keeps a property of this name
    pub fn allows(&self, name: &str) -> bool {
        match self {
            FilterRule::SerializeAll => true,
            FilterRule::SerializeAllExcept(excluded) => !excluded.contains(name),
            FilterRule::FilterOutAllExcept(kept) => kept.contains(name),
        }
    }
}

/// Per-target-class option overrides
#[derive(Debug, Default, Clone)]
pub struct ClassOverride {
    /// Replaces the class's default inclusion policy
    pub include: Option<Include>,
    /// Members ignored in addition to their own annotations
    pub ignored: FxHashSet<String>,
}

/// Serialization call options
#[derive(Default)]
pub struct SerOptions {
    /// Feature overrides
    pub features: FeatureSet,
    /// Active view set; empty means view filtering is off
    pub views: FxHashSet<String>,
    /// Attribute bag backing append virtual properties and custom codecs
    pub attributes: FxHashMap<String, JsonValue>,
    /// Named filter rules, keyed by filter id
    pub filters: FxHashMap<String, FilterRule>,
    /// Custom serializers, keyed by codec id
    pub serializers: FxHashMap<String, SerFn>,
    /// Ad-hoc serializers with class affinity, consulted in order before
    /// annotation lookup
    pub class_serializers: Vec<(String, SerFn)>,
    /// Custom inclusion predicates, keyed by predicate id
    pub include_predicates: FxHashMap<String, IncludeFn>,
    /// Custom type-id resolvers, keyed by base class name
    pub type_id_resolvers: FxHashMap<String, TypeIdFn>,
    /// Per-target-class overrides
    pub overrides: FxHashMap<String, ClassOverride>,
}

impl SerOptions {
    /// Options with every flag at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a feature (chainable)
    pub fn enable(mut self, feature: Feature) -> Self {
        self.features = self.features.enable(feature);
        self
    }

    /// Disable a feature (chainable)
    pub fn disable(mut self, feature: Feature) -> Self {
        self.features = self.features.disable(feature);
        self
    }

    /// Activate a view (chainable)
    pub fn view(mut self, name: impl Into<String>) -> Self {
        self.views.insert(name.into());
        self
    }

    /// Put a value into the attribute bag (chainable)
    pub fn attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Register a named filter rule (chainable)
    pub fn filter(mut self, id: impl Into<String>, rule: FilterRule) -> Self {
        self.filters.insert(id.into(), rule);
        self
    }
}

/// Deserialization call options
#[derive(Default)]
pub struct DeOptions {
    /// Feature overrides
    pub features: FeatureSet,
    /// Creator name override: selects among a class's named creators
    pub creator: Option<String>,
    /// Custom deserializers, keyed by codec id
    pub deserializers: FxHashMap<String, DeFn>,
    /// Ad-hoc deserializers with class affinity, consulted in order before
    /// annotation lookup
    pub class_deserializers: Vec<(String, DeFn)>,
    /// Injectable values, keyed by name
    pub injectables: FxHashMap<String, Value>,
    /// Custom type-id resolvers, keyed by base class name
    pub type_name_resolvers: FxHashMap<String, TypeNameFn>,
    /// Creator factories, keyed by class name
    pub creators: FxHashMap<String, CreatorFn>,
    /// Per-target-class overrides
    pub overrides: FxHashMap<String, ClassOverride>,
}

impl DeOptions {
    /// Options with every flag at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a feature (chainable)
    pub fn enable(mut self, feature: Feature) -> Self {
        self.features = self.features.enable(feature);
        self
    }

    /// Disable a feature (chainable)
    pub fn disable(mut self, feature: Feature) -> Self {
        self.features = self.features.disable(feature);
        self
    }

    /// Provide an injectable value (chainable)
    pub fn inject(mut self, key: impl Into<String>, value: Value) -> Self {
        self.injectables.insert(key.into(), value);
        self
    }
}

/// Serialization traversal context, created once per top-level call
pub(crate) struct SerContext<'a> {
    pub store: &'a MetaStore,
    pub opts: &'a SerOptions,
    pub identity: IdentityScopes,
}

impl<'a> SerContext<'a> {
    pub fn new(store: &'a MetaStore, opts: &'a SerOptions) -> Self {
        Self {
            store,
            opts,
            identity: IdentityScopes::new(),
        }
    }

    pub fn feature(&self, feature: Feature) -> bool {
        self.opts.features.is_enabled(feature)
    }
}

/// Deserialization traversal context, created once per top-level call
pub(crate) struct DeContext<'a> {
    pub store: &'a MetaStore,
    pub opts: &'a DeOptions,
    pub identity: ObjectIdTable,
}

impl<'a> DeContext<'a> {
    pub fn new(store: &'a MetaStore, opts: &'a DeOptions) -> Self {
        Self {
            store,
            opts,
            identity: ObjectIdTable::new(),
        }
    }

    pub fn feature(&self, feature: Feature) -> bool {
        self.opts.features.is_enabled(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rules() {
        let all = FilterRule::SerializeAll;
        assert!(all.allows("anything"));

        let mut excluded = FxHashSet::default();
        excluded.insert("secret".to_string());
        let except = FilterRule::SerializeAllExcept(excluded);
        assert!(except.allows("name"));
        assert!(!except.allows("secret"));

        let mut kept = FxHashSet::default();
        kept.insert("id".to_string());
        let only = FilterRule::FilterOutAllExcept(kept);
        assert!(only.allows("id"));
        assert!(!only.allows("name"));
    }

    #[test]
    fn test_option_builders() {
        let opts = SerOptions::new()
            .enable(Feature::WrapRootValue)
            .view("Public")
            .attribute("version", JsonValue::Number(2.0));
        assert!(opts.features.is_enabled(Feature::WrapRootValue));
        assert!(opts.views.contains("Public"));
        assert!(opts.attributes.contains_key("version"));
    }
}
