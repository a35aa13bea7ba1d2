//! Identity resolver
//!
//! Assigns and looks up object identifiers for reference sharing and
//! circular structures. Scope tables live for one top-level call; the only
//! state that survives calls is the process-wide sequence-counter table,
//! which backs the `Sequence` generator and is the engine's single required
//! synchronization point.

use crate::json::JsonValue;
use crate::meta::{IdScheme, IdentityInfo};
use crate::value::{Instance, ObjRef, Value};
use crate::{BindError, BindResult};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;
use uuid::Uuid;

/// Process-wide sequence counters, keyed by scope name
static SEQUENCES: Lazy<Mutex<FxHashMap<String, u64>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// Next value of the process-wide sequential-id counter for a scope
pub fn next_sequence(scope: &str) -> u64 {
    let mut counters = SEQUENCES.lock();
    let counter = counters.entry(scope.to_string()).or_insert(0);
    *counter += 1;
    *counter
}

/// Reset the sequential-id counter for a scope
///
/// Sequence counters are never reset implicitly; tests and callers that
/// need reproducible ids do it explicitly.
pub fn reset_sequence(scope: &str) {
    SEQUENCES.lock().remove(scope);
}

/// Hashable form of a scalar object id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum IdKey {
    /// Numeric id, stored as raw bits
    Num(u64),
    /// Textual id
    Text(String),
    /// Boolean id (legal but unusual)
    Flag(bool),
}

impl IdKey {
    /// Build a key from a scalar JSON id value
    pub fn from_json(value: &JsonValue) -> Option<IdKey> {
        match value {
            JsonValue::Number(n) => Some(IdKey::Num(n.to_bits())),
            JsonValue::String(s) => Some(IdKey::Text(s.clone())),
            JsonValue::Bool(b) => Some(IdKey::Flag(*b)),
            _ => None,
        }
    }

    /// Human-readable form for error messages
    pub fn display(&self) -> String {
        match self {
            IdKey::Num(bits) => format!("{}", f64::from_bits(*bits)),
            IdKey::Text(s) => s.clone(),
            IdKey::Flag(b) => format!("{}", b),
        }
    }
}

/// Serialization-side scope table: objects already written, by identity
#[derive(Default)]
pub(crate) struct IdentityScopes {
    seen: FxHashMap<(String, usize), JsonValue>,
    /// Per-call counters feeding the name input of the v3/v5 generators
    name_counters: FxHashMap<String, u64>,
}

impl IdentityScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id under which this object was already serialized in the scope,
    /// if any
    pub fn lookup(&self, scope: &str, obj: &ObjRef) -> Option<JsonValue> {
        self.seen
            .get(&(scope.to_string(), Rc::as_ptr(obj) as usize))
            .cloned()
    }

    /// Produce a fresh id for the object and register it in the scope
    pub fn assign(
        &mut self,
        info: &IdentityInfo,
        obj: &ObjRef,
        inst: &Instance,
    ) -> BindResult<JsonValue> {
        let id = self.produce(info, inst)?;
        self.seen.insert(
            (info.scope.clone(), Rc::as_ptr(obj) as usize),
            id.clone(),
        );
        Ok(id)
    }

    fn produce(&mut self, info: &IdentityInfo, inst: &Instance) -> BindResult<JsonValue> {
        match &info.scheme {
            IdScheme::Sequence => Ok(JsonValue::Number(next_sequence(&info.scope) as f64)),
            IdScheme::Property(member) => match inst.get(member) {
                Value::Number(n) => Ok(JsonValue::Number(n)),
                Value::String(s) => Ok(JsonValue::String(s)),
                Value::Bool(b) => Ok(JsonValue::Bool(b)),
                other => Err(BindError::Shape(format!(
                    "Identity property '{}' of class '{}' must hold a scalar, got {}",
                    member,
                    inst.class,
                    other.type_name()
                ))),
            },
            IdScheme::UuidV1 => {
                // Fixed zero node id; uniqueness within a scope comes from
                // the timestamp component
                Ok(JsonValue::String(Uuid::now_v1(&[0u8; 6]).to_string()))
            }
            IdScheme::UuidV4 => Ok(JsonValue::String(Uuid::new_v4().to_string())),
            IdScheme::UuidV3 { namespace } => {
                let ns = parse_namespace(namespace)?;
                let name = self.next_name(&info.scope);
                Ok(JsonValue::String(
                    Uuid::new_v3(&ns, name.as_bytes()).to_string(),
                ))
            }
            IdScheme::UuidV5 { namespace } => {
                let ns = parse_namespace(namespace)?;
                let name = self.next_name(&info.scope);
                Ok(JsonValue::String(
                    Uuid::new_v5(&ns, name.as_bytes()).to_string(),
                ))
            }
        }
    }

    /// Name input for the hashed UUID variants: scope-qualified per-call
    /// counter
    fn next_name(&mut self, scope: &str) -> String {
        let counter = self.name_counters.entry(scope.to_string()).or_insert(0);
        *counter += 1;
        format!("{}:{}", scope, counter)
    }
}

fn parse_namespace(namespace: &str) -> BindResult<Uuid> {
    Uuid::parse_str(namespace).map_err(|_| {
        BindError::Config(format!("Invalid UUID namespace '{}'", namespace))
    })
}

/// Deserialization-side scope table: constructed objects by id, plus ids
/// referenced before (or never) defined
#[derive(Default)]
pub(crate) struct ObjectIdTable {
    objects: FxHashMap<(String, IdKey), ObjRef>,
    pending: FxHashSet<(String, IdKey)>,
}

impl ObjectIdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a bare id reference. If the object is not yet constructed, a
    /// placeholder instance is registered; the full definition later fills
    /// the same cell, so every earlier reference resolves automatically.
    pub fn reference(&mut self, scope: &str, key: IdKey, class: &str) -> ObjRef {
        let table_key = (scope.to_string(), key);
        if let Some(existing) = self.objects.get(&table_key) {
            return existing.clone();
        }
        let placeholder = Instance::new(class).into_ref();
        self.pending.insert(table_key.clone());
        self.objects.insert(table_key, placeholder.clone());
        placeholder
    }

    /// Record the full definition for an id, adopting a placeholder if one
    /// exists. Returns the cell the caller must populate.
    pub fn define(&mut self, scope: &str, key: IdKey, class: &str) -> ObjRef {
        let table_key = (scope.to_string(), key);
        if let Some(existing) = self.objects.get(&table_key).cloned() {
            self.pending.remove(&table_key);
            existing.borrow_mut().class = class.to_string();
            return existing;
        }
        let cell = Instance::new(class).into_ref();
        self.objects.insert(table_key, cell.clone());
        cell
    }

    /// Ids referenced but never defined
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Display forms of the unresolved ids, for error reporting
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .pending
            .iter()
            .map(|(scope, key)| format!("{}#{}", scope, key.display()))
            .collect();
        ids.sort();
        ids
    }

    /// Pointers of the placeholder cells that remained unresolved
    pub fn unresolved_ptrs(&self) -> FxHashSet<usize> {
        self.pending
            .iter()
            .filter_map(|k| self.objects.get(k))
            .map(|rc| Rc::as_ptr(rc) as usize)
            .collect()
    }
}
