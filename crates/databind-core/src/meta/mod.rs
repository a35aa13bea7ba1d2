//! Metadata store
//!
//! Maps class names to declaration-derived [`ClassMeta`]. Populated by
//! explicit registration calls at startup, queried (never mutated) by the
//! transformers, so concurrent calls against one store are safe.

use crate::{BindError, BindResult};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub mod annotation;
pub mod class;

pub use annotation::{
    Annotation, CreatorMode, CreatorParam, CreatorSpec, Format, IdScheme, IdentityInfo, Include,
    NameTransform, TypeInfoCfg, TypeInfoMode,
};
pub use class::{ClassMeta, MemberMeta, TypeDesc};

/// Registry of class metadata
#[derive(Default, Clone)]
pub struct MetaStore {
    classes: FxHashMap<String, Arc<ClassMeta>>,
}

impl MetaStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; later registrations replace earlier ones
    pub fn register(&mut self, meta: ClassMeta) {
        self.classes.insert(meta.name.clone(), Arc::new(meta));
    }

    /// Get a class's metadata by name
    pub fn class(&self, name: &str) -> Option<Arc<ClassMeta>> {
        self.classes.get(name).cloned()
    }

    /// Check if a class is registered
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// The ordered member list of a class
    pub fn members(&self, class: &str) -> BindResult<Vec<MemberMeta>> {
        Ok(self.require(class)?.members.clone())
    }

    /// Annotation records for a class, or for one of its members
    pub fn annotations(&self, class: &str, member: Option<&str>) -> BindResult<Vec<Annotation>> {
        let meta = self.require(class)?;
        match member {
            None => Ok(meta.annotations.clone()),
            Some(name) => meta
                .member_meta(name)
                .map(|m| m.annotations.clone())
                .ok_or_else(|| {
                    BindError::Config(format!(
                        "Class '{}' has no member '{}'",
                        class, name
                    ))
                }),
        }
    }

    pub(crate) fn require(&self, name: &str) -> BindResult<Arc<ClassMeta>> {
        self.class(name)
            .ok_or_else(|| BindError::Config(format!("Class '{}' is not registered", name)))
    }
}
