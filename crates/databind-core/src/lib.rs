//! Metadata-driven JSON databinding engine
//!
//! This crate converts between in-memory object graphs and JSON text, driven
//! by per-class and per-member metadata rather than hand-written code per
//! type:
//! - Dynamic value model (instances, arrays, maps, scalars)
//! - JSON value tree with parser and writer
//! - Metadata store populated by explicit registration
//! - Paired serialization/deserialization transformers
//! - Object identity, reference sharing and circular graphs
//! - Polymorphic type resolution and creator-based construction

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod engine;
pub mod json;
pub mod meta;
pub mod value;

pub use engine::{
    deserialize, parse, reset_sequence, serialize, stringify, DeOptions, Feature, FeatureSet,
    FilterRule, SerOptions,
};
pub use json::JsonValue;
pub use meta::{
    Annotation, ClassMeta, CreatorMode, CreatorParam, CreatorSpec, Format, IdScheme, IdentityInfo,
    Include, MemberMeta, MetaStore, NameTransform, TypeDesc, TypeInfoCfg, TypeInfoMode,
};
pub use value::{Instance, ObjRef, Value};

/// Maximum nesting depth for the JSON parser (prevents stack overflow on
/// pathological documents).
pub(crate) const MAX_DEPTH: usize = 200;

/// Maximum recursion depth for the transformers. Much lower than the
/// parser's limit: a transformer level spans several large stack frames, so
/// the guard must trip well before the stack does.
pub(crate) const MAX_BIND_DEPTH: usize = 64;

/// Databinding errors
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// JSON text is not syntactically valid
    #[error("JSON syntax error: {0}")]
    Syntax(String),

    /// Metadata is inconsistent (duplicate unique annotation, incompatible
    /// annotation combination, missing registered codec)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document or graph shape does not match the metadata, and the
    /// corresponding fail-fast feature is enabled
    #[error("Data shape error: {0}")]
    Shape(String),

    /// Recursion exceeded the engine's nesting limit
    #[error("Maximum nesting depth exceeded")]
    DepthExceeded,
}

/// Databinding result
pub type BindResult<T> = Result<T, BindError>;
