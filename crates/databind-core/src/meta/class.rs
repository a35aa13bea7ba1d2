//! Class and member metadata
//!
//! Declaration-derived descriptions of classes: an ordered member list with
//! declared type descriptors, plus class-level and per-member annotation
//! records. Everything here is built once at registration time and read
//! (never mutated) by the transformers.

use crate::meta::annotation::{
    Annotation, CreatorSpec, Format, IdentityInfo, Include, NameTransform, TypeInfoCfg,
};
use crate::value::Value;
use crate::{BindError, BindResult};
use indexmap::IndexMap;

/// Declared type descriptor for a member or creator parameter
///
/// Supplied at registration time; the engine has no runtime reflection, so
/// this is the only source of static type knowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    /// Untyped: JSON shape maps directly onto the value model
    Any,
    /// Boolean
    Bool,
    /// Number
    Number,
    /// String
    String,
    /// Array with the given element type
    Array(Box<TypeDesc>),
    /// String-keyed map with the given value type
    Map(Box<TypeDesc>),
    /// Instance of the named registered class
    Class(String),
}

impl TypeDesc {
    /// Array-of helper
    pub fn array_of(element: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(element))
    }

    /// Map-of helper
    pub fn map_of(value: TypeDesc) -> Self {
        TypeDesc::Map(Box::new(value))
    }

    /// Class-reference helper
    pub fn class(name: impl Into<String>) -> Self {
        TypeDesc::Class(name.into())
    }

    /// The class name, if this describes a class reference
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeDesc::Class(name) => Some(name),
            _ => None,
        }
    }

    /// The type's zero value, used for null substitution
    pub fn zero_value(&self) -> Value {
        match self {
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::Number => Value::Number(0.0),
            TypeDesc::String => Value::String(String::new()),
            TypeDesc::Array(_) => Value::Array(Vec::new()),
            TypeDesc::Map(_) => Value::Map(IndexMap::new()),
            TypeDesc::Any | TypeDesc::Class(_) => Value::Null,
        }
    }
}

/// Metadata for one member
#[derive(Debug, Clone)]
pub struct MemberMeta {
    /// Canonical member name (the instance field key)
    pub name: String,
    /// Declared type
    pub ty: TypeDesc,
    /// Annotation records attached to this member
    pub annotations: Vec<Annotation>,
}

impl MemberMeta {
    /// Member with no annotations
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
        }
    }

    /// Attach an annotation (chainable)
    pub fn with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// The JSON property name: explicit name, else the naming-strategy
    /// transform of the canonical name, else the canonical name
    pub fn json_name(&self, naming: Option<NameTransform>) -> String {
        for a in &self.annotations {
            if let Annotation::Name(name) = a {
                return name.clone();
            }
        }
        match naming {
            Some(transform) => transform.apply(&self.name),
            None => self.name.clone(),
        }
    }

    /// Accepted alternative incoming names
    pub fn aliases(&self) -> &[String] {
        for a in &self.annotations {
            if let Annotation::Alias(names) = a {
                return names;
            }
        }
        &[]
    }

    /// Whether the member is excluded from (de)serialization entirely
    pub fn is_ignored(&self) -> bool {
        self.annotations.iter().any(|a| matches!(a, Annotation::Ignore))
    }

    /// Member-level inclusion policy
    pub fn include(&self) -> Option<&Include> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Include(policy) => Some(policy),
            _ => None,
        })
    }

    /// View names, if the member is view-restricted
    pub fn views(&self) -> Option<&[String]> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Views(names) => Some(names.as_slice()),
            _ => None,
        })
    }

    /// Output format override
    pub fn format(&self) -> Option<Format> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Format(f) => Some(*f),
            _ => None,
        })
    }

    /// Relation name if this is the managed side of a reference pair
    pub fn managed_ref(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::ManagedRef(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Relation name if this is the back side of a reference pair
    pub fn back_ref(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::BackRef(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Custom serializer codec id
    pub fn serialize_with(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::SerializeWith(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Custom deserializer codec id
    pub fn deserialize_with(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::DeserializeWith(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Whether the member's string value is written unquoted
    pub fn is_raw(&self) -> bool {
        self.annotations.iter().any(|a| matches!(a, Annotation::RawValue))
    }

    /// Unwrap prefix/suffix, if this member is unwrapped into its parent
    pub fn unwrapped(&self) -> Option<(&str, &str)> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Unwrapped { prefix, suffix } => Some((prefix.as_str(), suffix.as_str())),
            _ => None,
        })
    }

    /// Injectable-value key, if the member is injected rather than read
    /// from the document
    pub fn inject(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Inject(key) => Some(key.as_str()),
            _ => None,
        })
    }

    /// Whether this member is the class's any-getter
    pub fn is_any_getter(&self) -> bool {
        self.annotations.iter().any(|a| matches!(a, Annotation::AnyGetter))
    }

    /// Whether this member is the class's any-setter
    pub fn is_any_setter(&self) -> bool {
        self.annotations.iter().any(|a| matches!(a, Annotation::AnySetter))
    }
}

/// Metadata for one class
#[derive(Debug, Clone)]
pub struct ClassMeta {
    /// Registered class name
    pub name: String,
    /// Members, in declaration order
    pub members: Vec<MemberMeta>,
    /// Class-level annotation records
    pub annotations: Vec<Annotation>,
}

impl ClassMeta {
    /// Class with no members or annotations
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Append a member (chainable)
    pub fn member(mut self, member: MemberMeta) -> Self {
        self.members.push(member);
        self
    }

    /// Attach a class-level annotation (chainable)
    pub fn with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Look up a member by canonical name
    pub fn member_meta(&self, name: &str) -> Option<&MemberMeta> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Identity-info configuration
    pub fn identity(&self) -> Option<&IdentityInfo> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Identity(info) => Some(info),
            _ => None,
        })
    }

    /// Polymorphic type-info configuration
    pub fn type_info(&self) -> Option<&TypeInfoCfg> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::TypeInfo(cfg) => Some(cfg),
            _ => None,
        })
    }

    /// Declared subtype table entries, `(logical name, class name)`
    pub fn subtypes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.annotations.iter().filter_map(|a| match a {
            Annotation::Subtype { name, class } => Some((name.as_str(), class.as_str())),
            _ => None,
        })
    }

    /// Class-level naming strategy
    pub fn naming(&self) -> Option<NameTransform> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Naming(transform) => Some(*transform),
            _ => None,
        })
    }

    /// Explicit property ordering
    pub fn property_order(&self) -> Option<&[String]> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::PropertyOrder(names) => Some(names.as_slice()),
            _ => None,
        })
    }

    /// Root name for root wrapping/unwrapping: explicit, else the class name
    pub fn root_name(&self) -> &str {
        self.annotations
            .iter()
            .find_map(|a| match a {
                Annotation::RootName(name) => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or(&self.name)
    }

    /// Named serialization filter id
    pub fn filter_id(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Filter(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Class-level default inclusion policy
    pub fn include_default(&self) -> Option<&Include> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Include(policy) => Some(policy),
            _ => None,
        })
    }

    /// Class-level custom serializer codec id
    pub fn serialize_with(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::SerializeWith(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Class-level custom deserializer codec id
    pub fn deserialize_with(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::DeserializeWith(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Declared creators
    pub fn creators(&self) -> impl Iterator<Item = &CreatorSpec> {
        self.annotations.iter().filter_map(|a| match a {
            Annotation::Creator(spec) => Some(spec),
            _ => None,
        })
    }

    /// Append virtual properties, `(name, attribute key, prepend)`
    pub fn appends(&self) -> impl Iterator<Item = (&str, &str, bool)> {
        self.annotations.iter().filter_map(|a| match a {
            Annotation::Append { name, attr, prepend } => {
                Some((name.as_str(), attr.as_str(), *prepend))
            }
            _ => None,
        })
    }

    /// The class's any-getter member, enforcing uniqueness
    pub fn any_getter(&self) -> BindResult<Option<&MemberMeta>> {
        let mut found = None;
        for m in &self.members {
            if m.is_any_getter() {
                if found.is_some() {
                    return Err(BindError::Config(format!(
                        "Duplicate any-getter on class '{}'",
                        self.name
                    )));
                }
                found = Some(m);
            }
        }
        Ok(found)
    }

    /// The class's any-setter member, enforcing uniqueness
    pub fn any_setter(&self) -> BindResult<Option<&MemberMeta>> {
        let mut found = None;
        for m in &self.members {
            if m.is_any_setter() {
                if found.is_some() {
                    return Err(BindError::Config(format!(
                        "Duplicate any-setter on class '{}'",
                        self.name
                    )));
                }
                found = Some(m);
            }
        }
        Ok(found)
    }

    /// The back-reference member for a relation name, enforcing at most one
    /// per relation
    pub fn back_ref_member(&self, relation: &str) -> BindResult<Option<&MemberMeta>> {
        let mut found = None;
        for m in &self.members {
            if m.back_ref() == Some(relation) {
                if found.is_some() {
                    return Err(BindError::Config(format!(
                        "Duplicate back reference '{}' on class '{}'",
                        relation, self.name
                    )));
                }
                found = Some(m);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert_eq!(TypeDesc::Bool.zero_value(), Value::Bool(false));
        assert_eq!(TypeDesc::Number.zero_value(), Value::Number(0.0));
        assert_eq!(TypeDesc::String.zero_value(), Value::String(String::new()));
        assert!(TypeDesc::class("User").zero_value().is_null());
    }

    #[test]
    fn test_json_name_resolution() {
        let m = MemberMeta::new("firstName", TypeDesc::String);
        assert_eq!(m.json_name(None), "firstName");
        assert_eq!(m.json_name(Some(NameTransform::Snake)), "first_name");

        let named = MemberMeta::new("firstName", TypeDesc::String)
            .with(Annotation::Name("fn".to_string()));
        // Explicit name wins over the strategy
        assert_eq!(named.json_name(Some(NameTransform::Snake)), "fn");
    }

    #[test]
    fn test_duplicate_any_getter_is_config_error() {
        let meta = ClassMeta::new("Bag")
            .member(MemberMeta::new("a", TypeDesc::map_of(TypeDesc::Any)).with(Annotation::AnyGetter))
            .member(MemberMeta::new("b", TypeDesc::map_of(TypeDesc::Any)).with(Annotation::AnyGetter));
        assert!(matches!(meta.any_getter(), Err(BindError::Config(_))));
    }

    #[test]
    fn test_duplicate_back_ref_is_config_error() {
        let meta = ClassMeta::new("Child")
            .member(
                MemberMeta::new("a", TypeDesc::class("Parent"))
                    .with(Annotation::BackRef("owner".to_string())),
            )
            .member(
                MemberMeta::new("b", TypeDesc::class("Parent"))
                    .with(Annotation::BackRef("owner".to_string())),
            );
        assert!(matches!(
            meta.back_ref_member("owner"),
            Err(BindError::Config(_))
        ));
        assert!(meta.back_ref_member("other").unwrap().is_none());
    }

    #[test]
    fn test_root_name_default() {
        let meta = ClassMeta::new("User");
        assert_eq!(meta.root_name(), "User");
        let named = ClassMeta::new("User").with(Annotation::RootName("user".to_string()));
        assert_eq!(named.root_name(), "user");
    }
}
