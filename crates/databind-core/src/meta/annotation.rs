//! Annotation records
//!
//! An annotation is a declarative (kind, options) record attached to a class
//! or a member at registration time. The engine only ever reads these; it
//! never mutates the store during traversal.

use crate::value::Value;
use crate::meta::TypeDesc;

/// Inclusion policy for a member value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Include {
    /// Always write the member
    Always,
    /// Skip when the value is null
    NonNull,
    /// Skip when the value is null, an empty string, or an empty collection
    NonEmpty,
    /// Skip when the value equals the declared type's zero value
    NonDefault,
    /// Consult the named predicate registered in the serialization options;
    /// `true` means suppress the member
    Custom(String),
}

/// Class-level property naming strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTransform {
    /// `firstName` -> `first_name`
    Snake,
    /// `firstName` -> `first-name`
    Kebab,
    /// `first_name` -> `firstName`
    Camel,
    /// `firstName` -> `first.name`
    Dot,
    /// `firstName` -> `firstname`
    Lower,
}

impl NameTransform {
    /// Apply the transform to a canonical member name
    pub fn apply(&self, name: &str) -> String {
        let words = split_words(name);
        match self {
            NameTransform::Snake => words.join("_"),
            NameTransform::Kebab => words.join("-"),
            NameTransform::Dot => words.join("."),
            NameTransform::Lower => words.concat(),
            NameTransform::Camel => {
                let mut out = String::new();
                for (i, word) in words.iter().enumerate() {
                    if i == 0 {
                        out.push_str(word);
                    } else {
                        let mut chars = word.chars();
                        if let Some(first) = chars.next() {
                            out.extend(first.to_uppercase());
                            out.push_str(chars.as_str());
                        }
                    }
                }
                out
            }
        }
    }
}

/// Split a member name into lowercase words at case boundaries and
/// separator characters
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == '.' {
            if !current.is_empty() {
                words.push(current.clone());
                current.clear();
            }
        } else if ch.is_uppercase() {
            if !current.is_empty() {
                words.push(current.clone());
                current.clear();
            }
            current.extend(ch.to_lowercase());
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// How a polymorphic type identifier is embedded in the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInfoMode {
    /// Inline property with the given name, e.g. `{"@type":"dog",...}`
    Property(String),
    /// Single-entry wrapper object, e.g. `{"dog":{...}}`
    WrapperObject,
    /// Two-element wrapper array, e.g. `["dog",{...}]`
    WrapperArray,
}

/// Polymorphic type-info configuration for a base class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfoCfg {
    /// Identifier placement
    pub mode: TypeInfoMode,
}

/// Object-id generator variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdScheme {
    /// Process-wide monotonically increasing counter, keyed by scope name
    Sequence,
    /// The id is the value of the named member; no generation
    Property(String),
    /// Time-and-node based UUID
    UuidV1,
    /// Name-based UUID over MD5
    UuidV3 {
        /// Namespace UUID, in string form
        namespace: String,
    },
    /// Random UUID
    UuidV4,
    /// Name-based UUID over SHA-1
    UuidV5 {
        /// Namespace UUID, in string form
        namespace: String,
    },
}

/// Identity-info configuration for a class participating in reference
/// sharing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityInfo {
    /// Identity scope name; ids are unique per scope, scopes are independent
    pub scope: String,
    /// JSON property name carrying a generated id (ignored for the
    /// `Property` scheme, whose member is serialized as itself)
    pub property: String,
    /// Generator variant
    pub scheme: IdScheme,
    /// `true`: full form is `{"id":<id>,"item":{...}}` and references are
    /// `{"id":<id>}`; `false`: the id is embedded as the first property and
    /// references are the bare id
    pub as_wrapper: bool,
}

impl IdentityInfo {
    /// Identity info with the default id property name `@id`
    pub fn new(scope: impl Into<String>, scheme: IdScheme) -> Self {
        Self {
            scope: scope.into(),
            property: "@id".to_string(),
            scheme,
            as_wrapper: false,
        }
    }
}

/// Per-member output format override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Write a numeric member as a JSON string
    NumberAsString,
    /// Write a boolean member as 0 / 1
    BoolAsNumber,
    /// Write a map member as an array of `[key, value]` entries
    MapAsEntries,
}

/// Creator binding mode
#[derive(Debug, Clone)]
pub enum CreatorMode {
    /// Each parameter is matched by name against incoming properties
    Properties(Vec<CreatorParam>),
    /// The entire incoming value is passed as the single argument
    Delegating(TypeDesc),
}

/// One constructor/factory parameter
#[derive(Debug, Clone)]
pub struct CreatorParam {
    /// Parameter name, matched against incoming property names
    pub name: String,
    /// Declared parameter type
    pub ty: TypeDesc,
    /// Missing-value handling: required parameters are fatal under
    /// `FailOnMissingCreatorProperties`
    pub required: bool,
    /// Default value used when the document and injectables have none
    pub default: Option<Value>,
    /// Injectable-value key consulted before the default
    pub inject: Option<String>,
}

impl CreatorParam {
    /// Required parameter with no default
    pub fn required(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            inject: None,
        }
    }

    /// Optional parameter with a default value
    pub fn optional(name: impl Into<String>, ty: TypeDesc, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: Some(default),
            inject: None,
        }
    }
}

/// A selectable creator (constructor/factory) declaration
#[derive(Debug, Clone)]
pub struct CreatorSpec {
    /// Optional creator name, matched against the per-call creator override
    pub name: Option<String>,
    /// Binding mode
    pub mode: CreatorMode,
}

/// A single annotation record
#[derive(Debug, Clone)]
pub enum Annotation {
    /// Explicit JSON property name for a member
    Name(String),
    /// Accepted alternative incoming names for a member
    Alias(Vec<String>),
    /// Inclusion policy (member-level, or class-level default)
    Include(Include),
    /// Member is never (de)serialized
    Ignore,
    /// View names this member belongs to
    Views(Vec<String>),
    /// Output format override
    Format(Format),
    /// Managed (forward) side of a named reference pair
    ManagedRef(String),
    /// Back side of a named reference pair: suppressed on output, restored
    /// by back-patching on input
    BackRef(String),
    /// Identity-info configuration (class-level)
    Identity(IdentityInfo),
    /// Polymorphic type-info configuration (class-level, on the base class)
    TypeInfo(TypeInfoCfg),
    /// Subtype table entry (class-level, on the base class, repeatable)
    Subtype {
        /// Logical type id emitted/read in documents
        name: String,
        /// Registered class the id maps to
        class: String,
    },
    /// Member or class uses the custom serializer registered under this id
    SerializeWith(String),
    /// Member or class uses the custom deserializer registered under this id
    DeserializeWith(String),
    /// Creator declaration (class-level, repeatable for named creators)
    Creator(CreatorSpec),
    /// The member's string value is spliced into the output unquoted
    RawValue,
    /// Class-level property naming strategy
    Naming(NameTransform),
    /// Explicit property ordering (class-level); listed members first
    PropertyOrder(Vec<String>),
    /// Virtual property sourced from the per-call attribute bag
    /// (class-level, repeatable)
    Append {
        /// Output property name
        name: String,
        /// Attribute-bag key
        attr: String,
        /// Insert before regular members instead of after
        prepend: bool,
    },
    /// Splice the member's own properties into the parent object
    Unwrapped {
        /// Prefix applied to the spliced property names
        prefix: String,
        /// Suffix applied to the spliced property names
        suffix: String,
    },
    /// Member holds an associative collection spliced as sibling properties
    /// on output; at most one per class
    AnyGetter,
    /// Member collects unmatched incoming properties; at most one per class
    AnySetter,
    /// Class participates in the named serialization filter
    Filter(String),
    /// Member value comes from the per-call injectable values, not the
    /// document
    Inject(String),
    /// Root name used by root wrapping/unwrapping (class-level)
    RootName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_transform_snake() {
        assert_eq!(NameTransform::Snake.apply("firstName"), "first_name");
        assert_eq!(NameTransform::Snake.apply("first_name"), "first_name");
    }

    #[test]
    fn test_name_transform_kebab() {
        assert_eq!(NameTransform::Kebab.apply("firstName"), "first-name");
    }

    #[test]
    fn test_name_transform_camel() {
        assert_eq!(NameTransform::Camel.apply("first_name"), "firstName");
        assert_eq!(NameTransform::Camel.apply("firstName"), "firstName");
    }

    #[test]
    fn test_name_transform_dot_and_lower() {
        assert_eq!(NameTransform::Dot.apply("firstName"), "first.name");
        assert_eq!(NameTransform::Lower.apply("firstName"), "firstname");
    }
}
