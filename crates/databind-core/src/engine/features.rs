//! Feature flags
//!
//! Boolean-valued switches controlling transformer behavior, grouped into
//! common, serialization-only and deserialization-only namespaces. Unset
//! flags use the documented defaults; a [`FeatureSet`] holds the per-call
//! overrides.

use rustc_hash::FxHashMap;

/// Engine feature flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    // --- serialization ---
    /// Wrap the root result in a single-entry object keyed by the root name
    WrapRootValue,
    /// Order properties alphabetically after explicit ordering
    SortPropertiesAlphabetically,
    /// Include members with no view annotation when a view is active
    /// (default: enabled)
    DefaultViewInclusion,
    /// Substitute the declared type's zero value for null members
    WriteNullAsDefault,
    /// Fail when a member directly references its own container and no
    /// identity info applies
    FailOnSelfReferences,
    /// Write such self-references as null instead
    WriteSelfReferencesAsNull,
    /// Write non-finite numbers as 0
    NonFiniteAsZero,
    /// Clamp non-finite numbers to the max/min safe integer (±2^53−1);
    /// NaN becomes 0
    NonFiniteClampSafeInt,
    /// Clamp non-finite numbers to ±f64::MAX; NaN becomes 0
    NonFiniteClampMax,

    // --- deserialization ---
    /// Expect the document wrapped in a single-entry object keyed by the
    /// root name
    UnwrapRootValue,
    /// Match incoming property names case-insensitively as a last resort
    AcceptCaseInsensitiveProperties,
    /// Fail on incoming properties that match no member (default: enabled)
    FailOnUnknownProperties,
    /// Fail when a required creator parameter has no value
    FailOnMissingCreatorProperties,
    /// Fail on a missing or unresolvable polymorphic type id
    /// (default: enabled)
    FailOnInvalidSubtype,
    /// Fail when object-id references remain unresolved at end of call
    /// (default: enabled)
    FailOnUnresolvedObjectIds,
    /// Fail on null for a boolean/number/string-typed target
    FailOnNullForPrimitives,
    /// Substitute the type's zero value for null scalar targets
    SetDefaultValueForPrimitivesOnNull,
    /// Accept matching textual JSON strings for numeric/boolean targets
    AllowCoercionOfScalars,
}

impl Feature {
    /// The documented default for this flag
    pub fn default_enabled(self) -> bool {
        matches!(
            self,
            Feature::DefaultViewInclusion
                | Feature::FailOnUnknownProperties
                | Feature::FailOnInvalidSubtype
                | Feature::FailOnUnresolvedObjectIds
        )
    }
}

/// Per-call feature overrides
#[derive(Debug, Default, Clone)]
pub struct FeatureSet {
    overrides: FxHashMap<Feature, bool>,
}

impl FeatureSet {
    /// Empty set: every flag at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a flag (chainable)
    pub fn enable(mut self, feature: Feature) -> Self {
        self.overrides.insert(feature, true);
        self
    }

    /// Disable a flag (chainable)
    pub fn disable(mut self, feature: Feature) -> Self {
        self.overrides.insert(feature, false);
        self
    }

    /// Effective state of a flag
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.overrides
            .get(&feature)
            .copied()
            .unwrap_or_else(|| feature.default_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let features = FeatureSet::new();
        assert!(features.is_enabled(Feature::FailOnUnknownProperties));
        assert!(features.is_enabled(Feature::DefaultViewInclusion));
        assert!(!features.is_enabled(Feature::WrapRootValue));
        assert!(!features.is_enabled(Feature::AllowCoercionOfScalars));
    }

    #[test]
    fn test_overrides() {
        let features = FeatureSet::new()
            .disable(Feature::FailOnUnknownProperties)
            .enable(Feature::WrapRootValue);
        assert!(!features.is_enabled(Feature::FailOnUnknownProperties));
        assert!(features.is_enabled(Feature::WrapRootValue));
    }
}
