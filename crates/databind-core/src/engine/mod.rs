//! Transformation engine
//!
//! The two public entry-point pairs live here: [`serialize`]/[`stringify`]
//! for walking an object graph into JSON, and [`deserialize`]/[`parse`] for
//! binding JSON back into a graph. All engine state is per-call and carried
//! in a context struct; only the identity sequence counters are process
//! wide.

pub mod context;
pub(crate) mod creator;
pub mod de;
pub mod features;
pub(crate) mod identity;
pub mod ser;
pub(crate) mod types;

pub use context::{ClassOverride, DeOptions, FilterRule, SerOptions};
pub use de::{deserialize, parse};
pub use features::{Feature, FeatureSet};
pub use identity::reset_sequence;
pub use ser::{serialize, stringify};
