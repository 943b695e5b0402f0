//! Tenant localization of FHIR resource trees
//!
//! - [`walker`]: a generic bottom-up traversal driven by a [`LeafTransform`]
//! - [`localizer`]: the tenant-scoping transform and the [`Localize`] entry points
//!
//! ```rust
//! use interop_localize::Localize;
//! use interop_models::{Resource, Tenant};
//! use serde_json::json;
//!
//! let tenant = Tenant::new("mda").unwrap();
//! let observation = Resource::from_json(&json!({
//!     "resourceType": "Observation",
//!     "id": "E123",
//!     "subject": {"reference": "Patient/E123"}
//! }))
//! .unwrap();
//!
//! let localized = observation.localize(&tenant);
//! assert_eq!(localized.id(), Some("mda-E123"));
//! ```

pub mod localizer;
pub mod walker;

pub use localizer::{localize, localize_id, localize_pair, localize_reference, Localize, Localizer};
pub use walker::{walk_node, walk_resource, LeafTransform, Walked};
