//! FHIR resource trees for tenant-scoped ingestion
//!
//! This crate provides the immutable data model the ingestion core works on.
//!
//! # Module Organization
//!
//! - `common`: datatypes with tenant-relevant semantics (references, identifiers,
//!   extensions and the closed `value[x]` union) plus scalar primitives
//! - `node`: the generic tree ([`Node`], [`Element`])
//! - `resource`: tree roots ([`Resource`])
//! - `bundle`: search result pages ([`Page`])
//! - `tenant`: the scoping mnemonic ([`Tenant`])
//!
//! # Design Philosophy
//!
//! - **Immutable**: nodes are never mutated; rewrites produce new nodes
//! - **Structurally shared**: every node is an `Arc`, unchanged subtrees are shared
//!   and identity is observable through `ptr_eq`
//! - **Closed**: node shapes and choice cases are exhaustive enums
//! - **Eager**: JSON is decoded once at the boundary, malformed shapes are rejected there
//!
//! # Example
//!
//! ```rust
//! use interop_models::Resource;
//! use serde_json::json;
//!
//! let patient = Resource::from_json(&json!({
//!     "resourceType": "Patient",
//!     "id": "E123",
//!     "identifier": [{"system": "urn:oid:1.2.840", "value": "MRN1"}],
//!     "generalPractitioner": [{"reference": "Practitioner/P9"}]
//! }))
//! .unwrap();
//!
//! assert_eq!(patient.id(), Some("E123"));
//! assert_eq!(patient.identifiers().count(), 1);
//! ```

pub mod bundle;
pub mod common;
mod error;
mod json;
pub mod node;
pub mod resource;
pub mod tenant;

pub use bundle::{Link, Page, RELATION_NEXT};
pub use common::*;
pub use error::{ModelError, Result};
pub use node::{Element, Node, NodeData};
pub use resource::{Resource, ResourceData, ResourceKey};
pub use tenant::Tenant;
