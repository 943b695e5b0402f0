//! Resources: the roots of resource trees

use crate::common::Identifier;
use crate::error::Result;
use crate::json;
use crate::node::{Element, Node, NodeData};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// A FHIR resource - cheap to clone via Arc
#[derive(Debug, Clone)]
pub struct Resource(Arc<ResourceData>);

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData {
    pub resource_type: Arc<str>,
    /// Logical id. The only resource-level scalar that is tenant-scoped.
    pub id: Option<Arc<str>>,
    /// Everything except `resourceType` and `id`, in wire order.
    pub fields: Element,
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Resource {
    pub fn new(resource_type: &str, id: Option<&str>, fields: Element) -> Self {
        Self::from_data(ResourceData {
            resource_type: Arc::from(resource_type),
            id: id.map(Arc::from),
            fields,
        })
    }

    pub fn from_data(data: ResourceData) -> Self {
        Self(Arc::new(data))
    }

    pub fn data(&self) -> &ResourceData {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn resource_type(&self) -> &str {
        &self.0.resource_type
    }

    pub fn id(&self) -> Option<&str> {
        self.0.id.as_deref()
    }

    pub fn fields(&self) -> &Element {
        &self.0.fields
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.0.fields.get(name)
    }

    /// The top-level `identifier` collection.
    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        let nodes: &[Node] = match self.get("identifier") {
            Some(node) => match node.data() {
                NodeData::List(items) => items,
                NodeData::Identifier(_) => std::slice::from_ref(node),
                _ => &[],
            },
            None => &[],
        };
        nodes.iter().filter_map(Node::as_identifier)
    }

    /// `(resourceType, id)`, the de-duplication key for search results.
    pub fn key(&self) -> Option<ResourceKey> {
        Some(ResourceKey {
            resource_type: self.0.resource_type.clone(),
            id: self.0.id.clone()?,
        })
    }

    /// Build a resource from FHIR JSON. Rejects shapes the tree cannot represent.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        json::decode_resource(value, "$")
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(input)?;
        Self::from_json(&value)
    }

    pub fn to_json(&self) -> JsonValue {
        json::encode_resource(self)
    }
}

/// Identity of a resource within one server: `(resourceType, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub resource_type: Arc<str>,
    pub id: Arc<str>,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}
