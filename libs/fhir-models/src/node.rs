//! The resource tree
//!
//! Every node is an immutable, reference-counted handle. Cloning a [`Node`] is a pointer
//! copy, and [`Node::ptr_eq`] tells whether two handles share the same subtree. Rewrites
//! build new nodes only along the path that changed and share everything else.

use crate::common::{ChoiceValue, Extension, Identifier, Primitive, Reference};
use crate::resource::Resource;
use std::sync::Arc;

/// A node in a resource tree - cheap to clone via Arc
#[derive(Debug, Clone)]
pub struct Node(Arc<NodeData>);

/// The closed set of node shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Primitive(Primitive),
    /// A record with ordered, named fields.
    Element(Element),
    /// An ordered list; duplicates are preserved.
    List(Vec<Node>),
    /// A tagged union. The owning field name is the stem (`value`, `onset`, ...).
    Choice(ChoiceValue),
    Reference(Reference),
    Identifier(Identifier),
    Extension(Extension),
    /// A contained resource.
    Resource(Resource),
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Node {
    pub fn new(data: NodeData) -> Self {
        Self(Arc::new(data))
    }

    pub fn data(&self) -> &NodeData {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn primitive(value: impl Into<Primitive>) -> Self {
        Self::new(NodeData::Primitive(value.into()))
    }

    pub fn string(value: &str) -> Self {
        Self::primitive(value)
    }

    pub fn element(element: Element) -> Self {
        Self::new(NodeData::Element(element))
    }

    pub fn list(items: Vec<Node>) -> Self {
        Self::new(NodeData::List(items))
    }

    pub fn choice(value: ChoiceValue) -> Self {
        Self::new(NodeData::Choice(value))
    }

    pub fn reference(reference: Reference) -> Self {
        Self::new(NodeData::Reference(reference))
    }

    pub fn identifier(identifier: Identifier) -> Self {
        Self::new(NodeData::Identifier(identifier))
    }

    pub fn extension(extension: Extension) -> Self {
        Self::new(NodeData::Extension(extension))
    }

    pub fn resource(resource: Resource) -> Self {
        Self::new(NodeData::Resource(resource))
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self.data() {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self.data() {
            NodeData::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self.data() {
            NodeData::Reference(r) => Some(r),
            NodeData::Choice(choice) => choice.as_reference(),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self.data() {
            NodeData::Identifier(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_extension(&self) -> Option<&Extension> {
        match self.data() {
            NodeData::Extension(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.data() {
            NodeData::Primitive(p) => p.as_str(),
            _ => None,
        }
    }
}

/// A record: ordered `(name, value)` pairs.
///
/// Order is the wire order, so decode followed by encode reproduces the input layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    fields: Vec<(Arc<str>, Node)>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<(Arc<str>, Node)>) -> Self {
        Self { fields }
    }

    /// Builder-style insert. Replaces an existing field of the same name in place.
    pub fn with(mut self, name: &str, value: Node) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: Node) {
        match self.fields.iter_mut().find(|(n, _)| n.as_ref() == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((Arc::from(name), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.fields
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(Arc<str>, Node)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
