//! Structural walker
//!
//! Bottom-up traversal over a resource tree that applies a [`LeafTransform`] to the
//! tenant-scoped leaves (resource ids and reference strings) and rebuilds only the
//! path above a leaf that actually changed. Every composite whose children are all
//! unchanged is returned as the original handle, so `ptr_eq` holds for untouched
//! subtrees.
//!
//! Leaf-type walkers (`walk_reference`, `walk_identifier`, ...) return `Some(rewritten)`
//! when something changed and `None` otherwise. The handle-level walkers
//! ([`walk_node`], [`walk_resource`]) always return a value paired with the flag.

use interop_models::{
    ChoiceValue, Element, Extension, Identifier, Node, NodeData, Reference, Resource,
    ResourceData,
};
use std::sync::Arc;

/// Rewrites tenant-scoped leaves. `None` means "leave as is".
pub trait LeafTransform {
    /// A resource's logical id.
    fn resource_id(&self, id: &str) -> Option<Arc<str>>;

    /// A literal reference string (`Reference.reference`).
    fn reference(&self, reference: &str) -> Option<Arc<str>>;
}

/// A walked value and whether anything beneath it changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Walked<T> {
    pub value: T,
    pub changed: bool,
}

impl<T> Walked<T> {
    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            changed: false,
        }
    }

    pub fn changed(value: T) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    pub fn into_pair(self) -> (T, bool) {
        (self.value, self.changed)
    }
}

/// Walk any node.
pub fn walk_node<T: LeafTransform + ?Sized>(node: &Node, transform: &T) -> Walked<Node> {
    let rewritten = match node.data() {
        NodeData::Primitive(_) => None,
        NodeData::Element(element) => walk_element(element, transform).map(Node::element),
        NodeData::List(items) => walk_list(items, transform).map(Node::list),
        NodeData::Choice(choice) => walk_choice(choice, transform).map(Node::choice),
        NodeData::Reference(reference) => {
            walk_reference(reference, transform).map(Node::reference)
        }
        NodeData::Identifier(identifier) => {
            walk_identifier(identifier, transform).map(Node::identifier)
        }
        NodeData::Extension(extension) => {
            walk_extension(extension, transform).map(Node::extension)
        }
        NodeData::Resource(contained) => walk_contained(contained, transform).map(Node::resource),
    };

    match rewritten {
        Some(node) => Walked::changed(node),
        None => Walked::unchanged(node.clone()),
    }
}

/// Walk a root resource: its id and every field.
pub fn walk_resource<T: LeafTransform + ?Sized>(
    resource: &Resource,
    transform: &T,
) -> Walked<Resource> {
    let data = resource.data();
    let id = data.id.as_deref().and_then(|id| transform.resource_id(id));
    let fields = walk_element(&data.fields, transform);

    if id.is_none() && fields.is_none() {
        return Walked::unchanged(resource.clone());
    }

    Walked::changed(Resource::from_data(ResourceData {
        resource_type: data.resource_type.clone(),
        id: id.or_else(|| data.id.clone()),
        fields: fields.unwrap_or_else(|| data.fields.clone()),
    }))
}

/// Contained resources keep their id: it is local to the container and `#id`
/// references to it must keep resolving.
fn walk_contained<T: LeafTransform + ?Sized>(resource: &Resource, transform: &T) -> Option<Resource> {
    let data = resource.data();
    let fields = walk_element(&data.fields, transform)?;
    Some(Resource::from_data(ResourceData {
        resource_type: data.resource_type.clone(),
        id: data.id.clone(),
        fields,
    }))
}

pub fn walk_element<T: LeafTransform + ?Sized>(element: &Element, transform: &T) -> Option<Element> {
    walk_named(element.fields(), transform).map(Element::from_fields)
}

/// Walk a list. Order and duplicates are preserved.
pub fn walk_list<T: LeafTransform + ?Sized>(items: &[Node], transform: &T) -> Option<Vec<Node>> {
    rewrite_all(items, |item| {
        let walked = walk_node(item, transform);
        walked.changed.then_some(walked.value)
    })
}

/// Walk the active case of a tagged union. Scalar cases are never touched.
pub fn walk_choice<T: LeafTransform + ?Sized>(
    choice: &ChoiceValue,
    transform: &T,
) -> Option<ChoiceValue> {
    match choice {
        ChoiceValue::Boolean(_)
        | ChoiceValue::Integer(..)
        | ChoiceValue::Decimal(_)
        | ChoiceValue::Text(..) => None,
        ChoiceValue::Complex(ty, node) => {
            let walked = walk_node(node, transform);
            walked
                .changed
                .then(|| ChoiceValue::Complex(*ty, walked.value))
        }
        ChoiceValue::Identifier(identifier) => walk_identifier(identifier, transform)
            .map(|i| ChoiceValue::Identifier(Arc::new(i))),
        ChoiceValue::Reference(reference) => walk_reference(reference, transform)
            .map(|r| ChoiceValue::Reference(Arc::new(r))),
    }
}

/// Walk a reference: the literal string, the logical identifier, and extensions.
///
/// `type` and `display` are copied verbatim.
pub fn walk_reference<T: LeafTransform + ?Sized>(
    reference: &Reference,
    transform: &T,
) -> Option<Reference> {
    let literal = reference
        .reference
        .as_deref()
        .and_then(|r| transform.reference(r));
    let identifier = reference
        .identifier
        .as_deref()
        .and_then(|i| walk_identifier(i, transform));
    let extensions = walk_extensions(&reference.extensions, transform);
    let companions = walk_named(&reference.companions, transform);

    if literal.is_none() && identifier.is_none() && extensions.is_none() && companions.is_none()
    {
        return None;
    }

    Some(Reference {
        element_id: reference.element_id.clone(),
        extensions: extensions.unwrap_or_else(|| reference.extensions.clone()),
        reference: literal.or_else(|| reference.reference.clone()),
        type_: reference.type_.clone(),
        identifier: identifier
            .map(Arc::new)
            .or_else(|| reference.identifier.clone()),
        display: reference.display.clone(),
        companions: companions.unwrap_or_else(|| reference.companions.clone()),
        wire_order: reference.wire_order.clone(),
    })
}

/// Walk an identifier. `system` and `value` are business keys and never rewritten;
/// only nested references (the assigner) and extensions can change.
pub fn walk_identifier<T: LeafTransform + ?Sized>(
    identifier: &Identifier,
    transform: &T,
) -> Option<Identifier> {
    let extensions = walk_extensions(&identifier.extensions, transform);
    let type_ = walk_optional(identifier.type_.as_ref(), transform);
    let period = walk_optional(identifier.period.as_ref(), transform);
    let assigner = identifier
        .assigner
        .as_deref()
        .and_then(|a| walk_reference(a, transform));
    let companions = walk_named(&identifier.companions, transform);

    if extensions.is_none()
        && type_.is_none()
        && period.is_none()
        && assigner.is_none()
        && companions.is_none()
    {
        return None;
    }

    Some(Identifier {
        element_id: identifier.element_id.clone(),
        extensions: extensions.unwrap_or_else(|| identifier.extensions.clone()),
        use_: identifier.use_.clone(),
        type_: type_.or_else(|| identifier.type_.clone()),
        system: identifier.system.clone(),
        value: identifier.value.clone(),
        period: period.or_else(|| identifier.period.clone()),
        assigner: assigner.map(Arc::new).or_else(|| identifier.assigner.clone()),
        companions: companions.unwrap_or_else(|| identifier.companions.clone()),
        wire_order: identifier.wire_order.clone(),
    })
}

/// Walk an extension: its value and nested extensions. The url is never rewritten.
pub fn walk_extension<T: LeafTransform + ?Sized>(
    extension: &Extension,
    transform: &T,
) -> Option<Extension> {
    let extensions = walk_extensions(&extension.extensions, transform);
    let value = extension
        .value
        .as_ref()
        .and_then(|v| walk_choice(v, transform));
    let companions = walk_named(&extension.companions, transform);

    if extensions.is_none() && value.is_none() && companions.is_none() {
        return None;
    }

    Some(Extension {
        element_id: extension.element_id.clone(),
        url: extension.url.clone(),
        extensions: extensions.unwrap_or_else(|| extension.extensions.clone()),
        value: value.or_else(|| extension.value.clone()),
        companions: companions.unwrap_or_else(|| extension.companions.clone()),
        wire_order: extension.wire_order.clone(),
    })
}

fn walk_extensions<T: LeafTransform + ?Sized>(
    extensions: &[Extension],
    transform: &T,
) -> Option<Vec<Extension>> {
    rewrite_all(extensions, |e| walk_extension(e, transform))
}

fn walk_optional<T: LeafTransform + ?Sized>(node: Option<&Node>, transform: &T) -> Option<Node> {
    let walked = walk_node(node?, transform);
    walked.changed.then_some(walked.value)
}

fn walk_named<T: LeafTransform + ?Sized>(
    fields: &[(Arc<str>, Node)],
    transform: &T,
) -> Option<Vec<(Arc<str>, Node)>> {
    rewrite_all(fields, |(name, node)| {
        let walked = walk_node(node, transform);
        walked.changed.then(|| (name.clone(), walked.value))
    })
}

/// Apply `rewrite` to every item. Allocates only once the first item changes;
/// returns `None` when none did.
fn rewrite_all<I: Clone>(items: &[I], mut rewrite: impl FnMut(&I) -> Option<I>) -> Option<Vec<I>> {
    let mut out: Option<Vec<I>> = None;
    for (index, item) in items.iter().enumerate() {
        let rewritten = rewrite(item);
        if let Some(acc) = out.as_mut() {
            acc.push(rewritten.unwrap_or_else(|| item.clone()));
        } else if let Some(new) = rewritten {
            let mut acc = Vec::with_capacity(items.len());
            acc.extend_from_slice(&items[..index]);
            acc.push(new);
            out = Some(acc);
        }
    }
    out
}
