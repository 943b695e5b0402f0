//! FHIR JSON ↔ resource tree conversion
//!
//! Trees are built eagerly at the boundary: after decoding, the tree is the only source
//! of truth and no consumer goes back to the raw payload. Datatypes are recognised by
//! the FHIR JSON conventions:
//!
//! - `resourceType` marks a (contained) resource
//! - `extension` / `modifierExtension` hold extensions
//! - objects under `identifier` are identifiers
//! - objects made only of Reference fields with a `reference` or `identifier` are references
//! - `<stem><Type>` keys for known choice stems are tagged unions (`valueReference`)
//!
//! Encoding replays the key order that was read. Datatypes built in code are written in
//! canonical FHIR order, and `resourceType`/`id` always lead a resource.

use crate::common::{
    is_choice_suffix, ChoiceValue, ComplexType, Extension, Identifier, IntegerType, Primitive,
    Reference, TextType, WireOrder,
};
use crate::error::{ModelError, Result};
use crate::node::{Element, Node, NodeData};
use crate::resource::{Resource, ResourceData};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::str::FromStr;
use std::sync::Arc;

const REFERENCE_KEYS: &[&str] = &["id", "extension", "reference", "type", "identifier", "display"];

/// Field stems that are declared as `[x]` choices in the core resources.
const CHOICE_STEMS: &[&str] = &[
    "value",
    "onset",
    "abatement",
    "effective",
    "occurrence",
    "deceased",
    "multipleBirth",
    "medication",
    "performed",
    "serviced",
    "timing",
    "born",
    "age",
    "product",
    "item",
    "answer",
    "asNeeded",
    "reported",
    "dose",
    "rate",
    "defaultValue",
    "fixed",
    "pattern",
];

// =============================================================================
// Decoding
// =============================================================================

pub(crate) fn decode_resource(value: &Value, path: &str) -> Result<Resource> {
    let obj = value
        .as_object()
        .ok_or_else(|| ModelError::malformed(path, "expected a JSON object for the resource"))?;
    decode_resource_object(obj, path)
}

fn decode_resource_object(obj: &Map<String, Value>, path: &str) -> Result<Resource> {
    let resource_type = match obj.get("resourceType") {
        Some(Value::String(s)) if !s.is_empty() => Arc::from(s.as_str()),
        Some(_) => {
            return Err(ModelError::malformed(
                path,
                "resourceType must be a non-empty string",
            ))
        }
        None => {
            return Err(ModelError::MissingResourceType {
                path: path.to_string(),
            })
        }
    };

    let id = match obj.get("id") {
        None => None,
        Some(Value::String(s)) => Some(Arc::from(s.as_str())),
        Some(_) => return Err(ModelError::malformed(format!("{path}.id"), "id must be a string")),
    };

    let mut fields = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        if key == "resourceType" || key == "id" {
            continue;
        }
        fields.push(decode_field(key, value, &format!("{path}.{key}"))?);
    }

    Ok(Resource::from_data(ResourceData {
        resource_type,
        id,
        fields: Element::from_fields(fields),
    }))
}

fn decode_field(key: &str, value: &Value, path: &str) -> Result<(Arc<str>, Node)> {
    if let Some((stem, suffix)) = split_choice_key(key) {
        let choice = decode_choice(suffix, value, path)?;
        return Ok((Arc::from(stem), Node::choice(choice)));
    }
    Ok((Arc::from(key), decode_keyed(key, value, path)?))
}

/// `valueReference` → `("value", "Reference")`. Only for known stems and case names.
fn split_choice_key(key: &str) -> Option<(&str, &str)> {
    CHOICE_STEMS.iter().find_map(|stem| {
        let suffix = key.strip_prefix(stem)?;
        let starts_upper = suffix.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        (starts_upper && is_choice_suffix(suffix)).then_some((*stem, suffix))
    })
}

/// Decode a value whose meaning depends on the key it sits under.
fn decode_keyed(key: &str, value: &Value, path: &str) -> Result<Node> {
    match value {
        Value::Array(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                nodes.push(decode_keyed(key, item, &format!("{path}[{i}]"))?);
            }
            Ok(Node::list(nodes))
        }
        Value::Object(map) => match key {
            "extension" | "modifierExtension" => Ok(Node::extension(decode_extension(map, path)?)),
            "identifier" => Ok(Node::identifier(decode_identifier(map, path)?)),
            _ => decode_object(map, path),
        },
        _ if key == "extension" || key == "modifierExtension" => Err(ModelError::malformed(
            path,
            "extensions must be JSON objects",
        )),
        scalar => Ok(Node::primitive(decode_scalar(scalar, path)?)),
    }
}

fn decode_object(map: &Map<String, Value>, path: &str) -> Result<Node> {
    if map.contains_key("resourceType") {
        return Ok(Node::resource(decode_resource_object(map, path)?));
    }
    if is_reference_shape(map) {
        return Ok(Node::reference(decode_reference(map, path)?));
    }
    Ok(Node::element(decode_element(map, path)?))
}

fn decode_element(map: &Map<String, Value>, path: &str) -> Result<Element> {
    let mut fields = Vec::with_capacity(map.len());
    for (key, value) in map {
        fields.push(decode_field(key, value, &format!("{path}.{key}"))?);
    }
    Ok(Element::from_fields(fields))
}

fn is_reference_shape(map: &Map<String, Value>) -> bool {
    let only_reference_keys = map
        .keys()
        .all(|k| k.starts_with('_') || REFERENCE_KEYS.contains(&k.as_str()));
    let has_target = matches!(map.get("reference"), Some(Value::String(_)))
        || matches!(map.get("identifier"), Some(Value::Object(_)));
    let type_ok = !matches!(map.get("type"), Some(v) if !v.is_string());
    only_reference_keys && has_target && type_ok
}

fn decode_reference(map: &Map<String, Value>, path: &str) -> Result<Reference> {
    let mut reference = Reference {
        wire_order: wire_order(map),
        ..Reference::default()
    };
    for (key, value) in map {
        let child = format!("{path}.{key}");
        match key.as_str() {
            "id" => reference.element_id = Some(expect_str(value, &child)?),
            "extension" => reference.extensions = decode_extension_list(value, &child)?,
            "reference" => reference.reference = Some(expect_str(value, &child)?),
            "type" => reference.type_ = Some(expect_str(value, &child)?),
            "identifier" => {
                let obj = expect_object(value, &child)?;
                reference.identifier = Some(Arc::new(decode_identifier(obj, &child)?));
            }
            "display" => reference.display = Some(expect_str(value, &child)?),
            k if k.starts_with('_') => reference
                .companions
                .push((Arc::from(k), decode_keyed(k, value, &child)?)),
            other => {
                return Err(ModelError::malformed(
                    path,
                    format!("unexpected field '{other}' in Reference"),
                ))
            }
        }
    }
    Ok(reference)
}

fn decode_identifier(map: &Map<String, Value>, path: &str) -> Result<Identifier> {
    let mut identifier = Identifier {
        wire_order: wire_order(map),
        ..Identifier::default()
    };
    for (key, value) in map {
        let child = format!("{path}.{key}");
        match key.as_str() {
            "id" => identifier.element_id = Some(expect_str(value, &child)?),
            "extension" => identifier.extensions = decode_extension_list(value, &child)?,
            "use" => identifier.use_ = Some(expect_str(value, &child)?),
            "type" => {
                let obj = expect_object(value, &child)?;
                identifier.type_ = Some(Node::element(decode_element(obj, &child)?));
            }
            "system" => identifier.system = Some(expect_str(value, &child)?),
            "value" => identifier.value = Some(expect_str(value, &child)?),
            "period" => {
                let obj = expect_object(value, &child)?;
                identifier.period = Some(Node::element(decode_element(obj, &child)?));
            }
            "assigner" => {
                let obj = expect_object(value, &child)?;
                identifier.assigner = Some(Arc::new(decode_reference(obj, &child)?));
            }
            k if k.starts_with('_') => identifier
                .companions
                .push((Arc::from(k), decode_keyed(k, value, &child)?)),
            other => {
                return Err(ModelError::malformed(
                    path,
                    format!("unexpected field '{other}' in Identifier"),
                ))
            }
        }
    }
    Ok(identifier)
}

fn decode_extension_list(value: &Value, path: &str) -> Result<Vec<Extension>> {
    let items = value
        .as_array()
        .ok_or_else(|| ModelError::malformed(path, "extension must be an array"))?;
    let mut extensions = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child = format!("{path}[{i}]");
        extensions.push(decode_extension(expect_object(item, &child)?, &child)?);
    }
    Ok(extensions)
}

fn decode_extension(map: &Map<String, Value>, path: &str) -> Result<Extension> {
    let url = match map.get("url") {
        Some(Value::String(url)) => Arc::from(url.as_str()),
        _ => return Err(ModelError::malformed(path, "extension requires a string url")),
    };

    let mut extension = Extension::new(url);
    extension.wire_order = wire_order(map);
    let mut has_value = false;
    for (key, value) in map {
        let child = format!("{path}.{key}");
        match key.as_str() {
            "url" => {}
            "id" => extension.element_id = Some(expect_str(value, &child)?),
            "extension" => extension.extensions = decode_extension_list(value, &child)?,
            k if k.starts_with('_') => extension
                .companions
                .push((Arc::from(k), decode_keyed(k, value, &child)?)),
            k => {
                let Some(suffix) = k
                    .strip_prefix("value")
                    .filter(|s| s.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
                else {
                    return Err(ModelError::malformed(
                        path,
                        format!("unexpected field '{k}' in Extension"),
                    ));
                };
                if has_value {
                    return Err(ModelError::malformed(path, "extension has more than one value[x]"));
                }
                has_value = true;
                if is_choice_suffix(suffix) {
                    extension.value = Some(decode_choice(suffix, value, &child)?);
                } else {
                    // Datatype outside the modelled set: carried generically.
                    extension
                        .companions
                        .push((Arc::from(k), decode_keyed(k, value, &child)?));
                }
            }
        }
    }
    Ok(extension)
}

fn decode_choice(suffix: &str, value: &Value, path: &str) -> Result<ChoiceValue> {
    match suffix {
        "Boolean" => value
            .as_bool()
            .map(ChoiceValue::Boolean)
            .ok_or_else(|| ModelError::malformed(path, "expected a boolean")),
        "Decimal" => match value {
            Value::Number(n) => Ok(ChoiceValue::Decimal(decode_decimal(n, path)?)),
            _ => Err(ModelError::malformed(path, "expected a number")),
        },
        "Identifier" => {
            let obj = expect_object(value, path)?;
            Ok(ChoiceValue::Identifier(Arc::new(decode_identifier(obj, path)?)))
        }
        "Reference" => {
            let obj = expect_object(value, path)?;
            Ok(ChoiceValue::Reference(Arc::new(decode_reference(obj, path)?)))
        }
        _ => {
            if let Some(ty) = TextType::from_suffix(suffix) {
                return Ok(ChoiceValue::Text(ty, expect_str(value, path)?));
            }
            if let Some(ty) = IntegerType::from_suffix(suffix) {
                let int = value
                    .as_i64()
                    .ok_or_else(|| ModelError::malformed(path, "expected an integer"))?;
                return Ok(ChoiceValue::Integer(ty, int));
            }
            if let Some(ty) = ComplexType::from_suffix(suffix) {
                let obj = expect_object(value, path)?;
                return Ok(ChoiceValue::Complex(ty, Node::element(decode_element(obj, path)?)));
            }
            Err(ModelError::malformed(
                path,
                format!("unsupported choice type '{suffix}'"),
            ))
        }
    }
}

fn decode_scalar(value: &Value, path: &str) -> Result<Primitive> {
    Ok(match value {
        Value::Null => Primitive::Null,
        Value::Bool(b) => Primitive::Boolean(*b),
        Value::String(s) => Primitive::String(Arc::from(s.as_str())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Primitive::Integer(i),
            None => Primitive::Decimal(decode_decimal(n, path)?),
        },
        Value::Array(_) | Value::Object(_) => {
            return Err(ModelError::malformed(path, "expected a scalar"))
        }
    })
}

fn decode_decimal(n: &Number, path: &str) -> Result<Decimal> {
    let raw = n.to_string();
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| ModelError::malformed(path, format!("unrepresentable decimal {raw}: {e}")))
}

fn wire_order(map: &Map<String, Value>) -> WireOrder {
    WireOrder::recorded(map.keys().map(String::as_str))
}

fn expect_str(value: &Value, path: &str) -> Result<Arc<str>> {
    value
        .as_str()
        .map(Arc::from)
        .ok_or_else(|| ModelError::malformed(path, "expected a string"))
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ModelError::malformed(path, "expected an object"))
}

// =============================================================================
// Encoding
// =============================================================================

pub(crate) fn encode_resource(resource: &Resource) -> Value {
    let mut map = Map::new();
    map.insert(
        "resourceType".to_string(),
        Value::String(resource.resource_type().to_string()),
    );
    if let Some(id) = resource.id() {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    encode_fields(&mut map, resource.fields().fields());
    Value::Object(map)
}

fn encode_fields(map: &mut Map<String, Value>, fields: &[(Arc<str>, Node)]) {
    for (name, node) in fields {
        match node.data() {
            NodeData::Choice(choice) => {
                map.insert(format!("{name}{}", choice.type_name()), encode_choice(choice));
            }
            _ => {
                map.insert(name.to_string(), encode_node(node));
            }
        }
    }
}

fn encode_node(node: &Node) -> Value {
    match node.data() {
        NodeData::Primitive(p) => encode_primitive(p),
        NodeData::Element(element) => {
            let mut map = Map::new();
            encode_fields(&mut map, element.fields());
            Value::Object(map)
        }
        NodeData::List(items) => Value::Array(items.iter().map(encode_node).collect()),
        NodeData::Choice(choice) => encode_choice(choice),
        NodeData::Reference(reference) => encode_reference(reference),
        NodeData::Identifier(identifier) => encode_identifier(identifier),
        NodeData::Extension(extension) => encode_extension(extension),
        NodeData::Resource(resource) => encode_resource(resource),
    }
}

fn encode_primitive(primitive: &Primitive) -> Value {
    match primitive {
        Primitive::Null => Value::Null,
        Primitive::Boolean(b) => Value::Bool(*b),
        Primitive::Integer(i) => Value::Number((*i).into()),
        Primitive::Decimal(d) => encode_decimal(d),
        Primitive::String(s) => Value::String(s.to_string()),
    }
}

fn encode_decimal(decimal: &Decimal) -> Value {
    let raw = decimal.to_string();
    serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw))
}

fn encode_choice(choice: &ChoiceValue) -> Value {
    match choice {
        ChoiceValue::Boolean(b) => Value::Bool(*b),
        ChoiceValue::Integer(_, i) => Value::Number((*i).into()),
        ChoiceValue::Decimal(d) => encode_decimal(d),
        ChoiceValue::Text(_, s) => Value::String(s.to_string()),
        ChoiceValue::Complex(_, node) => encode_node(node),
        ChoiceValue::Identifier(identifier) => encode_identifier(identifier),
        ChoiceValue::Reference(reference) => encode_reference(reference),
    }
}

fn encode_reference(reference: &Reference) -> Value {
    let mut map = Map::new();
    insert_str(&mut map, "id", &reference.element_id);
    insert_extensions(&mut map, &reference.extensions);
    insert_str(&mut map, "reference", &reference.reference);
    insert_str(&mut map, "type", &reference.type_);
    if let Some(identifier) = &reference.identifier {
        map.insert("identifier".to_string(), encode_identifier(identifier));
    }
    insert_str(&mut map, "display", &reference.display);
    encode_fields(&mut map, &reference.companions);
    in_wire_order(map, &reference.wire_order)
}

fn encode_identifier(identifier: &Identifier) -> Value {
    let mut map = Map::new();
    insert_str(&mut map, "id", &identifier.element_id);
    insert_extensions(&mut map, &identifier.extensions);
    insert_str(&mut map, "use", &identifier.use_);
    if let Some(type_) = &identifier.type_ {
        map.insert("type".to_string(), encode_node(type_));
    }
    insert_str(&mut map, "system", &identifier.system);
    insert_str(&mut map, "value", &identifier.value);
    if let Some(period) = &identifier.period {
        map.insert("period".to_string(), encode_node(period));
    }
    if let Some(assigner) = &identifier.assigner {
        map.insert("assigner".to_string(), encode_reference(assigner));
    }
    encode_fields(&mut map, &identifier.companions);
    in_wire_order(map, &identifier.wire_order)
}

fn encode_extension(extension: &Extension) -> Value {
    let mut map = Map::new();
    insert_str(&mut map, "id", &extension.element_id);
    insert_extensions(&mut map, &extension.extensions);
    map.insert("url".to_string(), Value::String(extension.url.to_string()));
    if let Some(value) = &extension.value {
        map.insert(format!("value{}", value.type_name()), encode_choice(value));
    }
    encode_fields(&mut map, &extension.companions);
    in_wire_order(map, &extension.wire_order)
}

/// Reorder canonically written keys to the recorded order. Keys that were not read
/// keep their canonical position after the recorded ones.
fn in_wire_order(map: Map<String, Value>, order: &WireOrder) -> Value {
    let Some(keys) = order.keys() else {
        return Value::Object(map);
    };
    let mut entries: Vec<(String, Value)> = map.into_iter().collect();
    entries.sort_by_key(|(key, _)| {
        keys.iter()
            .position(|recorded| &**recorded == key.as_str())
            .unwrap_or(usize::MAX)
    });
    Value::Object(entries.into_iter().collect())
}

fn insert_str(map: &mut Map<String, Value>, key: &str, value: &Option<Arc<str>>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::String(v.to_string()));
    }
}

fn insert_extensions(map: &mut Map<String, Value>, extensions: &[Extension]) {
    if !extensions.is_empty() {
        map.insert(
            "extension".to_string(),
            Value::Array(extensions.iter().map(encode_extension).collect()),
        );
    }
}

impl Element {
    /// Decode a JSON object into a generic element (no `resourceType` handling).
    pub fn from_json(value: &Value) -> Result<Self> {
        decode_element(expect_object(value, "$")?, "$")
    }
}

impl Node {
    pub fn to_json(&self) -> Value {
        encode_node(self)
    }
}
