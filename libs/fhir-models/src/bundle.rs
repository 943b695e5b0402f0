//! Search result pages

use crate::error::{ModelError, Result};
use crate::json;
use crate::resource::Resource;
use serde_json::{json, Map, Value};

pub const RELATION_NEXT: &str = "next";

/// A navigation link of a search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub relation: String,
    pub url: String,
}

impl Link {
    pub fn new(relation: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            url: url.into(),
        }
    }

    pub fn next(url: impl Into<String>) -> Self {
        Self::new(RELATION_NEXT, url)
    }
}

/// One page of a remote search.
///
/// `links` is `None` when the response had no links section at all; such a page is
/// always the last one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub entries: Vec<Resource>,
    pub links: Option<Vec<Link>>,
}

impl Page {
    /// A terminal page.
    pub fn new(entries: Vec<Resource>) -> Self {
        Self {
            entries,
            links: None,
        }
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn with_next(self, url: impl Into<String>) -> Self {
        self.with_links(vec![Link::next(url)])
    }

    pub fn next_link(&self) -> Option<&Link> {
        self.links
            .as_deref()?
            .iter()
            .find(|link| link.relation == RELATION_NEXT)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_link().is_none()
    }

    /// Read a FHIR Bundle. Entries without a `resource` (e.g. response-only entries) are skipped.
    pub fn from_bundle_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ModelError::malformed("$", "expected a JSON object for the bundle"))?;
        match obj.get("resourceType").and_then(Value::as_str) {
            Some("Bundle") => {}
            Some(other) => {
                return Err(ModelError::malformed(
                    "$.resourceType",
                    format!("expected Bundle, found {other}"),
                ))
            }
            None => {
                return Err(ModelError::MissingResourceType {
                    path: "$".to_string(),
                })
            }
        }

        let links = match obj.get("link") {
            None => None,
            Some(Value::Array(items)) => {
                let mut links = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    links.push(decode_link(item, &format!("$.link[{i}]"))?);
                }
                Some(links)
            }
            Some(_) => return Err(ModelError::malformed("$.link", "link must be an array")),
        };

        let entries = match obj.get("entry") {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let mut entries = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let Some(resource) = item.get("resource") else {
                        continue;
                    };
                    entries.push(json::decode_resource(
                        resource,
                        &format!("$.entry[{i}].resource"),
                    )?);
                }
                entries
            }
            Some(_) => return Err(ModelError::malformed("$.entry", "entry must be an array")),
        };

        Ok(Self { entries, links })
    }

    pub fn from_bundle_str(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_bundle_json(&value)
    }

    /// Render as a `searchset` Bundle.
    pub fn to_bundle_json(&self) -> Value {
        let mut bundle = Map::new();
        bundle.insert("resourceType".to_string(), json!("Bundle"));
        bundle.insert("type".to_string(), json!("searchset"));
        bundle.insert("total".to_string(), json!(self.entries.len()));
        if let Some(links) = &self.links {
            bundle.insert(
                "link".to_string(),
                Value::Array(
                    links
                        .iter()
                        .map(|l| json!({"relation": l.relation, "url": l.url}))
                        .collect(),
                ),
            );
        }
        bundle.insert(
            "entry".to_string(),
            Value::Array(
                self.entries
                    .iter()
                    .map(|r| json!({"resource": r.to_json()}))
                    .collect(),
            ),
        );
        Value::Object(bundle)
    }
}

fn decode_link(value: &Value, path: &str) -> Result<Link> {
    let relation = value.get("relation").and_then(Value::as_str);
    let url = value.get("url").and_then(Value::as_str);
    match (relation, url) {
        (Some(relation), Some(url)) => Ok(Link::new(relation, url)),
        _ => Err(ModelError::malformed(
            path,
            "link requires string relation and url",
        )),
    }
}
