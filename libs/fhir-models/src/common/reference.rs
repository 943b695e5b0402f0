//! References between resources

use super::complex::{Extension, Identifier, WireOrder};
use crate::node::Node;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// `[<base-url>/]ResourceType/id[/_history/version]`
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<base>https?://\S+)/)?(?P<type>[A-Z][A-Za-z]+)/(?P<id>[A-Za-z0-9\-.]{1,64})(?:/_history/(?P<version>[A-Za-z0-9\-.]{1,64}))?$",
    )
    .expect("reference pattern is a valid regex")
});

/// FHIR Reference
///
/// Either literal (`reference` holds `Type/id`, possibly absolute or versioned) or logical
/// (only `identifier` is present). [`Reference::to`] builds the composite form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reference {
    pub element_id: Option<Arc<str>>,
    pub extensions: Vec<Extension>,
    pub reference: Option<Arc<str>>,
    pub type_: Option<Arc<str>>,
    pub identifier: Option<Arc<Identifier>>,
    pub display: Option<Arc<str>>,
    /// `_reference`, `_display` and other primitive companions, kept verbatim.
    pub companions: Vec<(Arc<str>, Node)>,
    pub wire_order: WireOrder,
}

impl Reference {
    pub fn literal(reference: impl Into<Arc<str>>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    /// Composite form: `resource_type` + `id`.
    pub fn to(resource_type: &str, id: &str) -> Self {
        Self {
            reference: Some(Arc::from(format!("{resource_type}/{id}"))),
            type_: Some(Arc::from(resource_type)),
            ..Self::default()
        }
    }

    pub fn logical(identifier: Identifier) -> Self {
        Self {
            identifier: Some(Arc::new(identifier)),
            ..Self::default()
        }
    }

    pub fn with_display(mut self, display: impl Into<Arc<str>>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Decompose the literal reference, if it has the `Type/id` shape.
    pub fn parse(&self) -> Option<ParsedReference<'_>> {
        ParsedReference::parse(self.reference.as_deref()?)
    }

    /// Target resource type: explicit `type`, else the one encoded in the literal.
    pub fn target_type(&self) -> Option<&str> {
        self.type_
            .as_deref()
            .or_else(|| self.parse().map(|p| p.resource_type))
    }

    pub fn target_id(&self) -> Option<&str> {
        self.parse().map(|p| p.id)
    }
}

/// The pieces of a `[<base>/]Type/id[/_history/version]` reference string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedReference<'a> {
    pub base: Option<&'a str>,
    pub resource_type: &'a str,
    pub id: &'a str,
    pub version: Option<&'a str>,
}

impl<'a> ParsedReference<'a> {
    /// Returns `None` for fragments, URNs, conditional references and any other shape.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let caps = REFERENCE_PATTERN.captures(raw)?;
        Some(Self {
            base: caps.name("base").map(|m| m.as_str()),
            resource_type: caps.name("type")?.as_str(),
            id: caps.name("id")?.as_str(),
            version: caps.name("version").map(|m| m.as_str()),
        })
    }

    /// `Type/id[/_history/version]` with the base dropped and `id` substituted.
    pub fn relative_with_id(&self, id: &str) -> String {
        match self.version {
            Some(version) => format!("{}/{}/_history/{}", self.resource_type, id, version),
            None => format!("{}/{}", self.resource_type, id),
        }
    }

    pub fn relative(&self) -> String {
        self.relative_with_id(self.id)
    }
}

impl fmt::Display for ParsedReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(base) = self.base {
            write!(f, "{base}/")?;
        }
        f.write_str(&self.relative())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_reference() {
        let parsed = ParsedReference::parse("Patient/E123").unwrap();
        assert_eq!(parsed.base, None);
        assert_eq!(parsed.resource_type, "Patient");
        assert_eq!(parsed.id, "E123");
        assert_eq!(parsed.version, None);
    }

    #[test]
    fn parses_absolute_versioned_reference() {
        let parsed =
            ParsedReference::parse("https://ehr.example.org/fhir/r4/Observation/o-1/_history/3")
                .unwrap();
        assert_eq!(parsed.base, Some("https://ehr.example.org/fhir/r4"));
        assert_eq!(parsed.resource_type, "Observation");
        assert_eq!(parsed.id, "o-1");
        assert_eq!(parsed.version, Some("3"));
        assert_eq!(parsed.relative(), "Observation/o-1/_history/3");
        assert_eq!(
            parsed.to_string(),
            "https://ehr.example.org/fhir/r4/Observation/o-1/_history/3"
        );
    }

    #[test]
    fn rejects_other_shapes() {
        for raw in [
            "#contained-1",
            "urn:uuid:53fefa32-fcbb-4ff8-8a92-55ee120877b7",
            "Patient?identifier=urn:oid:1|2",
            "https://ehr.example.org/fhir",
            "patient/123",
            "Patient/",
            "Patient/has space",
        ] {
            assert!(ParsedReference::parse(raw).is_none(), "{raw} should not parse");
        }
    }

    #[test]
    fn composite_reference_exposes_target() {
        let reference = Reference::to("Practitioner", "p1");
        assert_eq!(reference.reference.as_deref(), Some("Practitioner/p1"));
        assert_eq!(reference.target_type(), Some("Practitioner"));
        assert_eq!(reference.target_id(), Some("p1"));
    }
}
