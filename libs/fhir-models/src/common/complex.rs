//! FHIR complex types that carry tenant-relevant semantics
//!
//! Extensions, the closed `value[x]` sum type, and identifiers. Everything else is
//! represented generically as an [`Element`](crate::Element).

use super::reference::Reference;
use crate::node::Node;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! type_tags {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Type name as it appears in a `value[x]` suffix, e.g. `DateTime`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            pub fn from_suffix(suffix: &str) -> Option<Self> {
                match suffix {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

type_tags! {
    /// Primitive types whose JSON form is a string. `integer64` is string-encoded too.
    TextType {
        Base64Binary,
        Canonical,
        Code,
        Date,
        DateTime,
        Id,
        Instant,
        Integer64,
        Markdown,
        Oid,
        String,
        Time,
        Uri,
        Url,
        Uuid,
    }
}

type_tags! {
    /// Primitive types whose JSON form is an integer.
    IntegerType {
        Integer,
        PositiveInt,
        UnsignedInt,
    }
}

type_tags! {
    /// Datatypes carried as generic elements inside a choice.
    ComplexType {
        Address,
        Age,
        Annotation,
        Attachment,
        Availability,
        CodeableConcept,
        CodeableReference,
        Coding,
        ContactDetail,
        ContactPoint,
        Contributor,
        Count,
        DataRequirement,
        Distance,
        Dosage,
        Duration,
        Expression,
        ExtendedContactDetail,
        HumanName,
        Meta,
        MonetaryComponent,
        Money,
        ParameterDefinition,
        Period,
        Quantity,
        Range,
        Ratio,
        RatioRange,
        RelatedArtifact,
        SampledData,
        Signature,
        Timing,
        TriggerDefinition,
        UsageContext,
        VirtualServiceDetail,
    }
}

/// The active case of a `value[x]`-style tagged union.
///
/// Closed on purpose: every consumer matches exhaustively, so adding a case is a
/// compile error everywhere it matters.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceValue {
    Boolean(bool),
    Integer(IntegerType, i64),
    Decimal(Decimal),
    Text(TextType, Arc<str>),
    Complex(ComplexType, Node),
    Identifier(Arc<Identifier>),
    Reference(Arc<Reference>),
}

impl ChoiceValue {
    /// Suffix appended to the field stem on the wire (`valueReference`, `onsetDateTime`).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Decimal(_) => "Decimal",
            Self::Integer(ty, _) => ty.as_str(),
            Self::Text(ty, _) => ty.as_str(),
            Self::Complex(ty, _) => ty.as_str(),
            Self::Identifier(_) => "Identifier",
            Self::Reference(_) => "Reference",
        }
    }

    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Self::Text(TextType::String, value.into())
    }

    pub fn reference(reference: Reference) -> Self {
        Self::Reference(Arc::new(reference))
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(_, s) => Some(s),
            _ => None,
        }
    }
}

/// Whether a `value[x]` suffix names a supported case at all.
pub fn is_choice_suffix(suffix: &str) -> bool {
    matches!(suffix, "Boolean" | "Decimal" | "Identifier" | "Reference")
        || TextType::from_suffix(suffix).is_some()
        || IntegerType::from_suffix(suffix).is_some()
        || ComplexType::from_suffix(suffix).is_some()
}

/// Key order of a datatype as it was read, replayed when it is written back.
///
/// Empty for values built in code, which are written in FHIR's canonical field order.
/// Never part of equality.
#[derive(Debug, Clone, Default)]
pub struct WireOrder(Option<Arc<[Arc<str>]>>);

impl WireOrder {
    pub fn recorded<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self(Some(keys.into_iter().map(Into::into).collect()))
    }

    pub fn keys(&self) -> Option<&[Arc<str>]> {
        self.0.as_deref()
    }
}

impl PartialEq for WireOrder {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// FHIR Extension
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub element_id: Option<Arc<str>>,
    pub url: Arc<str>,
    pub extensions: Vec<Extension>,
    pub value: Option<ChoiceValue>,
    /// `_valueString`-style companions, plus `value[x]` cases of datatypes this crate
    /// does not model, kept as generic nodes under their wire key.
    pub companions: Vec<(Arc<str>, Node)>,
    pub wire_order: WireOrder,
}

impl Extension {
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self {
            element_id: None,
            url: url.into(),
            extensions: Vec::new(),
            value: None,
            companions: Vec::new(),
            wire_order: WireOrder::default(),
        }
    }

    pub fn with_value(mut self, value: ChoiceValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }
}

/// Identifier - a business key assigned by some system
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Identifier {
    pub element_id: Option<Arc<str>>,
    pub extensions: Vec<Extension>,
    pub use_: Option<Arc<str>>,
    pub type_: Option<Node>,
    pub system: Option<Arc<str>>,
    pub value: Option<Arc<str>>,
    pub period: Option<Node>,
    pub assigner: Option<Arc<Reference>>,
    /// `_system`, `_value` and other primitive companions, kept verbatim.
    pub companions: Vec<(Arc<str>, Node)>,
    pub wire_order: WireOrder,
}

impl Identifier {
    pub fn new(system: impl Into<Arc<str>>, value: impl Into<Arc<str>>) -> Self {
        Self {
            system: Some(system.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_assigner(mut self, assigner: Reference) -> Self {
        self.assigner = Some(Arc::new(assigner));
        self
    }

    /// The `(system, value)` pair, if both are present and non-blank.
    pub fn business_key(&self) -> Option<SystemValue> {
        SystemValue::new(self.system.as_deref()?, self.value.as_deref()?)
    }
}

/// Exact-match business key: two identifiers denote the same entity iff both parts match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemValue {
    pub system: String,
    pub value: String,
}

impl SystemValue {
    /// Returns `None` when either part is blank.
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Option<Self> {
        let system = system.into();
        let value = value.into();
        if system.trim().is_empty() || value.trim().is_empty() {
            return None;
        }
        Some(Self { system, value })
    }

    /// Token search value `system|value`, escaping FHIR search delimiters.
    pub fn to_search_token(&self) -> String {
        format!(
            "{}|{}",
            escape_search_value(&self.system),
            escape_search_value(&self.value)
        )
    }
}

impl fmt::Display for SystemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.value)
    }
}

fn escape_search_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '|' | ',' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_value_rejects_blank_parts() {
        assert!(SystemValue::new("urn:oid:1.2.3", "").is_none());
        assert!(SystemValue::new("  ", "MRN1").is_none());
        assert!(SystemValue::new("urn:oid:1.2.3", "MRN1").is_some());
    }

    #[test]
    fn search_token_escapes_delimiters() {
        let key = SystemValue::new("urn:oid:1.2.3", "a,b|c$d\\e").unwrap();
        assert_eq!(key.to_search_token(), "urn:oid:1.2.3|a\\,b\\|c\\$d\\\\e");
    }

    #[test]
    fn business_key_requires_both_parts() {
        let full = Identifier::new("urn:oid:1.2.3", "MRN1");
        assert_eq!(
            full.business_key(),
            SystemValue::new("urn:oid:1.2.3", "MRN1")
        );

        let no_system = Identifier {
            value: Some(Arc::from("MRN1")),
            ..Identifier::default()
        };
        assert!(no_system.business_key().is_none());
    }

    #[test]
    fn wire_order_is_not_part_of_equality() {
        let mut recorded = Identifier::new("urn:oid:1.2.3", "MRN1");
        recorded.wire_order = WireOrder::recorded(["value", "system"]);
        assert_eq!(recorded, Identifier::new("urn:oid:1.2.3", "MRN1"));
    }

    #[test]
    fn choice_suffixes_cover_all_tag_sets() {
        for ty in TextType::ALL {
            assert!(is_choice_suffix(ty.as_str()));
        }
        for ty in ComplexType::ALL {
            assert!(is_choice_suffix(ty.as_str()));
        }
        assert!(is_choice_suffix("Reference"));
        assert!(is_choice_suffix("Integer64"));
        assert!(is_choice_suffix("Contributor"));
        assert!(!is_choice_suffix("Set"));
        assert!(!is_choice_suffix("dateTime"));
    }
}
