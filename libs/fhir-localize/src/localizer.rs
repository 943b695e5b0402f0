//! Tenant localization
//!
//! Rewrites every tenant-scoped id and reference so it is unique within one tenant's
//! namespace:
//!
//! - a resource id `123` becomes `{tenant}-123`
//! - a reference `[<base>/]Type/123[/_history/v]` becomes `Type/{tenant}-123[/_history/v]`
//! - anything else (dates, codes, URNs, fragments, conditional references) passes through
//!
//! Localization is idempotent: an id that already carries the tenant prefix is left
//! alone, so applying it twice yields the same tree as applying it once.

use crate::walker::{walk_identifier, walk_node, walk_reference, walk_resource, LeafTransform};
use interop_models::{Identifier, Node, Page, ParsedReference, Reference, Resource, Tenant};
use std::borrow::Cow;
use std::sync::Arc;

/// [`LeafTransform`] that scopes ids and references to one tenant.
#[derive(Debug, Clone)]
pub struct Localizer {
    tenant: Tenant,
}

impl Localizer {
    pub fn new(tenant: &Tenant) -> Self {
        Self {
            tenant: tenant.clone(),
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }
}

impl LeafTransform for Localizer {
    fn resource_id(&self, id: &str) -> Option<Arc<str>> {
        match localize_id(id, &self.tenant) {
            Cow::Borrowed(_) => None,
            Cow::Owned(id) => Some(Arc::from(id)),
        }
    }

    fn reference(&self, reference: &str) -> Option<Arc<str>> {
        match localize_reference(reference, &self.tenant) {
            Cow::Borrowed(_) => None,
            Cow::Owned(reference) => Some(Arc::from(reference)),
        }
    }
}

/// Prefix a local id with `{tenant}-` unless it already is.
pub fn localize_id<'a>(id: &'a str, tenant: &Tenant) -> Cow<'a, str> {
    if tenant.owns(id) {
        Cow::Borrowed(id)
    } else {
        Cow::Owned(format!("{}{}", tenant.prefix(), id))
    }
}

/// Localize a literal reference string.
///
/// The base url is stripped, the id prefixed and a `/_history/` suffix reattached.
/// Strings that are not `[<base>/]Type/id[/_history/v]` come back borrowed.
pub fn localize_reference<'a>(reference: &'a str, tenant: &Tenant) -> Cow<'a, str> {
    let Some(parsed) = ParsedReference::parse(reference) else {
        return Cow::Borrowed(reference);
    };

    let id = localize_id(parsed.id, tenant);
    if parsed.base.is_none() && matches!(id, Cow::Borrowed(_)) {
        return Cow::Borrowed(reference);
    }
    Cow::Owned(parsed.relative_with_id(&id))
}

/// Tenant-scoping entry points.
///
/// `localize_pair` also reports whether anything changed. When it did not, the
/// returned value shares its storage with the input.
pub trait Localize: Sized {
    fn localize_pair(&self, tenant: &Tenant) -> (Self, bool);

    fn localize(&self, tenant: &Tenant) -> Self {
        self.localize_pair(tenant).0
    }
}

impl Localize for Resource {
    fn localize_pair(&self, tenant: &Tenant) -> (Self, bool) {
        let walked = walk_resource(self, &Localizer::new(tenant));
        if walked.changed {
            tracing::trace!(
                resource_type = self.resource_type(),
                id = walked.value.id(),
                tenant = %tenant,
                "localized resource"
            );
        }
        walked.into_pair()
    }
}

impl Localize for Node {
    fn localize_pair(&self, tenant: &Tenant) -> (Self, bool) {
        walk_node(self, &Localizer::new(tenant)).into_pair()
    }
}

impl Localize for Reference {
    fn localize_pair(&self, tenant: &Tenant) -> (Self, bool) {
        match walk_reference(self, &Localizer::new(tenant)) {
            Some(reference) => (reference, true),
            None => (self.clone(), false),
        }
    }
}

impl Localize for Identifier {
    fn localize_pair(&self, tenant: &Tenant) -> (Self, bool) {
        match walk_identifier(self, &Localizer::new(tenant)) {
            Some(identifier) => (identifier, true),
            None => (self.clone(), false),
        }
    }
}

impl Localize for Vec<Resource> {
    fn localize_pair(&self, tenant: &Tenant) -> (Self, bool) {
        let mut changed = false;
        let resources = self
            .iter()
            .map(|resource| {
                let (resource, c) = resource.localize_pair(tenant);
                changed |= c;
                resource
            })
            .collect();
        (resources, changed)
    }
}

/// Entries are localized; links are remote continuation urls and are kept verbatim.
impl Localize for Page {
    fn localize_pair(&self, tenant: &Tenant) -> (Self, bool) {
        let (entries, changed) = self.entries.localize_pair(tenant);
        (
            Page {
                entries,
                links: self.links.clone(),
            },
            changed,
        )
    }
}

/// Localize a resource for `tenant`.
pub fn localize(resource: &Resource, tenant: &Tenant) -> Resource {
    resource.localize(tenant)
}

/// Localize a resource for `tenant`, reporting whether anything changed.
pub fn localize_pair(resource: &Resource, tenant: &Tenant) -> (Resource, bool) {
    resource.localize_pair(tenant)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Tenant {
        Tenant::new("acme").unwrap()
    }

    #[test]
    fn prefixes_ids_once() {
        assert_eq!(localize_id("123", &acme()), "acme-123");
        assert!(matches!(localize_id("acme-123", &acme()), Cow::Borrowed(_)));
    }

    #[test]
    fn other_tenant_prefixes_are_not_ours() {
        assert_eq!(localize_id("acmex-1", &acme()), "acme-acmex-1");
    }

    #[test]
    fn reference_keeps_history_and_drops_base() {
        assert_eq!(
            localize_reference("Patient/123/_history/2", &acme()),
            "Patient/acme-123/_history/2"
        );
        assert_eq!(
            localize_reference("https://ehr.example.org/fhir/Patient/123", &acme()),
            "Patient/acme-123"
        );
    }

    #[test]
    fn localized_absolute_reference_still_drops_base() {
        assert_eq!(
            localize_reference("https://ehr.example.org/fhir/Patient/acme-123", &acme()),
            "Patient/acme-123"
        );
    }

    #[test]
    fn unrecognised_references_pass_through() {
        for raw in [
            "#contained-1",
            "urn:uuid:7f1e4f2c-1a4b-4f43-9b6b-3f0c9a1b2d3e",
            "Patient?identifier=urn:oid:1.2|MRN1",
            "https://terminology.example.org/ValueSet",
        ] {
            assert!(matches!(localize_reference(raw, &acme()), Cow::Borrowed(_)), "{raw}");
        }
    }
}
