//! File-backed collaborators for running the ingestion core without a remote system

use anyhow::{Context, Result};
use async_trait::async_trait;
use interop_ingest::{BoxError, InMemoryRegistry, PageFetcher, PageRequest};
use interop_models::{Page, Resource, SystemValue, Tenant};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read JSON from a file, or from stdin when the path is `-`.
pub fn read_json(path: &Path) -> Result<Value> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path.display()))?
    };
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {:?}", path.display()))
}

/// Serves a chain of saved searchset Bundles from a directory.
///
/// The initial request reads `first`; a continuation reads the file named by the last
/// path segment of the `next` link url (query string ignored).
pub struct DirectoryFetcher {
    dir: PathBuf,
    first: String,
}

impl DirectoryFetcher {
    pub fn new(dir: impl Into<PathBuf>, first: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            first: first.into(),
        }
    }

    fn file_for(&self, request: &PageRequest) -> Result<PathBuf, BoxError> {
        let name = match request {
            PageRequest::Initial(_) => self.first.as_str(),
            PageRequest::Continuation(token) => link_file_name(token.as_str())
                .ok_or_else(|| format!("next link '{token}' does not name a file"))?,
        };
        Ok(self.dir.join(name))
    }
}

fn link_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

#[async_trait]
impl PageFetcher for DirectoryFetcher {
    async fn fetch_page(&self, tenant: &Tenant, request: &PageRequest) -> Result<Page, BoxError> {
        let path = self.file_for(request)?;
        tracing::debug!(tenant = %tenant, file = %path.display(), "reading page");
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Page::from_bundle_str(&content)?)
    }
}

/// Answers `identifier=system|value,...` searches from the entries of one Bundle.
pub struct BundleSearchFetcher {
    resources: Vec<Resource>,
}

impl BundleSearchFetcher {
    pub fn from_bundle(value: &Value) -> Result<Self> {
        let page = Page::from_bundle_json(value).context("Invalid remote Bundle")?;
        Ok(Self {
            resources: page.entries,
        })
    }
}

#[async_trait]
impl PageFetcher for BundleSearchFetcher {
    async fn fetch_page(&self, _tenant: &Tenant, request: &PageRequest) -> Result<Page, BoxError> {
        let PageRequest::Initial(query) = request else {
            return Err("offline identifier search has a single page".into());
        };
        let wanted: Vec<&str> = query
            .param("identifier")
            .map(|tokens| tokens.split(',').collect())
            .unwrap_or_default();

        let entries = self
            .resources
            .iter()
            .filter(|resource| resource.resource_type() == query.resource_type)
            .filter(|resource| {
                resource.identifiers().any(|identifier| {
                    identifier
                        .business_key()
                        .is_some_and(|key| wanted.contains(&key.to_search_token().as_str()))
                })
            })
            .cloned()
            .collect();
        Ok(Page::new(entries))
    }
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    system: String,
    value: String,
    id: String,
}

/// Load a registry file: `[{"system": ..., "value": ..., "id": ...}, ...]`.
pub fn load_registry(path: &Path, tenant: &Tenant) -> Result<InMemoryRegistry> {
    let entries: Vec<RegistryEntry> = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("Invalid registry file {:?}", path.display()))?;

    let registry = InMemoryRegistry::new();
    for entry in entries {
        let Some(key) = SystemValue::new(&entry.system, &entry.value) else {
            tracing::warn!(id = %entry.id, "skipping registry entry without system or value");
            continue;
        };
        registry.insert(tenant, key, entry.id);
    }
    if registry.is_empty() {
        tracing::warn!(file = %path.display(), "registry file has no usable entries");
    } else {
        tracing::debug!(entries = registry.len(), "loaded identifier registry");
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_file_name_is_the_last_segment() {
        assert_eq!(
            link_file_name("https://ehr.example.org/fhir/page-2.json?_getpages=abc"),
            Some("page-2.json")
        );
        assert_eq!(link_file_name("page-3.json"), Some("page-3.json"));
        assert_eq!(link_file_name("https://ehr.example.org/fhir/"), None);
    }
}
