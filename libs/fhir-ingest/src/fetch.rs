//! The page-fetching collaborator
//!
//! HTTP, authentication, retries and timeouts live behind [`PageFetcher`]. The
//! aggregator only sees a materialized [`Page`] or a terminal failure.

use crate::error::BoxError;
use async_trait::async_trait;
use interop_models::{Page, Tenant};
use std::fmt;

/// A search against one resource type, e.g. `Patient?identifier=urn:oid:1.2|MRN1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub resource_type: String,
    pub params: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// `name=value&...` with both sides percent-encoded.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.resource_type)
        } else {
            write!(f, "{}?{}", self.resource_type, self.to_query_string())
        }
    }
}

/// Opaque continuation taken from a page's `next` link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Initial(SearchQuery),
    Continuation(ContinuationToken),
}

impl fmt::Display for PageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial(query) => query.fmt(f),
            Self::Continuation(token) => token.fmt(f),
        }
    }
}

/// Fetches one page of a remote search for a tenant's connection.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, tenant: &Tenant, request: &PageRequest) -> Result<Page, BoxError>;
}
