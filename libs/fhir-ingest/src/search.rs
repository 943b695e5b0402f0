//! Paginated search aggregation
//!
//! Follows `next` links sequentially until a page without one, concatenating entries in
//! page order and dropping later duplicates by `(resourceType, id)`.

use crate::cancel::Cancellation;
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::fetch::{ContinuationToken, PageFetcher, PageRequest, SearchQuery};
use interop_models::{Resource, ResourceKey, Tenant};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct SearchAggregator {
    fetcher: Arc<dyn PageFetcher>,
    max_pages: usize,
}

impl SearchAggregator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &SearchConfig) -> Self {
        Self {
            fetcher,
            max_pages: config.max_pages.max(1),
        }
    }

    pub async fn search(&self, tenant: &Tenant, query: SearchQuery) -> Result<Vec<Resource>> {
        self.search_with_cancel(tenant, query, &Cancellation::never())
            .await
    }

    /// Like [`SearchAggregator::search`], but stops issuing fetches once `cancel` fires.
    /// An in-flight fetch is abandoned. No partial result is returned.
    pub async fn search_with_cancel(
        &self,
        tenant: &Tenant,
        query: SearchQuery,
        cancel: &Cancellation,
    ) -> Result<Vec<Resource>> {
        tracing::debug!(tenant = %tenant, query = %query, "starting paginated search");

        let mut request = PageRequest::Initial(query);
        let mut followed: HashSet<ContinuationToken> = HashSet::new();
        let mut merged = Merged::default();
        let mut pages = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { pages });
            }
            if pages == self.max_pages {
                return Err(Error::PageLimitExceeded {
                    limit: self.max_pages,
                });
            }

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled { pages }),
                page = self.fetcher.fetch_page(tenant, &request) => page,
            }
            .map_err(|source| Error::Fetch {
                page: pages + 1,
                source,
            })?;
            pages += 1;

            let next = page
                .next_link()
                .map(|link| ContinuationToken::new(link.url.clone()));

            tracing::debug!(
                page = pages,
                entries = page.entries.len(),
                has_next = next.is_some(),
                "fetched search page"
            );

            for resource in page.entries {
                merged.push(resource);
            }

            let Some(next) = next else {
                break;
            };
            if !followed.insert(next.clone()) {
                return Err(Error::PaginationCycle {
                    continuation: next.to_string(),
                });
            }
            request = PageRequest::Continuation(next);
        }

        tracing::debug!(
            pages,
            resources = merged.resources.len(),
            duplicates = merged.duplicates,
            "search complete"
        );
        Ok(merged.resources)
    }
}

/// First-seen-wins accumulator. Resources without an id cannot be compared and are
/// always kept.
#[derive(Default)]
struct Merged {
    resources: Vec<Resource>,
    seen: HashSet<ResourceKey>,
    duplicates: usize,
}

impl Merged {
    fn push(&mut self, resource: Resource) {
        match resource.key() {
            Some(key) if self.seen.contains(&key) => self.duplicates += 1,
            Some(key) => {
                self.seen.insert(key);
                self.resources.push(resource);
            }
            None => self.resources.push(resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interop_models::Element;

    fn patient(id: Option<&str>) -> Resource {
        Resource::new("Patient", id, Element::new())
    }

    #[test]
    fn merge_keeps_first_seen_order() {
        let mut merged = Merged::default();
        merged.push(patient(Some("a")));
        merged.push(patient(Some("b")));
        merged.push(patient(Some("a")));
        merged.push(Resource::new("Observation", Some("a"), Element::new()));

        let keys: Vec<String> = merged
            .resources
            .iter()
            .filter_map(|r| r.key().map(|k| k.to_string()))
            .collect();
        assert_eq!(keys, vec!["Patient/a", "Patient/b", "Observation/a"]);
        assert_eq!(merged.duplicates, 1);
    }

    #[test]
    fn resources_without_id_are_never_deduplicated() {
        let mut merged = Merged::default();
        merged.push(patient(None));
        merged.push(patient(None));
        assert_eq!(merged.resources.len(), 2);
        assert_eq!(merged.duplicates, 0);
    }
}
