//! Identifier reconciliation
//!
//! Resolves caller-supplied business identifiers (e.g. MRNs) to canonical resource ids.
//! The internal registry is consulted first. Whatever it cannot resolve is searched on
//! the remote system in batches of `identifier=system|value,...` queries through the
//! [`SearchAggregator`].

use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::fetch::SearchQuery;
use crate::registry::IdentifierRegistry;
use crate::search::SearchAggregator;
use futures::stream::{self, StreamExt, TryStreamExt};
use interop_models::{Resource, SystemValue, Tenant};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Where a key was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Registry,
    Remote,
}

/// Outcome for one caller key. Keys resolved by neither source are absent from the
/// result map rather than represented here.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Registry { id: String },
    Remote { id: String, resource: Resource },
    /// The key lacked a system or value and was not looked up.
    InvalidKey { reason: String },
}

impl Resolution {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Registry { id } | Self::Remote { id, .. } => Some(id),
            Self::InvalidKey { .. } => None,
        }
    }

    pub fn origin(&self) -> Option<Origin> {
        match self {
            Self::Registry { .. } => Some(Origin::Registry),
            Self::Remote { .. } => Some(Origin::Remote),
            Self::InvalidKey { .. } => None,
        }
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Remote { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

/// A caller key and the identifier it stands for. `identifier` is `None` when the
/// caller could not supply both system and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    pub key: String,
    pub identifier: Option<SystemValue>,
}

impl LookupKey {
    pub fn new(key: impl Into<String>, system: &str, value: &str) -> Self {
        Self {
            key: key.into(),
            identifier: SystemValue::new(system, value),
        }
    }
}

pub struct IdentifierReconciler {
    registry: Arc<dyn IdentifierRegistry>,
    aggregator: SearchAggregator,
    config: ReconcilerConfig,
}

struct Batch {
    index: usize,
    keys: Vec<(String, SystemValue)>,
}

impl IdentifierReconciler {
    pub fn new(
        registry: Arc<dyn IdentifierRegistry>,
        aggregator: SearchAggregator,
        config: &ReconcilerConfig,
    ) -> Self {
        Self {
            registry,
            aggregator,
            config: config.clone(),
        }
    }

    /// Resolve raw values of one identifier system. The raw value is the result key.
    pub async fn resolve(
        &self,
        tenant: &Tenant,
        system: &str,
        values: &[String],
    ) -> Result<HashMap<String, Resolution>> {
        let keys = values
            .iter()
            .map(|value| LookupKey::new(value.as_str(), system, value))
            .collect();
        self.resolve_keys(tenant, keys).await
    }

    /// Resolve arbitrary keys. Each key appears at most once in the result; the first
    /// occurrence of a repeated key wins.
    pub async fn resolve_keys(
        &self,
        tenant: &Tenant,
        keys: Vec<LookupKey>,
    ) -> Result<HashMap<String, Resolution>> {
        let mut resolved: HashMap<String, Resolution> = HashMap::new();
        let mut pending: Vec<(String, SystemValue)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for LookupKey { key, identifier } in keys {
            if !seen.insert(key.clone()) {
                continue;
            }
            match identifier {
                Some(identifier) => pending.push((key, identifier)),
                None => {
                    resolved.insert(
                        key,
                        Resolution::InvalidKey {
                            reason: "identifier system or value is missing".to_string(),
                        },
                    );
                }
            }
        }

        if pending.is_empty() {
            return Ok(resolved);
        }

        let request: HashMap<String, SystemValue> = pending.iter().cloned().collect();
        let from_registry = self
            .registry
            .lookup(tenant, &request)
            .await
            .map_err(Error::Registry)?;

        pending.retain(|(key, _)| match from_registry.get(key) {
            Some(id) => {
                resolved.insert(key.clone(), Resolution::Registry { id: id.clone() });
                false
            }
            None => true,
        });

        tracing::debug!(
            tenant = %tenant,
            requested = request.len(),
            registry_hits = request.len() - pending.len(),
            "identifier registry lookup complete"
        );

        if pending.is_empty() {
            return Ok(resolved);
        }

        let batches: Vec<Batch> = pending
            .chunks(self.config.max_identifiers_per_query.max(1))
            .enumerate()
            .map(|(index, keys)| Batch {
                index,
                keys: keys.to_vec(),
            })
            .collect();

        let mut results: Vec<(Batch, Vec<Resource>)> = stream::iter(batches)
            .map(|batch| self.search_batch(tenant, batch))
            .buffer_unordered(self.config.max_concurrent_batches.max(1))
            .try_collect()
            .await?;
        results.sort_by_key(|(batch, _)| batch.index);

        for (batch, resources) in &results {
            match_batch(batch, resources, &mut resolved);
        }

        Ok(resolved)
    }

    async fn search_batch(&self, tenant: &Tenant, batch: Batch) -> Result<(Batch, Vec<Resource>)> {
        let tokens: Vec<String> = batch
            .keys
            .iter()
            .map(|(_, identifier)| identifier.to_search_token())
            .collect();
        let query = SearchQuery::new(self.config.resource_type.as_str())
            .with_param("identifier", tokens.join(","));

        tracing::debug!(
            tenant = %tenant,
            batch = batch.index,
            identifiers = batch.keys.len(),
            "searching remote system for unresolved identifiers"
        );

        let resources = self.aggregator.search(tenant, query).await?;
        Ok((batch, resources))
    }
}

/// Assign each returned resource to the keys whose identifier it carries. One resource
/// may satisfy several keys; when several resources satisfy one key the first wins.
fn match_batch(batch: &Batch, resources: &[Resource], resolved: &mut HashMap<String, Resolution>) {
    for resource in resources {
        let Some(id) = resource.id() else {
            tracing::debug!(
                resource_type = resource.resource_type(),
                "skipping remote resource without id"
            );
            continue;
        };

        // Identifiers missing system or value never match anything.
        let carried: Vec<SystemValue> = resource
            .identifiers()
            .filter_map(|identifier| identifier.business_key())
            .collect();

        for (key, identifier) in &batch.keys {
            if !carried.contains(identifier) {
                continue;
            }
            match resolved.get(key) {
                Some(existing) => {
                    if existing.id() != Some(id) {
                        tracing::warn!(
                            key = %key,
                            identifier = %identifier,
                            kept = existing.id(),
                            ignored = id,
                            "identifier matches several remote resources; keeping the first"
                        );
                    }
                }
                None => {
                    resolved.insert(
                        key.clone(),
                        Resolution::Remote {
                            id: id.to_string(),
                            resource: resource.clone(),
                        },
                    );
                }
            }
        }
    }
}
