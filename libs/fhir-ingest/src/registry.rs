//! The internal identifier registry collaborator

use crate::error::BoxError;
use async_trait::async_trait;
use interop_models::{SystemValue, Tenant};
use std::collections::HashMap;
use std::sync::RwLock;

/// Bulk lookup of business identifiers in the platform's own id space.
///
/// Returns the subset of `identifiers` it could resolve, keyed by the caller's key.
/// Unknown identifiers are simply absent from the result.
#[async_trait]
pub trait IdentifierRegistry: Send + Sync {
    async fn lookup(
        &self,
        tenant: &Tenant,
        identifiers: &HashMap<String, SystemValue>,
    ) -> Result<HashMap<String, String>, BoxError>;
}

/// Registry held in memory, partitioned by tenant.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: RwLock<HashMap<(Tenant, SystemValue), String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, tenant: &Tenant, key: SystemValue, id: impl Into<String>) -> Self {
        self.insert(tenant, key, id);
        self
    }

    /// Register `key` → `id` for `tenant`, replacing any previous mapping.
    pub fn insert(&self, tenant: &Tenant, key: SystemValue, id: impl Into<String>) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert((tenant.clone(), key), id.into());
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentifierRegistry for InMemoryRegistry {
    async fn lookup(
        &self,
        tenant: &Tenant,
        identifiers: &HashMap<String, SystemValue>,
    ) -> Result<HashMap<String, String>, BoxError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| "identifier registry lock poisoned")?;

        // Clones per probe; fine for the sizes an in-memory registry holds.
        let resolved = identifiers
            .iter()
            .filter_map(|(key, identifier)| {
                entries
                    .get(&(tenant.clone(), identifier.clone()))
                    .map(|id| (key.clone(), id.clone()))
            })
            .collect();
        Ok(resolved)
    }
}
