#![allow(dead_code)]

use async_trait::async_trait;
use interop_ingest::{BoxError, IdentifierRegistry, InMemoryRegistry, PageFetcher, PageRequest};
use interop_models::{Page, Resource, SystemValue, Tenant};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const MRN_SYSTEM: &str = "urn:oid:1.2.840.114350.1.13.0.1.7.5.737384.14";

pub fn tenant(mnemonic: &str) -> Tenant {
    Tenant::new(mnemonic).expect("valid tenant mnemonic")
}

pub fn resource(value: Value) -> Resource {
    Resource::from_json(&value).expect("fixture resource decodes")
}

pub fn patient(id: &str, mrns: &[&str]) -> Resource {
    let identifiers: Vec<Value> = mrns
        .iter()
        .map(|mrn| json!({"system": MRN_SYSTEM, "value": mrn}))
        .collect();
    resource(json!({
        "resourceType": "Patient",
        "id": id,
        "identifier": identifiers
    }))
}

pub fn ids(resources: &[Resource]) -> Vec<String> {
    resources
        .iter()
        .map(|r| r.id().unwrap_or("<none>").to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Scripted fetcher
// ---------------------------------------------------------------------------

enum Scripted {
    Page(Page),
    Fail(String),
    Hang,
}

/// Answers requests from a script keyed by the request's display form
/// (`Patient?name=doe` for the initial query, the link url for continuations).
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, request: &str, page: Page) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(request.to_string(), Scripted::Page(page));
        self
    }

    pub fn fail(self, request: &str, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(request.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    pub fn hang(self, request: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(request.to_string(), Scripted::Hang);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, _tenant: &Tenant, request: &PageRequest) -> Result<Page, BoxError> {
        self.requests.lock().unwrap().push(request.clone());
        let answer = {
            let script = self.script.lock().unwrap();
            match script.get(&request.to_string()) {
                Some(Scripted::Page(page)) => Ok(Some(page.clone())),
                Some(Scripted::Fail(message)) => Err(message.clone()),
                Some(Scripted::Hang) => Ok(None),
                None => Err(format!("unscripted request: {request}")),
            }
        };
        match answer {
            Ok(Some(page)) => Ok(page),
            Ok(None) => std::future::pending().await,
            Err(message) => Err(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifier search server
// ---------------------------------------------------------------------------

/// Serves `identifier=system|value,...` searches from a fixed set of resources,
/// one terminal page per query. Optionally answers after a delay and tracks how many
/// queries overlap.
#[derive(Default)]
pub struct IdentifierSearchFetcher {
    resources: Vec<Resource>,
    queries: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    latency: Duration,
    slow: Vec<(String, Duration)>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl IdentifierSearchFetcher {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            ..Self::default()
        }
    }

    /// Delay applied to every query.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay applied instead to queries asking for `mrn`.
    pub fn slow_for(mut self, mrn: &str, delay: Duration) -> Self {
        self.slow.push((mrn_key(mrn).to_search_token(), delay));
        self
    }

    /// Most queries observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// The `identifier` parameter of every query, in the order answers were sent.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// The `identifier` parameter of every query received.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for IdentifierSearchFetcher {
    async fn fetch_page(&self, _tenant: &Tenant, request: &PageRequest) -> Result<Page, BoxError> {
        let PageRequest::Initial(query) = request else {
            return Err("identifier searches are single-page".into());
        };
        let tokens = query.param("identifier").unwrap_or_default().to_string();
        self.queries.lock().unwrap().push(tokens.clone());

        let wanted: Vec<&str> = tokens.split(',').collect();
        let delay = self
            .slow
            .iter()
            .find(|(token, _)| wanted.contains(&token.as_str()))
            .map_or(self.latency, |(_, delay)| *delay);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(tokens.clone());

        let entries = self
            .resources
            .iter()
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

// ---------------------------------------------------------------------------
// Counting registry
// ---------------------------------------------------------------------------

/// Wraps an [`InMemoryRegistry`] and records how it was called.
pub struct CountingRegistry {
    inner: InMemoryRegistry,
    calls: AtomicUsize,
    requested: Mutex<Vec<SystemValue>>,
    fail: bool,
}

impl CountingRegistry {
    pub fn new(tenant: &Tenant, entries: &[(&str, &str)]) -> Self {
        let inner = InMemoryRegistry::new();
        for (mrn, id) in entries {
            inner.insert(tenant, mrn_key(mrn), *id);
        }
        Self {
            inner,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            inner: InMemoryRegistry::new(),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<SystemValue> {
        let mut requested = self.requested.lock().unwrap().clone();
        requested.sort();
        requested
    }
}

#[async_trait]
impl IdentifierRegistry for CountingRegistry {
    async fn lookup(
        &self,
        tenant: &Tenant,
        identifiers: &HashMap<String, SystemValue>,
    ) -> Result<HashMap<String, String>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .extend(identifiers.values().cloned());
        if self.fail {
            return Err("registry unavailable".into());
        }
        self.inner.lookup(tenant, identifiers).await
    }
}

pub fn mrn_key(mrn: &str) -> SystemValue {
    SystemValue::new(MRN_SYSTEM, mrn).expect("non-blank MRN")
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
