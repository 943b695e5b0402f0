//! Tenant-scoped ingestion of remote FHIR search results
//!
//! - [`SearchAggregator`]: follows `next` links through a [`PageFetcher`] and merges
//!   the pages into one de-duplicated result
//! - [`IdentifierReconciler`]: resolves business identifiers against an
//!   [`IdentifierRegistry`] first, then by batched remote searches
//!
//! HTTP, persistence and retries are collaborators behind the two traits.

pub mod cancel;
pub mod config;
pub mod error;
pub mod fetch;
pub mod reconcile;
pub mod registry;
pub mod search;

pub use cancel::{CancelHandle, Cancellation};
pub use config::{IngestConfig, LoggingConfig, ReconcilerConfig, SearchConfig};
pub use error::{BoxError, Error, Result};
pub use fetch::{ContinuationToken, PageFetcher, PageRequest, SearchQuery};
pub use reconcile::{IdentifierReconciler, LookupKey, Origin, Resolution};
pub use registry::{IdentifierRegistry, InMemoryRegistry};
pub use search::SearchAggregator;
