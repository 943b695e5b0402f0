use interop_models::ModelError;
use thiserror::Error;

/// Error type returned by collaborators (fetchers, registries). Kept opaque and
/// surfaced unchanged as the `source` of the wrapping [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// The page fetcher failed. Pagination stops at the first failure; no retry.
    #[error("fetching search page {page} failed: {source}")]
    Fetch {
        /// 1-based number of the page that failed.
        page: usize,
        #[source]
        source: BoxError,
    },

    #[error("search cancelled after {pages} page(s)")]
    Cancelled { pages: usize },

    #[error("search exceeded the limit of {limit} pages")]
    PageLimitExceeded { limit: usize },

    #[error("pagination cycle: continuation '{continuation}' was already followed")]
    PaginationCycle { continuation: String },

    #[error("identifier registry lookup failed: {0}")]
    Registry(#[source] BoxError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
