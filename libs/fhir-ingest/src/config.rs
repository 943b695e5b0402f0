//! Configuration for the ingestion core

use crate::error::{Error, Result};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "INTEROP";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on pages followed by one search. Guards against servers that
    /// keep handing out fresh `next` links. Default: 1000
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Resource type searched on the remote system. Default: Patient
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    /// Identifier tokens per remote search (`identifier=a|1,a|2,...`). Default: 10
    #[serde(default = "default_max_identifiers_per_query")]
    pub max_identifiers_per_query: usize,
    /// Remote batches in flight at once. Default: 4
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `interop_ingest=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            resource_type: default_resource_type(),
            max_identifiers_per_query: default_max_identifiers_per_query(),
            max_concurrent_batches: default_max_concurrent_batches(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_max_pages() -> usize {
    1000
}

fn default_resource_type() -> String {
    "Patient".to_string()
}

fn default_max_identifiers_per_query() -> usize {
    10
}

fn default_max_concurrent_batches() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl IngestConfig {
    /// Load from `.env`, an optional `interop.{toml,yaml,json}` file and `INTEROP__*`
    /// environment variables, in increasing precedence.
    pub fn load() -> Result<Self> {
        Self::load_from("interop")
    }

    /// Same as [`IngestConfig::load`] with an explicit config file stem.
    pub fn load_from(file_stem: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("search.max_pages", default_max_pages() as i64)?
            .set_default("reconciler.resource_type", default_resource_type())?
            .set_default(
                "reconciler.max_identifiers_per_query",
                default_max_identifiers_per_query() as i64,
            )?
            .set_default(
                "reconciler.max_concurrent_batches",
                default_max_concurrent_batches() as i64,
            )?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .add_source(config::File::with_name(file_stem).required(false))
            // INTEROP__RECONCILER__MAX_IDENTIFIERS_PER_QUERY=20 → reconciler.max_identifiers_per_query
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.max_pages == 0 {
            return Err(Error::InvalidConfig(
                "search.max_pages must be greater than 0".to_string(),
            ));
        }
        if self.reconciler.resource_type.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "reconciler.resource_type must not be empty".to_string(),
            ));
        }
        if self.reconciler.max_identifiers_per_query == 0 {
            return Err(Error::InvalidConfig(
                "reconciler.max_identifiers_per_query must be greater than 0".to_string(),
            ));
        }
        if self.reconciler.max_concurrent_batches == 0 {
            return Err(Error::InvalidConfig(
                "reconciler.max_concurrent_batches must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
