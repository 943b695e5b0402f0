mod logging;
mod offline;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use clap::{ArgAction, Parser, Subcommand};
use interop_ingest::{
    Cancellation, IdentifierReconciler, IngestConfig, Resolution, SearchAggregator, SearchQuery,
};
use interop_localize::Localize;
use interop_models::{Page, Resource, Tenant};
use serde_json::{json, Map, Value};

use offline::{load_registry, read_json, BundleSearchFetcher, DirectoryFetcher};

#[derive(Parser)]
#[command(
    name = "interop",
    about = "Tenant-scoped FHIR ingestion tools",
    version,
    arg_required_else_help = true
)]
struct Cli {
    /// Config file stem (e.g. `interop` for interop.toml). Environment variables
    /// prefixed with INTEROP__ override it.
    #[arg(long, global = true, default_value = "interop")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Localize a resource or Bundle (JSON) for a tenant.
    Localize {
        /// Tenant mnemonic.
        #[arg(short, long)]
        tenant: String,
        /// Path to a resource or Bundle JSON file (or "-" for stdin).
        input: PathBuf,
        /// Pretty-print JSON output.
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Follow `next` links through saved searchset Bundles and print the merged result.
    Aggregate {
        /// Tenant mnemonic.
        #[arg(short, long)]
        tenant: String,
        /// Directory holding the saved pages.
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,
        /// File name of the first page inside DIR.
        #[arg(short, long, value_name = "FILE")]
        first: String,
        /// Resource type searched (for logging).
        #[arg(long, default_value = "Patient")]
        resource_type: String,
        /// Localize the merged resources for the tenant.
        #[arg(long, action = ArgAction::SetTrue)]
        localize: bool,
        /// Pretty-print JSON output.
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Resolve identifier values against a registry file, then a Bundle of remote resources.
    Reconcile {
        /// Tenant mnemonic.
        #[arg(short, long)]
        tenant: String,
        /// Identifier system shared by all values.
        #[arg(short, long)]
        system: String,
        /// Registry file: JSON array of {"system", "value", "id"}.
        #[arg(long, value_name = "FILE")]
        registry: PathBuf,
        /// Bundle whose entries stand in for the remote system.
        #[arg(long, value_name = "FILE")]
        remote: PathBuf,
        /// Identifier values to resolve.
        #[arg(required = true)]
        values: Vec<String>,
        /// Pretty-print JSON output.
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Print CLI version.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = IngestConfig::load_from(&cli.config).context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    match cli.command {
        Commands::Version => {}
        Commands::Localize {
            tenant,
            input,
            pretty,
        } => {
            let tenant = parse_tenant(&tenant)?;
            let value = read_json(&input)?;
            write_json(&run_localize(&value, &tenant)?, pretty)?;
        }
        Commands::Aggregate {
            tenant,
            dir,
            first,
            resource_type,
            localize,
            pretty,
        } => {
            let tenant = parse_tenant(&tenant)?;
            let fetcher = Arc::new(DirectoryFetcher::new(dir, first));
            let aggregator = SearchAggregator::new(fetcher, &config.search);
            let bundle = run_aggregate(
                &aggregator,
                &tenant,
                SearchQuery::new(resource_type),
                localize,
            )
            .await?;
            write_json(&bundle, pretty)?;
        }
        Commands::Reconcile {
            tenant,
            system,
            registry,
            remote,
            values,
            pretty,
        } => {
            let tenant = parse_tenant(&tenant)?;
            let registry = Arc::new(load_registry(&registry, &tenant)?);
            let remote = Arc::new(BundleSearchFetcher::from_bundle(&read_json(&remote)?)?);
            let reconciler = IdentifierReconciler::new(
                registry,
                SearchAggregator::new(remote, &config.search),
                &config.reconciler,
            );
            let resolved = reconciler.resolve(&tenant, &system, &values).await?;
            write_json(&resolutions_to_json(&values, &resolved), pretty)?;
        }
    }

    Ok(())
}

fn parse_tenant(raw: &str) -> Result<Tenant> {
    Tenant::new(raw).with_context(|| format!("Invalid tenant '{raw}'"))
}

fn run_localize(value: &Value, tenant: &Tenant) -> Result<Value> {
    if value.get("resourceType").and_then(Value::as_str) == Some("Bundle") {
        let page = Page::from_bundle_json(value).context("Invalid Bundle")?;
        return Ok(page.localize(tenant).to_bundle_json());
    }
    let resource = Resource::from_json(value).context("Invalid resource")?;
    Ok(resource.localize(tenant).to_json())
}

async fn run_aggregate(
    aggregator: &SearchAggregator,
    tenant: &Tenant,
    query: SearchQuery,
    localize: bool,
) -> Result<Value> {
    let (cancel, cancellation) = Cancellation::channel();
    let search = aggregator.search_with_cancel(tenant, query, &cancellation);
    tokio::pin!(search);

    let resources = tokio::select! {
        result = &mut search => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, cancelling search...");
            cancel.cancel();
            search.await
        }
    }
    .context("Search failed")?;

    let page = Page::new(resources);
    let page = if localize { page.localize(tenant) } else { page };
    Ok(page.to_bundle_json())
}

fn resolutions_to_json(
    values: &[String],
    resolved: &std::collections::HashMap<String, Resolution>,
) -> Value {
    let mut out = Map::new();
    for value in values {
        let Some(resolution) = resolved.get(value) else {
            continue;
        };
        let entry = match resolution {
            Resolution::Registry { id } => json!({"id": id, "origin": "registry"}),
            Resolution::Remote { id, resource } => {
                json!({"id": id, "origin": "remote", "resource": resource.to_json()})
            }
            Resolution::InvalidKey { reason } => json!({"invalid": reason}),
        };
        out.insert(value.clone(), entry);
    }
    Value::Object(out)
}

fn write_json(value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}
