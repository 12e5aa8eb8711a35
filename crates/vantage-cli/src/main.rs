//! vantage: command-line front end for the dashboard filter layer.
//!
//! Each invocation loads the filter state the way a page load does (stored
//! slot, then the page URL), applies one command and prints the resulting
//! canonical location as JSON.

mod config;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vantage_core::defaults::PAGE_URL;
use vantage_core::{AdvancedFiltersPatch, QueryKey, SentimentFilter, TimeRange};
use vantage_query::{QueryCache, QueryRequest, QuerySubscription, SubscriptionOptions};
use vantage_store::storage::to_stored_json;
use vantage_store::{bootstrap, FileStorage, FilterStore, Location, MemoryLocation};

use crate::config::DashboardConfig;

#[derive(Parser)]
#[command(name = "vantage")]
#[command(author, version, about = "Global dashboard filters and cached queries")]
#[command(propagate_version = true)]
struct Cli {
    /// Current page location (default: http://localhost:3000/)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Backend base URL (overrides VANTAGE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Filter state file (overrides VANTAGE_STATE_FILE)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current filters and location
    Show,

    /// Select a preset time range (24h, 7d, 30d, custom)
    SetRange {
        range: TimeRange,
    },

    /// Select a custom date range; either bound may be omitted
    SetCustom {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Select a model ("All models" clears it)
    SetModel {
        model: String,
    },

    /// Select a region ("Region" clears it)
    SetRegion {
        region: String,
    },

    /// Change advanced filters; omitted flags keep their value
    SetAdvanced {
        /// all, positive, neutral or negative
        #[arg(long)]
        sentiment: Option<SentimentFilter>,

        #[arg(long)]
        hide_bots: Option<bool>,

        #[arg(long)]
        verified_only: Option<bool>,
    },

    /// Restore every filter to its default
    Reset,

    /// Print the cache key a view would use under the current filters
    Key {
        /// API path, e.g. /api/mentions
        path: String,

        /// View-local parameters as key=value
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Fetch a view's data through the query cache
    Fetch {
        /// API path, e.g. /api/mentions
        path: String,

        /// View-local parameters as key=value
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got: {}", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _log_guard = init_tracing();

    let cli = Cli::parse();

    let mut config = DashboardConfig::from_env()?;
    if let Some(api_url) = cli.api_url.clone() {
        config.api_url = api_url;
    }
    if let Some(state_file) = cli.state_file.clone() {
        config.state_file = state_file;
    }
    config.validate()?;

    let page_url = cli.url.clone().unwrap_or_else(|| PAGE_URL.to_string());
    let location = Arc::new(MemoryLocation::new(&page_url));
    let storage = Arc::new(FileStorage::new(config.state_file.clone()));
    let store = bootstrap(storage, location.clone());

    run(cli.command, &config, &store, location.as_ref()).await
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "vantage=warn")
///
/// Console output goes to stderr so command output on stdout stays parseable.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vantage=warn".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("vantage.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // no ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

async fn run(
    command: Commands,
    config: &DashboardConfig,
    store: &FilterStore,
    location: &dyn Location,
) -> anyhow::Result<()> {
    match command {
        Commands::Show => {}
        Commands::SetRange { range } => store.set_time_range(range),
        Commands::SetCustom { from, to } => store.set_custom_range(from, to),
        Commands::SetModel { model } => store.set_model(model),
        Commands::SetRegion { region } => store.set_region(region),
        Commands::SetAdvanced {
            sentiment,
            hide_bots,
            verified_only,
        } => {
            let patch = AdvancedFiltersPatch {
                sentiment,
                hide_bots,
                verified_only,
            };
            if patch.is_empty() {
                anyhow::bail!("set-advanced needs at least one of --sentiment, --hide-bots, --verified-only");
            }
            store.set_advanced(patch);
        }
        Commands::Reset => store.reset_all(),
        Commands::Key { path, params } => {
            let key = params
                .iter()
                .fold(QueryKey::new(path).with_filters(&store.snapshot()), |key, (k, v)| {
                    key.param(k.as_str(), v)
                });
            let output = serde_json::json!({
                "key": key.as_str(),
                "location": location.href(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }
        Commands::Fetch { path, params } => {
            return cmd_fetch(config, store, path, params).await;
        }
    }

    print_state(store, location)
}

fn print_state(store: &FilterStore, location: &dyn Location) -> anyhow::Result<()> {
    let snapshot = store.snapshot();
    let filters: serde_json::Value = serde_json::from_str(&to_stored_json(&snapshot)?)?;
    let output = serde_json::json!({
        "location": location.href(),
        "query": store.query_string(),
        "label": snapshot.time_label(),
        "filters": filters,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_fetch(
    config: &DashboardConfig,
    store: &FilterStore,
    path: String,
    params: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let fetcher = config
        .http_fetcher()
        .context("Failed to create HTTP fetcher")?;
    let cache = QueryCache::with_config(Arc::new(fetcher), config.cache_config());

    let request = params
        .into_iter()
        .fold(QueryRequest::filtered(path), |request, (k, v)| request.param(k, v));
    let mut view = QuerySubscription::new(
        cache,
        store.subscribe(),
        request,
        SubscriptionOptions::default(),
    );
    let key = view.key().unwrap_or_default().to_string();
    let state = view.settled().await;

    if let Some(err) = state.error {
        anyhow::bail!("{} ({})", err, key);
    }
    let output = serde_json::json!({
        "key": key,
        "data": state.data.as_deref(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
