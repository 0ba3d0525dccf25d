// ============================================================================
// feed-access — CLI for feed content access resolution
// ============================================================================
// Usage:
//   feed-access evaluate --input post.json [--now RFC3339]     Evaluate one post
//   feed-access feed --input page.json [--market crypto]       Resolve a feed page
//                    [--tab premium] [--cursor C] [--now RFC3339]
//   feed-access config                                         Show effective config
// ============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use feed_access_core::access::{
    evaluate, AccessResolver, EntitlementSnapshot, SnapshotSource, VerdictCache,
};
use feed_access_core::contract::AccessCheck;
use feed_access_core::{
    AccessCheckResponse, AccessConfig, ApiEnvelope, EntitlementFacts, FeedFilters, FeedTab,
    MarketType, Post,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Feed access resolution tool
#[derive(Parser)]
#[command(name = "feed-access", version, about = "Resolve feed post access verdicts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one post against explicit entitlement facts
    Evaluate {
        /// JSON file with { viewerId, post, facts }
        #[arg(long)]
        input: PathBuf,

        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,
    },

    /// Resolve a feed page against a snapshot of entitlement records
    Feed {
        /// JSON file with { viewerId, posts, follows, subscriptions, purchases, tips }
        #[arg(long)]
        input: PathBuf,

        /// Only include posts for this market: crypto, stocks, forex, futures, options
        #[arg(long)]
        market: Option<String>,

        /// Feed tab: all, following, premium
        #[arg(long, default_value = "all")]
        tab: String,

        /// Pagination cursor passed through with the filters
        #[arg(long)]
        cursor: Option<String>,

        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,
    },

    /// Show the effective configuration (after .env and environment)
    Config,
}

/// Input for `evaluate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateInput {
    viewer_id: String,
    post: Post,
    #[serde(default)]
    facts: EntitlementFacts,
}

/// Input for `feed`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedInput {
    viewer_id: String,
    posts: Vec<Post>,
    #[serde(flatten)]
    entitlements: EntitlementSnapshot,
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("feed_access=info".parse()?)
                .add_directive("feed_access_core=info".parse()?),
        )
        .init();
    Ok(())
}

fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Invalid --now '{}', expected RFC 3339", s))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_logging()?;
    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = AccessConfig::from_env();

    match cli.command {
        Commands::Evaluate { input, now } => cmd_evaluate(&input, now.as_deref()),
        Commands::Feed {
            input,
            market,
            tab,
            cursor,
            now,
        } => cmd_feed(&config, &input, market, &tab, cursor, now.as_deref()).await,
        Commands::Config => cmd_config(&config),
    }
}

fn cmd_evaluate(input: &Path, now: Option<&str>) -> Result<()> {
    let now = parse_now(now)?;
    let request: EvaluateInput = read_json(input)?;

    let response: AccessCheckResponse = evaluate(&request.post, &request.viewer_id, &request.facts, now)
        .map(|verdict| {
            info!("Post {}: {}", request.post.id, verdict.describe());
            AccessCheck {
                post_id: request.post.id.clone(),
                verdict,
            }
        })
        .into();

    print_json(&response)
}

async fn cmd_feed(
    config: &AccessConfig,
    input: &Path,
    market: Option<String>,
    tab: &str,
    cursor: Option<String>,
    now: Option<&str>,
) -> Result<()> {
    let now = parse_now(now)?;
    let market_type = market
        .as_deref()
        .map(str::parse::<MarketType>)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let tab: FeedTab = tab.parse().map_err(anyhow::Error::msg)?;
    let filters = FeedFilters {
        market_type,
        tab,
        cursor,
    };

    let request: FeedInput = read_json(input)?;
    info!(
        "Resolving {} posts for viewer {} at {}",
        request.posts.len(),
        request.viewer_id,
        now.to_rfc3339()
    );

    let source = Arc::new(SnapshotSource::new(request.entitlements));
    let cache = Arc::new(VerdictCache::with_capacity(config.cache_max_entries));
    let resolver = AccessResolver::new(source, cache, config);

    let response = resolver
        .resolve_feed(&request.viewer_id, &filters, request.posts, now)
        .await;

    print_json(&response)
}

fn cmd_config(config: &AccessConfig) -> Result<()> {
    print_json(&ApiEnvelope::ok(config))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
