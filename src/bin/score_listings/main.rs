//! Batch scorer - evaluates one request file and prints the deal report as JSON
//!
//! Usage: score-listings <request.json>
//!
//! The request file holds `{brand, model, guitarType?, source?, listings: [...]}`.
//! Runs against an in-memory store, so market prices come from the batch
//! itself or the reference catalog.

use anyhow::{bail, Context, Result};
use guitar_deals::config::AppConfig;
use guitar_deals::deals::engine::{DealEngine, EvaluateRequest};
use guitar_deals::deals::reference::{ReferenceLookup, StaticCatalog};
use guitar_deals::deals::store::MemoryStore;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    config.logging.init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let program = args.first().map(String::as_str).unwrap_or("score-listings");
        bail!("usage: {} <request.json>", program);
    }
    let path = PathBuf::from(&args[1]);

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let request: EvaluateRequest =
        serde_json::from_str(&raw).with_context(|| format!("Invalid request in {:?}", path))?;

    let reference: Arc<dyn ReferenceLookup> = match &config.catalog_path {
        Some(catalog) => Arc::new(StaticCatalog::from_csv_path(catalog)?),
        None => Arc::new(StaticCatalog::builtin()),
    };

    let engine = DealEngine::new(Arc::new(MemoryStore::new()), reference, config.engine);

    info!("Scoring {} listings from {:?}", request.listings.len(), path);
    let report = engine.evaluate(&request).await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
