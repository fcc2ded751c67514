//! Deal evaluation pipeline - normalize, persist, price, score
//!
//! Storage failures never abort an evaluation: cache and history errors are
//! logged and the pipeline carries on with what it has.

use crate::config::EngineConfig;
use crate::deals::market::{estimate_market_price, resolve_market_price, Estimate};
use crate::deals::normalize::normalize_all_for;
use crate::deals::reference::{brand_tier_estimate, ReferenceLookup};
use crate::deals::score::score_and_categorize;
use crate::deals::store::MarketStore;
use crate::deals::types::{DealReport, MarketKey, MarketPrice};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// One batch of raw listings for a single brand/model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub brand: String,
    pub model: String,
    #[serde(default = "default_guitar_type")]
    pub guitar_type: String,
    /// Marketplace the raw listings came from
    #[serde(default = "default_source")]
    pub source: String,
    pub listings: Vec<Value>,
}

fn default_guitar_type() -> String {
    "Electric".to_string()
}

fn default_source() -> String {
    "manual".to_string()
}

impl EvaluateRequest {
    pub fn key(&self) -> MarketKey {
        MarketKey::new(&self.brand, &self.model, &self.guitar_type)
    }
}

pub struct DealEngine {
    store: Arc<dyn MarketStore>,
    reference: Arc<dyn ReferenceLookup>,
    config: EngineConfig,
}

impl DealEngine {
    pub fn new(
        store: Arc<dyn MarketStore>,
        reference: Arc<dyn ReferenceLookup>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            reference,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn market_price(&self, key: &MarketKey) -> MarketPrice {
        self.market_price_at(key, Utc::now()).await
    }

    /// Resolve the market price for `key`, writing fresh estimates back to the cache
    pub async fn market_price_at(&self, key: &MarketKey, now: DateTime<Utc>) -> MarketPrice {
        let estimator = &self.config.estimator;

        let cached = match self.store.cached_estimate(key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Failed to read cached market price for {}: {}", key, e);
                None
            }
        };

        let history = match self.store.historical_listings(key, now - estimator.lookback()).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to load listing history for {}: {}", key, e);
                Vec::new()
            }
        };

        let estimate = estimate_market_price(key, &history, cached.as_ref(), now, estimator);

        if let Estimate::Fresh(fresh) = &estimate {
            if let Err(e) = self.store.save_estimate(fresh).await {
                warn!("Failed to cache market price for {}: {}", key, e);
            }
        }

        let reference = self.reference.reference_price(&key.brand, &key.model);
        let brand_default = brand_tier_estimate(&key.brand, &key.model, &self.config.brand_tiers);

        resolve_market_price(
            &estimate,
            reference.as_ref(),
            brand_default,
            self.config.fallback_market_price,
        )
    }

    pub async fn evaluate(&self, request: &EvaluateRequest) -> DealReport {
        self.evaluate_at(request, Utc::now()).await
    }

    /// Run the full pipeline over one request
    pub async fn evaluate_at(&self, request: &EvaluateRequest, now: DateTime<Utc>) -> DealReport {
        let key = request.key();

        info!("Step 1/4: Normalizing {} listings for {}...", request.listings.len(), key);
        let listings = normalize_all_for(&request.listings, &request.source, &key, now);

        info!("Step 2/4: Saving listings...");
        match self.store.save_listings(&listings).await {
            Ok(stats) => info!("Saved listings ({})", stats),
            Err(e) => warn!("Failed to save listings for {}: {}", key, e),
        }

        info!("Step 3/4: Resolving market price...");
        let reference_price = self.market_price_at(&key, now).await;
        info!(
            "Market price for {}: ${} ({:?})",
            key, reference_price.price, reference_price.basis
        );

        info!("Step 4/4: Scoring...");
        let batch = score_and_categorize(
            &listings,
            reference_price.price,
            self.reference.as_ref(),
            &self.config,
        );

        info!(
            "Evaluation complete for {}: {} scored, {} failed",
            key,
            batch.scored.len(),
            batch.failures.len()
        );

        DealReport {
            reference_price,
            scored_listings: batch.scored,
            categories: batch.categories,
            failures: batch.failures,
        }
    }
}
