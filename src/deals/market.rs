//! Market price estimation - trimmed statistics over recent listings,
//! with cache reuse and a reference/heuristic fallback chain

use crate::config::EstimatorConfig;
use crate::deals::types::{
    Listing, MarketKey, MarketPrice, MarketPriceEstimate, PriceBasis, ReferencePrice,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Outcome of `estimate_market_price`
#[derive(Debug, Clone, PartialEq)]
pub enum Estimate {
    /// Reused a cached estimate inside the freshness window
    Cached(MarketPriceEstimate),
    /// Freshly aggregated; the caller should persist it
    Fresh(MarketPriceEstimate),
    /// Too few qualifying listings to trust an average
    InsufficientData { sample_size: usize },
}

impl Estimate {
    pub fn estimate(&self) -> Option<&MarketPriceEstimate> {
        match self {
            Estimate::Cached(e) | Estimate::Fresh(e) => Some(e),
            Estimate::InsufficientData { .. } => None,
        }
    }
}

/// Price statistics over one sample
#[derive(Debug, Clone, PartialEq)]
pub struct PriceStats {
    /// Mean after trimming both tails
    pub avg: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub median: Decimal,
    pub sample_size: usize,
}

/// True when `cached` is for `key` and younger than the freshness window
pub fn is_fresh(
    cached: &MarketPriceEstimate,
    key: &MarketKey,
    now: DateTime<Utc>,
    config: &EstimatorConfig,
) -> bool {
    cached.key().cache_key() == key.cache_key() && cached.age(now) < config.freshness()
}

/// Estimate the market price for `key`.
///
/// Priority: fresh cache hit, then a trimmed mean over qualifying history
/// (matching key, priced, active, inside the lookback window). Fewer than
/// `min_sample_size` qualifying listings yields `InsufficientData`.
pub fn estimate_market_price(
    key: &MarketKey,
    historical: &[Listing],
    cached: Option<&MarketPriceEstimate>,
    now: DateTime<Utc>,
    config: &EstimatorConfig,
) -> Estimate {
    if let Some(cached) = cached {
        if is_fresh(cached, key, now, config) {
            info!(
                "Using cached market price for {}: ${} (n={})",
                key, cached.avg_price, cached.sample_size
            );
            return Estimate::Cached(cached.clone());
        }
        debug!("Cached market price for {} is stale or mismatched", key);
    }

    let prices = qualifying_prices(key, historical, now, config);

    if prices.len() < config.min_sample_size {
        warn!(
            "Insufficient data for {} market price (only {} listings)",
            key,
            prices.len()
        );
        return Estimate::InsufficientData {
            sample_size: prices.len(),
        };
    }

    let stats = match trimmed_stats(prices, config) {
        Some(stats) => stats,
        None => {
            warn!("Could not aggregate prices for {}", key);
            return Estimate::InsufficientData { sample_size: 0 };
        }
    };

    info!(
        "Calculated market price for {}: ${} (n={})",
        key, stats.avg, stats.sample_size
    );

    Estimate::Fresh(MarketPriceEstimate {
        brand: key.brand.clone(),
        model: key.model.clone(),
        guitar_type: key.guitar_type.clone(),
        avg_price: stats.avg,
        min_price: stats.min,
        max_price: stats.max,
        median_price: stats.median,
        sample_size: u32::try_from(stats.sample_size).unwrap_or(u32::MAX),
        calculated_at: now,
    })
}

/// Prices of listings that count toward the market estimate, sorted ascending
pub fn qualifying_prices(
    key: &MarketKey,
    historical: &[Listing],
    now: DateTime<Utc>,
    config: &EstimatorConfig,
) -> Vec<Decimal> {
    let cutoff = now - config.lookback();

    let mut prices: Vec<Decimal> = historical
        .iter()
        .filter(|l| key.matches(l))
        .filter(|l| l.has_price() && l.is_active && l.listed_at > cutoff)
        .map(|l| l.price)
        .collect();

    prices.sort();
    prices
}

/// Compute statistics over sorted prices.
///
/// Samples larger than `trim_min_sample` drop `max(1, n * trim_percent / 100)`
/// entries from each end before averaging; min/max/median use the full sample.
/// Returns None for an empty sample or on decimal overflow.
pub fn trimmed_stats(sorted: Vec<Decimal>, config: &EstimatorConfig) -> Option<PriceStats> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }

    let trimmed: &[Decimal] = if n > config.trim_min_sample {
        let cut = (n * config.trim_percent / 100).max(1);
        if cut * 2 < n {
            &sorted[cut..n - cut]
        } else {
            &sorted
        }
    } else {
        &sorted
    };

    let sum = trimmed
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(*p))?;
    let avg = sum.checked_div(Decimal::from(trimmed.len()))?.round_dp(2);

    Some(PriceStats {
        avg,
        min: sorted[0],
        max: sorted[n - 1],
        median: sorted[n / 2],
        sample_size: n,
    })
}

/// Resolve the price the scorer should use.
///
/// Chain: cached/fresh estimate, static reference MSRP, brand-tier heuristic,
/// then the caller's fallback constant.
pub fn resolve_market_price(
    estimate: &Estimate,
    reference: Option<&ReferencePrice>,
    brand_default: Option<Decimal>,
    fallback: Decimal,
) -> MarketPrice {
    match estimate {
        Estimate::Cached(e) => MarketPrice {
            price: e.avg_price,
            basis: PriceBasis::Cached,
            estimate: Some(e.clone()),
        },
        Estimate::Fresh(e) => MarketPrice {
            price: e.avg_price,
            basis: PriceBasis::Aggregated,
            estimate: Some(e.clone()),
        },
        Estimate::InsufficientData { .. } => {
            if let Some(reference) = reference.filter(|r| r.msrp > Decimal::ZERO) {
                return MarketPrice {
                    price: reference.msrp,
                    basis: PriceBasis::Reference,
                    estimate: None,
                };
            }

            if let Some(price) = brand_default.filter(|p| *p > Decimal::ZERO) {
                return MarketPrice {
                    price,
                    basis: PriceBasis::BrandHeuristic,
                    estimate: None,
                };
            }

            warn!("No market data available, using fallback price ${}", fallback);
            MarketPrice {
                price: fallback,
                basis: PriceBasis::Fallback,
                estimate: None,
            }
        }
    }
}
