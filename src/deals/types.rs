//! Core data types for the deal pipeline
//! Pure data structures; field names serialize as camelCase for the JSON surfaces

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Listing condition, ordered best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(alias = "Mint")]
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl Condition {
    /// Rank for "highest quality" ordering (lower = better)
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Excellent => write!(f, "Excellent"),
            Condition::VeryGood => write!(f, "Very Good"),
            Condition::Good => write!(f, "Good"),
            Condition::Fair => write!(f, "Fair"),
            Condition::Poor => write!(f, "Poor"),
            Condition::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Coarse quality/price bracket of a guitar model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Entry,
    Mid,
    MidHigh,
    High,
    Premium,
}

impl Tier {
    /// Tiers eligible for the "premium pick" category
    pub fn is_premium_pick(&self) -> bool {
        matches!(self, Tier::MidHigh | Tier::High | Tier::Premium)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Entry => write!(f, "entry"),
            Tier::Mid => write!(f, "mid"),
            Tier::MidHigh => write!(f, "mid-high"),
            Tier::High => write!(f, "high"),
            Tier::Premium => write!(f, "premium"),
        }
    }
}

/// Canonical listing, every field populated after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub source: String,
    pub brand: String,
    pub model: String,
    pub guitar_type: String,
    pub title: String,
    pub url: Option<String>,

    pub price: Decimal,
    pub condition: Condition,

    pub seller_verified: bool,
    pub seller_rating: Option<Decimal>,
    pub seller_account_age_days: Option<u32>,
    pub seller_total_sales: Option<u32>,

    pub description: String,
    pub image_count: u32,
    pub listed_at: DateTime<Utc>,
    pub is_active: bool,

    /// Computed by the scorer, never read from input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_score: Option<u8>,
}

impl Listing {
    /// Zero price means the source gave no usable price
    pub fn has_price(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

/// Brand/model/type triple used for market price lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketKey {
    pub brand: String,
    pub model: String,
    pub guitar_type: String,
}

impl MarketKey {
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        guitar_type: impl Into<String>,
    ) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            guitar_type: guitar_type.into(),
        }
    }

    /// Case-insensitive cache key
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.brand.trim().to_lowercase(),
            self.model.trim().to_lowercase(),
            self.guitar_type.trim().to_lowercase()
        )
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        use crate::deals::utils::same_key;

        same_key(&self.brand, &listing.brand)
            && same_key(&self.model, &listing.model)
            && same_key(&self.guitar_type, &listing.guitar_type)
    }
}

impl std::fmt::Display for MarketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.brand, self.model, self.guitar_type)
    }
}

/// Aggregated market price statistics for one brand/model/type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPriceEstimate {
    pub brand: String,
    pub model: String,
    pub guitar_type: String,
    pub avg_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub median_price: Decimal,
    pub sample_size: u32,
    pub calculated_at: DateTime<Utc>,
}

impl MarketPriceEstimate {
    pub fn key(&self) -> MarketKey {
        MarketKey::new(&self.brand, &self.model, &self.guitar_type)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.calculated_at
    }
}

/// Static reference data for a model (MSRP table entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePrice {
    pub msrp: Decimal,
    pub tier: Tier,
    /// Model quality rating out of 5, when known
    pub rating: Option<Decimal>,
}

/// Where a resolved market price came from, best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    Cached,
    Aggregated,
    Reference,
    BrandHeuristic,
    Fallback,
}

/// Market price the scorer runs against, with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPrice {
    pub price: Decimal,
    pub basis: PriceBasis,
    pub estimate: Option<MarketPriceEstimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnalysis {
    pub category: String,
    pub price_ratio: Option<Decimal>,
    pub percentage_below_market: Option<Decimal>,
    pub market_price: Decimal,
    pub listing_price: Decimal,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerAnalysis {
    pub category: String,
    pub verified: bool,
    pub account_age_days: Option<u32>,
    pub rating: Option<Decimal>,
    pub total_sales: Option<u32>,
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingAnalysis {
    pub category: String,
    pub description_length: usize,
    pub image_count: u32,
    pub negative_keywords_found: Vec<String>,
    pub positive_keywords_found: Vec<String>,
    pub red_flags: Vec<String>,
    pub quality_indicators: Vec<String>,
}

/// Per-component explanation of a deal score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub price_score: u8,
    pub seller_score: u8,
    pub listing_score: u8,
    pub price_analysis: PriceAnalysis,
    pub seller_analysis: SellerAnalysis,
    pub listing_analysis: ListingAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredListing {
    pub listing: Listing,
    pub deal_score: u8,
    pub breakdown: ScoreBreakdown,
    /// `(market - price) / market * 100`, absent without a usable market price
    pub price_below_market_pct: Option<Decimal>,
}

/// Labeled picks over a scored batch; each is absent when nothing qualifies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Categories {
    pub cheapest: Option<ScoredListing>,
    pub best_value: Option<ScoredListing>,
    pub highest_quality: Option<ScoredListing>,
    pub most_recent: Option<ScoredListing>,
    pub premium: Option<ScoredListing>,
}

/// A listing dropped from a batch because scoring failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringFailure {
    pub listing_id: String,
    pub reason: String,
}

/// Output of `score_and_categorize`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredBatch {
    pub scored: Vec<ScoredListing>,
    pub categories: Categories,
    pub failures: Vec<ScoringFailure>,
}

/// Full pipeline result for one brand/model evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealReport {
    pub reference_price: MarketPrice,
    pub scored_listings: Vec<ScoredListing>,
    pub categories: Categories,
    pub failures: Vec<ScoringFailure>,
}

/// Write operation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for WriteStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted: {}, updated: {}, skipped: {}, errors: {}",
            self.inserted, self.updated, self.skipped, self.errors
        )
    }
}
