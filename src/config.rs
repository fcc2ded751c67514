//! Configuration: environment settings for the binaries plus the scoring tunables
//!
//! Every threshold, keyword list, and weight table the engine uses lives in
//! [`EngineConfig`]. Defaults reproduce the production scoring; tests and
//! deployments substitute values by building the structs or loading a JSON file.

use crate::deals::types::Tier;
use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// Process configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent = in-memory store
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    /// CSV reference table; absent = built-in catalog
    pub catalog_path: Option<PathBuf>,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut engine = match env::var("DEAL_CONFIG_PATH") {
            Ok(path) => EngineConfig::from_json_path(Path::new(&path))?,
            Err(_) => EngineConfig::default(),
        };

        if let Ok(raw) = env::var("FALLBACK_MARKET_PRICE") {
            engine.fallback_market_price =
                Decimal::from_str(raw.trim()).map_err(|e| ConfigError::InvalidValue {
                    field: "FALLBACK_MARKET_PRICE",
                    reason: e.to_string(),
                })?;
        }

        Ok(AppConfig {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),

            bind_addr: env_parse("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)))?,

            catalog_path: env::var("CATALOG_PATH").ok().map(PathBuf::from),

            engine,

            logging: LoggingConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            },
        })
    }
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Install the global tracing subscriber; `RUST_LOG` wins over `level`
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let result = match self.format.as_str() {
            "json" => fmt().json().with_env_filter(filter).try_init(),
            _ => fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_level(true)
                .try_init(),
        };

        if let Err(e) = result {
            eprintln!("tracing subscriber already installed: {}", e);
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// All engine tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub estimator: EstimatorConfig,
    pub value: ValueConfig,
    pub brand_tiers: BrandTierConfig,
    /// Last-resort market price when nothing else resolves
    pub fallback_market_price: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            estimator: EstimatorConfig::default(),
            value: ValueConfig::default(),
            brand_tiers: BrandTierConfig::default(),
            fallback_market_price: dec!(1000),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; omitted sections keep their defaults
    pub fn from_json_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        serde_json::from_str(&raw).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    pub price: PriceScoring,
    pub seller: SellerScoring,
    pub listing: ListingQualityScoring,
    /// Upper clamp on the summed deal score
    pub total_cap: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            price: PriceScoring::default(),
            seller: SellerScoring::default(),
            listing: ListingQualityScoring::default(),
            total_cap: 100,
        }
    }
}

/// One price band: ratios at or below `max_ratio` earn `score`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBand {
    pub max_ratio: Decimal,
    pub score: u8,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PriceScoring {
    pub bands: Vec<PriceBand>,
    pub above_market_score: u8,
    pub above_market_label: String,
    /// Used when market price or listing price is unusable
    pub no_data_score: u8,
    pub max_score: u8,
}

impl Default for PriceScoring {
    fn default() -> Self {
        Self {
            bands: vec![
                PriceBand {
                    max_ratio: dec!(0.75),
                    score: 50,
                    label: "Excellent deal".into(),
                },
                PriceBand {
                    max_ratio: dec!(0.90),
                    score: 35,
                    label: "Good deal".into(),
                },
                PriceBand {
                    max_ratio: dec!(1.00),
                    score: 20,
                    label: "Fair deal".into(),
                },
            ],
            above_market_score: 5,
            above_market_label: "Overpriced".into(),
            no_data_score: 10,
            max_score: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SellerScoring {
    pub verified_score: u8,
    pub established_score: u8,
    pub new_account_score: u8,
    /// Accounts strictly older than this count as established
    pub established_after_days: u32,
    pub low_rating_threshold: Decimal,
    pub low_rating_penalty: u8,
    pub few_sales_threshold: u32,
    pub few_sales_penalty: u8,
    pub max_score: u8,
}

impl Default for SellerScoring {
    fn default() -> Self {
        Self {
            verified_score: 25,
            established_score: 15,
            new_account_score: 5,
            established_after_days: 30,
            low_rating_threshold: dec!(3.0),
            low_rating_penalty: 10,
            few_sales_threshold: 5,
            few_sales_penalty: 5,
            max_score: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingQualityScoring {
    pub negative_keywords: Vec<String>,
    pub positive_keywords: Vec<String>,
    pub poor_score: u8,
    pub moderate_score: u8,
    pub high_score: u8,
    /// Descriptions strictly longer than this count as detailed
    pub detailed_description_chars: usize,
    pub min_images_for_high: u32,
    /// Listings with this many images or fewer are poor
    pub max_images_for_poor: u32,
    pub positive_bonus_per_keyword: u8,
    pub positive_bonus_cap: u8,
    pub max_score: u8,
}

impl Default for ListingQualityScoring {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();

        Self {
            negative_keywords: words(&[
                "broken",
                "for parts",
                "damaged",
                "cracked",
                "issue",
                "repair",
                "needs work",
                "not working",
                "defective",
                "scratched",
                "dented",
                "project",
                "restore",
                "restoration",
                "missing parts",
                "as is",
            ]),
            positive_keywords: words(&[
                "mint condition",
                "original case",
                "recently serviced",
                "professional setup",
                "perfect condition",
                "like new",
                "barely used",
                "well maintained",
                "original packaging",
                "warranty",
                "certified",
                "authenticated",
            ]),
            poor_score: 5,
            moderate_score: 15,
            high_score: 25,
            detailed_description_chars: 150,
            min_images_for_high: 3,
            max_images_for_poor: 1,
            positive_bonus_per_keyword: 2,
            positive_bonus_cap: 5,
            max_score: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimatorConfig {
    /// Cached estimates younger than this are reused as-is
    pub cache_freshness_days: i64,
    pub lookback_days: i64,
    pub min_sample_size: usize,
    /// Percent trimmed from each end of the sorted sample
    pub trim_percent: usize,
    /// Trimming only applies to samples larger than this
    pub trim_min_sample: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            cache_freshness_days: 7,
            lookback_days: 90,
            min_sample_size: 5,
            trim_percent: 10,
            trim_min_sample: 10,
        }
    }
}

impl EstimatorConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_freshness_days)
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(self.lookback_days)
    }
}

/// Weights for the "best value" composite.
/// These constants were tuned by eye against live listings and have not been
/// validated by the product owners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValueConfig {
    pub discount_cap: Decimal,
    pub rating_multiplier: Decimal,
    pub rating_cap: Decimal,
    pub tier_bonus: TierBonus,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            discount_cap: dec!(50),
            rating_multiplier: dec!(5),
            rating_cap: dec!(25),
            tier_bonus: TierBonus::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TierBonus {
    pub entry: Decimal,
    pub mid: Decimal,
    pub mid_high: Decimal,
    pub high: Decimal,
    pub premium: Decimal,
}

impl Default for TierBonus {
    fn default() -> Self {
        Self {
            entry: dec!(0),
            mid: dec!(5),
            mid_high: dec!(10),
            high: dec!(15),
            premium: dec!(20),
        }
    }
}

impl TierBonus {
    pub fn for_tier(&self, tier: Tier) -> Decimal {
        match tier {
            Tier::Entry => self.entry,
            Tier::Mid => self.mid,
            Tier::MidHigh => self.mid_high,
            Tier::High => self.high,
            Tier::Premium => self.premium,
        }
    }
}

/// Model-name keywords that scale the base price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMultiplier {
    pub keywords: Vec<String>,
    pub multiplier: Decimal,
}

/// Heuristic market price for brands with no data: base × model keyword × brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrandTierConfig {
    pub base_price: Decimal,
    /// Checked in order; first matching group wins
    pub model_multipliers: Vec<KeywordMultiplier>,
    /// Keyed by lowercase brand name
    pub brand_multipliers: BTreeMap<String, Decimal>,
}

impl Default for BrandTierConfig {
    fn default() -> Self {
        let group = |keywords: &[&str], multiplier: Decimal| KeywordMultiplier {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            multiplier,
        };

        let brand_multipliers = [
            ("gibson", dec!(3.5)),
            ("fender", dec!(2.8)),
            ("martin", dec!(3.2)),
            ("taylor", dec!(3.0)),
            ("prs", dec!(3.8)),
            ("rickenbacker", dec!(3.5)),
            ("gretsch", dec!(2.5)),
            ("epiphone", dec!(1.2)),
            ("squier", dec!(0.8)),
            ("yamaha", dec!(1.5)),
            ("ibanez", dec!(1.8)),
            ("esp", dec!(2.2)),
            ("jackson", dec!(1.9)),
            ("schecter", dec!(1.6)),
        ]
        .into_iter()
        .map(|(brand, m)| (brand.to_string(), m))
        .collect();

        Self {
            base_price: dec!(800),
            model_multipliers: vec![
                group(&["custom", "signature", "artist", "limited"], dec!(1.8)),
                group(&["professional", "pro", "deluxe"], dec!(1.4)),
                group(&["standard", "studio"], dec!(1.0)),
                group(&["special", "tribute"], dec!(0.8)),
                group(&["junior", "student", "starter"], dec!(0.6)),
            ],
            brand_multipliers,
        }
    }
}
