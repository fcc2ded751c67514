//! Static reference prices (MSRP + tier) and the brand-tier price heuristic

use crate::config::BrandTierConfig;
use crate::deals::types::{ReferencePrice, Tier};
use crate::deals::utils::{parse_price_str, parse_tier};
use crate::error::CatalogError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Lookup into a static brand/model reference table
pub trait ReferenceLookup: Send + Sync {
    fn reference_price(&self, brand: &str, model: &str) -> Option<ReferencePrice>;
}

/// Lookup that knows nothing; value ranking degrades to plain deal score
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReference;

impl ReferenceLookup for NoReference {
    fn reference_price(&self, _brand: &str, _model: &str) -> Option<ReferencePrice> {
        None
    }
}

/// In-memory reference table keyed case-insensitively by (brand, model)
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<(String, String), ReferencePrice>,
}

/// Catalog CSV row: `brand,model,guitar_type,msrp,tier,rating`
#[derive(Debug, Deserialize)]
struct CatalogRow {
    brand: String,
    model: String,
    #[allow(dead_code)]
    guitar_type: Option<String>,
    msrp: String,
    tier: String,
    rating: Option<String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, brand: &str, model: &str, reference: ReferencePrice) {
        self.entries.insert(catalog_key(brand, model), reference);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a catalog CSV with a header row
    pub fn from_csv_path(path: &Path) -> Result<Self, CatalogError> {
        info!("Loading reference catalog from {:?}", path);
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut catalog = Self::new();

        for (idx, result) in reader.deserialize::<CatalogRow>().enumerate() {
            let row = result?;
            let line = idx + 2; // header is line 1

            let msrp = parse_price_str(&row.msrp)
                .filter(|m| *m > Decimal::ZERO)
                .ok_or_else(|| CatalogError::InvalidRow {
                    line,
                    reason: format!("bad msrp '{}'", row.msrp),
                })?;

            let tier = parse_tier(&row.tier).ok_or_else(|| CatalogError::InvalidRow {
                line,
                reason: format!("unknown tier '{}'", row.tier),
            })?;

            let rating = match row.rating.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(parse_price_str(raw).ok_or_else(|| {
                    CatalogError::InvalidRow {
                        line,
                        reason: format!("bad rating '{}'", raw),
                    }
                })?),
            };

            catalog.insert(&row.brand, &row.model, ReferencePrice { msrp, tier, rating });
        }

        info!("Loaded {} reference prices", catalog.len());

        Ok(catalog)
    }

    /// Small built-in table covering the most-tracked models
    pub fn builtin() -> Self {
        let rows: &[(&str, &str, Decimal, Tier)] = &[
            ("Fender", "Stratocaster", dec!(799), Tier::Mid),
            ("Fender", "Telecaster", dec!(799), Tier::Mid),
            ("Fender", "Jazzmaster", dec!(999), Tier::Mid),
            ("Fender", "Mustang", dec!(599), Tier::Entry),
            ("Fender", "Player Stratocaster", dec!(849), Tier::Mid),
            ("Fender", "American Professional II Stratocaster", dec!(1749), Tier::High),
            ("Fender", "American Ultra Stratocaster", dec!(2199), Tier::High),
            ("Fender", "CD-60S", dec!(199), Tier::Entry),
            ("Gibson", "Les Paul Standard", dec!(2899), Tier::High),
            ("Gibson", "Les Paul Studio", dec!(1599), Tier::Mid),
            ("Gibson", "SG Standard", dec!(1899), Tier::Mid),
            ("Gibson", "ES-335", dec!(3199), Tier::High),
            ("Gibson", "J-45", dec!(2799), Tier::High),
            ("Gibson", "Hummingbird", dec!(3999), Tier::Premium),
            ("Epiphone", "Les Paul Standard", dec!(699), Tier::Mid),
            ("Epiphone", "Casino", dec!(699), Tier::Mid),
            ("Ibanez", "RG550", dec!(799), Tier::Mid),
            ("Ibanez", "JEM", dec!(2299), Tier::High),
            ("Yamaha", "Pacifica", dec!(399), Tier::Entry),
            ("Yamaha", "FG830", dec!(299), Tier::Entry),
        ];

        let mut catalog = Self::new();
        for (brand, model, msrp, tier) in rows {
            catalog.insert(
                brand,
                model,
                ReferencePrice {
                    msrp: *msrp,
                    tier: *tier,
                    rating: None,
                },
            );
        }
        catalog
    }
}

impl ReferenceLookup for StaticCatalog {
    fn reference_price(&self, brand: &str, model: &str) -> Option<ReferencePrice> {
        self.entries.get(&catalog_key(brand, model)).cloned()
    }
}

fn catalog_key(brand: &str, model: &str) -> (String, String) {
    (brand.trim().to_lowercase(), model.trim().to_lowercase())
}

/// Heuristic price for a brand with no market data or catalog entry:
/// `base × first matching model-keyword multiplier × brand multiplier`.
/// Unknown brands get no estimate.
pub fn brand_tier_estimate(brand: &str, model: &str, config: &BrandTierConfig) -> Option<Decimal> {
    let brand_multiplier = match config.brand_multipliers.get(&brand.trim().to_lowercase()) {
        Some(m) => *m,
        None => {
            debug!("No brand multiplier for {}", brand);
            return None;
        }
    };

    let model_lower = model.to_lowercase();
    let words: Vec<&str> = model_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let model_multiplier = config
        .model_multipliers
        .iter()
        .find(|group| group.keywords.iter().any(|k| words.contains(&k.as_str())))
        .map(|group| group.multiplier)
        .unwrap_or(Decimal::ONE);

    let estimate = config
        .base_price
        .checked_mul(model_multiplier)
        .and_then(|p| p.checked_mul(brand_multiplier))
        .map(|p| p.trunc());

    if estimate.is_none() {
        warn!("Brand-tier estimate overflowed for {} {}", brand, model);
    }

    estimate
}
