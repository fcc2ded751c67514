//! Deal scoring - price, seller and listing-quality sub-scores summed to 0..=100
//!
//! Each sub-scorer is a pure function of one listing plus its slice of
//! [`ScoringConfig`]. Batch scoring isolates failures per listing.

use crate::config::{EngineConfig, ListingQualityScoring, PriceScoring, ScoringConfig, SellerScoring};
use crate::deals::categorize::categorize;
use crate::deals::reference::ReferenceLookup;
use crate::deals::types::{
    Listing, ListingAnalysis, PriceAnalysis, ScoreBreakdown, ScoredBatch, ScoredListing,
    ScoringFailure, SellerAnalysis,
};
use crate::error::ScoreError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

/// Price sub-score from `price / market_price` banding
pub fn score_price(
    listing: &Listing,
    market_price: Decimal,
    config: &PriceScoring,
) -> Result<(u8, PriceAnalysis), ScoreError> {
    let mut analysis = PriceAnalysis {
        category: String::new(),
        price_ratio: None,
        percentage_below_market: None,
        market_price,
        listing_price: listing.price,
        flags: Vec::new(),
    };

    if market_price <= Decimal::ZERO {
        analysis.category = "No market data".to_string();
        analysis.flags.push("No market data".to_string());
        return Ok((config.no_data_score.min(config.max_score), analysis));
    }

    if !listing.has_price() {
        analysis.category = "No listing price".to_string();
        analysis.flags.push("No listing price".to_string());
        return Ok((config.no_data_score.min(config.max_score), analysis));
    }

    let ratio = listing
        .price
        .checked_div(market_price)
        .ok_or(ScoreError::Arithmetic {
            operation: "price ratio",
        })?;

    let (score, label) = match config.bands.iter().find(|band| ratio <= band.max_ratio) {
        Some(band) => (band.score, band.label.clone()),
        None => (config.above_market_score, config.above_market_label.clone()),
    };

    analysis.category = label;
    analysis.price_ratio = Some(ratio.round_dp(4));
    analysis.percentage_below_market = Some(percent_below(listing.price, market_price)?);

    if ratio > Decimal::ONE {
        analysis.flags.push("Priced above market".to_string());
    }

    Ok((score.min(config.max_score), analysis))
}

/// `(market - price) / market * 100`, rounded to 2 places
pub fn percent_below(price: Decimal, market_price: Decimal) -> Result<Decimal, ScoreError> {
    market_price
        .checked_sub(price)
        .and_then(|diff| diff.checked_div(market_price))
        .and_then(|frac| frac.checked_mul(dec!(100)))
        .map(|pct| pct.round_dp(2))
        .ok_or(ScoreError::Arithmetic {
            operation: "percentage below market",
        })
}

/// Seller sub-score: base from verification/account age, then penalties
/// floored at zero
pub fn score_seller(listing: &Listing, config: &SellerScoring) -> (u8, SellerAnalysis) {
    let mut red_flags = Vec::new();

    let (mut score, category) = if listing.seller_verified {
        (config.verified_score, "Verified seller")
    } else {
        match listing.seller_account_age_days {
            Some(days) if days > config.established_after_days => {
                (config.established_score, "Established seller")
            }
            Some(_) => {
                red_flags.push("Very new seller".to_string());
                (config.new_account_score, "New seller")
            }
            None => {
                red_flags.push("Unknown account age".to_string());
                (config.new_account_score, "Unverified seller")
            }
        }
    };

    if let Some(rating) = listing.seller_rating {
        if rating < config.low_rating_threshold {
            score = score.saturating_sub(config.low_rating_penalty);
            red_flags.push(format!("Low seller rating ({})", rating));
        }
    }

    if let Some(sales) = listing.seller_total_sales {
        if sales < config.few_sales_threshold {
            score = score.saturating_sub(config.few_sales_penalty);
            red_flags.push("Very few completed sales".to_string());
        }
    }

    let analysis = SellerAnalysis {
        category: category.to_string(),
        verified: listing.seller_verified,
        account_age_days: listing.seller_account_age_days,
        rating: listing.seller_rating,
        total_sales: listing.seller_total_sales,
        red_flags,
    };

    (score.min(config.max_score), analysis)
}

/// Listing-quality sub-score from description keywords, length and photos.
///
/// Any negative keyword pins the score to `poor_score`; the positive-keyword
/// bonus is only added when no negative keyword matched.
pub fn score_listing_quality(listing: &Listing, config: &ListingQualityScoring) -> (u8, ListingAnalysis) {
    let text = listing.description.to_lowercase();
    let description_length = listing.description.chars().count();

    let negative = matched_keywords(&text, &config.negative_keywords);
    let positive = matched_keywords(&text, &config.positive_keywords);

    let mut red_flags: Vec<String> = negative
        .iter()
        .map(|k| format!("Mentions '{}'", k))
        .collect();
    let mut quality_indicators = Vec::new();

    let too_few_images = listing.image_count <= config.max_images_for_poor;
    if too_few_images {
        red_flags.push("Too few images".to_string());
    }

    let (base, category) = if !negative.is_empty() || too_few_images {
        (config.poor_score, "Poor quality listing")
    } else if description_length > config.detailed_description_chars
        && listing.image_count >= config.min_images_for_high
    {
        quality_indicators.push("Detailed description".to_string());
        quality_indicators.push(format!("{} images", listing.image_count));
        (config.high_score, "High quality listing")
    } else {
        (config.moderate_score, "Moderate quality listing")
    };

    let bonus = if negative.is_empty() {
        let per_keyword = usize::from(config.positive_bonus_per_keyword);
        let raw = positive.len().saturating_mul(per_keyword);
        raw.min(usize::from(config.positive_bonus_cap)) as u8
    } else {
        0
    };

    quality_indicators.extend(positive.iter().map(|k| format!("Mentions '{}'", k)));

    let score = base.saturating_add(bonus).min(config.max_score);

    let analysis = ListingAnalysis {
        category: category.to_string(),
        description_length,
        image_count: listing.image_count,
        negative_keywords_found: negative,
        positive_keywords_found: positive,
        red_flags,
        quality_indicators,
    };

    (score, analysis)
}

/// Distinct keywords found as case-insensitive substrings of `text`
fn matched_keywords(text: &str, keywords: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && text.contains(&keyword) && !found.contains(&keyword) {
            found.push(keyword);
        }
    }
    found
}

/// Score one listing against a market price
pub fn score_listing(
    listing: &Listing,
    market_price: Decimal,
    config: &ScoringConfig,
) -> Result<(u8, ScoreBreakdown), ScoreError> {
    let (price_score, price_analysis) = score_price(listing, market_price, &config.price)?;
    let (seller_score, seller_analysis) = score_seller(listing, &config.seller);
    let (listing_score, listing_analysis) = score_listing_quality(listing, &config.listing);

    let total = u16::from(price_score) + u16::from(seller_score) + u16::from(listing_score);
    let deal_score = total.min(u16::from(config.total_cap)) as u8;

    debug!(
        "Scored {}: {} (price {}, seller {}, listing {})",
        listing.id, deal_score, price_score, seller_score, listing_score
    );

    Ok((
        deal_score,
        ScoreBreakdown {
            price_score,
            seller_score,
            listing_score,
            price_analysis,
            seller_analysis,
            listing_analysis,
        },
    ))
}

/// Score a batch and pick its categories.
///
/// A listing whose scoring fails is logged, recorded in `failures` and left
/// out of both `scored` and the categories. `scored` is ordered by deal score
/// descending, then listing id.
pub fn score_and_categorize(
    listings: &[Listing],
    market_price: Decimal,
    reference: &dyn ReferenceLookup,
    config: &EngineConfig,
) -> ScoredBatch {
    info!(
        "Scoring {} listings against market price ${}",
        listings.len(),
        market_price
    );

    let mut scored = Vec::with_capacity(listings.len());
    let mut failures = Vec::new();

    for listing in listings {
        match score_listing(listing, market_price, &config.scoring) {
            Ok((deal_score, breakdown)) => {
                let price_below_market_pct = breakdown.price_analysis.percentage_below_market;
                scored.push(ScoredListing {
                    listing: Listing {
                        deal_score: Some(deal_score),
                        ..listing.clone()
                    },
                    deal_score,
                    breakdown,
                    price_below_market_pct,
                });
            }
            Err(e) => {
                warn!("Failed to score listing {}: {}", listing.id, e);
                failures.push(ScoringFailure {
                    listing_id: listing.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    scored.sort_by(|a, b| {
        b.deal_score
            .cmp(&a.deal_score)
            .then_with(|| a.listing.id.cmp(&b.listing.id))
    });

    let categories = categorize(&scored, reference, &config.value);

    info!(
        "Scored {} listings ({} failed)",
        scored.len(),
        failures.len()
    );

    ScoredBatch {
        scored,
        categories,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deals::reference::NoReference;
    use crate::deals::types::Condition;
    use chrono::{TimeZone, Utc};

    fn mock_listing() -> Listing {
        Listing {
            id: "reverb_1".to_string(),
            source: "Reverb".to_string(),
            brand: "Fender".to_string(),
            model: "Stratocaster".to_string(),
            guitar_type: "Electric".to_string(),
            title: "Fender Stratocaster".to_string(),
            url: None,
            price: dec!(600),
            condition: Condition::Excellent,
            seller_verified: true,
            seller_rating: None,
            seller_account_age_days: None,
            seller_total_sales: None,
            description: "Mint condition, barely used".to_string(),
            image_count: 5,
            listed_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            is_active: true,
            deal_score: None,
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let listing = mock_listing();

        let (score, breakdown) = score_listing(&listing, dec!(1000), &ScoringConfig::default()).unwrap();

        // 0.6 ratio -> 50; verified -> 25; short description, 5 images -> 15 + min(2*2, 5)
        assert_eq!(breakdown.price_score, 50);
        assert_eq!(breakdown.seller_score, 25);
        assert_eq!(breakdown.listing_score, 19);
        assert_eq!(score, 94);
        assert_eq!(breakdown.price_analysis.category, "Excellent deal");
        assert_eq!(breakdown.price_analysis.percentage_below_market, Some(dec!(40)));
        assert_eq!(
            breakdown.listing_analysis.positive_keywords_found,
            vec!["mint condition".to_string(), "barely used".to_string()]
        );
    }

    #[test]
    fn test_price_score_is_monotonic() {
        let config = PriceScoring::default();
        let mut listing = mock_listing();
        let mut last = u8::MAX;

        for step in 1..=30 {
            listing.price = Decimal::from(step * 50);
            let (score, _) = score_price(&listing, dec!(1000), &config).unwrap();
            assert!(score <= last, "score rose at price {}", listing.price);
            last = score;
        }
    }

    #[test]
    fn test_price_band_edges() {
        let config = PriceScoring::default();
        let mut listing = mock_listing();

        let cases = [(750, 50), (751, 35), (900, 35), (1000, 20), (1001, 5)];
        for (price, expected) in cases {
            listing.price = Decimal::from(price);
            let (score, _) = score_price(&listing, dec!(1000), &config).unwrap();
            assert_eq!(score, expected, "price {}", price);
        }
    }

    #[test]
    fn test_no_market_price_is_low_confidence() {
        let listing = mock_listing();

        for market in [Decimal::ZERO, dec!(-100)] {
            let (score, analysis) = score_price(&listing, market, &PriceScoring::default()).unwrap();
            assert_eq!(score, 10);
            assert_eq!(analysis.flags, vec!["No market data".to_string()]);
            assert!(analysis.price_ratio.is_none());
        }
    }

    #[test]
    fn test_no_listing_price_is_low_confidence() {
        let mut listing = mock_listing();
        listing.price = Decimal::ZERO;

        let (score, analysis) = score_price(&listing, dec!(1000), &PriceScoring::default()).unwrap();

        assert_eq!(score, 10);
        assert_eq!(analysis.category, "No listing price");
    }

    #[test]
    fn test_seller_score_clamps_at_zero() {
        let mut listing = mock_listing();
        listing.seller_verified = false;
        listing.seller_account_age_days = Some(3);
        listing.seller_rating = Some(dec!(1.0));
        listing.seller_total_sales = Some(0);

        let (score, analysis) = score_seller(&listing, &SellerScoring::default());

        assert_eq!(score, 0);
        assert_eq!(analysis.red_flags.len(), 3);
    }

    #[test]
    fn test_seller_score_adjustments() {
        let config = SellerScoring::default();
        let mut listing = mock_listing();
        listing.seller_verified = false;

        listing.seller_account_age_days = Some(31);
        assert_eq!(score_seller(&listing, &config).0, 15);

        listing.seller_account_age_days = Some(30);
        assert_eq!(score_seller(&listing, &config).0, 5);

        listing.seller_account_age_days = None;
        let (score, analysis) = score_seller(&listing, &config);
        assert_eq!(score, 5);
        assert!(analysis.red_flags.contains(&"Unknown account age".to_string()));

        listing.seller_verified = true;
        listing.seller_rating = Some(dec!(2.5));
        listing.seller_total_sales = Some(4);
        assert_eq!(score_seller(&listing, &config).0, 10);
    }

    #[test]
    fn test_negative_keyword_forces_poor_score() {
        let mut listing = mock_listing();
        listing.description = format!(
            "Like new, original case, warranty, certified. Small crack near the neck, needs work. {}",
            "x".repeat(200)
        );
        listing.image_count = 10;

        let (score, analysis) = score_listing_quality(&listing, &ListingQualityScoring::default());

        assert_eq!(score, 5);
        assert_eq!(analysis.negative_keywords_found, vec!["needs work".to_string()]);
        assert_eq!(analysis.positive_keywords_found.len(), 4);
    }

    #[test]
    fn test_listing_quality_bands() {
        let config = ListingQualityScoring::default();
        let mut listing = mock_listing();

        listing.description = "a".repeat(151);
        listing.image_count = 3;
        assert_eq!(score_listing_quality(&listing, &config).0, 25);

        listing.description = "a".repeat(150);
        assert_eq!(score_listing_quality(&listing, &config).0, 15);

        listing.image_count = 1;
        assert_eq!(score_listing_quality(&listing, &config).0, 5);
    }

    #[test]
    fn test_positive_bonus_caps() {
        let config = ListingQualityScoring::default();
        let mut listing = mock_listing();
        listing.description = format!(
            "Like new, original case, warranty, recently serviced. {}",
            "a".repeat(200)
        );
        listing.image_count = 4;

        // 25 + 5 capped at 25
        assert_eq!(score_listing_quality(&listing, &config).0, 25);

        listing.description = "Like new, original case, warranty, recently serviced".to_string();
        // 15 + min(8, 5)
        assert_eq!(score_listing_quality(&listing, &config).0, 20);
    }

    #[test]
    fn test_thresholds_are_substitutable() {
        let mut config = ScoringConfig::default();
        config.price.bands[0].max_ratio = dec!(0.5);
        config.total_cap = 60;

        let (score, breakdown) = score_listing(&mock_listing(), dec!(1000), &config).unwrap();

        assert_eq!(breakdown.price_score, 35);
        assert_eq!(score, 60);
    }

    #[test]
    fn test_score_bounds() {
        let mut listing = mock_listing();
        listing.description = "a".repeat(400) + " mint condition like new warranty certified";

        for price in [1, 100, 999, 5000, 1_000_000] {
            listing.price = Decimal::from(price);
            let (score, breakdown) = score_listing(&listing, dec!(1000), &ScoringConfig::default()).unwrap();
            assert!(score <= 100);
            assert!(breakdown.seller_score <= 25);
            assert!(breakdown.listing_score <= 25);
        }
    }

    #[test]
    fn test_batch_isolates_failures() {
        let good = mock_listing();
        let mut overflow = mock_listing();
        overflow.id = "reverb_2".to_string();
        overflow.price = Decimal::MAX;

        let batch = score_and_categorize(
            &[overflow, good],
            dec!(0.5),
            &NoReference,
            &EngineConfig::default(),
        );

        assert_eq!(batch.scored.len(), 1);
        assert_eq!(batch.scored[0].listing.id, "reverb_1");
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].listing_id, "reverb_2");
        assert!(batch.categories.cheapest.is_some());
    }

    #[test]
    fn test_batch_sorted_and_scored() {
        let cheap = mock_listing();
        let mut pricey = mock_listing();
        pricey.id = "reverb_0".to_string();
        pricey.price = dec!(1200);

        let batch = score_and_categorize(
            &[pricey, cheap],
            dec!(1000),
            &NoReference,
            &EngineConfig::default(),
        );

        assert_eq!(batch.scored[0].listing.id, "reverb_1");
        assert_eq!(batch.scored[0].listing.deal_score, Some(94));
        assert_eq!(batch.scored[1].price_below_market_pct, Some(dec!(-20)));
        assert!(batch.failures.is_empty());
    }
}
