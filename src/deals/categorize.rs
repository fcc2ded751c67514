//! Categorization - labeled picks (cheapest, best value, highest quality,
//! most recent, premium) over a scored batch

use crate::config::ValueConfig;
use crate::deals::reference::ReferenceLookup;
use crate::deals::types::{Categories, ReferencePrice, ScoredListing};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cmp::Ordering;
use tracing::debug;

/// Composite "value" used by the best-value and premium picks.
///
/// `deal_score + clamp(discount vs msrp, 0, cap) + min(rating × mult, cap) + tier bonus`.
/// Without reference data this is just the deal score.
pub fn value_score(
    scored: &ScoredListing,
    reference: Option<&ReferencePrice>,
    config: &ValueConfig,
) -> Decimal {
    let base = Decimal::from(scored.deal_score);

    let reference = match reference {
        Some(r) => r,
        None => return base,
    };

    let discount = if reference.msrp > Decimal::ZERO {
        reference
            .msrp
            .checked_sub(scored.listing.price)
            .and_then(|diff| diff.checked_div(reference.msrp))
            .and_then(|frac| frac.checked_mul(dec!(100)))
            .map(|pct| pct.max(Decimal::ZERO).min(config.discount_cap))
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    let rating = reference
        .rating
        .and_then(|r| r.checked_mul(config.rating_multiplier))
        .map(|r| r.max(Decimal::ZERO).min(config.rating_cap))
        .unwrap_or(Decimal::ZERO);

    base + discount + rating + config.tier_bonus.for_tier(reference.tier)
}

struct Candidate<'a> {
    scored: &'a ScoredListing,
    reference: Option<ReferencePrice>,
    value: Decimal,
}

impl Candidate<'_> {
    fn id(&self) -> &str {
        &self.scored.listing.id
    }
}

/// Pick each category from `scored`.
///
/// Listings without a price only compete for `most_recent`. `premium` is
/// limited to mid-high, high and premium tier models and is absent when
/// none are present. Ties go to the lowest listing id.
pub fn categorize(
    scored: &[ScoredListing],
    reference: &dyn ReferenceLookup,
    config: &ValueConfig,
) -> Categories {
    let candidates: Vec<Candidate> = scored
        .iter()
        .map(|s| {
            let reference = reference.reference_price(&s.listing.brand, &s.listing.model);
            let value = value_score(s, reference.as_ref(), config);
            Candidate {
                scored: s,
                reference,
                value,
            }
        })
        .collect();

    let priced: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.scored.listing.has_price())
        .collect();

    let cheapest = priced
        .iter()
        .min_by(|a, b| {
            a.scored
                .listing
                .price
                .cmp(&b.scored.listing.price)
                .then_with(|| a.id().cmp(b.id()))
        })
        .map(|c| c.scored.clone());

    let most_recent = candidates
        .iter()
        .min_by(|a, b| {
            b.scored
                .listing
                .listed_at
                .cmp(&a.scored.listing.listed_at)
                .then_with(|| a.id().cmp(b.id()))
        })
        .map(|c| c.scored.clone());

    let highest_quality = priced
        .iter()
        .min_by(|a, b| {
            let (la, lb) = (&a.scored.listing, &b.scored.listing);
            la.condition
                .rank()
                .cmp(&lb.condition.rank())
                .then_with(|| la.price.cmp(&lb.price))
                .then_with(|| a.id().cmp(b.id()))
        })
        .map(|c| c.scored.clone());

    let best_value = priced
        .iter()
        .min_by(|a, b| by_value(a, b))
        .map(|c| c.scored.clone());

    let premium = priced
        .iter()
        .filter(|c| {
            c.reference
                .as_ref()
                .map(|r| r.tier.is_premium_pick())
                .unwrap_or(false)
        })
        .min_by(|a, b| by_value(a, b))
        .map(|c| c.scored.clone());

    debug!(
        "Categorized {} listings (premium pick: {})",
        scored.len(),
        premium.is_some()
    );

    Categories {
        cheapest,
        best_value,
        highest_quality,
        most_recent,
        premium,
    }
}

/// Highest value first, then lowest id
fn by_value(a: &Candidate, b: &Candidate) -> Ordering {
    b.value.cmp(&a.value).then_with(|| a.id().cmp(b.id()))
}
