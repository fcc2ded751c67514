//! Listing normalizer - turn raw marketplace records into canonical `Listing`s
//!
//! Never fails: every field has a documented fallback, so a record with nothing
//! usable still becomes a listing (price 0, condition Unknown, listed now).

use crate::deals::types::{Condition, Listing, MarketKey};
use crate::deals::utils::{html_to_text, json_to_decimal, parse_condition, parse_timestamp};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

const ID_KEYS: &[&str] = &["id", "listingId", "listing_id"];
const BRAND_KEYS: &[&str] = &["brand", "make"];
const MODEL_KEYS: &[&str] = &["model"];
const TYPE_KEYS: &[&str] = &["guitarType", "type", "category"];
const TITLE_KEYS: &[&str] = &["title", "name"];
const URL_KEYS: &[&str] = &["url", "listingUrl", "web_url"];
const PRICE_KEYS: &[&str] = &["price"];
const CONDITION_KEYS: &[&str] = &["condition"];
const VERIFIED_KEYS: &[&str] = &["sellerVerified", "seller_verified"];
const RATING_KEYS: &[&str] = &["sellerRating", "seller_rating"];
const ACCOUNT_AGE_KEYS: &[&str] = &["sellerAccountAgeDays", "seller_account_age_days"];
const TOTAL_SALES_KEYS: &[&str] = &["sellerTotalSales", "seller_total_sales"];
const DESCRIPTION_KEYS: &[&str] = &["description"];
const IMAGE_KEYS: &[&str] = &["imageCount", "images", "image_urls", "photos"];
const LISTED_AT_KEYS: &[&str] = &["listedAt", "listed_date", "created_at", "datePosted"];
const ACTIVE_KEYS: &[&str] = &["isActive", "is_active"];

const DEFAULT_BRAND: &str = "Unknown";
const DEFAULT_MODEL: &str = "Unknown";
const DEFAULT_GUITAR_TYPE: &str = "Electric";
const DEFAULT_IMAGE_COUNT: u32 = 1;
const MAX_SELLER_RATING: Decimal = dec!(5);

/// Normalize one raw record, stamping missing dates with the current time
pub fn normalize_listing(raw: &Value, source: &str) -> Listing {
    normalize_listing_at(raw, source, Utc::now())
}

/// Normalize one raw record with an explicit "now" (used for `listedAt` fallback)
pub fn normalize_listing_at(raw: &Value, source: &str, now: DateTime<Utc>) -> Listing {
    normalize_listing_for(raw, source, &default_key(), now)
}

/// Brand/model/type a record falls back to when it names none
pub fn default_key() -> MarketKey {
    MarketKey::new(DEFAULT_BRAND, DEFAULT_MODEL, DEFAULT_GUITAR_TYPE)
}

/// Normalize one raw record, taking missing brand, model and guitar type
/// from `defaults` (the brand/model a batch was collected for)
pub fn normalize_listing_for(
    raw: &Value,
    source: &str,
    defaults: &MarketKey,
    now: DateTime<Utc>,
) -> Listing {
    let source = match source.trim() {
        "" => "unknown",
        s => s,
    };

    let price = field(raw, PRICE_KEYS)
        .and_then(json_to_decimal)
        .map(|p| p.round_dp(2))
        .filter(|p| *p > Decimal::ZERO)
        .unwrap_or(Decimal::ZERO);

    let listing = Listing {
        id: listing_id(raw, source),
        source: source.to_string(),
        brand: text_field(raw, BRAND_KEYS).unwrap_or_else(|| defaults.brand.clone()),
        model: text_field(raw, MODEL_KEYS).unwrap_or_else(|| defaults.model.clone()),
        guitar_type: text_field(raw, TYPE_KEYS).unwrap_or_else(|| defaults.guitar_type.clone()),
        title: text_field(raw, TITLE_KEYS).unwrap_or_default(),
        url: text_field(raw, URL_KEYS),
        price,
        condition: condition_field(raw),
        seller_verified: field(raw, VERIFIED_KEYS).and_then(as_bool).unwrap_or(false),
        seller_rating: field(raw, RATING_KEYS)
            .and_then(json_to_decimal)
            .map(|r| r.clamp(Decimal::ZERO, MAX_SELLER_RATING)),
        seller_account_age_days: field(raw, ACCOUNT_AGE_KEYS).and_then(as_count),
        seller_total_sales: field(raw, TOTAL_SALES_KEYS).and_then(as_count),
        description: field(raw, DESCRIPTION_KEYS)
            .and_then(Value::as_str)
            .map(html_to_text)
            .unwrap_or_default(),
        image_count: field(raw, IMAGE_KEYS)
            .and_then(as_count)
            .unwrap_or(DEFAULT_IMAGE_COUNT),
        listed_at: field(raw, LISTED_AT_KEYS)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .unwrap_or(now),
        is_active: field(raw, ACTIVE_KEYS).and_then(as_bool).unwrap_or(true),
        deal_score: None,
    };

    if listing.price.is_zero() {
        debug!("Listing {} has no usable price", listing.id);
    }

    listing
}

/// Normalize a batch; output has exactly one listing per input record
pub fn normalize_all(raws: &[Value], source: &str, now: DateTime<Utc>) -> Vec<Listing> {
    normalize_all_for(raws, source, &default_key(), now)
}

/// Normalize a batch collected for one brand/model/type
pub fn normalize_all_for(
    raws: &[Value],
    source: &str,
    defaults: &MarketKey,
    now: DateTime<Utc>,
) -> Vec<Listing> {
    let listings: Vec<Listing> = raws
        .iter()
        .map(|raw| normalize_listing_for(raw, source, defaults, now))
        .collect();

    info!("Normalized {} {} listings for {}", listings.len(), source, defaults);

    listings
}

/// `{source}_{raw id}`; already-prefixed ids pass through unchanged.
/// Records without an id get a UUIDv5 over their JSON so the id stays stable.
fn listing_id(raw: &Value, source: &str) -> String {
    let prefix = format!("{}_", source.to_lowercase());

    match field(raw, ID_KEYS).and_then(scalar_text) {
        Some(id) if id.starts_with(&prefix) => id,
        Some(id) => format!("{}{}", prefix, id),
        None => {
            let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.to_string().as_bytes());
            format!("{}{}", prefix, digest)
        }
    }
}

/// First present, non-null value among `keys`
fn field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(raw: &Value, keys: &[&str]) -> Option<String> {
    field(raw, keys).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty() && trimmed != "N/A").then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn condition_field(raw: &Value) -> Condition {
    match field(raw, CONDITION_KEYS) {
        Some(Value::String(label)) => parse_condition(label),
        Some(Value::Object(map)) => map
            .get("display_name")
            .or_else(|| map.get("name"))
            .and_then(Value::as_str)
            .map(parse_condition)
            .unwrap_or(Condition::Unknown),
        _ => Condition::Unknown,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-negative integer from a number, numeric string, or array length
fn as_count(value: &Value) -> Option<u32> {
    match value {
        Value::Array(items) => u32::try_from(items.len()).ok(),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_reverb_shaped_record() {
        let raw = json!({
            "id": 48213,
            "make": "Fender",
            "model": "Stratocaster",
            "price": {"amount": "1,049.99", "currency": "USD"},
            "condition": {"display_name": "Very Good"},
            "description": "<p>Plays <b>great</b>.</p><p>Original case included.</p>",
            "photos": [{}, {}, {}, {}],
            "created_at": "2024-05-20T09:15:00-05:00",
            "seller_verified": true,
            "seller_rating": 4.8
        });

        let listing = normalize_listing_at(&raw, "Reverb", fixed_now());

        assert_eq!(listing.id, "reverb_48213");
        assert_eq!(listing.source, "Reverb");
        assert_eq!(listing.brand, "Fender");
        assert_eq!(listing.model, "Stratocaster");
        assert_eq!(listing.guitar_type, "Electric");
        assert_eq!(listing.price, dec!(1049.99));
        assert_eq!(listing.condition, Condition::VeryGood);
        assert_eq!(listing.description, "Plays great. Original case included.");
        assert_eq!(listing.image_count, 4);
        assert_eq!(listing.listed_at.to_rfc3339(), "2024-05-20T14:15:00+00:00");
        assert!(listing.seller_verified);
        assert_eq!(listing.seller_rating, Some(dec!(4.8)));
        assert!(listing.is_active);
        assert_eq!(listing.deal_score, None);
    }

    #[test]
    fn test_normalize_empty_record_uses_defaults() {
        let listing = normalize_listing_at(&json!({}), "Craigslist", fixed_now());

        assert!(listing.id.starts_with("craigslist_"));
        assert_eq!(listing.brand, "Unknown");
        assert_eq!(listing.price, Decimal::ZERO);
        assert_eq!(listing.condition, Condition::Unknown);
        assert!(!listing.seller_verified);
        assert_eq!(listing.seller_rating, None);
        assert_eq!(listing.seller_account_age_days, None);
        assert_eq!(listing.seller_total_sales, None);
        assert_eq!(listing.description, "");
        assert_eq!(listing.image_count, 1);
        assert_eq!(listing.listed_at, fixed_now());
    }

    #[test]
    fn test_unparseable_and_negative_prices_become_zero() {
        let garbage = normalize_listing_at(&json!({"price": "make offer"}), "eBay", fixed_now());
        assert_eq!(garbage.price, Decimal::ZERO);

        let negative = normalize_listing_at(&json!({"price": -250}), "eBay", fixed_now());
        assert_eq!(negative.price, Decimal::ZERO);

        let string_price = normalize_listing_at(&json!({"price": "$2,150"}), "eBay", fixed_now());
        assert_eq!(string_price.price, dec!(2150));
    }

    #[test]
    fn test_missing_id_is_stable() {
        let raw = json!({"make": "Gibson", "model": "SG Standard", "price": 1200});

        let first = normalize_listing_at(&raw, "Facebook", fixed_now());
        let second = normalize_listing_at(&raw, "Facebook", fixed_now());

        assert_eq!(first.id, second.id);
        assert!(first.id.starts_with("facebook_"));
    }

    #[test]
    fn test_known_zero_images_is_kept() {
        let listing = normalize_listing_at(&json!({"image_urls": []}), "eBay", fixed_now());
        assert_eq!(listing.image_count, 0);
    }

    #[test]
    fn test_rating_is_clamped() {
        let high = normalize_listing_at(&json!({"sellerRating": 7.5}), "eBay", fixed_now());
        assert_eq!(high.seller_rating, Some(dec!(5)));

        let junk = normalize_listing_at(&json!({"sellerRating": "n/a"}), "eBay", fixed_now());
        assert_eq!(junk.seller_rating, None);
    }

    #[test]
    fn test_normalizing_canonical_output_is_identity() {
        let raw = json!({
            "listing_id": "A-77",
            "brand": "Gibson",
            "model": "Les Paul Standard",
            "type": "Electric",
            "price": "2,399.00",
            "condition": "Excellent",
            "seller_verified": false,
            "seller_rating": 4.2,
            "seller_account_age_days": 400,
            "seller_total_sales": 12,
            "description": "<div>Recently serviced,   original case</div><p>Swap the &lt;b&gt;bridge&lt;/b&gt; pickup &amp; wire it AT&amp;copy</p>",
            "images": 6,
            "listed_date": "2024-05-28",
            "is_active": true
        });

        let first = normalize_listing_at(&raw, "Reverb", fixed_now());
        let reinterpreted = serde_json::to_value(&first).unwrap();
        let second = normalize_listing_at(&reinterpreted, "Reverb", fixed_now());

        assert_eq!(first, second);
        assert_eq!(first.id, "reverb_A-77");

        let third = normalize_listing_at(&serde_json::to_value(&second).unwrap(), "Reverb", fixed_now());
        assert_eq!(second, third);
    }

    #[test]
    fn test_missing_key_fields_come_from_defaults() {
        let defaults = MarketKey::new("Martin", "D-28", "Acoustic");
        let raws = vec![
            json!({"id": 1, "price": 2400}),
            json!({"id": 2, "brand": "Fender", "type": "Electric", "price": 900}),
        ];

        let listings = normalize_all_for(&raws, "Reverb", &defaults, fixed_now());

        assert_eq!(listings[0].brand, "Martin");
        assert_eq!(listings[0].model, "D-28");
        assert_eq!(listings[0].guitar_type, "Acoustic");
        assert_eq!(listings[1].brand, "Fender");
        assert_eq!(listings[1].model, "D-28");
        assert_eq!(listings[1].guitar_type, "Electric");
    }

    #[test]
    fn test_normalize_all_keeps_every_record() {
        let raws = vec![json!({"price": 100}), json!("not an object"), json!(null)];
        let listings = normalize_all(&raws, "eBay", fixed_now());
        assert_eq!(listings.len(), 3);
    }
}
