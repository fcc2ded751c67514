//! Persistence hook - market price cache and listing history

use crate::deals::types::{Listing, MarketKey, MarketPriceEstimate, WriteStats};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Storage the engine reads history from and writes estimates/listings to.
///
/// Implementations must tolerate concurrent `save_estimate` calls for the
/// same key; the newest `calculated_at` wins.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn cached_estimate(&self, key: &MarketKey)
        -> Result<Option<MarketPriceEstimate>, StoreError>;

    async fn save_estimate(&self, estimate: &MarketPriceEstimate) -> Result<(), StoreError>;

    /// Listings for `key` first seen at or after `since`
    async fn historical_listings(
        &self,
        key: &MarketKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<Listing>, StoreError>;

    /// Upsert by listing id
    async fn save_listings(&self, listings: &[Listing]) -> Result<WriteStats, StoreError>;
}

/// Process-local store for tests, the batch binary and database-less servers
#[derive(Debug, Default)]
pub struct MemoryStore {
    estimates: RwLock<HashMap<String, MarketPriceEstimate>>,
    listings: RwLock<HashMap<String, Listing>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing listings
    pub fn with_listings(listings: impl IntoIterator<Item = Listing>) -> Self {
        let map = listings.into_iter().map(|l| (l.id.clone(), l)).collect();
        Self {
            estimates: RwLock::new(HashMap::new()),
            listings: RwLock::new(map),
        }
    }

    pub async fn listing_count(&self) -> usize {
        self.listings.read().await.len()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn cached_estimate(
        &self,
        key: &MarketKey,
    ) -> Result<Option<MarketPriceEstimate>, StoreError> {
        Ok(self.estimates.read().await.get(&key.cache_key()).cloned())
    }

    async fn save_estimate(&self, estimate: &MarketPriceEstimate) -> Result<(), StoreError> {
        let mut estimates = self.estimates.write().await;
        let cache_key = estimate.key().cache_key();

        match estimates.get(&cache_key) {
            Some(existing) if existing.calculated_at > estimate.calculated_at => {
                debug!("Kept newer cached estimate for {}", estimate.key());
            }
            _ => {
                estimates.insert(cache_key, estimate.clone());
            }
        }

        Ok(())
    }

    async fn historical_listings(
        &self,
        key: &MarketKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<Listing>, StoreError> {
        let listings = self.listings.read().await;

        let mut history: Vec<Listing> = listings
            .values()
            .filter(|l| key.matches(l) && l.listed_at >= since)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(history)
    }

    async fn save_listings(&self, listings: &[Listing]) -> Result<WriteStats, StoreError> {
        let mut stored = self.listings.write().await;
        let mut stats = WriteStats::default();

        for listing in listings {
            match stored.get_mut(&listing.id) {
                Some(existing) => {
                    *existing = merge_listing(existing, listing);
                    stats.updated += 1;
                }
                None => {
                    stored.insert(listing.id.clone(), listing.clone());
                    stats.inserted += 1;
                }
            }
        }

        info!("Write complete: {}", stats);

        Ok(stats)
    }
}

/// Upsert rule shared by every store: identity and first-seen fields stay,
/// everything observable about the offer is refreshed
pub fn merge_listing(existing: &Listing, incoming: &Listing) -> Listing {
    Listing {
        source: existing.source.clone(),
        brand: existing.brand.clone(),
        model: existing.model.clone(),
        guitar_type: existing.guitar_type.clone(),
        listed_at: existing.listed_at,
        deal_score: incoming.deal_score.or(existing.deal_score),
        ..incoming.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deals::types::Condition;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn mock_listing(id: &str, model: &str, age_days: i64) -> Listing {
        Listing {
            id: id.to_string(),
            source: "Reverb".to_string(),
            brand: "Fender".to_string(),
            model: model.to_string(),
            guitar_type: "Electric".to_string(),
            title: String::new(),
            url: None,
            price: dec!(700),
            condition: Condition::Good,
            seller_verified: false,
            seller_rating: None,
            seller_account_age_days: None,
            seller_total_sales: None,
            description: String::new(),
            image_count: 2,
            listed_at: now() - Duration::days(age_days),
            is_active: true,
            deal_score: None,
        }
    }

    fn estimate_at(calculated_at: DateTime<Utc>, avg: rust_decimal::Decimal) -> MarketPriceEstimate {
        MarketPriceEstimate {
            brand: "Fender".to_string(),
            model: "Stratocaster".to_string(),
            guitar_type: "Electric".to_string(),
            avg_price: avg,
            min_price: avg,
            max_price: avg,
            median_price: avg,
            sample_size: 5,
            calculated_at,
        }
    }

    #[tokio::test]
    async fn test_save_listings_counts_upserts() {
        let store = MemoryStore::new();

        let first = store
            .save_listings(&[mock_listing("a", "Stratocaster", 1), mock_listing("b", "Stratocaster", 1)])
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);

        let second = store
            .save_listings(&[mock_listing("a", "Stratocaster", 1)])
            .await
            .unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(store.listing_count().await, 2);
    }

    #[tokio::test]
    async fn test_resave_keeps_first_seen_fields() {
        let store = MemoryStore::new();
        let mut original = mock_listing("a", "Stratocaster", 30);
        original.deal_score = Some(80);
        store.save_listings(&[original.clone()]).await.unwrap();

        let mut relisted = mock_listing("a", "Telecaster", 0);
        relisted.price = dec!(650);
        relisted.is_active = false;
        store.save_listings(&[relisted]).await.unwrap();

        let key = MarketKey::new("Fender", "Stratocaster", "Electric");
        let history = store
            .historical_listings(&key, now() - Duration::days(90))
            .await
            .unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].listed_at, original.listed_at);
        assert_eq!(history[0].model, "Stratocaster");
        assert_eq!(history[0].price, dec!(650));
        assert!(!history[0].is_active);
        assert_eq!(history[0].deal_score, Some(80));
    }

    #[tokio::test]
    async fn test_history_filters_key_and_window() {
        let store = MemoryStore::with_listings(vec![
            mock_listing("a", "Stratocaster", 10),
            mock_listing("b", "Stratocaster", 120),
            mock_listing("c", "Telecaster", 10),
        ]);
        let key = MarketKey::new("fender", "stratocaster", "electric");

        let history = store
            .historical_listings(&key, now() - Duration::days(90))
            .await
            .unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "a");
    }

    #[tokio::test]
    async fn test_newest_estimate_wins() {
        let store = MemoryStore::new();
        let key = MarketKey::new("Fender", "Stratocaster", "Electric");

        store.save_estimate(&estimate_at(now(), dec!(700))).await.unwrap();
        store
            .save_estimate(&estimate_at(now() - Duration::days(1), dec!(650)))
            .await
            .unwrap();

        let cached = store.cached_estimate(&key).await.unwrap().unwrap();
        assert_eq!(cached.avg_price, dec!(700));
    }

    #[tokio::test]
    async fn test_concurrent_saves_leave_one_estimate() {
        let store = Arc::new(MemoryStore::new());
        let estimate = estimate_at(now(), dec!(700));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let estimate = estimate.clone();
                tokio::spawn(async move { store.save_estimate(&estimate).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let key = MarketKey::new("Fender", "Stratocaster", "Electric");
        assert_eq!(store.cached_estimate(&key).await.unwrap(), Some(estimate));
    }
}
