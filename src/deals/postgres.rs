//! PostgreSQL persistence - listing upserts and the market price cache

use crate::deals::store::MarketStore;
use crate::deals::types::{Listing, MarketKey, MarketPriceEstimate, WriteStats};
use crate::deals::utils::parse_condition;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PgStore {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: String,
    source: String,
    brand: String,
    model: String,
    guitar_type: String,
    title: String,
    url: Option<String>,
    price: Decimal,
    condition: String,
    seller_verified: bool,
    seller_rating: Option<Decimal>,
    seller_account_age_days: Option<i32>,
    seller_total_sales: Option<i32>,
    description: String,
    image_count: i32,
    listed_at: DateTime<Utc>,
    is_active: bool,
    deal_score: Option<i16>,
}

impl ListingRow {
    fn into_listing(self) -> Result<Listing, StoreError> {
        let corrupt = |reason: &str| StoreError::CorruptRow {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        let image_count = u32::try_from(self.image_count).map_err(|_| corrupt("negative image_count"))?;
        let deal_score = self
            .deal_score
            .map(u8::try_from)
            .transpose()
            .map_err(|_| corrupt("deal_score out of range"))?;

        Ok(Listing {
            condition: parse_condition(&self.condition),
            seller_account_age_days: self.seller_account_age_days.and_then(|d| u32::try_from(d).ok()),
            seller_total_sales: self.seller_total_sales.and_then(|s| u32::try_from(s).ok()),
            image_count,
            deal_score,
            id: self.id,
            source: self.source,
            brand: self.brand,
            model: self.model,
            guitar_type: self.guitar_type,
            title: self.title,
            url: self.url,
            price: self.price,
            seller_verified: self.seller_verified,
            seller_rating: self.seller_rating,
            description: self.description,
            listed_at: self.listed_at,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MarketPriceRow {
    brand: String,
    model: String,
    guitar_type: String,
    avg_price: Decimal,
    min_price: Decimal,
    max_price: Decimal,
    median_price: Decimal,
    sample_size: i32,
    calculated_at: DateTime<Utc>,
}

impl From<MarketPriceRow> for MarketPriceEstimate {
    fn from(row: MarketPriceRow) -> Self {
        MarketPriceEstimate {
            brand: row.brand,
            model: row.model,
            guitar_type: row.guitar_type,
            avg_price: row.avg_price,
            min_price: row.min_price,
            max_price: row.max_price,
            median_price: row.median_price,
            sample_size: u32::try_from(row.sample_size).unwrap_or(0),
            calculated_at: row.calculated_at,
        }
    }
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Connect and apply pending migrations
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        info!("Connecting to database...");

        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;

        info!("Database connected successfully");

        Ok(Self::new(db))
    }

    /// Insert or update a single listing, following `merge_listing`'s rule
    /// Returns true if inserted, false if updated
    async fn upsert_listing(&self, listing: &Listing) -> Result<bool, StoreError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO guitar_listings (
                id, source, brand, model, guitar_type, title, url, price, condition,
                seller_verified, seller_rating, seller_account_age_days, seller_total_sales,
                description, image_count, listed_at, is_active, deal_score, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, NOW()
            )
            ON CONFLICT (id) DO UPDATE SET
                price = EXCLUDED.price,
                condition = EXCLUDED.condition,
                seller_verified = EXCLUDED.seller_verified,
                seller_rating = EXCLUDED.seller_rating,
                seller_account_age_days = EXCLUDED.seller_account_age_days,
                seller_total_sales = EXCLUDED.seller_total_sales,
                title = EXCLUDED.title,
                url = EXCLUDED.url,
                description = EXCLUDED.description,
                image_count = EXCLUDED.image_count,
                is_active = EXCLUDED.is_active,
                deal_score = COALESCE(EXCLUDED.deal_score, guitar_listings.deal_score),
                updated_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&listing.id)
        .bind(&listing.source)
        .bind(&listing.brand)
        .bind(&listing.model)
        .bind(&listing.guitar_type)
        .bind(&listing.title)
        .bind(&listing.url)
        .bind(listing.price)
        .bind(listing.condition.to_string())
        .bind(listing.seller_verified)
        .bind(listing.seller_rating)
        .bind(listing.seller_account_age_days.map(clamp_i32))
        .bind(listing.seller_total_sales.map(clamp_i32))
        .bind(&listing.description)
        .bind(clamp_i32(listing.image_count))
        .bind(listing.listed_at)
        .bind(listing.is_active)
        .bind(listing.deal_score.map(i16::from))
        .fetch_one(&self.db)
        .await?;

        Ok(inserted)
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl MarketStore for PgStore {
    async fn cached_estimate(
        &self,
        key: &MarketKey,
    ) -> Result<Option<MarketPriceEstimate>, StoreError> {
        let row = sqlx::query_as::<_, MarketPriceRow>(
            r#"
            SELECT brand, model, guitar_type, avg_price, min_price, max_price,
                   median_price, sample_size, calculated_at
            FROM market_prices
            WHERE cache_key = $1
            "#,
        )
        .bind(key.cache_key())
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(MarketPriceEstimate::from))
    }

    async fn save_estimate(&self, estimate: &MarketPriceEstimate) -> Result<(), StoreError> {
        let key = estimate.key();

        // Older writes lose to whatever is already stored
        let result = sqlx::query(
            r#"
            INSERT INTO market_prices (
                cache_key, brand, model, guitar_type, avg_price, min_price,
                max_price, median_price, sample_size, calculated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (cache_key) DO UPDATE SET
                avg_price = EXCLUDED.avg_price,
                min_price = EXCLUDED.min_price,
                max_price = EXCLUDED.max_price,
                median_price = EXCLUDED.median_price,
                sample_size = EXCLUDED.sample_size,
                calculated_at = EXCLUDED.calculated_at
            WHERE market_prices.calculated_at <= EXCLUDED.calculated_at
            "#,
        )
        .bind(key.cache_key())
        .bind(&estimate.brand)
        .bind(&estimate.model)
        .bind(&estimate.guitar_type)
        .bind(estimate.avg_price)
        .bind(estimate.min_price)
        .bind(estimate.max_price)
        .bind(estimate.median_price)
        .bind(clamp_i32(estimate.sample_size))
        .bind(estimate.calculated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Kept newer cached estimate for {}", key);
        }

        Ok(())
    }

    async fn historical_listings(
        &self,
        key: &MarketKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<Listing>, StoreError> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT id, source, brand, model, guitar_type, title, url, price, condition,
                   seller_verified, seller_rating, seller_account_age_days, seller_total_sales,
                   description, image_count, listed_at, is_active, deal_score
            FROM guitar_listings
            WHERE LOWER(brand) = LOWER($1)
              AND LOWER(model) = LOWER($2)
              AND LOWER(guitar_type) = LOWER($3)
              AND listed_at >= $4
            ORDER BY id
            "#,
        )
        .bind(key.brand.trim())
        .bind(key.model.trim())
        .bind(key.guitar_type.trim())
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_listing() {
                Ok(listing) => listings.push(listing),
                Err(e) => warn!("Skipping stored listing: {}", e),
            }
        }

        debug!("Loaded {} historical listings for {}", listings.len(), key);

        Ok(listings)
    }

    async fn save_listings(&self, listings: &[Listing]) -> Result<WriteStats, StoreError> {
        info!("Writing {} listings to database", listings.len());

        let mut stats = WriteStats::default();

        for listing in listings {
            match self.upsert_listing(listing).await {
                Ok(true) => stats.inserted += 1,
                Ok(false) => stats.updated += 1,
                Err(e) => {
                    warn!("Failed to write listing {}: {}", listing.id, e);
                    stats.errors += 1;
                }
            }
        }

        info!("Write complete: {}", stats);

        Ok(stats)
    }
}
